//! End-to-end runs on the simulated platform.

use pretty_assertions::assert_eq;
use vecdispatch_core::backend::{FaultPoint, SimDeviceSpec, SimPlatform};
use vecdispatch_core::config::{RunConfig, RunConfigBuilder};
use vecdispatch_core::device::DeviceClass;
use vecdispatch_core::dispatch::RoundingPolicy;
use vecdispatch_core::error::{DeviceAttribute, Stage};
use vecdispatch_core::pipeline::run;
use vecdispatch_core::DispatchError;

fn config(elements: usize) -> RunConfig {
    RunConfigBuilder::from_defaults()
        .element_count(elements)
        .seed(42)
        .build()
        .unwrap()
}

fn two_gpus(fault: Option<FaultPoint>) -> SimPlatform {
    let mut fast = SimDeviceSpec::accelerator("fast", 8, 1500);
    if let Some(point) = fault {
        fast = fast.failing_at(point);
    }
    SimPlatform::new(vec![SimDeviceSpec::accelerator("slow", 10, 1000), fast])
}

#[test]
fn test_full_run_validates_every_element() {
    let platform = two_gpus(None);
    let report = run(&platform, &config(100_000)).unwrap();

    assert_eq!(report.platform, "simulated");
    assert_eq!(report.device_index, 1);
    assert_eq!(report.device_name, "fast");
    assert_eq!(report.score.value(), 12_000);
    assert_eq!(report.plan.local_size(), 256);
    assert_eq!(report.plan.global_size(), 100_096);
    assert_eq!(
        report.validation.to_string(),
        "Computed '100000/100000' correct values!"
    );
    assert!(report.validation.mismatches.is_empty());
    assert!(platform.live_resources().is_empty());
}

#[test]
fn test_exact_multiple_launches_idle_group() {
    let report = run(&two_gpus(None), &config(256)).unwrap();
    assert_eq!(report.plan.global_size(), 512);
    assert_eq!(report.plan.work_groups(), 2);
    assert!(report.validation.all_correct());
}

#[test]
fn test_empty_workload() {
    let report = run(&two_gpus(None), &config(0)).unwrap();
    assert_eq!(report.plan.global_size(), 256);
    assert_eq!(report.validation.total, 0);
    assert!(report.validation.all_correct());
}

#[test]
fn test_ceiling_policy_end_to_end() {
    let config = RunConfigBuilder::from_defaults()
        .element_count(1024)
        .rounding(RoundingPolicy::Ceiling)
        .build()
        .unwrap();
    let report = run(&two_gpus(None), &config).unwrap();
    assert_eq!(report.plan.global_size(), 1024);
    assert!(report.validation.all_correct());
}

#[test]
fn test_no_devices_of_class() {
    let config = RunConfigBuilder::from_defaults()
        .device_class(DeviceClass::Cpu)
        .build()
        .unwrap();
    let err = run(&two_gpus(None), &config).unwrap_err();
    assert!(matches!(err, DispatchError::NoDevicesFound { .. }));
    assert_eq!(err.stage(), Stage::Enumeration);
}

#[test]
fn test_query_failure_aborts_selection() {
    let platform = two_gpus(Some(FaultPoint::ClockFrequency));
    let err = run(&platform, &config(16)).unwrap_err();
    match err {
        DispatchError::DeviceQuery {
            index, attribute, ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(attribute, DeviceAttribute::ClockFrequency);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(platform.live_resources().is_empty());
}

#[test]
fn test_injected_faults_surface_with_their_stage() {
    let cases = [
        (FaultPoint::Context, Stage::Context),
        (FaultPoint::KernelBuild, Stage::KernelBuild),
        (FaultPoint::Upload, Stage::Transfer),
        (FaultPoint::Allocate, Stage::Transfer),
        (FaultPoint::WorkGroupSize, Stage::Planning),
        (FaultPoint::Launch, Stage::Launch),
        (FaultPoint::Finish, Stage::Launch),
        (FaultPoint::ReadBack, Stage::Transfer),
    ];
    for (fault, stage) in cases {
        let platform = two_gpus(Some(fault));
        let err = run(&platform, &config(1000)).unwrap_err();
        assert_eq!(err.stage(), stage, "fault {fault:?}: {err}");
        assert!(
            platform.live_resources().is_empty(),
            "fault {fault:?} leaked {:?}",
            platform.live_resources()
        );
    }
}

#[test]
fn test_faults_on_unselected_devices_are_ignored() {
    let platform = SimPlatform::new(vec![
        SimDeviceSpec::accelerator("broken", 1, 1).failing_at(FaultPoint::Launch),
        SimDeviceSpec::accelerator("healthy", 4, 1000),
    ]);
    let report = run(&platform, &config(500)).unwrap();
    assert_eq!(report.device_name, "healthy");
    assert!(report.validation.all_correct());
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_oversized_workload_is_rejected_before_enumeration() {
    let config = RunConfig {
        element_count: u32::MAX as usize + 1,
        ..RunConfig::default()
    };
    let err = run(&two_gpus(None), &config).unwrap_err();
    assert_eq!(err.stage(), Stage::Configuration);
}

#[test]
fn test_same_seed_same_report() {
    let first = run(&two_gpus(None), &config(4096)).unwrap();
    let second = run(&two_gpus(None), &config(4096)).unwrap();
    assert_eq!(first.validation, second.validation);
    assert_eq!(first.plan, second.plan);
}

#[cfg(feature = "serde")]
#[test]
fn test_report_serializes() {
    let report = run(&two_gpus(None), &config(300)).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["device_index"], 1);
    assert_eq!(json["plan"]["global_size"], 512);
    assert_eq!(json["validation"]["correct"], 300);
    assert_eq!(json["timings"]["entries"][0]["stage"], "enumerate");
}
