//! Benchmarks for device selection, launch planning and simulated runs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vecdispatch_core::backend::{SimDeviceSpec, SimPlatform};
use vecdispatch_core::config::RunConfigBuilder;
use vecdispatch_core::device::DeviceClass;
use vecdispatch_core::dispatch::{DispatchPlanner, RoundingPolicy};
use vecdispatch_core::pipeline::run;
use vecdispatch_core::platform::Platform;
use vecdispatch_core::selector::select_best;

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    for policy in [RoundingPolicy::AlwaysExtraGroup, RoundingPolicy::Ceiling] {
        let planner = DispatchPlanner::with_policy(policy);
        group.bench_function(BenchmarkId::from_parameter(policy), |b| {
            b.iter(|| planner.plan(black_box(100_000), black_box(256)))
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_best");

    for count in [2usize, 16, 256] {
        let platform = SimPlatform::new(
            (0..count)
                .map(|i| {
                    SimDeviceSpec::accelerator(format!("dev{i}"), (i % 97) as u32, 1000 + i as u32)
                })
                .collect(),
        );
        let devices = platform.enumerate(DeviceClass::All).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &devices, |b, devices| {
            b.iter(|| select_best(black_box(devices)))
        });
    }

    group.finish();
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulated_run");
    group.sample_size(20);

    for elements in [1_000usize, 100_000, 1_000_000] {
        let platform = SimPlatform::workstation();
        let config = RunConfigBuilder::from_defaults()
            .element_count(elements)
            .build()
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(elements), &config, |b, config| {
            b.iter(|| run(&platform, config))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_plan, bench_select, bench_run);
criterion_main!(benches);
