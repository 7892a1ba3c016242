//! One-shot vector-addition run over any [`Platform`].
//!
//! Stages execute strictly in order and the first failure ends the run.
//! Every handle acquired along the way is owned by this function's stack
//! frame, so early returns release them too.

use crate::config::RunConfig;
use crate::device::{ComputeDevice, DeviceScore};
use crate::dispatch::{DispatchPlan, DispatchPlanner};
use crate::error::{DispatchError, Result};
use crate::platform::{DeviceContext, KernelArg, KernelArgs, KernelOp, Platform};
use crate::selector::DeviceSelector;
use crate::workload::{ValidationReport, VectorWorkload};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span};

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StageTiming {
    /// Stage label
    pub stage: &'static str,
    /// Elapsed time
    pub elapsed: Duration,
}

/// Timings of every completed stage, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StageTimings {
    entries: Vec<StageTiming>,
}

impl StageTimings {
    fn time<T>(&mut self, stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let value = f()?;
        let elapsed = start.elapsed();
        debug!(stage, ?elapsed, "stage complete");
        self.entries.push(StageTiming { stage, elapsed });
        Ok(value)
    }

    /// Recorded stages.
    pub fn entries(&self) -> &[StageTiming] {
        &self.entries
    }

    /// Time spent in `stage`, if it ran.
    pub fn get(&self, stage: &str) -> Option<Duration> {
        self.entries
            .iter()
            .find(|t| t.stage == stage)
            .map(|t| t.elapsed)
    }

    /// Sum over all stages.
    pub fn total(&self) -> Duration {
        self.entries.iter().map(|t| t.elapsed).sum()
    }
}

impl fmt::Display for StageTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {:.3?}", t.stage, t.elapsed)?;
        }
        Ok(())
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RunReport {
    /// Platform the run executed on
    pub platform: String,
    /// Enumeration index of the selected device
    pub device_index: usize,
    /// Name of the selected device
    pub device_name: String,
    /// Selection score of the device
    pub score: DeviceScore,
    /// Launch geometry
    pub plan: DispatchPlan,
    /// Result check against the host reference
    pub validation: ValidationReport,
    /// Per-stage timings
    pub timings: StageTimings,
}

/// Selects a device on `platform`, adds two random vectors on it and
/// validates the result.
///
/// Validation mismatches are not errors; they are reported in
/// [`RunReport::validation`].
pub fn run<P: Platform>(platform: &P, config: &RunConfig) -> Result<RunReport> {
    config.validate()?;
    let span = info_span!("run", platform = platform.name(), elements = config.element_count);
    let _enter = span.enter();

    let mut timings = StageTimings::default();

    let devices = timings.time("enumerate", || platform.enumerate(config.device_class))?;
    let selector = DeviceSelector::for_class(config.device_class);
    let selected = timings.time("select", || selector.select_best(&devices))?;
    let device = selected.device;

    let mut context = timings.time("context", || platform.create_context(device))?;
    let kernel = timings.time("build", || context.build_kernel(KernelOp::VectorAdd))?;

    let workload = timings.time("generate", || {
        Ok(VectorWorkload::random(config.element_count, config.seed))
    })?;
    let (a, b, c) = timings.time("upload", || {
        let a = context.upload(workload.a())?;
        let b = context.upload(workload.b())?;
        let c = context.allocate(workload.len())?;
        Ok((a, b, c))
    })?;

    let count = u32::try_from(workload.len()).map_err(|_| {
        DispatchError::invalid_config(format!("element count {} exceeds u32", workload.len()))
    })?;
    let mut args = KernelArgs::new(KernelOp::VectorAdd);
    timings.time("bind", || {
        args.set(KernelArg::Buffer(&a))?
            .set(KernelArg::Buffer(&b))?
            .set(KernelArg::Buffer(&c))?
            .set(KernelArg::Uint(count))?;
        Ok(())
    })?;

    let planner = DispatchPlanner::with_policy(config.rounding);
    let plan = timings.time("plan", || {
        let local_size = context.work_group_size(&kernel);
        if let Ok(size) = local_size {
            info!(
                device = selected.index,
                local_size = size,
                "local work group size for device {} is {}",
                selected.index,
                size
            );
        }
        planner.plan_queried(workload.len(), local_size)
    })?;
    debug!(%plan, policy = %planner.policy(), "planned launch");

    timings.time("launch", || {
        context.launch(&kernel, &plan, &args)?;
        context.finish()
    })?;

    let mut output = vec![0.0_f32; workload.len()];
    timings.time("read back", || context.read_back(&c, &mut output))?;

    let validation = timings.time("validate", || {
        Ok(workload.validate(&output, config.max_mismatches))
    })?;
    info!(
        correct = validation.correct,
        total = validation.total,
        "{validation}"
    );

    Ok(RunReport {
        platform: platform.name().to_owned(),
        device_index: selected.index,
        device_name: device.name().to_owned(),
        score: selected.score(),
        plan,
        validation,
        timings,
    })
}
