//! Device selection and dispatch sizing for data-parallel kernels.
//!
//! This crate picks the best of several heterogeneous compute devices by a
//! throughput heuristic and computes a valid one-dimensional launch
//! partition for an arbitrary element count, given the work-group size the
//! device reports for a kernel.
//!
//! # Key Concepts
//!
//! - **Score**: compute units × maximum clock frequency (MHz); the highest
//!   score wins and ties keep the first device enumerated
//! - **Work-group size**: the granularity a device dispatches work-items in;
//!   the global size must be a multiple of it
//! - **Plan**: element count, local size and the padded global size
//!
//! # Modules
//!
//! - [`backend`]: simulated and CUDA platform implementations
//! - [`config`]: run configuration and environment overrides
//! - [`device`]: device trait, metrics and scores
//! - [`dispatch`]: launch geometry planner
//! - [`error`]: error types
//! - [`pipeline`]: end-to-end vector-addition run
//! - [`platform`]: platform, context and kernel argument abstractions
//! - [`selector`]: best-device selection
//! - [`workload`]: input generation and result validation

pub mod backend;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod platform;
pub mod selector;
pub mod workload;

pub use error::{DispatchError, Result, Stage};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use vecdispatch_core::prelude::*;
///
/// let platform = SimPlatform::workstation();
/// let devices = platform.enumerate(DeviceClass::Accelerator).unwrap();
/// let best = select_best(&devices).unwrap();
/// assert_eq!(best.index, 1);
///
/// let plan = plan(100_000, 256).unwrap();
/// assert_eq!(plan.global_size(), 100_096);
/// ```
pub mod prelude {
    pub use crate::backend::{FaultPoint, LiveResources, SimDeviceSpec, SimPlatform};
    pub use crate::config::{run_defaults, RunConfig, RunConfigBuilder};
    pub use crate::device::{ComputeDevice, DeviceClass, DeviceMetrics, DeviceScore, QueryError};
    pub use crate::dispatch::{plan, DispatchPlan, DispatchPlanner, RoundingPolicy};
    pub use crate::error::{DeviceAttribute, DispatchError, Result, Stage};
    pub use crate::pipeline::{run, RunReport, StageTimings};
    pub use crate::platform::{
        DeviceBuffer, DeviceContext, Kernel, KernelArg, KernelArgs, KernelOp, Platform,
    };
    pub use crate::selector::{select_best, Candidate, DeviceSelector, SelectionResult};
    pub use crate::workload::{Mismatch, ValidationReport, VectorWorkload};

    #[cfg(feature = "cuda")]
    pub use crate::backend::CudaPlatform;
}
