//! Best-device selection and dispatch sizing for accelerator kernels.
//!
//! This crate re-exports [`vecdispatch_core`] and adds the command line
//! front end used by the `vecdispatch` binary.
//!
//! # Example
//!
//! ```
//! use vecdispatch::prelude::*;
//!
//! let platform = SimPlatform::workstation();
//! let config = RunConfigBuilder::from_defaults()
//!     .element_count(1024)
//!     .build()
//!     .unwrap();
//! let report = run(&platform, &config).unwrap();
//! assert!(report.validation.all_correct());
//! ```

pub mod cli;

pub use vecdispatch_core::*;
