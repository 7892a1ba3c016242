//! Platform implementations.
//!
//! - [`sim`]: in-process simulated accelerators, always available
//! - `cuda`: NVIDIA devices through the CUDA driver (feature `cuda`)

pub mod sim;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use sim::{FaultPoint, LiveResources, SimDeviceSpec, SimPlatform};

#[cfg(feature = "cuda")]
pub use cuda::CudaPlatform;
