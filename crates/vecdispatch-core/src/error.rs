//! Error types for device selection, dispatch planning and kernel execution.
//!
//! Every error is fatal for the run that produced it. Each variant maps to
//! the pipeline [`Stage`] it was raised from, so callers can report which
//! step of the one-shot computation failed.

use std::fmt;
use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    /// Run configuration validation.
    Configuration,
    /// Platform context or command queue creation.
    Context,
    /// Device enumeration.
    Enumeration,
    /// Device capability queries and scoring.
    Selection,
    /// Kernel compilation and creation.
    KernelBuild,
    /// Buffer allocation, upload and readback.
    Transfer,
    /// Kernel argument binding.
    ArgumentBinding,
    /// Work-group size query and launch geometry.
    Planning,
    /// Kernel enqueue and completion.
    Launch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Context => write!(f, "context creation"),
            Self::Enumeration => write!(f, "device enumeration"),
            Self::Selection => write!(f, "device selection"),
            Self::KernelBuild => write!(f, "kernel build"),
            Self::Transfer => write!(f, "memory transfer"),
            Self::ArgumentBinding => write!(f, "kernel argument binding"),
            Self::Planning => write!(f, "dispatch planning"),
            Self::Launch => write!(f, "kernel launch"),
        }
    }
}

/// Device attribute read during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAttribute {
    /// Number of parallel compute units.
    ComputeUnits,
    /// Maximum configured clock frequency in MHz.
    ClockFrequency,
}

impl fmt::Display for DeviceAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComputeUnits => write!(f, "max compute units"),
            Self::ClockFrequency => write!(f, "max clock frequency"),
        }
    }
}

/// Errors that can occur while selecting a device and dispatching work to it.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The platform reported no devices of the requested class.
    #[error("no devices found (class: {class})")]
    NoDevicesFound {
        /// Device class that was enumerated
        class: String,
    },

    /// Reading a capability metric from a candidate device failed.
    ///
    /// Selection stops at the first failing candidate; no partial ranking
    /// is returned.
    #[error("failed to query {attribute} of device {index}: {reason}")]
    DeviceQuery {
        /// Enumeration index of the failing device
        index: usize,
        /// Attribute being read
        attribute: DeviceAttribute,
        /// Platform-provided failure description
        reason: String,
    },

    /// The device reported an unusable work-group size, or the query failed.
    #[error("invalid work-group size {reported}: {reason}")]
    InvalidGranularity {
        /// Size reported by the device (0 when the query itself failed)
        reported: usize,
        /// Why the granularity was rejected
        reason: String,
    },

    /// The launch geometry does not fit in the platform's size type.
    #[error("global work size overflows for {element_count} elements with local size {local_size}")]
    PlanOverflow {
        /// Requested element count
        element_count: usize,
        /// Work-group size
        local_size: usize,
    },

    /// Context or command queue setup failed.
    #[error("platform error: {reason}")]
    Platform {
        /// Description of the failure
        reason: String,
    },

    /// Compiling the kernel source or creating the kernel object failed.
    #[error("failed to build kernel '{kernel}': {reason}")]
    KernelBuild {
        /// Kernel entry point name
        kernel: String,
        /// Build log or platform message
        reason: String,
    },

    /// Binding a single kernel argument failed.
    #[error("failed to set kernel argument {index}: {reason}")]
    KernelArgument {
        /// Zero-based argument position
        index: usize,
        /// Description of the failure
        reason: String,
    },

    /// Enqueueing or completing the kernel failed.
    #[error("kernel launch failed: {reason}")]
    Launch {
        /// Description of the failure
        reason: String,
    },

    /// Allocating, uploading or reading back a device buffer failed.
    #[error("memory transfer failed: {reason}")]
    Transfer {
        /// Description of the failure
        reason: String,
    },

    /// The run configuration is inconsistent.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem
        reason: String,
    },
}

impl DispatchError {
    /// Create a `NoDevicesFound` error for the given device class.
    pub fn no_devices<C: fmt::Display>(class: C) -> Self {
        Self::NoDevicesFound {
            class: class.to_string(),
        }
    }

    /// Create a `DeviceQuery` error.
    pub fn device_query<S: Into<String>>(
        index: usize,
        attribute: DeviceAttribute,
        reason: S,
    ) -> Self {
        Self::DeviceQuery {
            index,
            attribute,
            reason: reason.into(),
        }
    }

    /// Create an `InvalidGranularity` error.
    pub fn invalid_granularity<S: Into<String>>(reported: usize, reason: S) -> Self {
        Self::InvalidGranularity {
            reported,
            reason: reason.into(),
        }
    }

    /// Create a `Platform` error.
    pub fn platform<S: Into<String>>(reason: S) -> Self {
        Self::Platform {
            reason: reason.into(),
        }
    }

    /// Create a `KernelBuild` error.
    pub fn kernel_build<K: Into<String>, S: Into<String>>(kernel: K, reason: S) -> Self {
        Self::KernelBuild {
            kernel: kernel.into(),
            reason: reason.into(),
        }
    }

    /// Create a `KernelArgument` error.
    pub fn kernel_argument<S: Into<String>>(index: usize, reason: S) -> Self {
        Self::KernelArgument {
            index,
            reason: reason.into(),
        }
    }

    /// Create a `Launch` error.
    pub fn launch<S: Into<String>>(reason: S) -> Self {
        Self::Launch {
            reason: reason.into(),
        }
    }

    /// Create a `Transfer` error.
    pub fn transfer<S: Into<String>>(reason: S) -> Self {
        Self::Transfer {
            reason: reason.into(),
        }
    }

    /// Create an `InvalidConfig` error.
    pub fn invalid_config<S: Into<String>>(reason: S) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// The pipeline stage this error was raised from.
    pub fn stage(&self) -> Stage {
        match self {
            Self::NoDevicesFound { .. } => Stage::Enumeration,
            Self::DeviceQuery { .. } => Stage::Selection,
            Self::InvalidGranularity { .. } | Self::PlanOverflow { .. } => Stage::Planning,
            Self::Platform { .. } => Stage::Context,
            Self::KernelBuild { .. } => Stage::KernelBuild,
            Self::KernelArgument { .. } => Stage::ArgumentBinding,
            Self::Launch { .. } => Stage::Launch,
            Self::Transfer { .. } => Stage::Transfer,
            Self::InvalidConfig { .. } => Stage::Configuration,
        }
    }
}

/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
