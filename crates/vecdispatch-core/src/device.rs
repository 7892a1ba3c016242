//! Compute device model.
//!
//! A device is an opaque, platform-owned handle that exposes two capability
//! metrics, the number of compute units and the maximum clock frequency.
//! Both are read through fallible queries; the selector only ever borrows
//! devices and never mutates them.

use crate::error::{DeviceAttribute, DispatchError};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Class of device a platform is asked to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum DeviceClass {
    /// Discrete or integrated GPUs and other accelerators.
    #[default]
    Accelerator,
    /// Host processors exposed as compute devices.
    Cpu,
    /// Every device the platform knows about.
    All,
}

impl DeviceClass {
    /// Whether a device of class `device` belongs to the requested class.
    pub fn admits(self, device: DeviceClass) -> bool {
        match self {
            Self::All => true,
            requested => requested == device,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accelerator => write!(f, "accelerator"),
            Self::Cpu => write!(f, "cpu"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for DeviceClass {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accelerator" | "gpu" => Ok(Self::Accelerator),
            "cpu" => Ok(Self::Cpu),
            "all" => Ok(Self::All),
            other => Err(DispatchError::invalid_config(format!(
                "unknown device class '{other}' (expected accelerator, cpu or all)"
            ))),
        }
    }
}

/// Failure reported by a device capability query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct QueryError {
    reason: String,
}

impl QueryError {
    /// Create a query error with a platform-provided reason.
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A compute device that can be scored and selected.
pub trait ComputeDevice {
    /// Human-readable device name, used for diagnostics only.
    fn name(&self) -> &str;

    /// Class this device belongs to.
    fn class(&self) -> DeviceClass;

    /// Number of parallel compute units.
    fn compute_units(&self) -> Result<u32, QueryError>;

    /// Maximum clock frequency in MHz.
    fn clock_frequency_mhz(&self) -> Result<u32, QueryError>;
}

impl<D: ComputeDevice + ?Sized> ComputeDevice for &D {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn class(&self) -> DeviceClass {
        (**self).class()
    }

    fn compute_units(&self) -> Result<u32, QueryError> {
        (**self).compute_units()
    }

    fn clock_frequency_mhz(&self) -> Result<u32, QueryError> {
        (**self).clock_frequency_mhz()
    }
}

/// Capability metrics read from a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceMetrics {
    /// Number of compute units
    pub compute_units: u32,
    /// Clock frequency in MHz
    pub clock_mhz: u32,
}

impl DeviceMetrics {
    /// Creates metrics from raw values.
    pub fn new(compute_units: u32, clock_mhz: u32) -> Self {
        Self {
            compute_units,
            clock_mhz,
        }
    }

    /// Reads both metrics from `device`, returning the first failing query.
    ///
    /// `index` is the device's enumeration position and is only used to
    /// label the error.
    pub fn query<D: ComputeDevice + ?Sized>(device: &D, index: usize) -> crate::Result<Self> {
        let compute_units = device.compute_units().map_err(|e| {
            DispatchError::device_query(index, DeviceAttribute::ComputeUnits, e.to_string())
        })?;
        let clock_mhz = device.clock_frequency_mhz().map_err(|e| {
            DispatchError::device_query(index, DeviceAttribute::ClockFrequency, e.to_string())
        })?;
        Ok(Self::new(compute_units, clock_mhz))
    }

    /// Performance heuristic: compute units times clock frequency.
    pub fn score(&self) -> DeviceScore {
        DeviceScore(u64::from(self.compute_units) * u64::from(self.clock_mhz))
    }
}

/// Derived ranking value of a device.
///
/// Widened to `u64` so the product of two `u32` metrics never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceScore(pub u64);

impl DeviceScore {
    /// Raw score value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
