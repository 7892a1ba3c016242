//! Run configuration.
//!
//! Process-wide defaults are read once from the environment
//! (`VECDISPATCH_ELEMENTS`, `VECDISPATCH_SEED`) and can be refined with
//! [`RunConfigBuilder`]. A variable that does not parse is an error, never
//! a silent fallback.

use crate::device::DeviceClass;
use crate::dispatch::RoundingPolicy;
use crate::error::{DispatchError, Result};
use once_cell::sync::Lazy;

/// Default number of vector elements.
pub const DEFAULT_ELEMENT_COUNT: usize = 100_000;

/// Environment variable overriding the element count.
pub const ENV_ELEMENTS: &str = "VECDISPATCH_ELEMENTS";

/// Environment variable overriding the workload seed.
pub const ENV_SEED: &str = "VECDISPATCH_SEED";

/// Settings for one dispatch run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RunConfig {
    /// Number of vector elements
    pub element_count: usize,
    /// Seed for the random input vectors
    pub seed: u64,
    /// Global size rounding policy
    pub rounding: RoundingPolicy,
    /// Device class to enumerate
    pub device_class: DeviceClass,
    /// Maximum number of mismatches kept in the validation report
    pub max_mismatches: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            element_count: DEFAULT_ELEMENT_COUNT,
            seed: 0,
            rounding: RoundingPolicy::default(),
            device_class: DeviceClass::default(),
            max_mismatches: 16,
        }
    }
}

impl RunConfig {
    /// Applies environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_ELEMENTS) {
            self.element_count = raw.trim().parse().map_err(|_| {
                DispatchError::invalid_config(format!("{ENV_ELEMENTS}='{raw}' is not a count"))
            })?;
        }
        if let Some(raw) = lookup(ENV_SEED) {
            self.seed = raw.trim().parse().map_err(|_| {
                DispatchError::invalid_config(format!("{ENV_SEED}='{raw}' is not a seed"))
            })?;
        }
        Ok(self)
    }

    /// Checks the configuration can be dispatched.
    ///
    /// The kernel receives the element count as a 32-bit unsigned scalar.
    pub fn validate(&self) -> Result<()> {
        if u32::try_from(self.element_count).is_err() {
            return Err(DispatchError::invalid_config(format!(
                "element count {} does not fit the kernel's 32-bit count argument",
                self.element_count
            )));
        }
        Ok(())
    }
}

static RUN_DEFAULTS: Lazy<Result<RunConfig>> =
    Lazy::new(|| RunConfig::default().apply_env(|key| std::env::var(key).ok()));

/// Process-wide defaults, including environment overrides.
///
/// The environment is read once. A malformed variable fails every call
/// with the same `InvalidConfig` error.
pub fn run_defaults() -> Result<&'static RunConfig> {
    RUN_DEFAULTS.as_ref().map_err(|err| err.clone())
}

/// Builder for a [`RunConfig`].
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// Starts from the process-wide defaults.
    pub fn from_env() -> Result<Self> {
        run_defaults().map(|config| Self::from_config(config.clone()))
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: RunConfig) -> Self {
        Self { config }
    }

    /// Starts from built-in defaults, ignoring the environment.
    pub fn from_defaults() -> Self {
        Self {
            config: RunConfig::default(),
        }
    }

    /// Sets the element count.
    pub fn element_count(mut self, count: usize) -> Self {
        self.config.element_count = count;
        self
    }

    /// Sets the workload seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sets the rounding policy.
    pub fn rounding(mut self, rounding: RoundingPolicy) -> Self {
        self.config.rounding = rounding;
        self
    }

    /// Sets the device class to enumerate.
    pub fn device_class(mut self, class: DeviceClass) -> Self {
        self.config.device_class = class;
        self
    }

    /// Sets the number of mismatches kept for diagnostics.
    pub fn max_mismatches(mut self, max: usize) -> Self {
        self.config.max_mismatches = max;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<RunConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RunConfigBuilder {
    fn default() -> Self {
        Self::from_defaults()
    }
}
