//! Command line interface and report rendering.

use clap::{Parser, ValueEnum};
use std::io::{self, Write};
use vecdispatch_core::config::{RunConfig, RunConfigBuilder};
use vecdispatch_core::device::{ComputeDevice, DeviceClass};
use vecdispatch_core::dispatch::RoundingPolicy;
use vecdispatch_core::error::Result;
use vecdispatch_core::pipeline::RunReport;
use vecdispatch_core::platform::Platform;
use vecdispatch_core::selector::DeviceSelector;

/// Platform implementation to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    /// In-process simulated devices
    #[default]
    Sim,
    /// NVIDIA devices through the CUDA driver
    Cuda,
}

/// Select the best compute device and add two vectors on it.
#[derive(Parser, Debug)]
#[command(name = "vecdispatch")]
#[command(version)]
#[command(about = "Select the best accelerator and run a vector addition on it", long_about = None)]
pub struct Cli {
    /// Number of vector elements [env: VECDISPATCH_ELEMENTS] [default: 100000]
    #[arg(short = 'n', long)]
    pub elements: Option<usize>,

    /// Seed for the random inputs [env: VECDISPATCH_SEED] [default: 0]
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Global size rounding (always-extra-group or ceiling)
    #[arg(long, default_value_t = RoundingPolicy::AlwaysExtraGroup)]
    pub rounding: RoundingPolicy,

    /// Device class to enumerate (accelerator, cpu or all)
    #[arg(long, default_value_t = DeviceClass::Accelerator)]
    pub class: DeviceClass,

    /// Platform backend
    #[arg(short, long, value_enum, default_value_t = Backend::Sim)]
    pub backend: Backend,

    /// Print every candidate with its score and exit
    #[arg(long)]
    pub list: bool,

    /// Maximum number of mismatches printed
    #[arg(long, default_value_t = 16)]
    pub max_mismatches: usize,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Layers command line values over the process-wide defaults.
    pub fn run_config(&self) -> Result<RunConfig> {
        self.layer(RunConfigBuilder::from_env()?)
    }

    /// Layers command line values over built-in defaults with environment
    /// overrides read through `lookup`.
    pub fn run_config_with<F>(&self, lookup: F) -> Result<RunConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = RunConfig::default().apply_env(lookup)?;
        self.layer(RunConfigBuilder::from_config(base))
    }

    fn layer(&self, builder: RunConfigBuilder) -> Result<RunConfig> {
        let mut builder = builder
            .rounding(self.rounding)
            .device_class(self.class)
            .max_mismatches(self.max_mismatches);
        if let Some(elements) = self.elements {
            builder = builder.element_count(elements);
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder.build()
    }
}

/// Writes one line per candidate device, marking the one that would be
/// selected.
pub fn write_candidates<P: Platform, W: Write>(
    platform: &P,
    class: DeviceClass,
    out: &mut W,
) -> anyhow::Result<()> {
    let devices = platform.enumerate(class)?;
    let selector = DeviceSelector::for_class(class);
    let candidates = selector.score_all(&devices)?;
    let best = selector.select_best(&devices)?;

    for (device, candidate) in devices.iter().zip(&candidates) {
        let marker = if candidate.index == best.index { '*' } else { ' ' };
        writeln!(
            out,
            "{marker} [{}] {}: {} units x {} MHz = {}",
            candidate.index,
            device.name(),
            candidate.metrics.compute_units,
            candidate.metrics.clock_mhz,
            candidate.score()
        )?;
    }
    Ok(())
}

/// Writes the diagnostic lines and the summary of a run.
pub fn write_report<W: Write>(report: &RunReport, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "info: local work group size for device {} is {}",
        report.device_index,
        report.plan.local_size()
    )?;
    for mismatch in &report.validation.mismatches {
        writeln!(out, "{mismatch}")?;
    }
    writeln!(out, "{}", report.validation)
}
