//! vecdispatch: pick the best compute device and add two vectors on it.
//!
//! Exit status is 0 when every element validates, 2 when some do not, and
//! 1 when any stage fails.

use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vecdispatch::backend::SimPlatform;
use vecdispatch::cli::{write_candidates, write_report, Backend, Cli};
use vecdispatch::config::RunConfig;
use vecdispatch::pipeline::run;
use vecdispatch::platform::Platform;
use vecdispatch::DispatchError;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match execute(&cli) {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<DispatchError>() {
                Some(dispatch) => eprintln!("error: {}: {dispatch}", dispatch.stage()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(cli: &Cli) -> Result<ExitCode> {
    let config = cli.run_config()?;
    match cli.backend {
        Backend::Sim => drive(&SimPlatform::workstation(), cli, &config),
        Backend::Cuda => drive_cuda(cli, &config),
    }
}

#[cfg(feature = "cuda")]
fn drive_cuda(cli: &Cli, config: &RunConfig) -> Result<ExitCode> {
    drive(&vecdispatch::backend::CudaPlatform, cli, config)
}

#[cfg(not(feature = "cuda"))]
fn drive_cuda(_cli: &Cli, _config: &RunConfig) -> Result<ExitCode> {
    Err(DispatchError::platform(
        "this build has no CUDA support (enable the `cuda` feature)",
    )
    .into())
}

fn drive<P: Platform>(platform: &P, cli: &Cli, config: &RunConfig) -> Result<ExitCode> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.list {
        write_candidates(platform, config.device_class, &mut out)?;
        return Ok(ExitCode::SUCCESS);
    }

    let report = run(platform, config)?;
    if cli.json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        write_report(&report, &mut out)?;
    }
    tracing::info!(total = ?report.timings.total(), timings = %report.timings, "run complete");

    Ok(if report.validation.all_correct() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
