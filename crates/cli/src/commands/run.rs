//! `run` command implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{CaptureConfig, Micros};
use tracing::{info, warn};

use super::load_config;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::pipeline::{CapturePipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_capture(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, args)?;

    info!(
        device = %config.device.name,
        width = config.device.width,
        height = config.device.height,
        threshold = %config.capture.start_threshold_us,
        recording = config.recording.enabled,
        output_dir = %config.recording.output_dir.display(),
        "Configuration loaded"
    );

    let pipeline = CapturePipeline::new(PipelineConfig {
        capture: config,
        duration: args.duration.filter(|d| *d > 0.0).map(Duration::from_secs_f64),
    });

    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = stop.clone();
    let mut worker = tokio::task::spawn_blocking(move || pipeline.run(&worker_stop));

    info!("Starting capture...");

    let joined = tokio::select! {
        joined = &mut worker => joined,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping capture...");
            stop.store(true, Ordering::SeqCst);
            worker.await
        }
    };

    let stats = joined.map_err(|e| CliError::worker(e.to_string()))??;
    info!(
        records = stats.drain.records_submitted,
        duration_secs = stats.duration.as_secs_f64(),
        "Capture completed"
    );
    stats.print_summary();

    info!("dvs-capture finished");
    Ok(())
}

/// Apply CLI flags on top of the file configuration and re-validate
fn apply_overrides(config: &mut CaptureConfig, args: &RunArgs) -> Result<()> {
    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding output directory from CLI");
        config.recording.output_dir = output.clone();
    }
    if let Some(threshold) = args.start_threshold_us {
        info!(threshold, "Overriding start threshold from CLI");
        config.capture.start_threshold_us = Micros(threshold);
    }
    if args.no_record {
        config.recording.enabled = false;
    }
    config_loader::ConfigLoader::validate(config).map_err(CliError::Config)
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
