//! Capture orchestrator - wires the mock device, session, recorder and preview.
//!
//! Runs on a blocking thread: session commands wait for the DrainLoop to
//! answer, and the loop below only polls a stop flag and the deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{CaptureConfig, PacketSource};
use ingestion::MockPacketSource;
use observability::CaptureMetricsAggregator;
use recorder::{finalize_to, PreviewRenderer, Recorder, RecorderOptions};
use sync_engine::CaptureSession;
use tracing::{error, info, instrument, warn};

use super::PipelineStats;
use crate::error::Result;

/// Poll interval of the control loop
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Status log / metrics sample interval
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Resolved capture configuration
    pub capture: CaptureConfig,

    /// Stop after this long (None = until stopped)
    pub duration: Option<Duration>,
}

/// Main capture orchestrator
pub struct CapturePipeline {
    config: PipelineConfig,
}

impl CapturePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `stop` is set, the duration elapses, or the session ends itself
    #[instrument(name = "capture_pipeline_run", skip_all)]
    pub fn run(self, stop: &AtomicBool) -> Result<PipelineStats> {
        let started = Instant::now();
        let capture = &self.config.capture;

        let source: Arc<dyn PacketSource> =
            Arc::new(MockPacketSource::from_device_config(&capture.device));
        let (width, height) = source.resolution();

        // Record to a temporary name; move to the configured name afterwards
        let destination = capture
            .recording
            .file_name
            .as_ref()
            .map(|name| capture.recording.output_dir.join(name));
        let mut options = RecorderOptions::from(&capture.recording);
        options.file_name = None;
        let recorder = Recorder::new("container", options);
        let recorder_metrics = recorder.metrics().clone();
        let recording_path = recorder.next_path();

        let preview = PreviewRenderer::from_config(width, height, &capture.preview);
        let preview_handle = preview.handle();

        let mut session = CaptureSession::start(source, capture, recorder, preview)?;
        if capture.recording.enabled {
            session.start_recording(&recording_path)?;
        } else {
            info!("recording disabled, preview only");
        }

        let mut partial = None;
        let mut aggregator = CaptureMetricsAggregator::new();
        let mut last_status = Instant::now();
        aggregator.observe(0.0, 0, 0, 0);

        loop {
            if stop.load(Ordering::SeqCst) {
                info!("stop requested");
                break;
            }
            if self.config.duration.is_some_and(|d| started.elapsed() >= d) {
                info!("capture duration reached");
                break;
            }
            if session.is_finished() {
                warn!("capture session ended on its own");
                break;
            }
            std::thread::sleep(POLL_INTERVAL);

            if partial.is_none() && !session.record_health().is_ok() {
                // the drain loop already closed the file; collect its path once
                let path = match session.stop_recording() {
                    Ok(Some(path)) => path,
                    Ok(None) => recording_path.clone(),
                    Err(e) => {
                        warn!(error = %e, "could not collect the partial recording");
                        recording_path.clone()
                    }
                };
                error!(
                    path = %path.display(),
                    "recording failed and was stopped, preview keeps running; keep or delete the partial file"
                );
                partial = Some(path);
            }

            let since = last_status.elapsed();
            if since >= STATUS_INTERVAL {
                last_status = Instant::now();
                let drain = session.stats();
                let ingestion = session.ingestion_metrics();
                aggregator.observe(
                    since.as_secs_f64(),
                    drain.records_submitted,
                    ingestion.total_dropped(),
                    drain.last_backlog,
                );
                let preview = preview_handle.latest();
                info!(
                    records = drain.records_submitted,
                    backlog = drain.last_backlog,
                    eps = preview.as_ref().map_or(0.0, |p| p.events_per_second),
                    fps = preview.as_ref().map_or(0.0, |p| p.frames_per_second),
                    recording_ok = session.record_health().is_ok(),
                    "capture status"
                );
            }
        }

        // the final drain pass runs before the recorder is closed
        let report = session.stop()?;
        let mut output = report.output;

        if !report.recorder_ok {
            // a partial recording keeps its temporary name
            if let Some(path) = output.as_ref() {
                warn!(path = %path.display(), "partial recording not moved to the configured name");
            }
        } else if let (Some(path), Some(destination)) = (output.as_ref(), destination) {
            output = Some(finalize_to(path, destination)?);
        }

        Ok(PipelineStats {
            duration: started.elapsed(),
            drain: report.drain,
            ingestion: report.ingestion,
            recorder: recorder_metrics.snapshot(),
            recorder_ok: report.recorder_ok,
            preview_updates: report.preview.updates(),
            output,
            aggregator,
        })
    }
}
