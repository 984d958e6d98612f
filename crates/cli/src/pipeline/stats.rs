//! Capture statistics.

use std::path::PathBuf;
use std::time::Duration;

use ingestion::MetricsSnapshot as IngestionSnapshot;
use observability::CaptureMetricsAggregator;
use recorder::MetricsSnapshot as RecorderSnapshot;
use sync_engine::DrainSnapshot;

/// Statistics from a capture run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// DrainLoop counters
    pub drain: DrainSnapshot,

    /// Producer-side counters
    pub ingestion: IngestionSnapshot,

    /// Container writer counters
    pub recorder: RecorderSnapshot,

    /// Recorder health at the end of the run
    pub recorder_ok: bool,

    /// Items the preview renderer received
    pub preview_updates: u64,

    /// Final recording path
    pub output: Option<PathBuf>,

    /// Periodic status samples
    pub aggregator: CaptureMetricsAggregator,
}

impl PipelineStats {
    /// Records submitted per second
    pub fn records_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.drain.records_submitted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Capture Statistics ===\n");

        println!("Overview");
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   Batches received: {}", self.ingestion.total_received());
        println!("   Batches drained: {}", self.drain.batches_drained);
        println!(
            "   Records submitted: {} ({:.1}/s)",
            self.drain.records_submitted,
            self.records_per_second()
        );
        println!("   Records written: {}", self.recorder.records_written);
        println!("   Bytes written: {}", self.recorder.bytes_written);

        println!("\nLosses");
        println!("   Dropped at ingestion: {}", self.ingestion.total_dropped());
        println!("   Rejected before threshold: {}", self.drain.samples_rejected);
        println!("   Invalid timestamps: {}", self.drain.samples_invalid);
        println!("   Empty frames: {}", self.drain.empty_frames);
        println!("   Record failures: {}", self.drain.record_failures);
        if self.drain.recordings_aborted > 0 {
            println!("   Recordings stopped on failure: {}", self.drain.recordings_aborted);
        }

        println!("\nPreview");
        println!("   Updates: {}", self.preview_updates);
        println!("   Skipped under backlog: {}", self.drain.preview_skipped);
        println!("   Max backlog: {}", self.drain.max_backlog);

        if self.drain.timestamp_regressions > 0 || self.drain.timestamp_resets > 0 {
            println!("\nTimestamps");
            println!("   Regressions: {}", self.drain.timestamp_regressions);
            println!("   Resets: {}", self.drain.timestamp_resets);
        }

        println!("\n{}", self.aggregator.summary());

        match &self.output {
            Some(path) if self.recorder_ok => println!("Recording: {}", path.display()),
            Some(path) => println!("Partial recording (keep or delete): {}", path.display()),
            None => println!("Recording: none"),
        }
        println!();
    }
}
