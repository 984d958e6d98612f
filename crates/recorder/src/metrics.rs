//! Recorder metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one recorder
#[derive(Debug, Default)]
pub struct RecorderMetrics {
    /// Records appended to the container
    records_written: AtomicU64,
    /// Container bytes written
    bytes_written: AtomicU64,
    /// Failed record writes (container or sidecar)
    failure_count: AtomicU64,
    /// Records skipped by the kind filter
    filtered_count: AtomicU64,
    /// Recordings opened
    recordings: AtomicU64,
}

impl RecorderMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    /// Count one appended record of `bytes` bytes
    pub fn inc_written(&self, bytes: usize) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        observability::record_recorder_bytes(bytes);
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn filtered_count(&self) -> u64 {
        self.filtered_count.load(Ordering::Relaxed)
    }

    pub fn inc_filtered_count(&self) {
        self.filtered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn recordings(&self) -> u64 {
        self.recordings.load(Ordering::Relaxed)
    }

    pub fn inc_recordings(&self) {
        self.recordings.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_written: self.records_written(),
            bytes_written: self.bytes_written(),
            failure_count: self.failure_count(),
            filtered_count: self.filtered_count(),
            recordings: self.recordings(),
        }
    }
}

/// Snapshot of recorder metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_written: u64,
    pub bytes_written: u64,
    pub failure_count: u64,
    pub filtered_count: u64,
    pub recordings: u64,
}
