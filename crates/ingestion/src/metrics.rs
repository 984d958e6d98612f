//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::PacketKind;

use crate::buffer::PushOutcome;

/// Counters for one stream
#[derive(Debug, Default)]
struct StreamCounters {
    received: AtomicU64,
    samples: AtomicU64,
    evicted: AtomicU64,
    rejected: AtomicU64,
    malformed: AtomicU64,
    empty: AtomicU64,
}

/// Ingestion metrics
///
/// Updated from driver threads, read by the CLI summary and tests.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    streams: [StreamCounters; 4],
}

fn slot(kind: PacketKind) -> usize {
    match kind {
        PacketKind::Event => 0,
        PacketKind::Imu => 1,
        PacketKind::Frame => 2,
        PacketKind::Special => 3,
    }
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch handed to a StreamBuffer
    pub fn record_push(&self, kind: PacketKind, samples: usize, outcome: PushOutcome) {
        let counters = &self.streams[slot(kind)];
        counters.received.fetch_add(1, Ordering::Relaxed);
        counters.samples.fetch_add(samples as u64, Ordering::Relaxed);
        match outcome {
            PushOutcome::Accepted => {}
            PushOutcome::EvictedOldest => {
                counters.evicted.fetch_add(1, Ordering::Relaxed);
            }
            PushOutcome::Rejected => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
        metrics::counter!("dvs_capture_batches_received_total", "stream" => kind.as_str())
            .increment(1);
        if outcome != PushOutcome::Accepted {
            metrics::counter!("dvs_capture_batches_dropped_total", "stream" => kind.as_str())
                .increment(1);
        }
    }

    /// Record a malformed packet
    pub fn record_malformed(&self, kind: PacketKind) {
        self.streams[slot(kind)]
            .malformed
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("dvs_capture_packets_malformed_total", "stream" => kind.as_str())
            .increment(1);
    }

    /// Record an empty packet
    pub fn record_empty(&self, kind: PacketKind) {
        self.streams[slot(kind)].empty.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot for one stream
    pub fn stream(&self, kind: PacketKind) -> StreamSnapshot {
        let counters = &self.streams[slot(kind)];
        StreamSnapshot {
            received: counters.received.load(Ordering::Relaxed),
            samples: counters.samples.load(Ordering::Relaxed),
            evicted: counters.evicted.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            malformed: counters.malformed.load(Ordering::Relaxed),
            empty: counters.empty.load(Ordering::Relaxed),
        }
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events: self.stream(PacketKind::Event),
            imu: self.stream(PacketKind::Imu),
            frames: self.stream(PacketKind::Frame),
            special: self.stream(PacketKind::Special),
        }
    }
}

/// Per-stream counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSnapshot {
    /// Batches pushed (including dropped ones)
    pub received: u64,
    /// Samples in those batches
    pub samples: u64,
    pub evicted: u64,
    pub rejected: u64,
    pub malformed: u64,
    pub empty: u64,
}

impl StreamSnapshot {
    pub fn dropped(&self) -> u64 {
        self.evicted + self.rejected
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub events: StreamSnapshot,
    pub imu: StreamSnapshot,
    pub frames: StreamSnapshot,
    pub special: StreamSnapshot,
}

impl MetricsSnapshot {
    pub fn total_received(&self) -> u64 {
        self.events.received + self.imu.received + self.frames.received + self.special.received
    }

    pub fn total_dropped(&self) -> u64 {
        self.events.dropped() + self.imu.dropped() + self.frames.dropped() + self.special.dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_push_outcomes() {
        let metrics = IngestionMetrics::new();
        metrics.record_push(PacketKind::Event, 10, PushOutcome::Accepted);
        metrics.record_push(PacketKind::Event, 5, PushOutcome::EvictedOldest);
        metrics.record_push(PacketKind::Frame, 1, PushOutcome::Rejected);
        metrics.record_malformed(PacketKind::Frame);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events.received, 2);
        assert_eq!(snapshot.events.samples, 15);
        assert_eq!(snapshot.events.evicted, 1);
        assert_eq!(snapshot.frames.rejected, 1);
        assert_eq!(snapshot.frames.malformed, 1);
        assert_eq!(snapshot.total_received(), 3);
        assert_eq!(snapshot.total_dropped(), 2);
    }
}
