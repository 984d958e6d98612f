//! RecordSink / PreviewSink - DrainLoop outputs
//!
//! Both sinks are single-writer: only the DrainLoop thread calls into them.
//! The recorder's [`HealthFlag`] is the one piece of state other threads read.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ContractError, EventSample, FrameSample, ImuSample, PacketKind};

/// Description of one recorded stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescription {
    pub stream_id: u16,
    /// Stream name, also used for sidecar file names
    pub name: String,
    pub kind: PacketKind,
    pub width: u16,
    pub height: u16,
}

impl StreamDescription {
    pub fn new(stream_id: u16, name: impl Into<String>, kind: PacketKind, width: u16, height: u16) -> Self {
        Self {
            stream_id,
            name: name.into(),
            kind,
            width,
            height,
        }
    }
}

/// Typed container record
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerRecord {
    /// All admitted events of one driver batch
    EventArray {
        stream_id: u16,
        timestamp_us: i64,
        width: u16,
        height: u16,
        events: Vec<EventSample>,
    },
    Imu { stream_id: u16, sample: ImuSample },
    Image {
        stream_id: u16,
        frame: FrameSample,
        /// Calibrated wall-clock milliseconds within the day
        wall_clock_ms: Option<u32>,
        /// Host wall clock (unix seconds) when the packet arrived
        arrival_unix_s: f64,
    },
}

impl ContainerRecord {
    pub fn kind(&self) -> PacketKind {
        match self {
            ContainerRecord::EventArray { .. } => PacketKind::Event,
            ContainerRecord::Imu { .. } => PacketKind::Imu,
            ContainerRecord::Image { .. } => PacketKind::Frame,
        }
    }

    pub fn stream_id(&self) -> u16 {
        match self {
            ContainerRecord::EventArray { stream_id, .. }
            | ContainerRecord::Imu { stream_id, .. }
            | ContainerRecord::Image { stream_id, .. } => *stream_id,
        }
    }

    /// Device-relative timestamp of the record
    pub fn timestamp_us(&self) -> i64 {
        match self {
            ContainerRecord::EventArray { timestamp_us, .. } => *timestamp_us,
            ContainerRecord::Imu { sample, .. } => sample.timestamp_us,
            ContainerRecord::Image { frame, .. } => frame.timestamp_us,
        }
    }
}

/// Persistent, lock-free health flag
///
/// Cleared by a failed write, set again only by a new `start`.
#[derive(Debug, Clone)]
pub struct HealthFlag(Arc<AtomicBool>);

impl HealthFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_ok(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns true if this call flipped the flag
    pub fn mark_failed(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn reset(&self) {
        self.0.store(true, Ordering::Release);
    }
}

impl Default for HealthFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Recorder output trait
pub trait RecordSink: Send {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Open a new recording; resets the health flag
    fn start(&mut self, streams: &[StreamDescription], path: &Path) -> Result<(), ContractError>;

    /// Append one record
    ///
    /// # Errors
    /// Write errors also clear the health flag.
    fn write(&mut self, record: &ContainerRecord) -> Result<(), ContractError>;

    /// Flush buffered output (called once per drain pass)
    fn flush(&mut self) -> Result<(), ContractError>;

    /// Finalize and return the output path
    fn stop(&mut self) -> Result<PathBuf, ContractError>;

    fn is_recording(&self) -> bool;

    fn health(&self) -> HealthFlag;

    fn is_ok(&self) -> bool {
        self.health().is_ok()
    }
}

/// Input to the preview renderer
#[derive(Debug, Clone, Copy)]
pub enum PreviewItem<'a> {
    Events(&'a [EventSample]),
    Imu(&'a ImuSample),
    Frame(&'a FrameSample),
}

/// Preview output trait
pub trait PreviewSink: Send {
    fn update(&mut self, item: PreviewItem<'_>);
}

/// Preview sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPreview;

impl PreviewSink for NoopPreview {
    fn update(&mut self, _item: PreviewItem<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_flag_shared() {
        let flag = HealthFlag::new();
        let reader = flag.clone();
        assert!(reader.is_ok());

        assert!(flag.mark_failed());
        assert!(!flag.mark_failed());
        assert!(!reader.is_ok());

        flag.reset();
        assert!(reader.is_ok());
    }

    #[test]
    fn test_record_accessors() {
        let record = ContainerRecord::Imu {
            stream_id: 1,
            sample: ImuSample {
                timestamp_us: 42,
                accel: [0.0; 3],
                gyro: [0.0; 3],
                temperature: 0.0,
            },
        };
        assert_eq!(record.kind(), PacketKind::Imu);
        assert_eq!(record.stream_id(), 1);
        assert_eq!(record.timestamp_us(), 42);
    }
}
