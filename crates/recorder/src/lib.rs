//! # Recorder
//!
//! Output side of the capture pipeline.
//!
//! Responsibilities:
//! - Append typed records to a `.dvsrec` container (`Recorder` implements `RecordSink`)
//! - Optional sidecars: compact event log, 16-bit frame PNGs, frame log, UTC map
//! - Lossy live preview (`PreviewRenderer` implements `PreviewSink`)
//! - Read containers back and convert them to sidecar files

pub mod container;
pub mod convert;
pub mod error;
pub mod metrics;
pub mod preview;
pub mod recorder;
pub mod sinks;

pub use container::{ContainerReader, ContainerWriter};
pub use convert::{convert_container, ConvertOptions, ConvertReport};
pub use error::{RecorderError, Result};
pub use metrics::{MetricsSnapshot, RecorderMetrics};
pub use preview::{PreviewHandle, PreviewImage, PreviewRenderer, RateEstimator};
pub use recorder::{finalize_to, temp_file_name, Recorder, RecorderOptions};
pub use sinks::{EventLogWriter, FrameDump, UtcMap, UtcMapWriter};
