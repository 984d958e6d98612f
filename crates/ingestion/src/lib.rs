//! # Ingestion
//!
//! Driver-facing side of the capture pipeline.
//!
//! Responsibilities:
//! - Receive packets on driver threads (`StreamRouter` implements `PacketHandler`)
//! - Copy or retain them into per-stream `StreamBuffer`s without blocking
//! - Wake the single consumer through `DrainSignal`
//! - Skip and count malformed packets
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{CaptureBuffers, IngestionMetrics, MockPacketSource, StreamRouter};
//!
//! let buffers = Arc::new(CaptureBuffers::default());
//! let router = Arc::new(StreamRouter::new(buffers.clone(), Arc::new(IngestionMetrics::new())));
//! source.register(router);
//! source.start()?;
//!
//! for queued in buffers.buffer(PacketKind::Event).drain_all() {
//!     // ...
//! }
//! ```

mod buffer;
mod error;
mod metrics;
mod mock;
mod router;
mod signal;

// Re-exports
pub use buffer::{BufferSettings, PushOutcome, StreamBuffer};
pub use error::{IngestionError, Result};
pub use metrics::{IngestionMetrics, MetricsSnapshot, StreamSnapshot};
pub use mock::{split_device_time, MockPacketSource, MockSourceConfig};
pub use router::{wall_clock_unix_s, BatchRef, CaptureBuffers, QueuedBatch, StreamRouter};
pub use signal::{DrainSignal, WakeReason};
