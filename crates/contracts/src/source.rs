//! PacketSource trait - driver abstraction
//!
//! The driver owns its delivery threads and calls back into a registered
//! [`PacketHandler`] once per packet. Real devices and the mock source share
//! this interface.

use std::sync::Arc;

use crate::{ContractError, PacketBatch, PacketContainer, PacketKind, StreamDescription};

/// Per-kind packet callbacks
///
/// Invoked synchronously on a driver thread. A borrowed batch is only valid
/// until the callback returns; a container handle may be retained.
/// Implementations must not block and must not panic.
pub trait PacketHandler: Send + Sync {
    fn on_event_batch(&self, batch: &PacketBatch);

    fn on_imu_batch(&self, batch: &PacketBatch);

    fn on_frame_batch(&self, batch: &PacketBatch);

    fn on_container(&self, container: Arc<PacketContainer>);
}

/// Packet source trait
///
/// # Example
///
/// ```ignore
/// let source: Arc<dyn PacketSource> = open_device()?;
/// source.register(router.clone());
/// source.start()?;
/// // ... capture ...
/// source.stop();
/// ```
pub trait PacketSource: Send + Sync {
    /// Device name (used for logging)
    fn name(&self) -> &str;

    fn source_id(&self) -> i16;

    /// Sensor resolution (width, height)
    fn resolution(&self) -> (u16, u16);

    /// Nominal sample rate of a stream, if the device reports one
    fn sample_rate_hz(&self, kind: PacketKind) -> Option<f64>;

    /// Current device-relative clock in microseconds
    fn device_time_us(&self) -> i64;

    /// Register the packet handler
    ///
    /// Registering again replaces the previous handler.
    fn register(&self, handler: Arc<dyn PacketHandler>);

    /// Start delivery
    ///
    /// # Errors
    /// `ContractError::DeviceUnavailable` when the device cannot be opened.
    fn start(&self) -> Result<(), ContractError>;

    /// Stop delivery; no callback runs after this returns.
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Streams exposed by this device, in recording order
    fn stream_descriptions(&self) -> Vec<StreamDescription> {
        let (width, height) = self.resolution();
        vec![
            StreamDescription::new(0, "dvs", PacketKind::Event, width, height),
            StreamDescription::new(1, "imu", PacketKind::Imu, 0, 0),
            StreamDescription::new(2, "aps", PacketKind::Frame, width, height),
        ]
    }
}
