//! # Sync Engine
//!
//! 采集管线的消费端。
//!
//! 负责：
//! - 由 (overflow, local) 重建 64 位设备时间戳
//! - 启动阈值同步闸门，帧稳定期内烧录经过的秒数
//! - 单消费者 DrainLoop：按节拍换出缓冲，记录 + 预览
//! - 设备时钟与墙钟标定
//! - `CaptureSession` 管理设备、DrainLoop 与 Recorder 的生命周期
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::CaptureSession;
//!
//! let source: Arc<dyn PacketSource> = Arc::new(MockPacketSource::from_device_config(&config.device));
//! let mut session = CaptureSession::start(source, &config, recorder, preview)?;
//! session.start_recording(&path)?;
//! // ... capture ...
//! let report = session.stop()?;
//! ```

mod calibration;
mod engine;
mod error;
mod gate;
mod overlay;
mod session;
mod stats;
mod timestamp;

#[cfg(test)]
mod testing;

// Re-exports
pub use calibration::{
    calibrate_live, calibrate_wall_clock, collect_probes, ms_of_day, ClockCalibration, ClockProbe,
    MS_PER_DAY,
};
pub use engine::{DrainCommand, DrainLoop, DrainOutcome, DrainSettings, PassReport};
pub use error::{CalibrationError, Result, SessionError};
pub use gate::{admit, SynchronizationGate, Timestamped};
pub use overlay::{burn_elapsed_seconds, burn_text};
pub use session::{CaptureSession, SessionReport};
pub use stats::{DrainSnapshot, DrainState, DrainStats, StateCell};
pub use timestamp::{reconstruct, EpochTracker, Monotonicity, TimestampReconstructor, OVERFLOW_SHIFT};
