//! Sync engine 错误类型

use contracts::ContractError;
use thiserror::Error;

/// 时钟标定错误
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("clock calibration needs at least 2 probes, got {got}")]
    NotEnoughProbes { got: usize },

    #[error("clock probe outside the valid wall-clock range")]
    InvalidProbe,
}

/// CaptureSession 错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 设备无法启动 (致命，不会开始录制)
    #[error("capture device failed to start: {0}")]
    DeviceUnavailable(#[source] ContractError),

    /// Recorder 启动/结束失败
    #[error("recorder error: {0}")]
    Recorder(#[source] ContractError),

    /// 无法创建 DrainLoop 线程
    #[error("failed to spawn drain loop: {0}")]
    Spawn(#[from] std::io::Error),

    /// DrainLoop 已退出，无法接收命令
    #[error("drain loop is not running")]
    DrainStopped,

    /// DrainLoop 线程 panic
    #[error("drain loop panicked")]
    DrainPanicked,
}

/// Session Result 类型别名
pub type Result<T> = std::result::Result<T, SessionError>;
