//! Recorder error types

use contracts::ContractError;
use thiserror::Error;

/// Recorder-specific errors
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Not a container file
    #[error("not a capture container (bad magic)")]
    BadMagic,

    /// Container written by an incompatible version
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u16),

    /// Malformed record or header
    #[error("corrupt container at byte {offset}: {message}")]
    Corrupt { offset: u64, message: String },

    /// Stream header could not be (de)serialized
    #[error("stream header error: {0}")]
    Header(#[from] serde_json::Error),

    /// Frame image could not be written
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// `start` while a recording is open
    #[error("recorder '{0}' is already recording")]
    AlreadyRecording(String),

    /// Operation needs an open recording
    #[error("recorder '{0}' is not recording")]
    NotRecording(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecorderError {
    /// Create a corrupt-container error
    pub fn corrupt(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupt {
            offset,
            message: message.into(),
        }
    }
}

impl From<RecorderError> for ContractError {
    fn from(err: RecorderError) -> Self {
        match err {
            RecorderError::NotRecording(name) => ContractError::not_recording(name),
            RecorderError::Io(e) => ContractError::Io(e),
            other => ContractError::Other(other.to_string()),
        }
    }
}

/// Recorder Result type alias
pub type Result<T> = std::result::Result<T, RecorderError>;
