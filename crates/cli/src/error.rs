//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or is invalid
    #[error("Invalid configuration: {0}")]
    Config(#[source] contracts::ContractError),

    /// Capture session failed (device unavailable, drain loop stopped, ...)
    #[error("Capture failed: {0}")]
    Session(#[from] sync_engine::SessionError),

    /// Container or sidecar error
    #[error("Recording error: {0}")]
    Recorder(#[from] recorder::RecorderError),

    /// Capture worker did not finish cleanly
    #[error("Capture worker failed: {message}")]
    Worker { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
