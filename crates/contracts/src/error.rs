//! Layered error definitions
//!
//! Categorized by source: config / device / packet / recorder

use thiserror::Error;

use crate::PacketKind;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Device Errors =====
    /// Device could not be opened or started (fatal for the run)
    #[error("device '{device}' unavailable: {message}")]
    DeviceUnavailable { device: String, message: String },

    /// Packet with inconsistent layout
    #[error("malformed {kind} packet: {message}")]
    MalformedPacket { kind: PacketKind, message: String },

    // ===== Recorder Errors =====
    /// Recorder write error
    #[error("recorder '{sink_name}' write error: {message}")]
    RecordWrite { sink_name: String, message: String },

    /// Recorder used in the wrong state (e.g. write before start)
    #[error("recorder '{sink_name}' is not recording")]
    NotRecording { sink_name: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create device unavailable error
    pub fn device_unavailable(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create malformed packet error
    pub fn malformed_packet(kind: PacketKind, message: impl Into<String>) -> Self {
        Self::MalformedPacket {
            kind,
            message: message.into(),
        }
    }

    /// Create recorder write error
    pub fn record_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create not-recording error
    pub fn not_recording(sink_name: impl Into<String>) -> Self {
        Self::NotRecording {
            sink_name: sink_name.into(),
        }
    }

    /// Fatal errors abort the run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DeviceUnavailable { .. } | Self::ConfigParse { .. } | Self::ConfigValidation { .. }
        )
    }
}
