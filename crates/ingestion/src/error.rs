//! Ingestion 错误类型

use contracts::PacketKind;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 数据包布局不一致
    #[error("malformed {kind} packet: {message}")]
    MalformedPacket {
        /// 包类型
        kind: PacketKind,
        /// 错误消息
        message: String,
    },

    /// 回调类型与包内容不符
    #[error("{actual} packet delivered through the {expected} callback")]
    UnexpectedKind {
        expected: PacketKind,
        actual: PacketKind,
    },

    /// 已停止接收
    #[error("router for source {source_id} is closed")]
    Closed {
        /// 设备源 ID
        source_id: i16,
    },
}

impl IngestionError {
    pub fn malformed(kind: PacketKind, message: impl Into<String>) -> Self {
        Self::MalformedPacket {
            kind,
            message: message.into(),
        }
    }
}

impl From<IngestionError> for contracts::ContractError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::MalformedPacket { kind, message } => {
                contracts::ContractError::malformed_packet(kind, message)
            }
            other => contracts::ContractError::Other(other.to_string()),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
