//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 队列配置非法 (构造时即失败)
    #[error("invalid queue config at '{field}': {message}")]
    InvalidConfig {
        /// 配置字段
        field: String,
        /// 错误消息
        message: String,
    },

    /// UDP 报文格式错误
    #[error("malformed datagram: {reason}")]
    MalformedDatagram {
        /// 原因
        reason: String,
    },

    /// 未知的事件主题
    #[error("unknown event topic '{topic}'")]
    UnknownTopic {
        /// 主题
        topic: String,
    },
}

impl IngestionError {
    pub(crate) fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDatagram {
            reason: reason.into(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
