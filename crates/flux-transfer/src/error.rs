use std::time::Duration;
use thiserror::Error;

/// 后端错误
///
/// 由 [`crate::backend::StreamContext`] / [`crate::backend::ObjectBucket`] 实现返回。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// 对象或流不存在
    #[error("not found: {0}")]
    NotFound(String),

    /// 后端拒绝请求（subject 重叠、无流接收、配置非法等）
    #[error("rejected: {0}")]
    Rejected(String),

    /// 连接或服务端故障
    #[error("unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// 传输器统一错误类型
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(#[source] BackendError),

    #[error("Publish cancelled")]
    Cancelled,

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TransferError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransferError::NotFound(_))
    }
}

impl From<BackendError> for TransferError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(what) => TransferError::NotFound(what),
            other => TransferError::Backend(other),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, TransferError>;
