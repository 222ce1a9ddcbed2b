use async_trait::async_trait;
use bytes::Bytes;
use flux_types::{PublishAck, StreamConfig, StreamInfo};
use std::sync::Arc;

use crate::error::BackendResult;

pub mod memory;
#[cfg(feature = "nats")]
pub mod nats;

pub use memory::{MemoryBucket, MemoryStreamContext, StoredMessage};
#[cfg(feature = "nats")]
pub use nats::{NatsBucket, NatsStreamContext};

/// 对象桶抽象 trait
///
/// 以字符串为键、不透明字节为值的键值存储。
#[async_trait]
pub trait ObjectBucket: Send + Sync {
    /// 读取对象，不存在时返回 `BackendError::NotFound`
    async fn get(&self, key: &str) -> BackendResult<Bytes>;

    /// 写入（覆盖）对象
    async fn put(&self, key: &str, data: Bytes) -> BackendResult<()>;

    /// 删除对象，不存在时返回 `BackendError::NotFound`
    async fn delete(&self, key: &str) -> BackendResult<()>;

    /// 列出所有对象键，按字典序升序返回
    async fn list(&self) -> BackendResult<Vec<String>>;

    /// 桶名
    fn name(&self) -> &str;
}

/// 流上下文抽象 trait
///
/// 提供对象桶创建、流管理和发布能力，对应 JetStream 上下文。
#[async_trait]
pub trait StreamContext: Send + Sync {
    /// 创建（或打开）对象桶
    async fn create_object_bucket(&self, bucket: &str) -> BackendResult<Arc<dyn ObjectBucket>>;

    /// 创建流，已存在时更新配置
    async fn create_or_update_stream(&self, config: StreamConfig) -> BackendResult<StreamInfo>;

    /// 删除流
    async fn delete_stream(&self, name: &str) -> BackendResult<()>;

    /// 获取流信息
    async fn stream_info(&self, name: &str) -> BackendResult<StreamInfo>;

    /// 发布消息并等待确认
    async fn publish(&self, subject: &str, payload: Bytes) -> BackendResult<PublishAck>;

    /// 获取后端类型
    fn backend_type(&self) -> &str;
}
