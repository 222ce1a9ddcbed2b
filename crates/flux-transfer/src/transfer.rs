use bytes::Bytes;
use flux_types::{MeasurementOption, Payload, PublishAck, RetentionPolicy, StreamConfig, StreamInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{ObjectBucket, StreamContext};
use crate::config::{MeasurementPolicy, TransferSettings};
use crate::error::{Result, TransferError};
use crate::naming;

/// 传输器选项
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// 发布确认超时，`None` 表示只受取消令牌约束
    pub publish_timeout: Option<Duration>,
    /// 创建流失败时删除刚写入的配置
    pub compensate_on_failure: bool,
    pub measurement_policy: MeasurementPolicy,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from(&TransferSettings::default())
    }
}

impl From<&TransferSettings> for TransferOptions {
    fn from(settings: &TransferSettings) -> Self {
        Self {
            publish_timeout: settings.publish_timeout(),
            compensate_on_failure: settings.compensate_on_failure,
            measurement_policy: settings.measurement_policy,
        }
    }
}

/// 测量信息：保存的配置与实时流信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementInfo {
    pub option: MeasurementOption,
    pub info: StreamInfo,
}

/// 传输器
///
/// 绑定一个命名空间，负责测量配置的存取、工作队列流的创建删除以及载荷发布。
/// 克隆只复制共享句柄。
#[derive(Clone)]
pub struct Transfer {
    namespace: String,
    context: Arc<dyn StreamContext>,
    bucket: Arc<dyn ObjectBucket>,
    options: TransferOptions,
}

impl Transfer {
    /// 新建传输器，创建（或打开）`<namespace>_logs` 对象桶
    pub async fn new(namespace: impl Into<String>, context: Arc<dyn StreamContext>) -> Result<Self> {
        Self::with_options(namespace, context, TransferOptions::default()).await
    }

    pub async fn with_options(
        namespace: impl Into<String>,
        context: Arc<dyn StreamContext>,
        options: TransferOptions,
    ) -> Result<Self> {
        let namespace = namespace.into();
        naming::validate_namespace(&namespace)?;

        let bucket_name = naming::bucket_name(&namespace);
        let bucket = context.create_object_bucket(&bucket_name).await?;

        info!(
            namespace = %namespace,
            bucket = %bucket_name,
            backend = context.backend_type(),
            "Transfer initialized"
        );

        Ok(Self {
            namespace,
            context,
            bucket,
            options,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    pub fn bucket_name(&self) -> String {
        naming::bucket_name(&self.namespace)
    }

    pub fn stream_name(&self, key: &str) -> String {
        naming::stream_name(&self.namespace, key)
    }

    pub fn subject(&self, measurement: &str) -> String {
        naming::subject(&self.namespace, measurement)
    }

    /// 获取传输器信息
    pub async fn get(&self, key: &str) -> Result<MeasurementInfo> {
        naming::validate_token("measurement key", key)?;

        let data = self.bucket.get(key).await?;
        let option: MeasurementOption =
            serde_json::from_slice(&data).map_err(TransferError::Decode)?;

        let name = self.stream_name(key);
        let info = self.context.stream_info(&name).await?;

        debug!(namespace = %self.namespace, key = %key, stream = %name, "Measurement loaded");
        Ok(MeasurementInfo { option, info })
    }

    /// 设置传输器
    ///
    /// 先写入配置，再创建工作队列流。两步之间没有事务：
    /// 流创建失败时配置仍然保留，除非启用了 `compensate_on_failure`。
    pub async fn set(&self, key: &str, option: &MeasurementOption) -> Result<StreamInfo> {
        naming::validate_token("measurement key", key)?;
        naming::validate_token("measurement", &option.measurement)?;

        if self.options.measurement_policy == MeasurementPolicy::Strict && option.measurement != key {
            return Err(TransferError::InvalidInput(format!(
                "measurement '{}' does not match key '{}'",
                option.measurement, key
            )));
        }

        let data = serde_json::to_vec(option).map_err(TransferError::Encode)?;
        self.bucket.put(key, Bytes::from(data)).await?;

        let config = StreamConfig::new(self.stream_name(key))
            .with_subject(self.subject(&option.measurement))
            .with_description(option.description.clone())
            .with_retention(RetentionPolicy::WorkQueue);

        match self.context.create_or_update_stream(config).await {
            Ok(info) => {
                info!(
                    namespace = %self.namespace,
                    key = %key,
                    stream = %info.config.name,
                    subject = %self.subject(&option.measurement),
                    "Measurement configured"
                );
                Ok(info)
            }
            Err(err) => {
                if self.options.compensate_on_failure {
                    self.compensate_set(key).await;
                }
                Err(err.into())
            }
        }
    }

    async fn compensate_set(&self, key: &str) {
        match self.bucket.delete(key).await {
            Ok(()) => debug!(namespace = %self.namespace, key = %key, "Measurement write rolled back"),
            Err(err) => warn!(
                namespace = %self.namespace,
                key = %key,
                error = %err,
                "Failed to roll back measurement write"
            ),
        }
    }

    /// 移除配置
    ///
    /// 先删除配置再删除流；配置删除失败时流保持不变。
    pub async fn remove(&self, key: &str) -> Result<()> {
        naming::validate_token("measurement key", key)?;

        self.bucket.delete(key).await?;

        let name = self.stream_name(key);
        self.context.delete_stream(&name).await?;

        info!(namespace = %self.namespace, key = %key, stream = %name, "Measurement removed");
        Ok(())
    }

    /// 发布
    ///
    /// 等待后端确认；取消令牌触发时返回 `Cancelled`，超时返回 `Timeout`。
    pub async fn publish(
        &self,
        cancel: &CancellationToken,
        key: &str,
        payload: &Payload,
    ) -> Result<PublishAck> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        naming::validate_token("measurement key", key)?;

        let data = serde_json::to_vec(payload).map_err(TransferError::Encode)?;
        let subject = self.subject(key);

        let ack = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            result = self.publish_with_timeout(&subject, Bytes::from(data)) => result?,
        };

        debug!(subject = %subject, stream = %ack.stream, sequence = ack.sequence, "Payload published");
        Ok(ack)
    }

    async fn publish_with_timeout(&self, subject: &str, data: Bytes) -> Result<PublishAck> {
        let publish = self.context.publish(subject, data);
        match self.options.publish_timeout {
            Some(limit) => match tokio::time::timeout(limit, publish).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(TransferError::Timeout(limit)),
            },
            None => Ok(publish.await?),
        }
    }

    /// 列出已配置的测量键
    pub async fn list(&self) -> Result<Vec<String>> {
        Ok(self.bucket.list().await?)
    }
}
