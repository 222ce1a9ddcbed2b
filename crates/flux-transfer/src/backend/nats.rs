use super::{ObjectBucket, StreamContext};
use crate::config::NatsConfig;
use crate::error::{BackendError, BackendResult};
use async_nats::jetstream::context::{
    CreateStreamErrorKind, DeleteStreamErrorKind, GetStreamErrorKind, PublishErrorKind,
};
use async_nats::jetstream::{self, object_store, stream, ErrorCode};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flux_types::{PublishAck, RetentionPolicy, StreamConfig, StreamInfo, StreamState};
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};

fn unavailable(op: &str, err: impl std::fmt::Display) -> BackendError {
    error!(op = %op, error = %err, "NATS request failed");
    BackendError::Unavailable(format!("{}: {}", op, err))
}

fn rejected(op: &str, err: impl std::fmt::Display) -> BackendError {
    error!(op = %op, error = %err, "NATS request rejected");
    BackendError::Rejected(format!("{}: {}", op, err))
}

fn is_stream_not_found(err: &jetstream::Error) -> bool {
    err.error_code() == ErrorCode::STREAM_NOT_FOUND
}

/// JetStream API 拒绝的请求记为 `Rejected`，其余（超时、连接）记为 `Unavailable`
fn jetstream_error(
    op: &str,
    name: &str,
    api: Option<&jetstream::Error>,
    err: impl std::fmt::Display,
) -> BackendError {
    match api {
        Some(api) if is_stream_not_found(api) => {
            BackendError::NotFound(format!("stream '{}'", name))
        }
        Some(_) => rejected(op, err),
        None => unavailable(op, err),
    }
}

fn create_stream_error(
    name: &str,
    kind: &CreateStreamErrorKind,
    err: impl std::fmt::Display,
) -> BackendError {
    let op = format!("create stream '{}'", name);
    match kind {
        CreateStreamErrorKind::JetStream(api) => jetstream_error(&op, name, Some(api), err),
        CreateStreamErrorKind::EmptyStreamName
        | CreateStreamErrorKind::InvalidStreamName
        | CreateStreamErrorKind::DomainAndExternalSet => rejected(&op, err),
        _ => unavailable(&op, err),
    }
}

fn publish_error(
    subject: &str,
    kind: PublishErrorKind,
    err: impl std::fmt::Display,
) -> BackendError {
    let op = format!("publish to '{}'", subject);
    match kind {
        // 没有流捕获该 subject（no responders）或期望序号不符
        PublishErrorKind::StreamNotFound
        | PublishErrorKind::WrongLastMessageId
        | PublishErrorKind::WrongLastSequence => rejected(&op, err),
        _ => unavailable(&op, err),
    }
}

/// NATS JetStream 对象桶
pub struct NatsBucket {
    name: String,
    store: object_store::ObjectStore,
}

#[async_trait]
impl ObjectBucket for NatsBucket {
    async fn get(&self, key: &str) -> BackendResult<Bytes> {
        let mut object = match self.store.get(key).await {
            Ok(object) => object,
            Err(err) if matches!(err.kind(), object_store::GetErrorKind::NotFound) => {
                return Err(BackendError::NotFound(format!(
                    "object '{}' in bucket '{}'",
                    key, self.name
                )));
            }
            Err(err) => return Err(unavailable("object get", err)),
        };

        let mut buffer = Vec::new();
        object
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| unavailable("object read", e))?;

        Ok(Bytes::from(buffer))
    }

    async fn put(&self, key: &str, data: Bytes) -> BackendResult<()> {
        let size = data.len();
        let mut reader: &[u8] = data.as_ref();
        self.store
            .put(key, &mut reader)
            .await
            .map_err(|e| unavailable("object put", e))?;

        debug!(bucket = %self.name, key = %key, bytes = size, "Object stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        match self.store.delete(key).await {
            Ok(()) => Ok(()),
            Err(err) if matches!(err.kind(), object_store::DeleteErrorKind::NotFound) => Err(
                BackendError::NotFound(format!("object '{}' in bucket '{}'", key, self.name)),
            ),
            Err(err) => Err(unavailable("object delete", err)),
        }
    }

    async fn list(&self) -> BackendResult<Vec<String>> {
        let mut list = self
            .store
            .list()
            .await
            .map_err(|e| unavailable("object list", e))?;

        let mut keys = Vec::new();
        while let Some(entry) = list.next().await {
            let info = entry.map_err(|e| unavailable("object list", e))?;
            if !info.deleted {
                keys.push(info.name);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// NATS JetStream 流上下文
#[derive(Clone)]
pub struct NatsStreamContext {
    context: jetstream::Context,
}

impl NatsStreamContext {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }

    /// 连接 NATS 服务器并创建 JetStream 上下文
    pub async fn connect(config: &NatsConfig) -> BackendResult<Self> {
        let client = async_nats::ConnectOptions::new()
            .name(&config.connection_name)
            .connect(config.url.as_str())
            .await
            .map_err(|e| unavailable("connect", e))?;

        info!(url = %config.url, "Connected to NATS");
        Ok(Self::new(jetstream::new(client)))
    }
}

fn to_nats_retention(retention: RetentionPolicy) -> stream::RetentionPolicy {
    match retention {
        RetentionPolicy::Limits => stream::RetentionPolicy::Limits,
        RetentionPolicy::Interest => stream::RetentionPolicy::Interest,
        RetentionPolicy::WorkQueue => stream::RetentionPolicy::WorkQueue,
    }
}

fn from_nats_retention(retention: stream::RetentionPolicy) -> RetentionPolicy {
    match retention {
        stream::RetentionPolicy::Limits => RetentionPolicy::Limits,
        stream::RetentionPolicy::Interest => RetentionPolicy::Interest,
        stream::RetentionPolicy::WorkQueue => RetentionPolicy::WorkQueue,
    }
}

fn from_nats_info(info: &stream::Info) -> StreamInfo {
    let created = DateTime::<Utc>::from_timestamp(
        info.created.unix_timestamp(),
        info.created.nanosecond(),
    )
    .unwrap_or_default();

    StreamInfo {
        config: StreamConfig {
            name: info.config.name.clone(),
            subjects: info.config.subjects.clone(),
            description: info.config.description.clone().unwrap_or_default(),
            retention: from_nats_retention(info.config.retention),
        },
        state: StreamState {
            messages: info.state.messages,
            bytes: info.state.bytes,
            first_sequence: info.state.first_sequence,
            last_sequence: info.state.last_sequence,
            consumer_count: info.state.consumer_count,
        },
        created,
    }
}

#[async_trait]
impl StreamContext for NatsStreamContext {
    async fn create_object_bucket(&self, bucket: &str) -> BackendResult<Arc<dyn ObjectBucket>> {
        let store = self
            .context
            .create_object_store(object_store::Config {
                bucket: bucket.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| unavailable("create object store", e))?;

        info!(bucket = %bucket, "Object bucket ready");
        Ok(Arc::new(NatsBucket {
            name: bucket.to_string(),
            store,
        }))
    }

    async fn create_or_update_stream(&self, config: StreamConfig) -> BackendResult<StreamInfo> {
        let name = config.name.clone();
        let nats_config = stream::Config {
            name: config.name,
            subjects: config.subjects,
            description: Some(config.description),
            retention: to_nats_retention(config.retention),
            ..Default::default()
        };

        let info = self
            .context
            .create_or_update_stream(nats_config)
            .await
            .map_err(|e| create_stream_error(&name, &e.kind(), &e))?;

        info!(stream = %name, "Stream ready");
        Ok(from_nats_info(&info))
    }

    async fn delete_stream(&self, name: &str) -> BackendResult<()> {
        self.context
            .delete_stream(name)
            .await
            .map_err(|e| match e.kind() {
                DeleteStreamErrorKind::JetStream(api) => {
                    jetstream_error("delete stream", name, Some(&api), &e)
                }
                _ => unavailable("delete stream", &e),
            })?;

        info!(stream = %name, "Stream deleted");
        Ok(())
    }

    async fn stream_info(&self, name: &str) -> BackendResult<StreamInfo> {
        let mut stream = self
            .context
            .get_stream(name)
            .await
            .map_err(|e| match e.kind() {
                GetStreamErrorKind::JetStream(api) => {
                    jetstream_error("stream info", name, Some(&api), &e)
                }
                GetStreamErrorKind::EmptyName | GetStreamErrorKind::InvalidStreamName => {
                    rejected("stream info", &e)
                }
                _ => unavailable("stream info", &e),
            })?;

        let info = stream
            .info()
            .await
            .map_err(|e| unavailable("stream info", e))?;

        Ok(from_nats_info(info))
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> BackendResult<PublishAck> {
        let ack = self
            .context
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| publish_error(subject, e.kind(), &e))?
            .await
            .map_err(|e| publish_error(subject, e.kind(), &e))?;

        debug!(subject = %subject, stream = %ack.stream, sequence = ack.sequence, "Message acknowledged");
        Ok(PublishAck {
            stream: ack.stream,
            sequence: ack.sequence,
            duplicate: ack.duplicate,
        })
    }

    fn backend_type(&self) -> &str {
        "nats"
    }
}
