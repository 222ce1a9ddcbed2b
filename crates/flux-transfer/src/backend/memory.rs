use super::{ObjectBucket, StreamContext};
use crate::error::{BackendError, BackendResult};
use crate::subject;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use flux_types::{PublishAck, RetentionPolicy, StreamConfig, StreamInfo, StreamState};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 内存对象桶
pub struct MemoryBucket {
    name: String,
    objects: DashMap<String, Bytes>,
}

impl MemoryBucket {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: DashMap::new(),
        }
    }

    /// 对象数量
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectBucket for MemoryBucket {
    async fn get(&self, key: &str) -> BackendResult<Bytes> {
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BackendError::NotFound(format!("object '{}' in bucket '{}'", key, self.name)))
    }

    async fn put(&self, key: &str, data: Bytes) -> BackendResult<()> {
        debug!(bucket = %self.name, key = %key, bytes = data.len(), "Object stored");
        self.objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        match self.objects.remove(key) {
            Some(_) => {
                debug!(bucket = %self.name, key = %key, "Object deleted");
                Ok(())
            }
            None => Err(BackendError::NotFound(format!(
                "object '{}' in bucket '{}'",
                key, self.name
            ))),
        }
    }

    async fn list(&self) -> BackendResult<Vec<String>> {
        let mut keys: Vec<String> = self.objects.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 流中保存的消息
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub subject: String,
    pub sequence: u64,
    pub payload: Bytes,
    pub published: DateTime<Utc>,
}

struct MemoryStream {
    config: StreamConfig,
    created: DateTime<Utc>,
    messages: VecDeque<StoredMessage>,
    bytes: u64,
    last_sequence: u64,
}

impl MemoryStream {
    fn new(config: StreamConfig) -> Self {
        Self {
            config,
            created: Utc::now(),
            messages: VecDeque::new(),
            bytes: 0,
            last_sequence: 0,
        }
    }

    fn captures(&self, subject: &str) -> bool {
        self.config
            .subjects
            .iter()
            .any(|filter| subject::matches(filter, subject))
    }

    fn append(&mut self, subject: &str, payload: Bytes) -> u64 {
        self.last_sequence += 1;
        self.bytes += payload.len() as u64;
        self.messages.push_back(StoredMessage {
            subject: subject.to_string(),
            sequence: self.last_sequence,
            payload,
            published: Utc::now(),
        });
        self.last_sequence
    }

    fn info(&self) -> StreamInfo {
        let first_sequence = match self.messages.front() {
            Some(message) => message.sequence,
            None if self.last_sequence == 0 => 0,
            None => self.last_sequence + 1,
        };

        StreamInfo {
            config: self.config.clone(),
            state: StreamState {
                messages: self.messages.len() as u64,
                bytes: self.bytes,
                first_sequence,
                last_sequence: self.last_sequence,
                consumer_count: 0,
            },
            created: self.created,
        }
    }
}

/// 内存流上下文
///
/// 进程内实现的 JetStream 语义：对象桶按名共享，流按 subject 路由，
/// 工作队列流的消息被取走后即删除。
#[derive(Clone, Default)]
pub struct MemoryStreamContext {
    buckets: Arc<DashMap<String, Arc<MemoryBucket>>>,
    streams: Arc<RwLock<HashMap<String, MemoryStream>>>,
}

impl MemoryStreamContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取已创建的对象桶
    pub fn bucket(&self, name: &str) -> Option<Arc<MemoryBucket>> {
        self.buckets.get(name).map(|entry| entry.value().clone())
    }

    /// 当前所有流名
    pub async fn stream_names(&self) -> Vec<String> {
        let streams = self.streams.read().await;
        let mut names: Vec<String> = streams.keys().cloned().collect();
        names.sort();
        names
    }

    /// 消费消息
    ///
    /// 工作队列流中取走的消息视为已确认并从流中删除；其他保留策略下只读取不删除。
    pub async fn fetch(&self, stream: &str, max: usize) -> BackendResult<Vec<StoredMessage>> {
        let mut streams = self.streams.write().await;
        let entry = streams
            .get_mut(stream)
            .ok_or_else(|| BackendError::NotFound(format!("stream '{}'", stream)))?;

        let count = max.min(entry.messages.len());
        let batch: Vec<StoredMessage> = if entry.config.retention == RetentionPolicy::WorkQueue {
            let batch: Vec<StoredMessage> = entry.messages.drain(..count).collect();
            let consumed: u64 = batch.iter().map(|m| m.payload.len() as u64).sum();
            entry.bytes -= consumed;
            batch
        } else {
            entry.messages.iter().take(count).cloned().collect()
        };

        debug!(stream = %stream, count = batch.len(), "Messages fetched");
        Ok(batch)
    }
}

fn validate_stream_config(config: &StreamConfig) -> BackendResult<()> {
    if config.name.is_empty()
        || config
            .name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '.' | '*' | '>' | '/' | '\\'))
    {
        return Err(BackendError::Rejected(format!(
            "invalid stream name '{}'",
            config.name
        )));
    }

    if config.subjects.is_empty() || config.subjects.iter().any(|s| s.is_empty()) {
        return Err(BackendError::Rejected(format!(
            "stream '{}' requires at least one non-empty subject",
            config.name
        )));
    }

    Ok(())
}

#[async_trait]
impl StreamContext for MemoryStreamContext {
    async fn create_object_bucket(&self, bucket: &str) -> BackendResult<Arc<dyn ObjectBucket>> {
        if bucket.is_empty() {
            return Err(BackendError::Rejected("bucket name must not be empty".to_string()));
        }

        let entry: Arc<dyn ObjectBucket> = self
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(|| {
                info!(bucket = %bucket, "Object bucket created");
                Arc::new(MemoryBucket::new(bucket))
            })
            .value()
            .clone();

        Ok(entry)
    }

    async fn create_or_update_stream(&self, config: StreamConfig) -> BackendResult<StreamInfo> {
        validate_stream_config(&config)?;

        let mut streams = self.streams.write().await;

        // JetStream 不允许不同流的 subject 重叠
        for (name, existing) in streams.iter() {
            if *name == config.name {
                continue;
            }
            let overlap = config.subjects.iter().any(|a| {
                existing
                    .config
                    .subjects
                    .iter()
                    .any(|b| subject::overlaps(a, b))
            });
            if overlap {
                warn!(stream = %config.name, existing = %name, "Stream subjects overlap");
                return Err(BackendError::Rejected(format!(
                    "subjects of stream '{}' overlap with stream '{}'",
                    config.name, name
                )));
            }
        }

        match streams.get_mut(&config.name) {
            Some(existing) => {
                let from = existing.config.retention;
                let to = config.retention;
                if from != to && (from == RetentionPolicy::WorkQueue || to == RetentionPolicy::WorkQueue) {
                    return Err(BackendError::Rejected(format!(
                        "stream '{}' can not change retention policy to/from workqueue",
                        config.name
                    )));
                }
                existing.config = config;
                debug!(stream = %existing.config.name, "Stream updated");
                Ok(existing.info())
            }
            None => {
                let name = config.name.clone();
                let stream = MemoryStream::new(config);
                let info = stream.info();
                streams.insert(name.clone(), stream);
                info!(stream = %name, "Stream created");
                Ok(info)
            }
        }
    }

    async fn delete_stream(&self, name: &str) -> BackendResult<()> {
        let mut streams = self.streams.write().await;
        match streams.remove(name) {
            Some(_) => {
                info!(stream = %name, "Stream deleted");
                Ok(())
            }
            None => Err(BackendError::NotFound(format!("stream '{}'", name))),
        }
    }

    async fn stream_info(&self, name: &str) -> BackendResult<StreamInfo> {
        let streams = self.streams.read().await;
        streams
            .get(name)
            .map(MemoryStream::info)
            .ok_or_else(|| BackendError::NotFound(format!("stream '{}'", name)))
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> BackendResult<PublishAck> {
        let mut streams = self.streams.write().await;

        let Some(stream) = streams.values_mut().find(|s| s.captures(subject)) else {
            return Err(BackendError::Rejected(format!(
                "no responders available for subject '{}'",
                subject
            )));
        };

        let size = payload.len();
        let sequence = stream.append(subject, payload);
        debug!(
            stream = %stream.config.name,
            subject = %subject,
            sequence = sequence,
            bytes = size,
            "Message stored"
        );

        Ok(PublishAck {
            stream: stream.config.name.clone(),
            sequence,
            duplicate: false,
        })
    }

    fn backend_type(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workqueue(name: &str, subject: &str) -> StreamConfig {
        StreamConfig::new(name)
            .with_subject(subject)
            .with_retention(RetentionPolicy::WorkQueue)
    }

    #[tokio::test]
    async fn test_bucket_put_get_delete() {
        let ctx = MemoryStreamContext::new();
        let bucket = ctx.create_object_bucket("ns_logs").await.unwrap();

        bucket.put("cpu", Bytes::from_static(b"{}")).await.unwrap();
        assert_eq!(bucket.get("cpu").await.unwrap(), Bytes::from_static(b"{}"));
        assert_eq!(bucket.list().await.unwrap(), vec!["cpu".to_string()]);

        bucket.delete("cpu").await.unwrap();
        assert!(matches!(bucket.get("cpu").await, Err(BackendError::NotFound(_))));
        assert!(matches!(bucket.delete("cpu").await, Err(BackendError::NotFound(_))));
    }

    #[test]
    fn test_bucket_list_sorted() {
        let bucket = MemoryBucket::new("ns_logs");
        tokio_test::block_on(async {
            for key in ["mem", "disk", "cpu"] {
                bucket.put(key, Bytes::new()).await.unwrap();
            }
            assert_eq!(bucket.list().await.unwrap(), vec!["cpu", "disk", "mem"]);
        });
        assert_eq!(bucket.name(), "ns_logs");
        assert_eq!(bucket.len(), 3);
    }

    #[tokio::test]
    async fn test_bucket_is_shared_by_name() {
        let ctx = MemoryStreamContext::new();
        let first = ctx.create_object_bucket("ns_logs").await.unwrap();
        first.put("k", Bytes::from_static(b"v")).await.unwrap();

        let second = ctx.create_object_bucket("ns_logs").await.unwrap();
        assert_eq!(second.get("k").await.unwrap(), Bytes::from_static(b"v"));
        assert_eq!(ctx.bucket("ns_logs").unwrap().len(), 1);
        assert!(ctx.bucket("other_logs").is_none());
    }

    #[tokio::test]
    async fn test_empty_bucket_name_rejected() {
        let ctx = MemoryStreamContext::new();
        assert!(matches!(
            ctx.create_object_bucket("").await,
            Err(BackendError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_routes_by_subject() {
        let ctx = MemoryStreamContext::new();
        ctx.create_or_update_stream(workqueue("ns:logs:cpu", "ns.logs.cpu"))
            .await
            .unwrap();
        ctx.create_or_update_stream(workqueue("ns:logs:mem", "ns.logs.mem"))
            .await
            .unwrap();

        let ack = ctx.publish("ns.logs.cpu", Bytes::from_static(b"1")).await.unwrap();
        assert_eq!(ack.stream, "ns:logs:cpu");
        assert_eq!(ack.sequence, 1);
        let ack = ctx.publish("ns.logs.cpu", Bytes::from_static(b"22")).await.unwrap();
        assert_eq!(ack.sequence, 2);

        let cpu = ctx.stream_info("ns:logs:cpu").await.unwrap();
        assert_eq!(cpu.state.messages, 2);
        assert_eq!(cpu.state.bytes, 3);
        assert_eq!(cpu.state.first_sequence, 1);
        assert_eq!(cpu.state.last_sequence, 2);

        let mem = ctx.stream_info("ns:logs:mem").await.unwrap();
        assert_eq!(mem.state.messages, 0);
    }

    #[tokio::test]
    async fn test_publish_without_stream_rejected() {
        let ctx = MemoryStreamContext::new();
        let err = ctx.publish("ns.logs.cpu", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected(ref r) if r.contains("no responders")));
    }

    #[tokio::test]
    async fn test_wildcard_stream_captures() {
        let ctx = MemoryStreamContext::new();
        ctx.create_or_update_stream(StreamConfig::new("all").with_subject("ns.logs.>"))
            .await
            .unwrap();

        let ack = ctx.publish("ns.logs.cpu.core0", Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(ack.stream, "all");
    }

    #[tokio::test]
    async fn test_overlapping_subjects_rejected() {
        let ctx = MemoryStreamContext::new();
        ctx.create_or_update_stream(workqueue("a", "ns.logs.cpu")).await.unwrap();

        let err = ctx
            .create_or_update_stream(workqueue("b", "ns.logs.*"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
        assert_eq!(ctx.stream_names().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_update_keeps_messages() {
        let ctx = MemoryStreamContext::new();
        ctx.create_or_update_stream(workqueue("s", "ns.logs.cpu")).await.unwrap();
        ctx.publish("ns.logs.cpu", Bytes::from_static(b"x")).await.unwrap();

        let info = ctx
            .create_or_update_stream(workqueue("s", "ns.logs.cpu").with_description("updated"))
            .await
            .unwrap();
        assert_eq!(info.config.description, "updated");
        assert_eq!(info.state.messages, 1);
    }

    #[tokio::test]
    async fn test_retention_change_to_workqueue_rejected() {
        let ctx = MemoryStreamContext::new();
        ctx.create_or_update_stream(StreamConfig::new("s").with_subject("a.b"))
            .await
            .unwrap();

        let err = ctx
            .create_or_update_stream(workqueue("s", "a.b"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_invalid_stream_config_rejected() {
        let ctx = MemoryStreamContext::new();
        for config in [
            StreamConfig::new("").with_subject("a"),
            StreamConfig::new("bad.name").with_subject("a"),
            StreamConfig::new("no-subjects"),
        ] {
            assert!(matches!(
                ctx.create_or_update_stream(config).await,
                Err(BackendError::Rejected(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_workqueue_fetch_removes_messages() {
        let ctx = MemoryStreamContext::new();
        ctx.create_or_update_stream(workqueue("s", "ns.logs.cpu")).await.unwrap();
        for _ in 0..3 {
            ctx.publish("ns.logs.cpu", Bytes::from_static(b"ab")).await.unwrap();
        }

        let batch = ctx.fetch("s", 2).await.unwrap();
        assert_eq!(
            batch.iter().map(|m| m.sequence).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let info = ctx.stream_info("s").await.unwrap();
        assert_eq!(info.state.messages, 1);
        assert_eq!(info.state.bytes, 2);
        assert_eq!(info.state.first_sequence, 3);

        let rest = ctx.fetch("s", 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].sequence, 3);

        let info = ctx.stream_info("s").await.unwrap();
        assert_eq!(info.state.messages, 0);
        assert_eq!(info.state.first_sequence, 4);
        assert_eq!(info.state.last_sequence, 3);
        assert!(ctx.fetch("s", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_limits_fetch_keeps_messages() {
        let ctx = MemoryStreamContext::new();
        ctx.create_or_update_stream(StreamConfig::new("s").with_subject("a.b"))
            .await
            .unwrap();
        ctx.publish("a.b", Bytes::from_static(b"x")).await.unwrap();

        assert_eq!(ctx.fetch("s", 5).await.unwrap().len(), 1);
        assert_eq!(ctx.fetch("s", 5).await.unwrap().len(), 1);
        assert_eq!(ctx.stream_info("s").await.unwrap().state.messages, 1);
    }

    #[tokio::test]
    async fn test_delete_stream() {
        let ctx = MemoryStreamContext::new();
        ctx.create_or_update_stream(workqueue("s", "a.b")).await.unwrap();

        ctx.delete_stream("s").await.unwrap();
        assert!(matches!(ctx.stream_info("s").await, Err(BackendError::NotFound(_))));
        assert!(matches!(ctx.delete_stream("s").await, Err(BackendError::NotFound(_))));
        assert!(matches!(ctx.fetch("s", 1).await, Err(BackendError::NotFound(_))));
    }
}
