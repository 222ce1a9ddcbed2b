use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 流保留策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// 按数量/大小/时间上限保留
    #[default]
    Limits,
    /// 存在消费者兴趣时保留
    Interest,
    /// 工作队列：每条消息只投递给一个消费者，确认后删除
    WorkQueue,
}

/// 流配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    pub subjects: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub retention: RetentionPolicy,
}

impl StreamConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subjects: Vec::new(),
            description: String::new(),
            retention: RetentionPolicy::default(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subjects.push(subject.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }
}

/// 流运行状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    /// 当前保存的消息数
    pub messages: u64,
    /// 当前保存的字节数
    pub bytes: u64,
    pub first_sequence: u64,
    pub last_sequence: u64,
    pub consumer_count: usize,
}

/// 流信息（配置 + 实时状态）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub config: StreamConfig,
    pub state: StreamState,
    pub created: DateTime<Utc>,
}

impl StreamInfo {
    pub fn name(&self) -> &str {
        &self.config.name
    }
}

/// 发布确认
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAck {
    /// 接收消息的流
    pub stream: String,
    /// 消息在流中的序号
    pub sequence: u64,
    #[serde(default)]
    pub duplicate: bool,
}
