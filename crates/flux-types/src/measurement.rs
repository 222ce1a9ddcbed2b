use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 测量配置
///
/// 以 JSON 形式保存在命名空间的对象桶中，键为测量键。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementOption {
    /// 主题（用于生成发布 subject）
    pub measurement: String,
    /// 描述
    pub description: String,
}

impl MeasurementOption {
    pub fn new(measurement: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            description: description.into(),
        }
    }
}

/// 载荷
///
/// 一条带时间戳的标签/字段数据，序列化后作为消息体发布。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// 标签
    pub tags: HashMap<String, String>,
    /// 字段
    pub fields: HashMap<String, serde_json::Value>,
    /// 时间
    pub time: DateTime<Utc>,
}

impl Payload {
    pub fn new() -> Self {
        Self {
            tags: HashMap::new(),
            fields: HashMap::new(),
            time: Utc::now(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}
