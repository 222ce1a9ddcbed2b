use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::logging::LoggingConfig;
use crate::naming;

/// 环境变量前缀，例如 `FLUX_TRANSFER__NAMESPACE=prod`
const ENV_PREFIX: &str = "FLUX_TRANSFER";

/// 传输器配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// 命名空间
    pub namespace: String,
    pub nats: NatsConfig,
    pub transfer: TransferSettings,
    pub logging: LoggingConfig,
}

/// NATS 连接配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub connection_name: String,
}

/// 测量键与 subject 的约束策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementPolicy {
    /// 存储键与 `option.measurement` 可以不同
    #[default]
    Decoupled,
    /// 要求存储键与 `option.measurement` 相同
    Strict,
}

/// `[transfer]` 配置段
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferSettings {
    /// 发布确认超时（毫秒），0 表示不限时
    pub publish_timeout_ms: u64,
    /// 创建流失败时删除刚写入的配置
    pub compensate_on_failure: bool,
    pub measurement_policy: MeasurementPolicy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            namespace: "flux".to_string(),
            nats: NatsConfig::default(),
            transfer: TransferSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            connection_name: "flux-transfer".to_string(),
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            publish_timeout_ms: 5000,
            compensate_on_failure: false,
            measurement_policy: MeasurementPolicy::default(),
        }
    }
}

impl TransferSettings {
    pub fn publish_timeout(&self) -> Option<Duration> {
        (self.publish_timeout_ms > 0).then(|| Duration::from_millis(self.publish_timeout_ms))
    }
}

impl TransferConfig {
    /// 从 TOML 文件加载配置
    ///
    /// 文件不存在时使用默认配置；环境变量覆盖文件中的值。
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?;

        let config = Config::builder()
            .add_source(File::new(path_str, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let loaded: TransferConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: TransferConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        naming::validate_namespace(&self.namespace)
            .map_err(|e| anyhow!("invalid configuration: {}", e))?;

        if self.nats.url.trim().is_empty() {
            return Err(anyhow!("nats.url must not be empty"));
        }

        Ok(())
    }
}
