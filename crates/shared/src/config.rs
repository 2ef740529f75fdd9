//! 配置管理模块
//!
//! 支持多层配置文件加载、环境变量覆盖，以及启动期的必填项校验。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::kafka::topics;
use crate::retry::RetryPolicy;

/// 数据库配置
///
/// 连接串没有内置默认值，须由配置文件或 `LEITURA_DATABASE__URL` 提供。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_seconds: 30,
            idle_timeout_seconds: 600,
        }
    }
}

/// Kafka 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: String,
    pub consumer_group: String,
    pub auto_offset_reset: String,
    /// 接收端投递消息指针的 topic
    pub webhook_topic: String,
    /// 待重投消息的 topic
    pub retry_topic: String,
    pub dead_letter_topic: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: String::new(),
            consumer_group: "reading-consumer".to_string(),
            auto_offset_reset: "earliest".to_string(),
            webhook_topic: topics::WEBHOOK_EVENTS.to_string(),
            retry_topic: topics::WEBHOOK_RETRY.to_string(),
            dead_letter_topic: topics::DEAD_LETTER_QUEUE.to_string(),
        }
    }
}

/// 存储配置
///
/// 原始请求体和规范化阅读记录各占一张表，表名须显式配置。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub payload_table: String,
    pub reading_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            payload_table: String::new(),
            reading_table: String::new(),
        }
    }
}

/// 接收端配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// 请求体上限（字节）
    pub max_body_bytes: usize,
    /// 允许的活动系列标识，其余一律忽略
    pub allowed_series: Vec<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
            allowed_series: vec![
                "maratona-lendo-paises".to_string(),
                "mundotalendo-2026".to_string(),
            ],
        }
    }
}

impl WebhookConfig {
    pub fn is_allowed_series(&self, identifier: &str) -> bool {
        self.allowed_series.iter().any(|s| s == identifier)
    }
}

/// 消费端配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// 单条消息的处理时限，超时按瞬时故障重投
    pub message_timeout_seconds: u64,
    /// 最大重投次数，超过后进入死信队列
    pub max_redeliveries: u32,
    /// 发布重投信封时的退避参数
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_multiplier: f64,
    /// 两次重投之间的基础间隔
    pub redelivery_delay_seconds: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            message_timeout_seconds: 30,
            max_redeliveries: 3,
            backoff_initial_ms: 100,
            backoff_max_ms: 5_000,
            backoff_multiplier: 2.0,
            redelivery_delay_seconds: 10,
        }
    }
}

impl ConsumerConfig {
    pub fn message_timeout(&self) -> Duration {
        Duration::from_secs(self.message_timeout_seconds)
    }

    /// 重投间隔：第 N 次重投等待 `redelivery_delay * 2^N`，上限 2 分钟
    ///
    /// 重投 worker 在等待期间不拉取新消息，上限需低于 `max.poll.interval.ms`。
    pub fn redelivery_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_redeliveries,
            Duration::from_secs(self.redelivery_delay_seconds),
            Duration::from_secs(120),
            2.0,
        )
    }

    /// 构造发布重投信封时使用的退避策略
    pub fn publish_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            3,
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_millis(self.backoff_max_ms),
            self.backoff_multiplier,
        )
    }
}

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，由 `AppConfig::load` 注入
    pub service_name: String,
    pub log_level: String,
    /// 是否输出 JSON 格式日志
    pub json_logs: bool,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub storage: StorageConfig,
    pub webhook: WebhookConfig,
    pub consumer: ConsumerConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（LEITURA_ 前缀，嵌套用 `__`，如 LEITURA_DATABASE__URL -> database.url）
    ///
    /// 工作目录下存在 `.env` 时先读入进程环境。
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let env = std::env::var("LEITURA_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env, service_name)
    }

    /// 从指定目录按环境和服务名分层加载，文件缺失时跳过
    pub fn load_from(config_dir: &Path, env: &str, service_name: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{env}.toml"))).required(false))
            .add_source(File::from(config_dir.join(format!("{service_name}.toml"))).required(false))
            .add_source(
                Environment::with_prefix("LEITURA")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("webhook.allowed_series")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.observability.service_name = config.service_name.clone();

        Ok(config)
    }

    /// 校验启动必需的配置项
    ///
    /// 存储、队列任一缺失都视为致命错误，服务拒绝启动。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("database.url", &self.database.url),
            ("storage.payload_table", &self.storage.payload_table),
            ("storage.reading_table", &self.storage.reading_table),
            ("kafka.brokers", &self.kafka.brokers),
            ("kafka.webhook_topic", &self.kafka.webhook_topic),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("缺少必需配置项: {key}")));
            }
        }

        if !is_sql_identifier(&self.storage.payload_table)
            || !is_sql_identifier(&self.storage.reading_table)
        {
            return Err(ConfigError::Message("存储表名只能包含字母、数字和下划线".to_string()));
        }

        Ok(())
    }

    /// 获取服务地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 表名会拼接进 SQL，只放行简单标识符
fn is_sql_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_config_dir() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config")
    }

    /// 填好必需项的配置
    fn configured() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = "postgres://leitura@localhost:5432/leitura_db".to_string();
        config.kafka.brokers = "localhost:9092".to_string();
        config.storage.payload_table = "webhook_payloads".to_string();
        config.storage.reading_table = "readings".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.webhook.max_body_bytes, 1024 * 1024);
        assert_eq!(config.kafka.webhook_topic, "leitura.webhook.events");
        assert!(configured().validate().is_ok());
    }

    /// 连接串、broker 和表名没有内置值，缺配置时拒绝启动
    #[test]
    fn test_defaults_do_not_pass_validation() {
        let config = AppConfig::default();
        assert!(config.database.url.is_empty());
        assert!(config.kafka.brokers.is_empty());
        assert!(config.storage.reading_table.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_missing_dir_fails_validation() {
        let dir = std::env::temp_dir().join(format!("leitura-config-{}", uuid::Uuid::new_v4()));
        let config = AppConfig::load_from(&dir, "production", "webhook-api").unwrap();

        assert_eq!(config.service_name, "webhook-api");
        assert_eq!(config.observability.service_name, "webhook-api");
        assert!(config.validate().is_err());
    }

    /// 开发环境的连接信息只在 development.toml 中
    #[test]
    fn test_load_repo_config_layers() {
        let dev = AppConfig::load_from(&repo_config_dir(), "development", "reading-consumer").unwrap();
        assert!(dev.validate().is_ok());
        assert_eq!(dev.storage.reading_table, "readings");
        assert_eq!(dev.observability.metrics_port, 9092);

        let prod = AppConfig::load_from(&repo_config_dir(), "production", "webhook-api").unwrap();
        assert!(prod.observability.json_logs);
        assert_eq!(prod.observability.metrics_port, 9091);
        assert!(prod.database.url.is_empty());
        assert!(prod.validate().is_err());
    }

    #[test]
    fn test_server_addr() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            ..Default::default()
        };
        assert_eq!(config.server_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_allowed_series() {
        let webhook = WebhookConfig::default();
        assert!(webhook.is_allowed_series("maratona-lendo-paises"));
        assert!(webhook.is_allowed_series("mundotalendo-2026"));
        assert!(!webhook.is_allowed_series("outra-maratona"));
        assert!(!webhook.is_allowed_series(""));
    }

    /// 缺少任一必需项都应拒绝启动
    #[test]
    fn test_validate_missing_required() {
        let mut config = configured();
        config.database.url = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("database.url"));

        let mut config = configured();
        config.kafka.brokers = "  ".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("kafka.brokers"));

        let mut config = configured();
        config.storage.payload_table = String::new();
        assert!(config.validate().is_err());

        let mut config = configured();
        config.storage.reading_table = String::new();
        assert!(config.validate().is_err());

        let mut config = configured();
        config.kafka.webhook_topic = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unsafe_table_name() {
        let mut config = configured();
        config.storage.reading_table = "readings; DROP TABLE x".to_string();
        assert!(config.validate().is_err());

        assert!(is_sql_identifier("webhook_payloads"));
        assert!(!is_sql_identifier("1readings"));
    }

    #[test]
    fn test_consumer_durations() {
        let consumer = ConsumerConfig::default();
        assert_eq!(consumer.message_timeout(), Duration::from_secs(30));

        let policy = consumer.publish_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));

        let redelivery = consumer.redelivery_policy();
        assert_eq!(redelivery.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(redelivery.delay_for_attempt(1), Duration::from_secs(20));
        assert_eq!(redelivery.delay_for_attempt(10), Duration::from_secs(120));
    }
}
