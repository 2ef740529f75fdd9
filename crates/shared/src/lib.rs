//! 共享库
//!
//! 两个服务共用的配置、错误处理、数据库连接、Kafka、重投、事件模型、
//! 请求体存储、国家映射、文本清洗和可观测性代码。

pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod kafka;
pub mod mapping;
pub mod observability;
pub mod payload_store;
pub mod redelivery;
pub mod retry;
pub mod text;
