//! 阅读事件消费服务
//!
//! 消费 Kafka 中的 webhook 消息指针，从 Payload Store 读回完整请求体，
//! 替换该用户的旧阅读记录，再把每个挑战条目转换为按国家归档的规范化记录。
//! 仅在没有任何条目成功且存在可重试错误时，消息才会进入重投流程。

pub mod consumer;
pub mod error;
pub mod fetcher;
pub mod processor;
pub mod reading_store;
