//! Webhook 接收服务
//!
//! 接收上游提交的阅读进度事件：校验、落盘原始请求体、向 Kafka 投递消息指针后立即返回 202。
//! 同时提供按国家、按用户聚合的只读查询接口。

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod query;
pub mod queue;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
