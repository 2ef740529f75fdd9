//! HTTP 处理器

pub mod health;
pub mod readings;
pub mod stats;
pub mod users;
pub mod webhook;
