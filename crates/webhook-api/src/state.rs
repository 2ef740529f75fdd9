//! 应用状态定义
//!
//! 启动时构造一次，handler 之间通过 Arc 共享只读句柄。

use std::sync::Arc;

use leitura_shared::config::WebhookConfig;
use leitura_shared::payload_store::PayloadStore;

use crate::auth::CredentialStore;
use crate::query::ReadingQuery;
use crate::queue::EventQueue;

#[derive(Clone)]
pub struct AppState {
    pub payloads: Arc<dyn PayloadStore>,
    pub queue: Arc<dyn EventQueue>,
    pub credentials: Arc<dyn CredentialStore>,
    pub readings: Arc<dyn ReadingQuery>,
    pub webhook: Arc<WebhookConfig>,
}

impl AppState {
    pub fn new(
        payloads: Arc<dyn PayloadStore>,
        queue: Arc<dyn EventQueue>,
        credentials: Arc<dyn CredentialStore>,
        readings: Arc<dyn ReadingQuery>,
        webhook: WebhookConfig,
    ) -> Self {
        Self {
            payloads,
            queue,
            credentials,
            readings,
            webhook: Arc::new(webhook),
        }
    }
}
