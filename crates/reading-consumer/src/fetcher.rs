//! 请求体读取
//!
//! 按队列消息中的 UUID 从 Payload Store 读回完整请求体并解析。

use std::sync::Arc;

use leitura_shared::events::WebhookPayload;
use leitura_shared::payload_store::{PayloadStore, payload_key};
use tracing::{debug, error, info};

use crate::error::ConsumerError;

pub struct PayloadFetcher {
    store: Arc<dyn PayloadStore>,
}

impl PayloadFetcher {
    pub fn new(store: Arc<dyn PayloadStore>) -> Self {
        Self { store }
    }

    /// 读取并解析请求体
    ///
    /// - 键不存在：`PayloadNotFound`（永久）
    /// - 存储故障：`PayloadFetch`（可重试）
    /// - JSON 非法：`InvalidPayloadJson`（永久）
    pub async fn fetch(&self, uuid: &str) -> Result<WebhookPayload, ConsumerError> {
        let key = payload_key(uuid);
        debug!(uuid, key = %key, "读取请求体");

        let body = self.store.get(&key).await.map_err(|e| {
            if e.is_not_found() {
                error!(uuid, key = %key, "请求体不存在");
                ConsumerError::PayloadNotFound { key: key.clone() }
            } else {
                error!(uuid, key = %key, error = %e, "读取请求体失败");
                ConsumerError::PayloadFetch(e)
            }
        })?;

        let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
            error!(uuid, error = %e, "请求体 JSON 解析失败");
            ConsumerError::InvalidPayloadJson(e.to_string())
        })?;

        info!(
            uuid,
            user = %payload.perfil.nome,
            desafios = payload.desafios.len(),
            "请求体读取完成"
        );

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use leitura_shared::error::PipelineError;
    use leitura_shared::payload_store::MemoryPayloadStore;

    /// 始终返回连接池超时的存储
    struct UnavailableStore;

    #[async_trait]
    impl PayloadStore for UnavailableStore {
        async fn put(&self, _key: &str, _body: &[u8]) -> leitura_shared::error::Result<()> {
            Err(PipelineError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn get(&self, _key: &str) -> leitura_shared::error::Result<Vec<u8>> {
            Err(PipelineError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn delete(&self, _key: &str) -> leitura_shared::error::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fetch_existing_payload() {
        let store = Arc::new(MemoryPayloadStore::new());
        store
            .put(
                &payload_key("abc"),
                br#"{"perfil":{"nome":"Ana"},"desafios":[{"tipo":"leitura"}]}"#,
            )
            .await
            .unwrap();

        let payload = PayloadFetcher::new(store).fetch("abc").await.unwrap();
        assert_eq!(payload.perfil.nome, "Ana");
        assert_eq!(payload.desafios.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_missing_payload_is_permanent() {
        let fetcher = PayloadFetcher::new(Arc::new(MemoryPayloadStore::new()));
        let err = fetcher.fetch("missing").await.unwrap_err();
        assert!(matches!(err, ConsumerError::PayloadNotFound { ref key } if key == "payloads/missing.json"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_store_failure_is_retryable() {
        let fetcher = PayloadFetcher::new(Arc::new(UnavailableStore));
        let err = fetcher.fetch("abc").await.unwrap_err();
        assert!(matches!(err, ConsumerError::PayloadFetch(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_malformed_json_is_permanent() {
        let store = Arc::new(MemoryPayloadStore::new());
        store.put(&payload_key("bad"), b"{not json").await.unwrap();

        let err = PayloadFetcher::new(store).fetch("bad").await.unwrap_err();
        assert!(matches!(err, ConsumerError::InvalidPayloadJson(_)));
        assert!(!err.is_retryable());
    }
}
