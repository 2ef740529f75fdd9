//! handler 测试用的内存实现

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use leitura_shared::config::WebhookConfig;
use leitura_shared::error::PipelineError;
use leitura_shared::events::QueueMessage;
use leitura_shared::payload_store::{MemoryPayloadStore, PayloadStore};
use tokio::sync::Mutex;
use tower::ServiceExt;

use crate::auth::{CredentialStore, MockCredentialStore};
use crate::query::{ReadingQuery, ReadingRow};
use crate::queue::EventQueue;
use crate::routes::build_router;
use crate::state::AppState;

pub const VALID_KEY: &str = "chave-valida";

/// 只接受 [`VALID_KEY`] 的凭证存储
pub fn accepting_credentials() -> Arc<dyn CredentialStore> {
    let expected = crate::auth::hash_api_key(VALID_KEY);
    let mut store = MockCredentialStore::new();
    store
        .expect_is_active()
        .returning(move |hash| Ok(hash == expected));
    Arc::new(store)
}

/// 记录已投递消息的队列，`fail` 为真时投递总是失败
#[derive(Default)]
pub struct RecordingQueue {
    pub sent: Mutex<Vec<QueueMessage>>,
    pub fail: bool,
}

impl RecordingQueue {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl EventQueue for RecordingQueue {
    async fn enqueue(&self, message: &QueueMessage) -> Result<(), PipelineError> {
        if self.fail {
            return Err(PipelineError::Kafka("broker unavailable".to_string()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

/// 写入总是失败的 Payload Store
pub struct FailingPayloadStore;

#[async_trait]
impl PayloadStore for FailingPayloadStore {
    async fn put(&self, _key: &str, _body: &[u8]) -> leitura_shared::error::Result<()> {
        Err(PipelineError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn get(&self, key: &str) -> leitura_shared::error::Result<Vec<u8>> {
        Err(PipelineError::NotFound {
            entity: "payload".to_string(),
            id: key.to_string(),
        })
    }
    async fn delete(&self, _key: &str) -> leitura_shared::error::Result<()> {
        Ok(())
    }
}

/// 返回固定数据的只读查询
#[derive(Default)]
pub struct StaticReadings {
    pub rows: Vec<ReadingRow>,
    pub fail: bool,
}

#[async_trait]
impl ReadingQuery for StaticReadings {
    async fn all_readings(&self) -> Result<Vec<ReadingRow>, PipelineError> {
        if self.fail {
            return Err(PipelineError::Database(sqlx::Error::PoolClosed));
        }
        Ok(self.rows.clone())
    }

    async fn country_readings(
        &self,
        iso3: &str,
        min_progress: i32,
    ) -> Result<Vec<ReadingRow>, PipelineError> {
        let rows = self.all_readings().await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.iso3 == iso3 && r.progresso >= min_progress)
            .collect())
    }

    async fn ping(&self) -> Result<(), PipelineError> {
        if self.fail {
            return Err(PipelineError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

pub fn row(user: &str, iso3: &str, progresso: i32, updated_at: &str) -> ReadingRow {
    ReadingRow {
        iso3: iso3.to_string(),
        pais: format!("pais-{iso3}"),
        categoria: "Mundo".to_string(),
        progresso,
        user_name: user.to_string(),
        imagem_url: format!("https://avatar/{user}.png"),
        livro: format!("livro-{user}-{iso3}"),
        capa_url: format!("https://capa/{user}-{iso3}.jpg"),
        updated_at: updated_at.to_string(),
    }
}

/// 测试装配
pub struct TestApp {
    pub payloads: Arc<MemoryPayloadStore>,
    pub queue: Arc<RecordingQueue>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(Arc::new(RecordingQueue::default()), StaticReadings::default())
    }

    pub fn with(queue: Arc<RecordingQueue>, readings: StaticReadings) -> Self {
        let payloads = Arc::new(MemoryPayloadStore::new());
        let state = AppState::new(
            payloads.clone(),
            queue.clone(),
            accepting_credentials(),
            Arc::new(readings),
            WebhookConfig::default(),
        );
        Self {
            payloads,
            queue,
            state,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }
}

/// 读取 JSON 响应体
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    use http_body_util::BodyExt;

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
