//! 原始请求体存储
//!
//! 接收端先把完整请求体按 `payloads/{uuid}.json` 写入存储，再向队列投递指针；
//! 消费端按同一个键读回。记录一经写入不再修改。

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{PipelineError, Result};

/// 请求体的存储键
pub fn payload_key(uuid: &str) -> String {
    format!("payloads/{uuid}.json")
}

/// 原始请求体存储
///
/// `get` 在键不存在时必须返回 `PipelineError::NotFound`，
/// 消费端据此区分永久缺失和瞬时故障。
#[async_trait]
pub trait PayloadStore: Send + Sync {
    /// 写入请求体，键已存在时返回 `AlreadyExists`
    async fn put(&self, key: &str, body: &[u8]) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// 删除请求体，键不存在时视为成功
    async fn delete(&self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// PostgreSQL 实现
// ---------------------------------------------------------------------------

/// 基于 PostgreSQL 表的实现，表结构见 `migrations/`
pub struct PgPayloadStore {
    pool: PgPool,
    table: String,
}

impl PgPayloadStore {
    /// `table` 须已通过 `AppConfig::validate` 的标识符校验
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl PayloadStore for PgPayloadStore {
    #[instrument(skip(self, body), fields(bytes = body.len()))]
    async fn put(&self, key: &str, body: &[u8]) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (object_key, body, content_type) VALUES ($1, $2, 'application/json')",
            self.table
        );

        sqlx::query(&sql)
            .bind(key)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    PipelineError::AlreadyExists {
                        entity: "payload".to_string(),
                        field: "object_key".to_string(),
                        value: key.to_string(),
                    }
                }
                other => PipelineError::Database(other),
            })?;

        debug!(key, "请求体已写入");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let sql = format!("SELECT body FROM {} WHERE object_key = $1", self.table);

        let body: Option<Vec<u8>> = sqlx::query_scalar(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        body.ok_or_else(|| PipelineError::NotFound {
            entity: "payload".to_string(),
            id: key.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE object_key = $1", self.table);
        sqlx::query(&sql).bind(key).execute(&self.pool).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 内存实现
// ---------------------------------------------------------------------------

/// 内存实现，用于测试和本地调试
#[derive(Default)]
pub struct MemoryPayloadStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryPayloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的全部键
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl PayloadStore for MemoryPayloadStore {
    async fn put(&self, key: &str, body: &[u8]) -> Result<()> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Err(PipelineError::AlreadyExists {
                entity: "payload".to_string(),
                field: "object_key".to_string(),
                value: key.to_string(),
            });
        }
        objects.insert(key.to_string(), body.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound {
                entity: "payload".to_string(),
                id: key.to_string(),
            })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}
