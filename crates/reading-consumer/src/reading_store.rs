//! 阅读记录存储
//!
//! 主键 (`pk`, `sk`)，`user_name` 上有二级索引，用于替换同一用户的旧记录。

use async_trait::async_trait;
use leitura_shared::error::Result;
use leitura_shared::events::{NormalizedReading, READING_PARTITION_KEY};
use sqlx::PgPool;
use tracing::{debug, info, instrument};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// 写入一条阅读记录，同主键时覆盖
    async fn save(&self, reading: &NormalizedReading) -> Result<()>;

    /// 删除该用户在固定分区下的全部记录，返回删除条数
    async fn delete_user_readings(&self, user: &str) -> Result<u64>;
}

pub struct PgReadingStore {
    pool: PgPool,
    table: String,
}

impl PgReadingStore {
    /// `table` 须已通过 `AppConfig::validate` 的标识符校验
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    #[instrument(skip(self, reading), fields(sk = %reading.sk, iso3 = %reading.iso3))]
    async fn save(&self, reading: &NormalizedReading) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (
                pk, sk, iso3, pais, categoria, progresso, user_name,
                imagem_url, livro, capa_url, webhook_uuid, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (pk, sk) DO UPDATE SET
                iso3 = EXCLUDED.iso3,
                pais = EXCLUDED.pais,
                categoria = EXCLUDED.categoria,
                progresso = EXCLUDED.progresso,
                user_name = EXCLUDED.user_name,
                imagem_url = EXCLUDED.imagem_url,
                livro = EXCLUDED.livro,
                capa_url = EXCLUDED.capa_url,
                webhook_uuid = EXCLUDED.webhook_uuid,
                updated_at = EXCLUDED.updated_at
            "#,
            self.table
        );

        sqlx::query(&sql)
            .bind(&reading.pk)
            .bind(&reading.sk)
            .bind(&reading.iso3)
            .bind(&reading.pais)
            .bind(&reading.categoria)
            .bind(reading.progresso)
            .bind(&reading.user)
            .bind(&reading.imagem_url)
            .bind(&reading.livro)
            .bind(&reading.capa_url)
            .bind(&reading.webhook_uuid)
            .bind(&reading.updated_at)
            .execute(&self.pool)
            .await?;

        debug!("阅读记录已写入");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_user_readings(&self, user: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE user_name = $1 AND pk = $2", self.table);

        let deleted = sqlx::query(&sql)
            .bind(user)
            .bind(READING_PARTITION_KEY)
            .execute(&self.pool)
            .await?
            .rows_affected();

        info!(user, deleted, "已删除用户旧阅读记录");
        Ok(deleted)
    }
}
