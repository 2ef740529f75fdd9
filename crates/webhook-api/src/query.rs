//! 阅读记录只读查询

use async_trait::async_trait;
use leitura_shared::error::PipelineError;
use leitura_shared::events::READING_PARTITION_KEY;
use sqlx::PgPool;
use tracing::instrument;

/// 查询用的阅读记录行
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ReadingRow {
    pub iso3: String,
    pub pais: String,
    pub categoria: String,
    pub progresso: i32,
    pub user_name: String,
    pub imagem_url: String,
    pub livro: String,
    pub capa_url: String,
    /// RFC-3339，统一 UTC 偏移，可直接按字符串比较
    pub updated_at: String,
}

#[async_trait]
pub trait ReadingQuery: Send + Sync {
    /// 固定分区下的全部记录
    async fn all_readings(&self) -> Result<Vec<ReadingRow>, PipelineError>;

    /// 指定国家且进度不低于 `min_progress` 的记录
    async fn country_readings(
        &self,
        iso3: &str,
        min_progress: i32,
    ) -> Result<Vec<ReadingRow>, PipelineError>;

    /// 存储连通性检查
    async fn ping(&self) -> Result<(), PipelineError>;
}

const READING_COLUMNS: &str =
    "iso3, pais, categoria, progresso, user_name, imagem_url, livro, capa_url, updated_at";

pub struct PgReadingQuery {
    pool: PgPool,
    table: String,
}

impl PgReadingQuery {
    /// `table` 须已通过 `AppConfig::validate` 的标识符校验
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl ReadingQuery for PgReadingQuery {
    #[instrument(skip(self))]
    async fn all_readings(&self) -> Result<Vec<ReadingRow>, PipelineError> {
        let sql = format!("SELECT {READING_COLUMNS} FROM {} WHERE pk = $1", self.table);

        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(READING_PARTITION_KEY)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn country_readings(
        &self,
        iso3: &str,
        min_progress: i32,
    ) -> Result<Vec<ReadingRow>, PipelineError> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM {} WHERE pk = $1 AND iso3 = $2 AND progresso >= $3",
            self.table
        );

        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(READING_PARTITION_KEY)
            .bind(iso3)
            .bind(min_progress)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn ping(&self) -> Result<(), PipelineError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
