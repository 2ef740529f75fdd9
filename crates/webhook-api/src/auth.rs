//! API Key 认证
//!
//! 请求通过 `x-api-key` 头传递密钥（头名大小写不敏感）。
//! 存储中只保存 SHA-256 摘要，查询出错时按未授权处理。

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use leitura_shared::error::PipelineError;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{debug, error, warn};

use crate::error::ApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// 凭证存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 摘要对应的密钥存在且处于启用状态
    async fn is_active(&self, key_hash: &str) -> Result<bool, PipelineError>;
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn is_active(&self, key_hash: &str) -> Result<bool, PipelineError> {
        let active: Option<bool> =
            sqlx::query_scalar("SELECT active FROM api_keys WHERE key_hash = $1")
                .bind(key_hash)
                .fetch_optional(&self.pool)
                .await?;

        Ok(active.unwrap_or(false))
    }
}

/// 计算 API Key 的 SHA-256 十六进制摘要
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 校验请求头中的 API Key
///
/// 空密钥直接拒绝，不查询存储。
pub async fn authorize(store: &dyn CredentialStore, headers: &HeaderMap) -> Result<(), ApiError> {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    if key.is_empty() {
        warn!("缺少 API Key");
        return Err(ApiError::Unauthorized);
    }

    let key_prefix: String = key.chars().take(6).collect();

    match store.is_active(&hash_api_key(key)).await {
        Ok(true) => {
            debug!(key_prefix, "API Key 校验通过");
            Ok(())
        }
        Ok(false) => {
            warn!(key_prefix, "API Key 无效或已停用");
            Err(ApiError::Unauthorized)
        }
        Err(e) => {
            error!(key_prefix, error = %e, "校验 API Key 时查询失败");
            Err(ApiError::Unauthorized)
        }
    }
}

/// 只读接口的认证中间件
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(state.credentials.as_ref(), request.headers()).await?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_hash_api_key() {
        // echo -n "test" | sha256sum
        assert_eq!(
            hash_api_key("test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
        assert_eq!(hash_api_key("abc").len(), 64);
    }

    #[tokio::test]
    async fn test_missing_key_skips_lookup() {
        let mut store = MockCredentialStore::new();
        store.expect_is_active().never();

        let result = authorize(&store, &HeaderMap::new()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));

        let result = authorize(&store, &headers_with("x-api-key", "   ")).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_active_key_is_accepted() {
        let expected = hash_api_key("chave-secreta");
        let mut store = MockCredentialStore::new();
        store
            .expect_is_active()
            .withf(move |hash| hash == expected)
            .times(1)
            .returning(|_| Ok(true));

        assert!(authorize(&store, &headers_with("x-api-key", "chave-secreta")).await.is_ok());
    }

    #[tokio::test]
    async fn test_header_name_is_case_insensitive() {
        let mut store = MockCredentialStore::new();
        store.expect_is_active().returning(|_| Ok(true));

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::HeaderName::from_bytes(b"X-API-Key").unwrap(),
            HeaderValue::from_static("k"),
        );
        assert!(authorize(&store, &headers).await.is_ok());
    }

    #[tokio::test]
    async fn test_inactive_key_is_rejected() {
        let mut store = MockCredentialStore::new();
        store.expect_is_active().returning(|_| Ok(false));

        let result = authorize(&store, &headers_with("x-api-key", "revogada")).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_lookup_error_fails_closed() {
        let mut store = MockCredentialStore::new();
        store
            .expect_is_active()
            .returning(|_| Err(PipelineError::Database(sqlx::Error::PoolTimedOut)));

        let result = authorize(&store, &headers_with("x-api-key", "k")).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }
}
