//! 接收服务错误类型
//!
//! 响应体统一为 `{"error": CODE, "message": ...}`。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leitura_shared::error::PipelineError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Payload exceeds 1 MB limit")]
    PayloadTooLarge,

    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("Failed to parse JSON payload")]
    InvalidJson,

    #[error("{0}")]
    Validation(String),

    #[error("Invalid ISO3 code format")]
    InvalidIso3,

    #[error("Failed to store payload")]
    Storage(#[source] PipelineError),

    #[error("Failed to queue message")]
    Queue(#[source] PipelineError),

    #[error("Error fetching data")]
    Query(#[source] PipelineError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge | Self::InvalidJson | Self::Validation(_) | Self::InvalidIso3 => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Storage(_) | Self::Queue(_) | Self::Query(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidJson => "INVALID_JSON",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidIso3 => "INVALID_ISO3",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Query(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 系统错误的细节只进日志
        match &self {
            Self::Storage(e) => tracing::error!(error = %e, "写入请求体失败"),
            Self::Queue(e) => tracing::error!(error = %e, "投递队列消息失败"),
            Self::Query(e) => tracing::error!(error = %e, "查询阅读记录失败"),
            _ => {}
        }

        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
        });

        (self.status_code(), axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn db_error() -> PipelineError {
        PipelineError::Database(sqlx::Error::PoolTimedOut)
    }

    #[test]
    fn test_status_and_codes() {
        let cases = vec![
            (ApiError::PayloadTooLarge, StatusCode::BAD_REQUEST, "PAYLOAD_TOO_LARGE"),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (ApiError::InvalidJson, StatusCode::BAD_REQUEST, "INVALID_JSON"),
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (ApiError::InvalidIso3, StatusCode::BAD_REQUEST, "INVALID_ISO3"),
            (ApiError::Storage(db_error()), StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            (ApiError::Queue(db_error()), StatusCode::INTERNAL_SERVER_ERROR, "QUEUE_ERROR"),
            (ApiError::Query(db_error()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.status_code(), status, "状态码不匹配: {code}");
            assert_eq!(error.error_code(), code);
        }
    }

    #[tokio::test]
    async fn test_response_body_hides_system_details() {
        let response = ApiError::Storage(db_error()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "STORAGE_ERROR");
        assert_eq!(body["message"], "Failed to store payload");
    }

    #[tokio::test]
    async fn test_validation_message_passes_through() {
        let response = ApiError::Validation("No desafios provided".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert_eq!(body["message"], "No desafios provided");
    }
}
