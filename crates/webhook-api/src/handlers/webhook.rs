//! Webhook 接收
//!
//! 处理顺序固定：大小检查 → 认证 → JSON 解析 → 系列过滤 → 字段校验
//! → 写入请求体 → 投递消息。请求体必须先落盘再投递。

use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use http_body_util::LengthLimitError;
use leitura_shared::events::{QueueMessage, WebhookPayload};
use leitura_shared::observability::metrics;
use leitura_shared::payload_store::payload_key;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::authorize;
use crate::dto::{WebhookAccepted, WebhookIgnored};
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let response = match accept(&state, &headers, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    metrics::record_webhook_request(response.status().as_u16());
    response
}

async fn accept(state: &AppState, headers: &HeaderMap, body: Body) -> Result<Response> {
    let bytes = read_limited(body, state.webhook.max_body_bytes).await?;
    info!(bytes = bytes.len(), "收到 webhook 请求");

    authorize(state.credentials.as_ref(), headers).await?;

    let payload: WebhookPayload = serde_json::from_slice(&bytes).map_err(|e| {
        warn!(error = %e, "请求体 JSON 解析失败");
        ApiError::InvalidJson
    })?;

    let identifier = &payload.maratona.identificador;
    if !state.webhook.is_allowed_series(identifier) {
        info!(identificador = %identifier, "系列不在白名单内，忽略");
        let body = WebhookIgnored {
            success: true,
            message: "Event ignored - invalid identificador".to_string(),
        };
        return Ok((StatusCode::OK, Json(body)).into_response());
    }

    if let Some(message) = payload.validation_message() {
        warn!(message = %message, "请求体校验失败");
        return Err(ApiError::Validation(message));
    }

    let uuid = Uuid::new_v4().to_string();
    let user = payload.perfil.nome.clone();
    let key = payload_key(&uuid);

    state
        .payloads
        .put(&key, &bytes)
        .await
        .map_err(ApiError::Storage)?;
    info!(uuid = %uuid, user = %user, key = %key, "请求体已写入");

    let message = QueueMessage::new(uuid.clone(), user.clone(), Utc::now());
    if let Err(e) = state.queue.enqueue(&message).await {
        // 消息没发出去，请求体不再有人读取
        if let Err(cleanup) = state.payloads.delete(&key).await {
            warn!(uuid = %uuid, key = %key, error = %cleanup, "清理请求体失败");
        }
        return Err(ApiError::Queue(e));
    }

    info!(uuid = %uuid, user = %user, desafios = payload.desafios.len(), "webhook 已入队");

    let body = WebhookAccepted {
        success: true,
        uuid,
        status: "QUEUED".to_string(),
        message: "Webhook queued for processing".to_string(),
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

/// 读取请求体，超过 `limit` 字节返回 `PayloadTooLarge`
async fn read_limited(body: Body, limit: usize) -> Result<Bytes> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let inner = e.into_inner();
        if inner.is::<LengthLimitError>() {
            warn!(limit, "请求体超过大小上限");
            ApiError::PayloadTooLarge
        } else {
            warn!(error = %inner, "读取请求体失败");
            ApiError::InvalidJson
        }
    })
}
