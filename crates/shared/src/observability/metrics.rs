//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 收集并导出指标，
//! 通过独立的 HTTP 端口暴露 `/metrics`。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

fn describe_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    metrics::describe_counter!(
        "webhook_requests_total",
        "Webhook submissions by response status"
    );
    metrics::describe_counter!(
        "queue_messages_total",
        "Queue messages by final outcome"
    );
    metrics::describe_counter!(
        "desafios_processed_total",
        "Challenge entries by processing result"
    );
    metrics::describe_counter!(
        "redeliveries_total",
        "Messages routed to the retry or dead-letter topic"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 记录函数
// ============================================================================

#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录 webhook 提交结果（按 HTTP 状态码）
#[inline]
pub fn record_webhook_request(status: u16) {
    metrics::counter!("webhook_requests_total", "status" => status.to_string()).increment(1);
}

/// 记录队列消息最终结局：acknowledged / retried / dead_lettered
#[inline]
pub fn record_queue_message(outcome: &str) {
    metrics::counter!("queue_messages_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录单个挑战条目的处理结果：processed / skipped / 错误类型
#[inline]
pub fn record_desafio(result: &str) {
    metrics::counter!("desafios_processed_total", "result" => result.to_string()).increment(1);
}

/// 记录重投路由：retry / dead_letter
#[inline]
pub fn record_redelivery(target: &str) {
    metrics::counter!("redeliveries_total", "target" => target.to_string()).increment(1);
}
