//! Webhook 接收服务入口

use std::sync::Arc;

use anyhow::Context;
use leitura_shared::{
    config::AppConfig,
    database::Database,
    kafka::KafkaProducer,
    observability,
    payload_store::PgPayloadStore,
};
use tokio::net::TcpListener;
use tracing::{error, info};
use webhook_api::{
    auth::PgCredentialStore, query::PgReadingQuery, queue::KafkaEventQueue, routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("webhook-api").context("加载配置失败")?;
    config.validate().context("配置校验失败")?;

    let _guard = observability::init(&config.observability).await?;

    info!(
        environment = %config.environment,
        addr = %config.server_addr(),
        series = ?config.webhook.allowed_series,
        "Starting webhook-api"
    );

    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;

    let producer = KafkaProducer::new(&config.kafka)?;

    let state = AppState::new(
        Arc::new(PgPayloadStore::new(
            db.pool().clone(),
            config.storage.payload_table.clone(),
        )),
        Arc::new(KafkaEventQueue::new(
            producer,
            config.kafka.webhook_topic.clone(),
        )),
        Arc::new(PgCredentialStore::new(db.pool().clone())),
        Arc::new(PgReadingQuery::new(
            db.pool().clone(),
            config.storage.reading_table.clone(),
        )),
        config.webhook.clone(),
    );

    let app = routes::build_router(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 停止接收新连接，等待处理中的请求完成
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("webhook-api shutdown complete");
    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
