//! 阅读事件消费服务
//!
//! 同时运行 webhook topic 的消费循环和重投 topic 的转发循环。

use std::sync::Arc;

use anyhow::Context;
use leitura_shared::{
    config::AppConfig,
    database::Database,
    kafka::KafkaProducer,
    observability,
    payload_store::PgPayloadStore,
    redelivery::{RedeliveryPublisher, RedeliveryWorker},
};
use reading_consumer::{
    consumer::{ConsumerContext, ReadingConsumer},
    reading_store::PgReadingStore,
};
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("reading-consumer").context("加载配置失败")?;
    config.validate().context("配置校验失败")?;

    let _guard = observability::init(&config.observability).await?;

    info!(
        environment = %config.environment,
        topic = %config.kafka.webhook_topic,
        "Starting reading-consumer"
    );

    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;

    let payloads = Arc::new(PgPayloadStore::new(
        db.pool().clone(),
        config.storage.payload_table.clone(),
    ));
    let readings = Arc::new(PgReadingStore::new(
        db.pool().clone(),
        config.storage.reading_table.clone(),
    ));
    let context = Arc::new(ConsumerContext::new(payloads, readings));

    let producer = KafkaProducer::new(&config.kafka)?;
    let publisher = RedeliveryPublisher::new(producer.clone(), &config);

    let consumer = ReadingConsumer::new(&config, context, publisher)?;
    let worker = RedeliveryWorker::new(&config, producer)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut stopped = shutdown_rx.clone();

    // 消费循环提前退出时同样通知重投 worker 停止
    let consumer_task = async {
        let result = consumer.run(shutdown_rx.clone()).await;
        let _ = shutdown_tx.send(true);
        result
    };

    let signal_task = async {
        tokio::select! {
            _ = shutdown_signal() => info!("收到关闭信号，等待处理中的消息完成"),
            _ = stopped.wait_for(|stop| *stop) => {}
        }
        let _ = shutdown_tx.send(true);
    };

    let (consumer_result, (), ()) = tokio::join!(
        consumer_task,
        worker.run(shutdown_rx.clone()),
        signal_task
    );

    if let Err(e) = consumer_result {
        error!(error = %e, "阅读消费者异常退出");
    }

    db.close().await;
    info!("reading-consumer shutdown complete");
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
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
