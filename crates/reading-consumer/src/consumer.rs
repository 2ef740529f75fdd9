//! 队列消费者
//!
//! 单条消息的处理阶段：
//! `received → parsed → payload_fetched → readings_replaced → items_processed`，
//! 最终落到 `Acknowledged` 或 `Retried`。
//!
//! 需要重试的消息通过 [`RedeliveryPublisher`] 发往重投 topic，
//! 原消息的偏移量照常登记，不阻塞同分区的后续消息。

use std::sync::Arc;
use std::time::Duration;

use leitura_shared::config::AppConfig;
use leitura_shared::error::PipelineError;
use leitura_shared::events::QueueMessage;
use leitura_shared::kafka::{ConsumerMessage, KafkaConsumer};
use leitura_shared::observability::metrics;
use leitura_shared::payload_store::PayloadStore;
use leitura_shared::redelivery::{RedeliveryPublisher, RedeliveryRoute};
use tokio::sync::watch;
use tracing::{Instrument, debug, debug_span, error, info, info_span, warn};

use crate::error::ConsumerError;
use crate::fetcher::PayloadFetcher;
use crate::processor::{DesafioProcessor, ProcessingMeta, ProcessingResult, ProcessingSummary};
use crate::reading_store::ReadingStore;

/// 消息最终去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// 确认，不再投递
    Acknowledged,
    /// 交给重投流程
    Retried,
}

impl MessageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acknowledged => "acknowledged",
            Self::Retried => "retried",
        }
    }
}

/// 单条消息的处理结论，`detail` 写入重投信封的错误说明
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDisposition {
    pub outcome: MessageOutcome,
    pub detail: String,
}

/// 处理上下文
///
/// 启动时构造一次，之后只读共享。测试中可以换成内存实现。
pub struct ConsumerContext {
    fetcher: PayloadFetcher,
    readings: Arc<dyn ReadingStore>,
    processor: DesafioProcessor,
}

impl ConsumerContext {
    pub fn new(payloads: Arc<dyn PayloadStore>, readings: Arc<dyn ReadingStore>) -> Self {
        Self {
            fetcher: PayloadFetcher::new(payloads),
            processor: DesafioProcessor::new(readings.clone()),
            readings,
        }
    }
}

/// 汇总条目结果决定消息去向
///
/// 至少一条成功则确认；全部未成功且存在可重试错误则重试；其余确认丢弃。
pub fn decide_outcome(results: &[ProcessingResult]) -> MessageOutcome {
    if results.iter().any(|r| r.processed) {
        return MessageOutcome::Acknowledged;
    }

    let retryable = results
        .iter()
        .filter_map(|r| r.error.as_ref())
        .any(ConsumerError::is_retryable);

    if retryable {
        MessageOutcome::Retried
    } else {
        MessageOutcome::Acknowledged
    }
}

/// 执行消息处理的各个阶段
///
/// 返回 `Err` 表示整条消息在处理条目之前就失败了。
pub async fn process_message(
    ctx: &ConsumerContext,
    body: &[u8],
) -> Result<ProcessingSummary, ConsumerError> {
    debug!(stage = "received", bytes = body.len(), "收到队列消息");

    let message: QueueMessage = serde_json::from_slice(body).map_err(|e| {
        error!(stage = "received", error = %e, "队列消息解析失败");
        ConsumerError::InvalidMessage(e.to_string())
    })?;

    let span = tracing::Span::current();
    span.record("uuid", message.uuid.as_str());
    span.record("user", message.user.as_str());
    info!(stage = "parsed", "队列消息已解析");

    let payload = ctx.fetcher.fetch(&message.uuid).await?;
    info!(stage = "payload_fetched", desafios = payload.desafios.len(), "请求体已读取");

    // 删除失败不阻断处理，新旧记录可能短暂并存
    match ctx.readings.delete_user_readings(&message.user).await {
        Ok(deleted) => info!(stage = "readings_replaced", deleted, "旧阅读记录已删除"),
        Err(e) => warn!(stage = "readings_replaced", error = %e, "删除旧阅读记录失败，继续处理"),
    }

    let meta = ProcessingMeta {
        uuid: message.uuid.clone(),
        user: payload.perfil.nome.clone(),
        avatar_url: payload.perfil.imagem.clone(),
        timestamp: message.parsed_timestamp(),
    };

    let summary = ctx.processor.process_all(&payload, &meta).await;

    info!(
        stage = "items_processed",
        processed = summary.processed,
        failed = summary.failed,
        skipped = summary.skipped(),
        "挑战条目处理完成"
    );

    for result in &summary.results {
        if let Some(e) = &result.error {
            if !matches!(e, ConsumerError::CountryNotFound { .. }) {
                error!(country = %result.country, error = %e, "挑战条目处理失败");
            }
        }
    }

    Ok(summary)
}

/// 处理一条队列消息并给出结论
pub async fn handle_message(ctx: &ConsumerContext, body: &[u8]) -> MessageDisposition {
    let span = info_span!(
        "queue_message",
        uuid = tracing::field::Empty,
        user = tracing::field::Empty
    );

    async move {
        let disposition = match process_message(ctx, body).await {
            Ok(summary) => {
                let outcome = decide_outcome(&summary.results);
                let detail = format!(
                    "processed={} failed={} skipped={}",
                    summary.processed,
                    summary.failed,
                    summary.skipped()
                );
                MessageDisposition { outcome, detail }
            }
            Err(e) => {
                let outcome = if e.is_retryable() {
                    MessageOutcome::Retried
                } else {
                    MessageOutcome::Acknowledged
                };
                MessageDisposition {
                    outcome,
                    detail: e.to_string(),
                }
            }
        };

        match disposition.outcome {
            MessageOutcome::Acknowledged => {
                info!(outcome = "acknowledged", detail = %disposition.detail, "消息已确认")
            }
            MessageOutcome::Retried => {
                warn!(outcome = "retried", detail = %disposition.detail, "消息需要重试")
            }
        }

        disposition
    }
    .instrument(span)
    .await
}

/// 阅读消费者
pub struct ReadingConsumer {
    consumer: KafkaConsumer,
    context: Arc<ConsumerContext>,
    redelivery: RedeliveryPublisher,
    topic: String,
    message_timeout: Duration,
}

impl ReadingConsumer {
    pub fn new(
        config: &AppConfig,
        context: Arc<ConsumerContext>,
        redelivery: RedeliveryPublisher,
    ) -> Result<Self, PipelineError> {
        let consumer = KafkaConsumer::new(&config.kafka, None)?;

        Ok(Self {
            consumer,
            context,
            redelivery,
            topic: config.kafka.webhook_topic.clone(),
            message_timeout: config.consumer.message_timeout(),
        })
    }

    /// 启动消费循环，直到收到关闭信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), PipelineError> {
        self.consumer.subscribe(&[self.topic.as_str()])?;

        info!(topic = %self.topic, timeout_secs = self.message_timeout.as_secs(), "阅读消费者已启动");

        let context = self.context;
        let redelivery = self.redelivery;
        let message_timeout = self.message_timeout;

        self.consumer
            .start(shutdown, |msg| {
                let context = context.clone();
                let redelivery = redelivery.clone();
                async move { dispatch(&context, &redelivery, message_timeout, msg).await }
            })
            .await;

        info!("阅读消费者已停止");
        Ok(())
    }
}

/// 带时限处理一条队列消息
///
/// 超时按瞬时故障处理，结论为 `Retried`。
pub async fn handle_with_timeout(
    ctx: &ConsumerContext,
    body: &[u8],
    message_timeout: Duration,
) -> MessageDisposition {
    match tokio::time::timeout(message_timeout, handle_message(ctx, body)).await {
        Ok(disposition) => disposition,
        Err(_) => {
            warn!(timeout_ms = message_timeout.as_millis() as u64, "消息处理超时");
            MessageDisposition {
                outcome: MessageOutcome::Retried,
                detail: format!("处理超时 ({}ms)", message_timeout.as_millis()),
            }
        }
    }
}

/// 处理一条 Kafka 消息，需要重试时发往重投 topic
///
/// 返回 `Err` 只发生在重投信封发布失败时，此时偏移量不登记。
async fn dispatch(
    context: &ConsumerContext,
    redelivery: &RedeliveryPublisher,
    message_timeout: Duration,
    msg: ConsumerMessage,
) -> Result<(), PipelineError> {
    let disposition = handle_with_timeout(context, &msg.payload, message_timeout)
        .instrument(debug_span!("dispatch", partition = msg.partition, offset = msg.offset))
        .await;

    match disposition.outcome {
        MessageOutcome::Acknowledged => {
            metrics::record_queue_message(MessageOutcome::Acknowledged.as_str());
        }
        MessageOutcome::Retried => {
            let route = redelivery.redeliver(&msg, &disposition.detail).await?;
            let label = match route {
                RedeliveryRoute::Retry { .. } => MessageOutcome::Retried.as_str(),
                RedeliveryRoute::DeadLetter { .. } => "dead_lettered",
            };
            metrics::record_queue_message(label);
        }
    }

    Ok(())
}
