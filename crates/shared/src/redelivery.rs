//! 消息重投与死信
//!
//! 消费端判定一条消息需要重试时，不阻塞分区原地重试，而是把原始消息包进
//! `RedeliveryEnvelope` 发到重投 topic。重投 worker 等到 `nextAttemptAt`
//! 再把原始消息发回源 topic，并在 `x-delivery-attempt` header 中记录次数。
//! 次数用尽后信封进入死信 topic，等待人工介入。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::kafka::{ConsumerMessage, DELIVERY_ATTEMPT_HEADER, KafkaConsumer, KafkaProducer};
use crate::observability::metrics;
use crate::retry::{RetryPolicy, retry_with_policy};

// ---------------------------------------------------------------------------
// RedeliveryEnvelope
// ---------------------------------------------------------------------------

/// 重投信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeliveryEnvelope {
    /// 原始消息 key（事件 UUID）
    pub message_id: String,
    pub source_topic: String,
    /// 原始消息内容
    pub payload: String,
    /// 最近一次失败原因
    pub error: String,
    /// 本次重投是第几次，从 1 开始；进入死信时为已重投次数
    pub attempt: u32,
    pub max_attempts: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub source_service: String,
}

impl RedeliveryEnvelope {
    /// 距离计划重投时间还剩多久，已到期时为零
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.next_attempt_at - now).to_std().unwrap_or_default()
    }
}

/// 重投路由决策
#[derive(Debug, Clone, PartialEq)]
pub enum RedeliveryRoute {
    /// 发往重投 topic
    Retry {
        attempt: u32,
        next_attempt_at: DateTime<Utc>,
    },
    /// 次数已用尽，发往死信 topic
    DeadLetter { attempts: u32 },
}

/// 根据已重投次数决定去向
///
/// `delivered_attempts` 为当前这次投递之前已经发生的重投次数（首次投递为 0）。
pub fn plan_redelivery(
    delivered_attempts: u32,
    max_redeliveries: u32,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> RedeliveryRoute {
    if delivered_attempts >= max_redeliveries {
        return RedeliveryRoute::DeadLetter {
            attempts: delivered_attempts,
        };
    }

    let delay = policy.delay_for_attempt(delivered_attempts);
    RedeliveryRoute::Retry {
        attempt: delivered_attempts + 1,
        next_attempt_at: now + chrono::Duration::from_std(delay).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// RedeliveryPublisher
// ---------------------------------------------------------------------------

/// 把需要重试的消息发往重投或死信 topic
#[derive(Clone)]
pub struct RedeliveryPublisher {
    producer: KafkaProducer,
    retry_topic: String,
    dead_letter_topic: String,
    source_service: String,
    max_redeliveries: u32,
    redelivery_policy: RetryPolicy,
    publish_policy: RetryPolicy,
}

impl RedeliveryPublisher {
    pub fn new(producer: KafkaProducer, config: &AppConfig) -> Self {
        Self {
            producer,
            retry_topic: config.kafka.retry_topic.clone(),
            dead_letter_topic: config.kafka.dead_letter_topic.clone(),
            source_service: config.service_name.clone(),
            max_redeliveries: config.consumer.max_redeliveries,
            redelivery_policy: config.consumer.redelivery_policy(),
            publish_policy: config.consumer.publish_policy(),
        }
    }

    /// 安排消息重投
    ///
    /// 发布失败时按 `publish_policy` 退避重试；仍失败则返回错误，
    /// 调用方不应登记该消息的偏移量。
    pub async fn redeliver(
        &self,
        msg: &ConsumerMessage,
        reason: &str,
    ) -> Result<RedeliveryRoute, PipelineError> {
        let now = Utc::now();
        let delivered = msg.delivery_attempt();
        let route = plan_redelivery(delivered, self.max_redeliveries, &self.redelivery_policy, now);

        let message_id = msg.key.clone().unwrap_or_else(|| format!("{}-{}", msg.partition, msg.offset));
        let (topic, attempt, next_attempt_at) = match &route {
            RedeliveryRoute::Retry {
                attempt,
                next_attempt_at,
            } => (self.retry_topic.as_str(), *attempt, *next_attempt_at),
            RedeliveryRoute::DeadLetter { attempts } => {
                (self.dead_letter_topic.as_str(), *attempts, now)
            }
        };

        let envelope = RedeliveryEnvelope {
            message_id: message_id.clone(),
            source_topic: msg.topic.clone(),
            payload: String::from_utf8_lossy(&msg.payload).into_owned(),
            error: reason.to_string(),
            attempt,
            max_attempts: self.max_redeliveries,
            first_failed_at: first_failed_at(msg).unwrap_or(now),
            last_failed_at: now,
            next_attempt_at,
            source_service: self.source_service.clone(),
        };

        retry_with_policy(
            &self.publish_policy,
            "publish_redelivery",
            PipelineError::is_retryable,
            || self.producer.send_json(topic, &message_id, &envelope),
        )
        .await?;

        match &route {
            RedeliveryRoute::Retry { .. } => {
                metrics::record_redelivery("retry");
                warn!(
                    message_id = %message_id,
                    attempt,
                    max_attempts = self.max_redeliveries,
                    next_attempt_at = %next_attempt_at,
                    error = reason,
                    "消息已安排重投"
                );
            }
            RedeliveryRoute::DeadLetter { .. } => {
                metrics::record_redelivery("dead_letter");
                error!(
                    message_id = %message_id,
                    source_topic = %msg.topic,
                    attempts = attempt,
                    error = reason,
                    "消息重投次数已用尽，已转入死信队列，需人工介入"
                );
            }
        }

        Ok(route)
    }
}

/// 首次失败时间沿 header 传递，便于在死信中还原完整时间线
const FIRST_FAILED_HEADER: &str = "x-first-failed-at";

fn first_failed_at(msg: &ConsumerMessage) -> Option<DateTime<Utc>> {
    msg.headers
        .get(FIRST_FAILED_HEADER)
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// RedeliveryWorker
// ---------------------------------------------------------------------------

/// 重投 worker
///
/// 消费重投 topic，到期后把原始消息发回源 topic。
pub struct RedeliveryWorker {
    consumer: KafkaConsumer,
    producer: KafkaProducer,
}

impl RedeliveryWorker {
    /// 使用 `.retry` 后缀的独立消费组
    pub fn new(config: &AppConfig, producer: KafkaProducer) -> Result<Self, PipelineError> {
        let consumer = KafkaConsumer::new(&config.kafka, Some("retry"))?;
        consumer.subscribe(&[config.kafka.retry_topic.as_str()])?;

        info!(topic = %config.kafka.retry_topic, "重投 worker 已创建");

        Ok(Self { consumer, producer })
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let producer = self.producer.clone();
        let wait_shutdown = shutdown.clone();

        self.consumer
            .start(shutdown, move |msg| {
                let producer = producer.clone();
                let mut shutdown = wait_shutdown.clone();
                async move { forward_when_due(&msg, &producer, &mut shutdown).await }
            })
            .await;

        info!("重投 worker 已退出");
    }
}

/// 等到计划时间后把原始消息发回源 topic
///
/// 等待期间收到关闭信号时返回错误，偏移量不登记，重启后会重新处理这条信封。
async fn forward_when_due(
    msg: &ConsumerMessage,
    producer: &KafkaProducer,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), PipelineError> {
    let envelope: RedeliveryEnvelope = match msg.deserialize_payload() {
        Ok(envelope) => envelope,
        Err(e) => {
            // 无法解析的信封重试也没有意义，记录后跳过
            error!(offset = msg.offset, error = %e, "重投信封格式错误，已丢弃");
            return Ok(());
        }
    };

    let wait = envelope.remaining(Utc::now());
    if !wait.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                return Err(PipelineError::Internal("等待重投期间收到关闭信号".to_string()));
            }
        }
    }

    let attempt = envelope.attempt.to_string();
    let first_failed = envelope.first_failed_at.to_rfc3339();
    producer
        .send_with_headers(
            &envelope.source_topic,
            &envelope.message_id,
            envelope.payload.as_bytes(),
            &[
                (DELIVERY_ATTEMPT_HEADER, attempt.as_str()),
                (FIRST_FAILED_HEADER, first_failed.as_str()),
            ],
        )
        .await?;

    info!(
        message_id = %envelope.message_id,
        source_topic = %envelope.source_topic,
        attempt = envelope.attempt,
        max_attempts = envelope.max_attempts,
        "消息已重投到源 topic"
    );

    Ok(())
}
