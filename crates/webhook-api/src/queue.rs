//! 事件队列
//!
//! 接收端只投递轻量的消息指针，完整请求体已经写入 Payload Store。

use async_trait::async_trait;
use leitura_shared::error::PipelineError;
use leitura_shared::events::QueueMessage;
use leitura_shared::kafka::KafkaProducer;
use tracing::debug;

#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn enqueue(&self, message: &QueueMessage) -> Result<(), PipelineError>;
}

/// Kafka 实现，消息键为事件 UUID
pub struct KafkaEventQueue {
    producer: KafkaProducer,
    topic: String,
}

impl KafkaEventQueue {
    pub fn new(producer: KafkaProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl EventQueue for KafkaEventQueue {
    async fn enqueue(&self, message: &QueueMessage) -> Result<(), PipelineError> {
        let (partition, offset) = self
            .producer
            .send_json(&self.topic, &message.uuid, message)
            .await?;

        debug!(uuid = %message.uuid, topic = %self.topic, partition, offset, "队列消息已投递");
        Ok(())
    }
}
