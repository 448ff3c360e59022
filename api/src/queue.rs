//! Static queue registry shared by the producer side (`/api/tests/send-sqs`)
//! and the consumer side (queue-delivery invocations).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

/// Logical name of the only queue this service owns.
pub const DEFAULT_QUEUE: &str = "hono-lambda";

/// Event-source marker carried by SQS delivery records.
pub const SQS_EVENT_SOURCE: &str = "aws:sqs";

/// A queue-delivery invocation: one or more messages pulled from SQS.
///
/// Mirrors the AWS SQS event structure; unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqsEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<SqsMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsMessage {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub receipt_handle: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub event_source: String,
    #[serde(rename = "eventSourceARN", default)]
    pub event_source_arn: String,
    #[serde(default)]
    pub aws_region: String,
}

impl SqsEvent {
    /// Queue name of the delivery: the part of the first record's source ARN
    /// after the last `:`.
    pub fn queue_name(&self) -> Option<&str> {
        self.records
            .first()
            .and_then(|record| record.event_source_arn.rsplit(':').next())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("queue consumer failed: {0}")]
pub struct ConsumerError(pub String);

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Consumer invoked with the full delivery batch.
pub type QueueConsumer = Arc<dyn Fn(SqsEvent) -> BoxFuture<Result<(), ConsumerError>> + Send + Sync>;

#[derive(Clone)]
pub struct QueueDefinition {
    /// Provider address used when enqueueing. `None` until configured.
    pub url: Option<String>,
    pub consumer: QueueConsumer,
}

/// Logical queue name -> provider address and consumer.
#[derive(Clone, Default)]
pub struct QueueRegistry {
    queues: HashMap<String, QueueDefinition>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry this service ships with: `hono-lambda`, consumed by
    /// [`log_messages`].
    pub fn with_default_queue(url: Option<String>) -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_QUEUE, url, log_messages);
        registry
    }

    pub fn register<F, Fut>(&mut self, name: impl Into<String>, url: Option<String>, consumer: F)
    where
        F: Fn(SqsEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ConsumerError>> + Send + 'static,
    {
        let consumer: QueueConsumer = Arc::new(move |event| Box::pin(consumer(event)));
        self.queues
            .insert(name.into(), QueueDefinition { url, consumer });
    }

    pub fn get(&self, name: &str) -> Option<&QueueDefinition> {
        self.queues.get(name)
    }
}

/// Consumer for `hono-lambda`: logs the delivery and every message body.
pub async fn log_messages(event: SqsEvent) -> Result<(), ConsumerError> {
    info!(records = event.records.len(), "Queue event received");
    for record in &event.records {
        info!(message_id = %record.message_id, body = %record.body, "Queue message");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_from(arn: &str) -> SqsEvent {
        SqsEvent {
            records: vec![SqsMessage {
                message_id: "m-1".into(),
                body: "hello".into(),
                event_source: SQS_EVENT_SOURCE.into(),
                event_source_arn: arn.into(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn queue_name_is_last_arn_segment() {
        let event = event_from("arn:aws:sqs:ap-south-1:123456789012:hono-lambda");
        assert_eq!(event.queue_name(), Some("hono-lambda"));

        let event = event_from("no-colons");
        assert_eq!(event.queue_name(), Some("no-colons"));

        assert_eq!(SqsEvent::default().queue_name(), None);
    }

    #[test]
    fn deserializes_aws_shape() {
        let raw = r#"{"Records":[{"messageId":"m","receiptHandle":"r","body":"b",
            "attributes":{"ApproximateReceiveCount":"1"},"messageAttributes":{},
            "eventSource":"aws:sqs","eventSourceARN":"arn:aws:sqs:r:1:q","awsRegion":"r"}]}"#;
        let event: SqsEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.records[0].event_source, SQS_EVENT_SOURCE);
        assert_eq!(event.queue_name(), Some("q"));
    }

    #[tokio::test]
    async fn default_registry_knows_hono_lambda() {
        let registry = QueueRegistry::with_default_queue(None);
        let queue = registry.get(DEFAULT_QUEUE).unwrap();
        assert!(queue.url.is_none());
        assert!((queue.consumer)(event_from("x:hono-lambda")).await.is_ok());
        assert!(registry.get("other").is_none());
    }
}
