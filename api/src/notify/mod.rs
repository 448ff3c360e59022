//! Outbound mail and queue messages.
//!
//! Transports are opaque send capabilities; [`NotificationGateway`] adds the
//! queue-name resolution in front of them so an unknown queue fails before
//! any network call.

mod aws;

pub use aws::{SesMailer, SqsSender};

use crate::queue::QueueRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("queue {0} not found")]
    QueueNotFound(String),
    #[error("queue {0} has no provider URL configured")]
    QueueUrlMissing(String),
    #[error("no sender address configured")]
    SenderMissing,
    #[error("invalid request: {0}")]
    Build(String),
    #[error("provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Returns the provider message id.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, NotificationError>;
}

#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Returns the provider message id.
    async fn send(&self, queue_url: &str, body: &str) -> Result<String, NotificationError>;
}

#[derive(Clone)]
pub struct NotificationGateway {
    mail: Arc<dyn MailTransport>,
    queue: Arc<dyn QueueTransport>,
    registry: Arc<QueueRegistry>,
}

impl NotificationGateway {
    pub fn new(
        mail: Arc<dyn MailTransport>,
        queue: Arc<dyn QueueTransport>,
        registry: Arc<QueueRegistry>,
    ) -> Self {
        Self {
            mail,
            queue,
            registry,
        }
    }

    /// Sends a mail; without an HTML body the text is wrapped in `<p>`.
    pub async fn send_email(
        &self,
        to: String,
        subject: String,
        text: String,
        html: Option<String>,
    ) -> Result<String, NotificationError> {
        let html = html.unwrap_or_else(|| format!("<p>{text}</p>"));
        let email = OutgoingEmail {
            to,
            subject,
            text,
            html,
        };

        let message_id = self.mail.send(&email).await?;
        info!(to = %email.to, message_id = %message_id, "Email sent");
        Ok(message_id)
    }

    pub async fn enqueue(&self, queue_name: &str, body: &str) -> Result<String, NotificationError> {
        let queue = self
            .registry
            .get(queue_name)
            .ok_or_else(|| NotificationError::QueueNotFound(queue_name.to_string()))?;
        let url = queue
            .url
            .as_deref()
            .ok_or_else(|| NotificationError::QueueUrlMissing(queue_name.to_string()))?;

        let message_id = self.queue.send(url, body).await?;
        info!(queue = queue_name, message_id = %message_id, "Message enqueued");
        Ok(message_id)
    }
}
