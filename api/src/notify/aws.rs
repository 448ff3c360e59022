use super::{MailTransport, NotificationError, OutgoingEmail, QueueTransport};
use async_trait::async_trait;
use aws_sdk_ses::types::{Body, Content, Destination, Message};

const CHARSET: &str = "UTF-8";

/// Mail over Amazon SES.
pub struct SesMailer {
    client: aws_sdk_ses::Client,
    from: Option<String>,
}

impl SesMailer {
    pub fn new(config: &aws_config::SdkConfig, from: Option<String>) -> Self {
        Self {
            client: aws_sdk_ses::Client::new(config),
            from,
        }
    }
}

fn content(data: &str) -> Result<Content, NotificationError> {
    Content::builder()
        .data(data)
        .charset(CHARSET)
        .build()
        .map_err(|e| NotificationError::Build(e.to_string()))
}

#[async_trait]
impl MailTransport for SesMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, NotificationError> {
        let from = self.from.as_deref().ok_or(NotificationError::SenderMissing)?;

        let message = Message::builder()
            .subject(content(&email.subject)?)
            .body(
                Body::builder()
                    .text(content(&email.text)?)
                    .html(content(&email.html)?)
                    .build(),
            )
            .build();

        let output = self
            .client
            .send_email()
            .source(from)
            .destination(Destination::builder().to_addresses(&email.to).build())
            .message(message)
            .send()
            .await
            .map_err(|e| {
                NotificationError::Provider(aws_sdk_ses::error::DisplayErrorContext(e).to_string())
            })?;

        Ok(output.message_id().to_string())
    }
}

/// Messages over Amazon SQS.
pub struct SqsSender {
    client: aws_sdk_sqs::Client,
}

impl SqsSender {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_sqs::Client::new(config),
        }
    }
}

#[async_trait]
impl QueueTransport for SqsSender {
    async fn send(&self, queue_url: &str, body: &str) -> Result<String, NotificationError> {
        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                NotificationError::Provider(aws_sdk_sqs::error::DisplayErrorContext(e).to_string())
            })?;

        Ok(output.message_id().unwrap_or_default().to_string())
    }
}
