//! `/api/tests/*`: manual checks that mail and queue delivery are wired up.

use crate::{
    AppState,
    dto::{DeliveryResponse, JsonBody, SendMailRequest, SendQueueMessageRequest},
    errors::ApiError,
    queue::DEFAULT_QUEUE,
};
use axum::{Json, extract::State, http::StatusCode};
use tracing::error;

fn failed(message: &'static str) -> (StatusCode, Json<DeliveryResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(DeliveryResponse::failed(message)),
    )
}

/// POST /api/tests/send-mail
/// Body: { "to": "...", "subject": "...", "message": "...", "html"?: "..." }
///
/// An unreadable body fails like the send itself would.
pub async fn send_mail(
    State(state): State<AppState>,
    payload: Result<JsonBody<SendMailRequest>, ApiError>,
) -> (StatusCode, Json<DeliveryResponse>) {
    let JsonBody(payload) = match payload {
        Ok(payload) => payload,
        Err(e) => {
            error!("Error sending email: {}", e.message());
            return failed("Failed to send email");
        }
    };

    let sent = state
        .notifications
        .send_email(payload.to, payload.subject, payload.message, payload.html)
        .await;

    match sent {
        Ok(message_id) => (StatusCode::OK, Json(DeliveryResponse::delivered(message_id))),
        Err(e) => {
            error!("Error sending email: {}", e);
            failed("Failed to send email")
        }
    }
}

/// POST /api/tests/send-sqs
/// Body: { "message": "..." }
pub async fn send_sqs(
    State(state): State<AppState>,
    payload: Result<JsonBody<SendQueueMessageRequest>, ApiError>,
) -> (StatusCode, Json<DeliveryResponse>) {
    let JsonBody(payload) = match payload {
        Ok(payload) => payload,
        Err(e) => {
            error!("Error sending queue message: {}", e.message());
            return failed("Failed to send message");
        }
    };

    match state
        .notifications
        .enqueue(DEFAULT_QUEUE, &payload.message)
        .await
    {
        Ok(message_id) => (StatusCode::OK, Json(DeliveryResponse::delivered(message_id))),
        Err(e) => {
            error!("Error sending queue message: {}", e);
            failed("Failed to send message")
        }
    }
}
