use axum::{
    Json,
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::{any::Any, fmt::Display};
use tracing::{debug, error};

pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";
pub const ROUTE_NOT_FOUND: &str = "Route not found";

/// The closed set of failures a handler can answer with.
///
/// Each kind maps to exactly one status code. `Upstream` carries a fixed,
/// caller-safe message and a private detail that only goes to the log.
#[derive(Debug)]
pub enum ApiError {
    Validation(&'static str),
    NotFound(&'static str),
    Conflict(&'static str),
    Upstream {
        message: &'static str,
        detail: String,
    },
}

impl ApiError {
    pub fn upstream(message: &'static str, err: impl Display) -> Self {
        ApiError::Upstream {
            message,
            detail: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::Validation(msg) | ApiError::NotFound(msg) | ApiError::Conflict(msg) => *msg,
            ApiError::Upstream { message, .. } => *message,
        }
    }
}

/// Renders the `{success: false, error}` envelope.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Upstream { message, detail } = &self {
            error!("{}: {}", message, detail);
        }

        error_envelope(self.status(), self.message())
    }
}

pub const INVALID_JSON_BODY: &str = "Invalid JSON body";

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        debug!("Unreadable request body: {}", rejection.body_text());
        ApiError::Validation(INVALID_JSON_BODY)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        debug!("Rejected request body: {}", err);
        ApiError::Validation(INVALID_JSON_BODY)
    }
}

pub fn error_envelope(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
          "success": false,
          "error": message
        })),
    )
        .into_response()
}

/// Fallback for routes and methods nobody registered.
pub async fn not_found() -> Response {
    error_envelope(StatusCode::NOT_FOUND, ROUTE_NOT_FOUND)
}

/// Used by `CatchPanicLayer`: a panicking handler still answers with the envelope.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!("Unhandled error: {}", detail);

    error_envelope(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
}
