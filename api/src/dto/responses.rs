use serde::Serialize;

/// The `{success, data | message}` envelope every resource handler returns.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Result of the diagnostic mail/queue endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl DeliveryResponse {
    pub fn delivered(message_id: String) -> Self {
        Self {
            status: "success",
            message_id: Some(message_id),
            message: None,
        }
    }

    pub fn failed(message: &'static str) -> Self {
        Self {
            status: "error",
            message_id: None,
            message: Some(message),
        }
    }
}
