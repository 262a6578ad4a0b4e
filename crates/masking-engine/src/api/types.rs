//! API request/response types.

use serde::{Deserialize, Serialize};

/// Webhook acknowledgment.
///
/// `status` is `"blocked"` when the engine already forwarded the message
/// manually and the upstream transport must suppress its own delivery, or
/// `"ignored"` for a pass-through no-op.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl WebhookAck {
    pub fn blocked(correlation_id: Option<String>, detail: Option<&str>) -> Self {
        Self {
            status: "blocked".into(),
            detail: detail.map(String::from),
            correlation_id,
        }
    }

    pub fn ignored(reason: &str) -> Self {
        Self {
            status: "ignored".into(),
            detail: Some(reason.into()),
            correlation_id: None,
        }
    }
}

/// Admin rotation request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttachNumberRequest {
    pub sitter_id: String,
}

/// Admin rotation response.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttachNumberResponse {
    pub status: String,
    pub new_number: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub store_healthy: bool,
    pub transport_healthy: bool,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}
