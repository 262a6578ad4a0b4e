//! Provider API request/response types.

use serde::{Deserialize, Serialize};

/// Form payload for the provider's send endpoint.
#[derive(Debug, Serialize)]
pub struct SendMessageRequest {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Body")]
    pub body: String,
}

/// Provider acknowledgment for an accepted message.
#[derive(Debug, Deserialize)]
pub struct SendMessageResponse {
    /// Provider-assigned delivery id.
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}
