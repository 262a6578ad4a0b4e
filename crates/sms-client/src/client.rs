//! HTTP SMS client.

use crate::error::SmsError;
use crate::types::*;
use crate::SmsTransport;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// REST API client for the SMS provider.
///
/// The request timeout doubles as the outbound send bound: a hung provider
/// call fails the send instead of stalling the routing request.
#[derive(Clone)]
pub struct HttpSmsClient {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

impl HttpSmsClient {
    /// Create a new client.
    pub fn new(
        base_url: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SmsError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        })
    }

    /// Get the configured account sid.
    pub fn account_sid(&self) -> &str {
        &self.account_sid
    }
}

#[async_trait]
impl SmsTransport for HttpSmsClient {
    #[instrument(skip(self, body))]
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<String, SmsError> {
        let request = SendMessageRequest {
            from: from.to_string(),
            to: to.to_string(),
            body: body.to_string(),
        };

        let response = self
            .client
            .post(format!(
                "{}/Accounts/{}/Messages",
                self.base_url, self.account_sid
            ))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let msg = response.text().await.unwrap_or_default();
            warn!("Send failed: {}", msg);
            return Err(SmsError::SendFailed(msg));
        }

        let ack: SendMessageResponse = response.json().await?;
        debug!("Sent message to {} (sid: {})", to, ack.sid);
        Ok(ack.sid)
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
