//! SMS transport client.
//!
//! Defines the [`SmsTransport`] seam the routing engine sends through, plus
//! an HTTP implementation against a provider REST API.

mod client;
mod error;
mod types;

pub use client::HttpSmsClient;
pub use error::SmsError;
pub use types::*;

use async_trait::async_trait;

/// Outbound SMS primitive.
///
/// `send` returns the provider's delivery id. Implementations must bound
/// the request time so a slow provider cannot stall a routing request.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<String, SmsError>;

    /// Whether the provider API is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}
