//! Engine error types.

use record_store::RecordStoreError;
use sms_client::SmsError;
use thiserror::Error;

/// Errors surfaced by the routing engine and its collaborators.
///
/// Transient delivery failures carry their direction so the webhook layer
/// can answer each leg with the right status; the message record itself
/// stays `Pending` for the fallback retrier.
#[derive(Error, Debug)]
pub enum MaskingError {
    #[error("Missing required field(s): {0}")]
    Validation(String),

    #[error("No Ready number available in the pool")]
    PoolExhausted,

    #[error("Data integrity: {0}")]
    DataIntegrity(String),

    #[error("Forward to client failed: {0}")]
    ForwardToClientFailed(#[source] SmsError),

    #[error("Forward to sitter failed: {0}")]
    ForwardToSitterFailed(#[source] SmsError),

    #[error("Record store error: {0}")]
    Store(#[from] RecordStoreError),
}
