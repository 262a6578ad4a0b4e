//! Message history log.

use crate::error::MaskingError;
use crate::types::*;
use chrono::Utc;
use record_store::{Record, RecordStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Append-then-update log of forwarding attempts.
///
/// A record is created `Pending` before each send and moved to a terminal
/// status exactly once per attempt; the fallback retrier may move it again.
#[derive(Clone)]
pub struct MessageLog {
    store: Arc<dyn RecordStore>,
}

impl MessageLog {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Persist a forwarding attempt before the send happens.
    pub async fn create_pending(
        &self,
        correlation_id: &str,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<MessageRecord, MaskingError> {
        let record = self
            .store
            .create(
                MESSAGES_TABLE,
                record_fields(json!({
                    "Correlation ID": correlation_id,
                    "From": from,
                    "To": to,
                    "Body": body,
                    "Status": DeliveryStatus::Pending.as_str(),
                    "Timestamp": Utc::now().to_rfc3339(),
                })),
            )
            .await?;
        Ok(MessageRecord::from_record(&record))
    }

    /// Move a message to a new delivery status.
    pub async fn set_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
    ) -> Result<(), MaskingError> {
        self.store
            .update(
                MESSAGES_TABLE,
                message_id,
                record_fields(json!({ "Status": status.as_str() })),
            )
            .await?;
        Ok(())
    }

    /// `Pending` messages whose age exceeds `age`, oldest first.
    pub async fn pending_older_than(
        &self,
        age: Duration,
    ) -> Result<Vec<MessageRecord>, MaskingError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());

        let records = self
            .store
            .find(MESSAGES_TABLE, &|r: &Record| {
                let pending = r
                    .str_field(STATUS_FIELDS)
                    .and_then(DeliveryStatus::parse)
                    == Some(DeliveryStatus::Pending);
                let old_enough = MessageRecord::from_record(r)
                    .timestamp
                    .map(|t| t < cutoff)
                    .unwrap_or(false);
                pending && old_enough
            })
            .await?;

        Ok(records.iter().map(MessageRecord::from_record).collect())
    }
}
