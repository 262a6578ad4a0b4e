//! Masking-number pool manager.
//!
//! Owns the `Ready -> Assigned -> Ready` lifecycle of inventory numbers.
//! The invariant that at most one holder ever has an `Assigned` number is
//! enforced here, not by callers: draws only ever see `Ready` records and
//! both halves of an assignment stand or fall together.

use crate::audit::{events, AuditLog};
use crate::error::MaskingError;
use crate::types::*;
use record_store::{Record, RecordStore};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};

#[derive(Clone)]
pub struct NumberPool {
    store: Arc<dyn RecordStore>,
    audit: AuditLog,
}

impl NumberPool {
    pub fn new(store: Arc<dyn RecordStore>, audit: AuditLog) -> Self {
        Self { store, audit }
    }

    /// Next `Ready` number carrying the given lifecycle tag, first by
    /// insertion order. No fairness guarantee.
    pub async fn next_ready(&self, tag: &str) -> Result<Option<MaskingNumber>, MaskingError> {
        let records = self
            .store
            .find(INVENTORY_TABLE, &|r: &Record| {
                let tagged = r
                    .str_field(NUMBER_TYPE_FIELDS)
                    .map(|t| t.eq_ignore_ascii_case(tag))
                    .unwrap_or(false);
                let ready = r
                    .str_field(STATUS_FIELDS)
                    .and_then(NumberStatus::parse)
                    == Some(NumberStatus::Ready);
                tagged && ready && r.has_field(PHONE_FIELDS)
            })
            .await?;
        Ok(records.first().and_then(MaskingNumber::from_record))
    }

    /// Inventory record for a number value, for deallocation bookkeeping.
    pub async fn find_by_number(
        &self,
        value: &str,
    ) -> Result<Option<MaskingNumber>, MaskingError> {
        let records = self
            .store
            .find(INVENTORY_TABLE, &|r: &Record| {
                r.str_field(PHONE_FIELDS)
                    .map(|v| crate::phone::same_number(v, value))
                    .unwrap_or(false)
            })
            .await?;
        Ok(records.first().and_then(MaskingNumber::from_record))
    }

    /// Assign a `Ready` number to a client: mark the inventory record
    /// `Assigned` and write the value onto the client record. If the second
    /// half fails the first is reverted so the number is not stranded.
    #[instrument(skip(self, client, number), fields(client = %client.id, number = %number.value))]
    pub async fn assign(
        &self,
        client: &Client,
        number: &MaskingNumber,
    ) -> Result<(), MaskingError> {
        if number.status != Some(NumberStatus::Ready) {
            return Err(MaskingError::DataIntegrity(format!(
                "number {} is not Ready",
                number.value
            )));
        }

        self.store
            .update(
                INVENTORY_TABLE,
                &number.id,
                record_fields(json!({
                    "Status": NumberStatus::Assigned.as_str(),
                    "Assigned To": client.id,
                })),
            )
            .await?;

        if let Err(e) = self
            .store
            .update(
                CLIENTS_TABLE,
                &client.id,
                record_fields(json!({ "twilio-number": number.value })),
            )
            .await
        {
            if let Err(revert) = self.reset_to_ready(&number.id).await {
                error!(
                    "Failed to revert half-assigned number {}: {}",
                    number.value, revert
                );
            }
            return Err(e.into());
        }

        info!("Assigned {} to client {}", number.value, client.id);
        Ok(())
    }

    /// Release a number back to the pool. The client's masking-number field
    /// is cleared first so no state ever shows a client pointing at a
    /// `Ready` number.
    #[instrument(skip(self))]
    pub async fn release(&self, client_id: &str, number_id: &str) -> Result<(), MaskingError> {
        self.store
            .update(
                CLIENTS_TABLE,
                client_id,
                record_fields(json!({ "twilio-number": null })),
            )
            .await?;
        self.reset_to_ready(number_id).await?;
        info!("Released number {} from client {}", number_id, client_id);
        Ok(())
    }

    /// Force-rotate a sitter's public entry point: draw the next `Ready`
    /// pool number, point the sitter at it, and return the old number to
    /// the pool.
    pub async fn rotate_sitter_entry_point(
        &self,
        sitter: &Sitter,
        tag: &str,
    ) -> Result<String, MaskingError> {
        let new = match self.next_ready(tag).await? {
            Some(n) => n,
            None => {
                self.audit
                    .record(
                        events::POOL_EXHAUSTED,
                        &format!("No Ready number for rotation of sitter {}", sitter.id),
                        "",
                    )
                    .await;
                return Err(MaskingError::PoolExhausted);
            }
        };

        let old = self.find_assigned_to(&sitter.id).await?;

        self.store
            .update(
                INVENTORY_TABLE,
                &new.id,
                record_fields(json!({
                    "Status": NumberStatus::Assigned.as_str(),
                    "Assigned To": sitter.id,
                })),
            )
            .await?;
        self.store
            .update(
                SITTERS_TABLE,
                &sitter.id,
                record_fields(json!({ "Twilio Number": new.value })),
            )
            .await?;

        if let Some(old) = old {
            if old.id != new.id {
                if let Err(e) = self.reset_to_ready(&old.id).await {
                    error!(
                        "Failed to release old number {} for sitter {}: {}",
                        old.value, sitter.id, e
                    );
                }
            }
        }

        self.audit
            .record(
                events::NUMBER_ROTATION,
                &format!("Assigned {} to sitter {}", new.value, sitter.display_name),
                "",
            )
            .await;

        Ok(new.value)
    }

    async fn find_assigned_to(
        &self,
        owner_id: &str,
    ) -> Result<Option<MaskingNumber>, MaskingError> {
        let records = self
            .store
            .find(INVENTORY_TABLE, &|r: &Record| {
                r.str_field(ASSIGNED_TO_FIELDS) == Some(owner_id)
            })
            .await?;
        Ok(records.first().and_then(MaskingNumber::from_record))
    }

    async fn reset_to_ready(&self, number_id: &str) -> Result<(), MaskingError> {
        self.store
            .update(
                INVENTORY_TABLE,
                number_id,
                record_fields(json!({
                    "Status": NumberStatus::Ready.as_str(),
                    "Assigned To": null,
                })),
            )
            .await?;
        Ok(())
    }
}
