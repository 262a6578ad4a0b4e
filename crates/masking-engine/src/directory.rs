//! Party directory: sitter and client identity resolution.

use crate::error::MaskingError;
use crate::phone;
use crate::types::*;
use chrono::Utc;
use record_store::{Record, RecordStore};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Resolves raw phone numbers to sitter and client identities, creating
/// client shell records lazily on first contact.
#[derive(Clone)]
pub struct PartyDirectory {
    store: Arc<dyn RecordStore>,
}

impl PartyDirectory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Sitter whose public entry point matches `number`.
    #[instrument(skip(self))]
    pub async fn find_sitter_by_entry_point(
        &self,
        number: &str,
    ) -> Result<Option<Sitter>, MaskingError> {
        let records = self
            .store
            .find(SITTERS_TABLE, &|r: &Record| {
                r.str_field(ENTRY_POINT_FIELDS)
                    .map(|v| phone::same_number(v, number))
                    .unwrap_or(false)
            })
            .await?;
        Ok(records.first().map(Sitter::from_record))
    }

    /// Sitter whose real phone number matches `number`.
    #[instrument(skip(self))]
    pub async fn find_sitter_by_real_number(
        &self,
        number: &str,
    ) -> Result<Option<Sitter>, MaskingError> {
        let records = self
            .store
            .find(SITTERS_TABLE, &|r: &Record| {
                r.str_field(PHONE_FIELDS)
                    .map(|v| phone::same_number(v, number))
                    .unwrap_or(false)
            })
            .await?;
        Ok(records.first().map(Sitter::from_record))
    }

    /// Fetch a sitter by record id.
    pub async fn get_sitter(&self, id: &str) -> Result<Sitter, MaskingError> {
        let record = self.store.get(SITTERS_TABLE, id).await?;
        Ok(Sitter::from_record(&record))
    }

    /// Client keyed by real phone number.
    pub async fn find_client_by_phone(
        &self,
        number: &str,
    ) -> Result<Option<Client>, MaskingError> {
        let records = self
            .store
            .find(CLIENTS_TABLE, &|r: &Record| {
                r.str_field(PHONE_FIELDS)
                    .map(|v| phone::same_number(v, number))
                    .unwrap_or(false)
            })
            .await?;
        Ok(records.first().map(Client::from_record))
    }

    /// Client currently holding `number` as their masking number.
    pub async fn find_client_by_masking_number(
        &self,
        number: &str,
    ) -> Result<Option<Client>, MaskingError> {
        let records = self
            .store
            .find(CLIENTS_TABLE, &|r: &Record| {
                r.str_field(MASKING_NUMBER_FIELDS)
                    .map(|v| phone::same_number(v, number))
                    .unwrap_or(false)
            })
            .await?;
        Ok(records.first().map(Client::from_record))
    }

    /// Find or create the client for `number`, refreshing their activity
    /// timestamp. Upsert semantics keep rapid first contacts from leaving
    /// duplicate records.
    pub async fn ensure_client(&self, number: &str) -> Result<Client, MaskingError> {
        let now = Utc::now().to_rfc3339();

        if let Some(existing) = self.find_client_by_phone(number).await? {
            let updated = self
                .store
                .update(
                    CLIENTS_TABLE,
                    &existing.id,
                    record_fields(json!({ "Last Active": now })),
                )
                .await?;
            debug!("Matched existing client {}", existing.id);
            return Ok(Client::from_record(&updated));
        }

        let created = self
            .store
            .create(
                CLIENTS_TABLE,
                record_fields(json!({
                    "Phone Number": number,
                    "Name": "Unknown",
                    "Created At": now,
                    "Last Active": now,
                })),
            )
            .await?;
        info!("Created client shell for {}", number);
        Ok(Client::from_record(&created))
    }

    /// Reset the TTL clock for a client.
    pub async fn touch_last_active(&self, client_id: &str) -> Result<(), MaskingError> {
        self.store
            .update(
                CLIENTS_TABLE,
                client_id,
                record_fields(json!({ "Last Active": Utc::now().to_rfc3339() })),
            )
            .await?;
        Ok(())
    }

    /// Point a client's record at the sitter they are talking to.
    pub async fn link_sitter(
        &self,
        client_id: &str,
        sitter_name: &str,
    ) -> Result<(), MaskingError> {
        self.store
            .update(
                CLIENTS_TABLE,
                client_id,
                record_fields(json!({ "Sitter": sitter_name })),
            )
            .await?;
        Ok(())
    }

    /// Bump a client's error counter by one.
    pub async fn increment_error_count(&self, client_id: &str) -> Result<(), MaskingError> {
        let record = self.store.get(CLIENTS_TABLE, client_id).await?;
        let count = record.int_field(ERROR_COUNT_FIELDS).unwrap_or(0);
        self.store
            .update(
                CLIENTS_TABLE,
                client_id,
                record_fields(json!({ "Error Count": count + 1 })),
            )
            .await?;
        Ok(())
    }

    /// All clients currently holding a masking number.
    pub async fn clients_with_masking_number(&self) -> Result<Vec<Client>, MaskingError> {
        let records = self
            .store
            .find(CLIENTS_TABLE, &|r: &Record| {
                r.has_field(MASKING_NUMBER_FIELDS)
            })
            .await?;
        Ok(records.iter().map(Client::from_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use record_store::MemoryStore;

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create(
                SITTERS_TABLE,
                record_fields(json!({
                    "Full Name": "Jane Sitter",
                    "Phone Number": "+15550001111",
                    "Twilio Number": "+15550009999",
                })),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_sitter_lookups_distinguish_columns() {
        let store = seeded_store().await;
        let directory = PartyDirectory::new(store);

        let by_entry = directory
            .find_sitter_by_entry_point("+15550009999")
            .await
            .unwrap();
        assert!(by_entry.is_some());

        let by_real = directory
            .find_sitter_by_real_number("+15550009999")
            .await
            .unwrap();
        assert!(by_real.is_none());

        let by_real = directory
            .find_sitter_by_real_number("5550001111")
            .await
            .unwrap();
        assert_eq!(by_real.unwrap().display_name, "Jane Sitter");
    }

    #[tokio::test]
    async fn test_ensure_client_creates_shell_once() {
        let store = seeded_store().await;
        let directory = PartyDirectory::new(store.clone());

        let first = directory.ensure_client("+15550003333").await.unwrap();
        assert_eq!(first.name, "Unknown");
        assert!(first.last_active.is_some());

        let second = directory.ensure_client("+15550003333").await.unwrap();
        assert_eq!(first.id, second.id);

        let all = store.find(CLIENTS_TABLE, &|_| true).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_increment_error_count() {
        let store = seeded_store().await;
        let directory = PartyDirectory::new(store.clone());

        let client = directory.ensure_client("+15550003333").await.unwrap();
        directory.increment_error_count(&client.id).await.unwrap();
        directory.increment_error_count(&client.id).await.unwrap();

        let record = store.get(CLIENTS_TABLE, &client.id).await.unwrap();
        assert_eq!(record.int_field(ERROR_COUNT_FIELDS), Some(2));
    }
}
