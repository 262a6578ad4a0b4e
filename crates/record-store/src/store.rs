//! Store trait and the in-memory implementation.

use crate::error::RecordStoreError;
use crate::record::{Fields, Record};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Record-level predicate used by [`RecordStore::find`].
pub type Predicate<'a> = &'a (dyn Fn(&Record) -> bool + Send + Sync);

/// Storage backend for tables of records.
///
/// Every mutation is an atomic per-record operation; the engine relies on
/// that instead of holding cross-record locks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records in `table` matching the predicate, in insertion order.
    /// An unknown table is an empty result, not an error.
    async fn find(
        &self,
        table: &str,
        predicate: Predicate<'_>,
    ) -> Result<Vec<Record>, RecordStoreError>;

    /// Fetch a single record by id.
    async fn get(&self, table: &str, id: &str) -> Result<Record, RecordStoreError>;

    /// Create a record and return it with its assigned id.
    async fn create(&self, table: &str, fields: Fields) -> Result<Record, RecordStoreError>;

    /// Merge `fields` into an existing record. A `null` value clears the
    /// field entirely.
    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Record, RecordStoreError>;

    /// Whether the backend is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}

/// In-memory record store.
///
/// The reference backend for tests and single-node deployments; a real
/// deployment implements [`RecordStore`] against its own database.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Record>>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("rec{:06}", n)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(
        &self,
        table: &str,
        predicate: Predicate<'_>,
    ) -> Result<Vec<Record>, RecordStoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|records| records.iter().filter(|r| predicate(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, table: &str, id: &str) -> Result<Record, RecordStoreError> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .and_then(|records| records.iter().find(|r| r.id == id))
            .cloned()
            .ok_or_else(|| RecordStoreError::RecordNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    async fn create(&self, table: &str, fields: Fields) -> Result<Record, RecordStoreError> {
        let record = Record {
            id: self.allocate_id(),
            fields,
        };

        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .push(record.clone());

        debug!("Created {}/{}", table, record.id);
        Ok(record)
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Record, RecordStoreError> {
        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(table)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| RecordStoreError::RecordNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in fields {
            if value == Value::Null {
                record.fields.remove(&key);
            } else {
                record.fields.insert(key, value);
            }
        }

        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryStore::new();

        let created = store
            .create("Clients", fields(json!({"Phone Number": "+15550001111"})))
            .await
            .unwrap();

        let fetched = store.get("Clients", &created.id).await.unwrap();
        assert_eq!(fetched.str_field(&["Phone Number"]), Some("+15550001111"));
    }

    #[tokio::test]
    async fn test_get_missing_record() {
        let store = MemoryStore::new();
        let result = store.get("Clients", "rec999999").await;
        assert!(matches!(
            result,
            Err(RecordStoreError::RecordNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_unknown_table_is_empty() {
        let store = MemoryStore::new();
        let records = store.find("Nope", &|_| true).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_find_preserves_insertion_order() {
        let store = MemoryStore::new();
        for n in ["+1", "+2", "+3"] {
            store
                .create("Numbers", fields(json!({"Phone Number": n})))
                .await
                .unwrap();
        }

        let all = store.find("Numbers", &|_| true).await.unwrap();
        let values: Vec<_> = all
            .iter()
            .filter_map(|r| r.str_field(&["Phone Number"]))
            .collect();
        assert_eq!(values, vec!["+1", "+2", "+3"]);
    }

    #[tokio::test]
    async fn test_update_merges_and_null_clears() {
        let store = MemoryStore::new();
        let created = store
            .create(
                "Clients",
                fields(json!({"Phone Number": "+15550001111", "twilio-number": "+15550002222"})),
            )
            .await
            .unwrap();

        let updated = store
            .update(
                "Clients",
                &created.id,
                fields(json!({"Name": "Jo", "twilio-number": null})),
            )
            .await
            .unwrap();

        assert_eq!(updated.str_field(&["Name"]), Some("Jo"));
        assert_eq!(updated.str_field(&["Phone Number"]), Some("+15550001111"));
        assert!(!updated.has_field(&["twilio-number"]));
    }
}
