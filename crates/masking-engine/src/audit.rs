//! Best-effort audit trail.

use crate::types::{record_fields, AUDIT_TABLE};
use chrono::Utc;
use record_store::RecordStore;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Event types written to the audit log.
pub mod events {
    pub const POOL_EXHAUSTED: &str = "POOL_EXHAUSTED";
    pub const NUMBER_DEALLOCATED: &str = "NUMBER_DEALLOCATED";
    pub const NUMBER_ROTATION: &str = "NUMBER_ROTATION";
    pub const FORWARD_ERROR: &str = "FORWARD_ERROR";
}

/// Append-only sink for system events.
///
/// Audit writes never fail the primary flow: a store error is reduced to a
/// warn-level log line and dropped.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn RecordStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Record an event, swallowing any storage failure.
    pub async fn record(&self, event: &str, description: &str, details: &str) {
        let fields = record_fields(json!({
            "Event": event,
            "Description": description,
            "Details": details,
            "Timestamp": Utc::now().to_rfc3339(),
        }));

        if let Err(e) = self.store.create(AUDIT_TABLE, fields).await {
            warn!("Audit write failed ({}): {}", event, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use record_store::{Fields, MemoryStore, Predicate, Record, RecordStoreError};

    /// Store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl RecordStore for BrokenStore {
        async fn find(
            &self,
            _table: &str,
            _predicate: Predicate<'_>,
        ) -> Result<Vec<Record>, RecordStoreError> {
            Err(RecordStoreError::Backend("down".into()))
        }

        async fn get(&self, table: &str, id: &str) -> Result<Record, RecordStoreError> {
            Err(RecordStoreError::RecordNotFound {
                table: table.into(),
                id: id.into(),
            })
        }

        async fn create(&self, _table: &str, _fields: Fields) -> Result<Record, RecordStoreError> {
            Err(RecordStoreError::Backend("down".into()))
        }

        async fn update(
            &self,
            _table: &str,
            _id: &str,
            _fields: Fields,
        ) -> Result<Record, RecordStoreError> {
            Err(RecordStoreError::Backend("down".into()))
        }
    }

    #[tokio::test]
    async fn test_record_writes_event() {
        let store = Arc::new(MemoryStore::new());
        let audit = AuditLog::new(store.clone());

        audit
            .record(events::NUMBER_ROTATION, "rotated", "details")
            .await;

        let rows = store.find(AUDIT_TABLE, &|_| true).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].str_field(&["Event"]),
            Some(events::NUMBER_ROTATION)
        );
    }

    #[tokio::test]
    async fn test_record_swallows_store_failure() {
        let audit = AuditLog::new(Arc::new(BrokenStore));

        // Must return normally; the failure is only logged.
        audit.record(events::POOL_EXHAUSTED, "pool empty", "").await;
    }
}
