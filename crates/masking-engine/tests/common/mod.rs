//! Shared fixtures for integration tests.

use async_trait::async_trait;
use masking_engine::*;
use record_store::{Fields, MemoryStore, RecordStore};
use serde_json::{json, Value};
use sms_client::{SmsError, SmsTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub from: String,
    pub to: String,
    pub body: String,
}

/// Recording transport double. Flip `fail` to simulate provider outages.
#[derive(Default)]
pub struct MockTransport {
    pub sent: Mutex<Vec<SentSms>>,
    pub fail: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<SentSms> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl SmsTransport for MockTransport {
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<String, SmsError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SmsError::SendFailed("provider unavailable".into()));
        }
        self.sent.lock().await.push(SentSms {
            from: from.into(),
            to: to.into(),
            body: body.into(),
        });
        Ok(format!("SM{:04}", self.sent.lock().await.len()))
    }
}

pub async fn seed_sitter(
    store: &MemoryStore,
    name: &str,
    real_number: &str,
    entry_point: &str,
) -> String {
    store
        .create(
            SITTERS_TABLE,
            fields(json!({
                "Full Name": name,
                "Phone Number": real_number,
                "Twilio Number": entry_point,
            })),
        )
        .await
        .unwrap()
        .id
}

pub async fn seed_pool_number(store: &MemoryStore, value: &str) -> String {
    store
        .create(
            INVENTORY_TABLE,
            fields(json!({
                "Phone Number": value,
                "Status": "Ready",
                "Type": "Pool",
            })),
        )
        .await
        .unwrap()
        .id
}

pub async fn seed_named_client(store: &MemoryStore, name: &str, phone: &str) -> String {
    store
        .create(
            CLIENTS_TABLE,
            fields(json!({
                "Name": name,
                "Phone Number": phone,
            })),
        )
        .await
        .unwrap()
        .id
}

pub fn sms(from: &str, to: &str, body: &str) -> InboundSms {
    InboundSms {
        from: from.into(),
        to: to.into(),
        body: body.into(),
    }
}

pub fn engine(
    store: &Arc<MemoryStore>,
    transport: &Arc<MockTransport>,
    config: &MaskingConfig,
) -> RoutingEngine {
    let store: Arc<dyn RecordStore> = store.clone();
    let transport: Arc<dyn SmsTransport> = transport.clone();
    RoutingEngine::new(store, transport, config)
}
