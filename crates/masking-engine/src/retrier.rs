//! Delivery fallback retrier.
//!
//! Re-attempts sends stuck in `Pending`. Best-effort at-least-once: a
//! duplicate delivery is an accepted tradeoff for never losing a message.

use crate::config::MaskingConfig;
use crate::messages::MessageLog;
use crate::types::{DeliveryStatus, MessageRecord};
use record_store::RecordStore;
use sms_client::SmsTransport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub struct FallbackRetrier {
    messages: MessageLog,
    transport: Arc<dyn SmsTransport>,
    retry_age: Duration,
    interval: Duration,
}

impl FallbackRetrier {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transport: Arc<dyn SmsTransport>,
        config: &MaskingConfig,
    ) -> Self {
        Self {
            messages: MessageLog::new(store),
            transport,
            retry_age: config.retry_age,
            interval: config.retry_interval,
        }
    }

    /// Run a single retry pass. Returns the number of re-sent messages.
    pub async fn retry_once(&self) -> usize {
        let pending = match self.messages.pending_older_than(self.retry_age).await {
            Ok(pending) => pending,
            Err(e) => {
                error!("Retry query failed: {}", e);
                return 0;
            }
        };

        if pending.is_empty() {
            debug!("No pending messages due for retry");
            return 0;
        }

        info!("Found {} pending message(s) for retry", pending.len());

        let mut resent = 0;
        for record in pending {
            if self.retry_message(&record).await {
                resent += 1;
            }
        }
        resent
    }

    /// Re-send one message exactly as persisted, no re-transformation.
    async fn retry_message(&self, record: &MessageRecord) -> bool {
        let (from, to, body) = match (&record.from, &record.to, &record.body) {
            (Some(from), Some(to), Some(body)) => (from, to, body),
            _ => {
                error!("Cannot retry message {}: missing fields", record.id);
                self.set_status_logged(&record.id, DeliveryStatus::RetryAborted)
                    .await;
                return false;
            }
        };

        match self.transport.send(from, to, body).await {
            Ok(_) => {
                self.set_status_logged(&record.id, DeliveryStatus::SentViaFallback)
                    .await;
                info!("Message {} re-sent via fallback", record.id);
                true
            }
            Err(e) => {
                error!("Fallback retry failed for message {}: {}", record.id, e);
                // Terminal status so a persistent failure cannot loop forever.
                self.set_status_logged(&record.id, DeliveryStatus::RetryError)
                    .await;
                false
            }
        }
    }

    async fn set_status_logged(&self, message_id: &str, status: DeliveryStatus) {
        if let Err(e) = self.messages.set_status(message_id, status).await {
            error!("Failed to update message {}: {}", message_id, e);
        }
    }

    /// Run the retrier as a long-lived loop.
    pub async fn run(&self) {
        info!(
            "Fallback retrier started (age threshold: {:?}, interval: {:?})",
            self.retry_age, self.interval
        );

        loop {
            self.retry_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Spawn the retrier as a background task.
pub fn spawn_retrier(
    store: Arc<dyn RecordStore>,
    transport: Arc<dyn SmsTransport>,
    config: &MaskingConfig,
) -> tokio::task::JoinHandle<()> {
    let retrier = FallbackRetrier::new(store, transport, config);

    tokio::spawn(async move {
        retrier.run().await;
    })
}
