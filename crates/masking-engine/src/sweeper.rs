//! Deallocation sweeper for idle masking-number assignments.
//!
//! Periodically releases numbers whose clients have gone quiet past the
//! inactivity TTL. Safe to re-run: released clients no longer carry a
//! masking number and drop out of the candidate query.

use crate::audit::{events, AuditLog};
use crate::config::MaskingConfig;
use crate::directory::PartyDirectory;
use crate::error::MaskingError;
use crate::pool::NumberPool;
use crate::types::Client;
use chrono::{DateTime, Utc};
use record_store::RecordStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub struct TtlSweeper {
    directory: PartyDirectory,
    pool: NumberPool,
    audit: AuditLog,
    ttl: Duration,
    interval: Duration,
}

impl TtlSweeper {
    pub fn new(store: Arc<dyn RecordStore>, config: &MaskingConfig) -> Self {
        let audit = AuditLog::new(store.clone());
        Self {
            directory: PartyDirectory::new(store.clone()),
            pool: NumberPool::new(store, audit.clone()),
            audit,
            ttl: config.inactivity_ttl,
            interval: config.sweep_interval,
        }
    }

    /// Run a single deallocation check. Returns the number of released
    /// assignments.
    pub async fn sweep_once(&self) -> usize {
        debug!("Running deallocation check");

        let clients = match self.directory.clients_with_masking_number().await {
            Ok(clients) => clients,
            Err(e) => {
                error!("Deallocation query failed: {}", e);
                return 0;
            }
        };

        if clients.is_empty() {
            debug!("No assigned clients found, skipping check");
            return 0;
        }

        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(14));
        let mut released = 0;

        for client in clients {
            match self.sweep_client(&client, now, ttl).await {
                Ok(true) => released += 1,
                Ok(false) => {}
                // One bad record must not stall the rest of the sweep.
                Err(e) => error!("Deallocation failed for client {}: {}", client.id, e),
            }
        }

        info!("Deallocation check complete, released {} number(s)", released);
        released
    }

    async fn sweep_client(
        &self,
        client: &Client,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Result<bool, MaskingError> {
        let masking_number = match &client.masking_number {
            Some(value) => value,
            None => return Ok(false),
        };

        // Never auto-expire a client that has no recorded activity.
        let last_active = match client.last_active {
            Some(timestamp) => timestamp,
            None => {
                debug!("Client {} has no activity timestamp, skipping", client.id);
                return Ok(false);
            }
        };

        let age = now.signed_duration_since(last_active);
        if age <= ttl {
            return Ok(false);
        }

        info!(
            "Client {} inactive for {} days, releasing {}",
            client.id,
            age.num_days(),
            masking_number
        );

        let number = match self.pool.find_by_number(masking_number).await? {
            Some(number) => number,
            None => {
                error!(
                    "No inventory record for {}, manual cleanup may be required",
                    masking_number
                );
                return Ok(false);
            }
        };

        self.pool.release(&client.id, &number.id).await?;
        self.audit
            .record(
                events::NUMBER_DEALLOCATED,
                &format!("Released {} from client {}", masking_number, client.id),
                &format!("Inactive {} days", age.num_days()),
            )
            .await;

        Ok(true)
    }

    /// Run the sweeper as a long-lived loop.
    pub async fn run(&self) {
        info!(
            "Deallocation sweeper started (ttl: {:?}, interval: {:?})",
            self.ttl, self.interval
        );

        loop {
            self.sweep_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Spawn the sweeper as a background task.
pub fn spawn_sweeper(
    store: Arc<dyn RecordStore>,
    config: &MaskingConfig,
) -> tokio::task::JoinHandle<()> {
    let sweeper = TtlSweeper::new(store, config);

    tokio::spawn(async move {
        sweeper.run().await;
    })
}
