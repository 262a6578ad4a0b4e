//! The routing engine.
//!
//! One inbound SMS in, exactly one decision out: forward to the client,
//! forward to the sitter, ignore, or error. Message records are persisted
//! before every send so a failed delivery is recoverable by the fallback
//! retrier.

use crate::audit::{events, AuditLog};
use crate::config::MaskingConfig;
use crate::directory::PartyDirectory;
use crate::error::MaskingError;
use crate::format::{format_display_name, MarkerPolicy};
use crate::messages::MessageLog;
use crate::phone;
use crate::pool::NumberPool;
use crate::types::*;
use record_store::RecordStore;
use sms_client::SmsTransport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub struct RoutingEngine {
    directory: PartyDirectory,
    pool: NumberPool,
    messages: MessageLog,
    transport: Arc<dyn SmsTransport>,
    audit: AuditLog,
    pool_tag: String,
    marker: MarkerPolicy,
    /// Serializes the allocation path per client so a rapid double-text
    /// from a brand-new client cannot draw two Ready numbers.
    client_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RoutingEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transport: Arc<dyn SmsTransport>,
        config: &MaskingConfig,
    ) -> Self {
        let audit = AuditLog::new(store.clone());
        Self {
            directory: PartyDirectory::new(store.clone()),
            pool: NumberPool::new(store.clone(), audit.clone()),
            messages: MessageLog::new(store),
            transport,
            audit,
            pool_tag: config.pool_tag.clone(),
            marker: config.marker,
            client_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Route one inbound SMS event.
    ///
    /// Priority order, first match wins: a sitter sending from their real
    /// number, a client texting a sitter's entry point, then nobody we
    /// know.
    #[instrument(skip(self, sms), fields(from = %sms.from, to = %sms.to))]
    pub async fn handle_inbound(&self, sms: &InboundSms) -> Result<RouteOutcome, MaskingError> {
        let from = phone::normalize(&sms.from);
        let to = phone::normalize(&sms.to);

        if let Some(sitter) = self.directory.find_sitter_by_real_number(&from).await? {
            debug!("Sender matched sitter {}", sitter.display_name);
            return self.forward_to_client(&sitter, &to, &sms.body).await;
        }

        if let Some(sitter) = self.directory.find_sitter_by_entry_point(&to).await? {
            debug!("Recipient matched entry point of {}", sitter.display_name);
            return self.forward_to_sitter(&sitter, &from, &to, &sms.body).await;
        }

        debug!("Neither side matched the sitter directory, ignoring");
        Ok(RouteOutcome::Ignored(IgnoreReason::UnknownParties))
    }

    /// Sitter replied; `to` is the masking number of one of their clients.
    /// The body is relayed unmodified from the sitter's entry point.
    async fn forward_to_client(
        &self,
        sitter: &Sitter,
        masking_number: &str,
        body: &str,
    ) -> Result<RouteOutcome, MaskingError> {
        let entry_point = sitter.entry_point.as_deref().ok_or_else(|| {
            MaskingError::DataIntegrity(format!("sitter {} has no entry-point number", sitter.id))
        })?;

        let client = match self
            .directory
            .find_client_by_masking_number(masking_number)
            .await?
        {
            Some(client) => client,
            None => {
                info!("No client holds {}, ignoring", masking_number);
                return Ok(RouteOutcome::Ignored(IgnoreReason::OrphanedMaskingNumber));
            }
        };

        let client_number = client.real_number.clone().ok_or_else(|| {
            MaskingError::DataIntegrity(format!("client {} has no phone number", client.id))
        })?;

        self.directory.touch_last_active(&client.id).await?;

        let correlation_id = Uuid::new_v4().to_string();
        let message = self
            .messages
            .create_pending(&correlation_id, entry_point, &client_number, body)
            .await?;

        match self.transport.send(entry_point, &client_number, body).await {
            Ok(delivery_id) => {
                self.messages
                    .set_status(&message.id, DeliveryStatus::Sent)
                    .await?;
                debug!("Forwarded to client {} ({})", client.id, delivery_id);
                Ok(RouteOutcome::ForwardedToClient { correlation_id })
            }
            Err(e) => {
                warn!("Send to client failed, message {} stays pending: {}", message.id, e);
                self.audit
                    .record(
                        events::FORWARD_ERROR,
                        &format!("Forward to client {} failed", client.id),
                        &e.to_string(),
                    )
                    .await;
                Err(MaskingError::ForwardToClientFailed(e))
            }
        }
    }

    /// Client texted a sitter's entry point. Allocates a masking number on
    /// first contact and relays from it to the sitter's real number.
    async fn forward_to_sitter(
        &self,
        sitter: &Sitter,
        client_number: &str,
        entry_point: &str,
        body: &str,
    ) -> Result<RouteOutcome, MaskingError> {
        let sitter_number = sitter.real_number.as_deref().ok_or_else(|| {
            MaskingError::DataIntegrity(format!("sitter {} has no real phone number", sitter.id))
        })?;

        // A sitter whose entry point is their own real number would bounce
        // every forward back into this webhook.
        if phone::same_number(sitter_number, entry_point) {
            warn!(
                "Entry point {} is sitter {}'s own number, suppressing forward",
                entry_point, sitter.id
            );
            return Ok(RouteOutcome::Ignored(IgnoreReason::SelfAddressedSitter));
        }

        let lock = self.client_lock(client_number).await;
        let _guard = lock.lock().await;

        let client = self.directory.ensure_client(client_number).await?;

        let (masking_number, new_assignment) = match client.masking_number.clone() {
            Some(value) => (value, false),
            None => {
                let drawn = match self.pool.next_ready(&self.pool_tag).await? {
                    Some(number) => number,
                    None => {
                        self.directory.increment_error_count(&client.id).await?;
                        self.audit
                            .record(
                                events::POOL_EXHAUSTED,
                                &format!("No Ready pool number for client {}", client.id),
                                "",
                            )
                            .await;
                        return Err(MaskingError::PoolExhausted);
                    }
                };
                self.pool.assign(&client, &drawn).await?;
                (drawn.value, true)
            }
        };

        self.directory
            .link_sitter(&client.id, &sitter.display_name)
            .await?;

        let outbound_body = if new_assignment {
            self.marker
                .apply(body, &format_display_name(&client.name))
        } else {
            body.to_string()
        };

        let correlation_id = Uuid::new_v4().to_string();
        let message = self
            .messages
            .create_pending(&correlation_id, &masking_number, sitter_number, &outbound_body)
            .await?;

        match self
            .transport
            .send(&masking_number, sitter_number, &outbound_body)
            .await
        {
            Ok(delivery_id) => {
                self.messages
                    .set_status(&message.id, DeliveryStatus::Sent)
                    .await?;
                debug!("Forwarded to sitter {} ({})", sitter.id, delivery_id);
                Ok(RouteOutcome::ForwardedToSitter {
                    correlation_id,
                    new_assignment,
                })
            }
            Err(e) => {
                warn!("Send to sitter failed, message {} stays pending: {}", message.id, e);
                if let Err(count_err) = self.directory.increment_error_count(&client.id).await {
                    warn!("Failed to bump error count for {}: {}", client.id, count_err);
                }
                self.audit
                    .record(
                        events::FORWARD_ERROR,
                        &format!("Forward to sitter {} failed", sitter.id),
                        &e.to_string(),
                    )
                    .await;
                Err(MaskingError::ForwardToSitterFailed(e))
            }
        }
    }

    async fn client_lock(&self, client_number: &str) -> Arc<Mutex<()>> {
        let mut locks = self.client_locks.lock().await;
        locks
            .entry(phone::digits(client_number))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
