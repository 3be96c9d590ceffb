//! Reconciliation engine
//!
//! Translates webhook deliveries into conversation store operations.
//! Inbound messages become stored records with name refinement; status
//! callbacks update the referenced message by provider id and keep the
//! recipient's conversation alive even when the message itself was never
//! recorded locally. Items are processed independently: one malformed
//! item or store fault skips that item, never the delivery.

use crate::error::Result;
use crate::inbox::store::ConversationStore;
use crate::inbox::types::{DeliveryStatus, NewMessage};
use crate::webhook::event::{self, InboundMessage, StatusEvent};
use serde_json::Value;
use std::sync::Arc;

/// Outcome counts for one processed delivery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Inbound messages stored
    pub messages: usize,
    /// Status callbacks applied
    pub statuses: usize,
    /// Items dropped for missing fields or store faults
    pub skipped: usize,
}

/// Applies webhook payloads to the conversation store
pub struct Reconciler {
    store: Arc<dyn ConversationStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Apply one webhook delivery.
    ///
    /// Problems are logged and counted, never returned: the webhook
    /// boundary acknowledges every delivery it receives.
    pub async fn apply(&self, payload: &Value) -> BatchSummary {
        let mut summary = BatchSummary::default();

        if !event::is_whatsapp_payload(payload) {
            tracing::warn!("Ignoring webhook delivery with unrecognized object discriminator");
            summary.skipped += 1;
            return summary;
        }

        for value in event::change_values(payload) {
            let contacts = event::items(value, "contacts");

            for item in event::items(value, "messages") {
                match event::parse_message(item, contacts) {
                    Some(message) => match self.store_message(&message).await {
                        Ok(()) => summary.messages += 1,
                        Err(e) => {
                            tracing::warn!(
                                "Failed to store message from {}: {}",
                                message.from,
                                e
                            );
                            summary.skipped += 1;
                        }
                    },
                    None => {
                        tracing::warn!("Skipping message item without a sender");
                        summary.skipped += 1;
                    }
                }
            }

            for item in event::items(value, "statuses") {
                match event::parse_status(item) {
                    Some(status) => match self.apply_status(&status).await {
                        Ok(()) => summary.statuses += 1,
                        Err(e) => {
                            tracing::warn!(
                                "Failed to apply status for {}: {}",
                                status.provider_id,
                                e
                            );
                            summary.skipped += 1;
                        }
                    },
                    None => {
                        tracing::warn!("Skipping status item without id or label");
                        summary.skipped += 1;
                    }
                }
            }
        }

        tracing::debug!(
            "Webhook delivery reconciled: {} messages, {} statuses, {} skipped",
            summary.messages,
            summary.statuses,
            summary.skipped
        );
        summary
    }

    async fn store_message(&self, message: &InboundMessage) -> Result<()> {
        self.store
            .ensure_conversation(
                &message.from,
                message.sender_name.as_deref(),
                message.timestamp,
            )
            .await?;
        self.store
            .append_message(
                &message.from,
                NewMessage::inbound(
                    message.provider_id.clone(),
                    message.body.clone(),
                    message.timestamp,
                ),
            )
            .await
    }

    /// Status callbacks may reference messages we never stored (sends
    /// from another client of the same number), so the update itself is
    /// allowed to miss. The recipient's conversation is still touched so
    /// outbound traffic shows up in the inbox.
    async fn apply_status(&self, status: &StatusEvent) -> Result<()> {
        let delivery = DeliveryStatus::from(status.status.as_str());
        self.store
            .update_message_status(&status.provider_id, delivery.clone(), status.timestamp)
            .await?;

        match &status.recipient_id {
            Some(recipient) => {
                self.store
                    .ensure_conversation(recipient, None, status.timestamp)
                    .await?;

                if delivery == DeliveryStatus::Failed {
                    if status.no_account {
                        self.store
                            .append_message(
                                recipient,
                                NewMessage::system(
                                    undeliverable_notice(recipient),
                                    status.timestamp,
                                ),
                            )
                            .await?;
                    } else {
                        tracing::warn!(
                            "Delivery of {} to {} failed",
                            status.provider_id,
                            recipient
                        );
                    }
                }
            }
            None => {
                if delivery == DeliveryStatus::Failed {
                    tracing::warn!(
                        "Delivery of {} failed (callback carries no recipient)",
                        status.provider_id
                    );
                }
            }
        }

        Ok(())
    }
}

/// Body of the synthetic record appended when the provider reports the
/// recipient has no WhatsApp account
fn undeliverable_notice(recipient: &str) -> String {
    format!(
        "Message to {} could not be delivered: the recipient has no WhatsApp account.",
        recipient
    )
}
