//! Outbound dispatcher for the Cloud API send endpoint
//!
//! Validates the request, submits the text message with bearer auth, and
//! records the accepted message in the conversation store under the
//! destination identifier. The provider confirms delivery later through
//! status callbacks on the webhook, which update the same record by its
//! provider-assigned id.

use crate::config::{resolve_credential, WhatsAppConfig};
use crate::error::{Error, Result};
use crate::inbox::store::ConversationStore;
use crate::inbox::types::{now_ts, NewMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of a successful send
#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    /// Provider-assigned message identifier; `None` when the provider's
    /// response carried none
    pub message_id: Option<String>,
}

/// Submits outbound text messages to the provider
pub struct Dispatcher {
    config: WhatsAppConfig,
    access_token: String,
    client: reqwest::Client,
    store: Arc<dyn ConversationStore>,
}

impl Dispatcher {
    /// Create a dispatcher. The bearer token is resolved from the
    /// environment variable named in the config, failing at startup
    /// rather than on the first send.
    pub fn new(config: WhatsAppConfig, store: Arc<dyn ConversationStore>) -> Result<Self> {
        let access_token = resolve_credential(&config.access_token_ref)?;
        Ok(Self {
            config,
            access_token,
            client: reqwest::Client::new(),
            store,
        })
    }

    fn send_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.api_base, self.config.api_version, self.config.phone_number_id
        )
    }

    /// Submit a text message and record it as sent.
    pub async fn send(&self, to: &str, body: &str) -> Result<SendReceipt> {
        if to.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "missing destination field: to".to_string(),
            ));
        }
        if body.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "missing message field: body".to_string(),
            ));
        }

        tracing::debug!("Sending message to {}", to);

        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": {"body": body},
        });

        let response = self
            .client
            .post(self.send_url())
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            tracing::warn!("Provider rejected send to {}: {} {}", to, status, text);
            return Err(Error::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        let message_id = extract_message_id(&text);
        if message_id.is_none() {
            tracing::warn!("Send to {} accepted but response carried no message id", to);
        }

        let timestamp = now_ts();
        self.store.ensure_conversation(to, None, timestamp).await?;
        self.store
            .append_message(to, NewMessage::outbound(message_id.clone(), body, timestamp))
            .await?;

        tracing::info!("Message to {} accepted by provider", to);
        Ok(SendReceipt { message_id })
    }
}

/// Success response from the send endpoint
#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SendResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct SendResponseMessage {
    id: String,
}

/// The id of the first accepted message, if the response has the
/// expected shape
fn extract_message_id(text: &str) -> Option<String> {
    serde_json::from_str::<SendResponse>(text)
        .ok()
        .and_then(|r| r.messages.into_iter().next())
        .map(|m| m.id)
}
