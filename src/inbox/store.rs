//! Conversation store trait and in-memory backend
//!
//! The store is the single seam between the reconciliation engine, the
//! outbound dispatcher, and the management API. Both backends guarantee
//! that each operation is atomic with respect to concurrent callers.

use crate::error::Result;
use crate::inbox::types::{Conversation, DeliveryStatus, MessageRecord, NewMessage};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage interface for conversations and their messages
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Return the conversation for `identifier`, creating it if absent.
    ///
    /// A name hint fills the stored name only when it is absent or still
    /// equal to the bare identifier; a name that was set from a real
    /// display name is never overwritten. Last-activity advances to
    /// `max(current, timestamp)`. The returned snapshot carries no
    /// message history.
    async fn ensure_conversation(
        &self,
        identifier: &str,
        name_hint: Option<&str>,
        timestamp: i64,
    ) -> Result<Conversation>;

    /// Append a message to the conversation's history, creating the
    /// conversation if needed, and advance its last-activity to
    /// `max(current, message.timestamp)`.
    async fn append_message(&self, identifier: &str, message: NewMessage) -> Result<()>;

    /// Set the status of the message carrying `provider_id`, advancing
    /// its timestamp to `max(current, timestamp)`. A miss is a no-op,
    /// not an error: status callbacks may reference messages that were
    /// never recorded locally.
    async fn update_message_status(
        &self,
        provider_id: &str,
        status: DeliveryStatus,
        timestamp: i64,
    ) -> Result<()>;

    /// All conversations, most recently active first (identifier breaks
    /// ties), each with its messages oldest first.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// One conversation with its ordered messages, or `None`.
    async fn get_conversation(&self, identifier: &str) -> Result<Option<Conversation>>;
}

/// Volatile conversation store; state is lost on restart
pub struct MemoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn blank_conversation(identifier: &str, timestamp: i64) -> Conversation {
    Conversation {
        identifier: identifier.to_string(),
        name: None,
        last_activity: timestamp,
        messages: Vec::new(),
    }
}

/// Messages sort by timestamp; the sort is stable, so records appended
/// with equal timestamps keep their insertion order.
fn sort_messages(conversation: &mut Conversation) {
    conversation.messages.sort_by_key(|m| m.timestamp);
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn ensure_conversation(
        &self,
        identifier: &str,
        name_hint: Option<&str>,
        timestamp: i64,
    ) -> Result<Conversation> {
        let mut conversations = self.conversations.write().await;
        let entry = conversations
            .entry(identifier.to_string())
            .or_insert_with(|| blank_conversation(identifier, timestamp));

        entry.last_activity = entry.last_activity.max(timestamp);
        if let Some(hint) = name_hint {
            let placeholder = match &entry.name {
                None => true,
                Some(current) => current == identifier,
            };
            if placeholder {
                entry.name = Some(hint.to_string());
            }
        }

        Ok(Conversation {
            messages: Vec::new(),
            ..entry.clone()
        })
    }

    async fn append_message(&self, identifier: &str, message: NewMessage) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        let entry = conversations
            .entry(identifier.to_string())
            .or_insert_with(|| blank_conversation(identifier, message.timestamp));

        entry.last_activity = entry.last_activity.max(message.timestamp);
        entry.messages.push(MessageRecord {
            provider_id: message.provider_id,
            direction: message.direction,
            body: message.body,
            status: message.status,
            timestamp: message.timestamp,
        });

        Ok(())
    }

    async fn update_message_status(
        &self,
        provider_id: &str,
        status: DeliveryStatus,
        timestamp: i64,
    ) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        for conversation in conversations.values_mut() {
            if let Some(message) = conversation
                .messages
                .iter_mut()
                .find(|m| m.provider_id.as_deref() == Some(provider_id))
            {
                message.status = status;
                message.timestamp = message.timestamp.max(timestamp);
                return Ok(());
            }
        }

        tracing::debug!("Status update for unknown message {}", provider_id);
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conversations = self.conversations.read().await;
        let mut all: Vec<Conversation> = conversations.values().cloned().collect();
        for conversation in &mut all {
            sort_messages(conversation);
        }
        all.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        Ok(all)
    }

    async fn get_conversation(&self, identifier: &str) -> Result<Option<Conversation>> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(identifier).map(|c| {
            let mut conversation = c.clone();
            sort_messages(&mut conversation);
            conversation
        }))
    }
}
