//! Conversation and message storage
//!
//! Provides the conversation data model, the `ConversationStore` trait with
//! its in-memory and SQLite backends, and the REST endpoints for listing
//! conversations and submitting outbound messages.

pub mod handler;
pub mod sqlite;
pub mod store;
pub mod types;

pub use handler::{inbox_router, InboxState};
pub use sqlite::SqliteStore;
pub use store::{ConversationStore, MemoryStore};
pub use types::{Conversation, DeliveryStatus, Direction, MessageRecord, NewMessage};
