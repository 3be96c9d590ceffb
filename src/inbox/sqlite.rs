//! SQLite-backed conversation store
//!
//! Two tables: `conversations` keyed by the contact identifier, and
//! `messages` owned by their conversation. Name refinement and the
//! monotonic timestamp clamps are expressed in single SQL statements so
//! every trait operation stays atomic under the connection lock.

use crate::error::Result;
use crate::inbox::store::ConversationStore;
use crate::inbox::types::{Conversation, DeliveryStatus, Direction, MessageRecord, NewMessage};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQL schema for initialization
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    identifier TEXT PRIMARY KEY,
    name TEXT,
    last_activity INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_activity ON conversations(last_activity DESC);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL,
    provider_message_id TEXT,
    direction TEXT NOT NULL,
    body TEXT NOT NULL,
    status TEXT NOT NULL,
    timestamp INTEGER NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(identifier) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_provider_id ON messages(provider_message_id);
"#;

/// Upsert for a conversation row. Last-activity only ever advances, and
/// a name hint lands only when the stored name is NULL or still the bare
/// identifier.
const UPSERT_CONVERSATION: &str = "INSERT INTO conversations (identifier, name, last_activity)
     VALUES (?1, ?2, ?3)
     ON CONFLICT(identifier) DO UPDATE SET
         last_activity = MAX(last_activity, excluded.last_activity),
         name = CASE
             WHEN excluded.name IS NOT NULL AND (name IS NULL OR name = identifier)
             THEN excluded.name
             ELSE name
         END";

/// Durable conversation store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn messages_for(conn: &Connection, identifier: &str) -> Result<Vec<MessageRecord>> {
        let mut stmt = conn.prepare(
            "SELECT provider_message_id, direction, body, status, timestamp
             FROM messages WHERE conversation_id = ?1 ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![identifier], row_to_message)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        provider_id: row.get(0)?,
        direction: parse_direction(&row.get::<_, String>(1)?),
        body: row.get(2)?,
        status: DeliveryStatus::from(row.get::<_, String>(3)?),
        timestamp: row.get(4)?,
    })
}

fn parse_direction(s: &str) -> Direction {
    s.parse().unwrap_or(Direction::System)
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn ensure_conversation(
        &self,
        identifier: &str,
        name_hint: Option<&str>,
        timestamp: i64,
    ) -> Result<Conversation> {
        let conn = self.conn.lock().unwrap();
        conn.execute(UPSERT_CONVERSATION, params![identifier, name_hint, timestamp])?;

        let conversation = conn.query_row(
            "SELECT identifier, name, last_activity FROM conversations WHERE identifier = ?1",
            params![identifier],
            |row| {
                Ok(Conversation {
                    identifier: row.get(0)?,
                    name: row.get(1)?,
                    last_activity: row.get(2)?,
                    messages: Vec::new(),
                })
            },
        )?;

        Ok(conversation)
    }

    async fn append_message(&self, identifier: &str, message: NewMessage) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            UPSERT_CONVERSATION,
            params![identifier, Option::<String>::None, message.timestamp],
        )?;
        conn.execute(
            "INSERT INTO messages (conversation_id, provider_message_id, direction, body, status, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                identifier,
                message.provider_id,
                message.direction.to_string(),
                message.body,
                message.status.as_str(),
                message.timestamp,
            ],
        )?;

        Ok(())
    }

    async fn update_message_status(
        &self,
        provider_id: &str,
        status: DeliveryStatus,
        timestamp: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE messages SET status = ?1, timestamp = MAX(timestamp, ?2)
             WHERE provider_message_id = ?3",
            params![status.as_str(), timestamp, provider_id],
        )?;

        if updated == 0 {
            tracing::debug!("Status update for unknown message {}", provider_id);
        }
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT identifier, name, last_activity FROM conversations
             ORDER BY last_activity DESC, identifier ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Conversation {
                identifier: row.get(0)?,
                name: row.get(1)?,
                last_activity: row.get(2)?,
                messages: Vec::new(),
            })
        })?;

        let mut conversations = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        for conversation in &mut conversations {
            conversation.messages = Self::messages_for(&conn, &conversation.identifier)?;
        }

        Ok(conversations)
    }

    async fn get_conversation(&self, identifier: &str) -> Result<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let conversation = conn
            .query_row(
                "SELECT identifier, name, last_activity FROM conversations WHERE identifier = ?1",
                params![identifier],
                |row| {
                    Ok(Conversation {
                        identifier: row.get(0)?,
                        name: row.get(1)?,
                        last_activity: row.get(2)?,
                        messages: Vec::new(),
                    })
                },
            )
            .optional()?;

        match conversation {
            Some(mut conversation) => {
                conversation.messages = Self::messages_for(&conn, &conversation.identifier)?;
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }
}
