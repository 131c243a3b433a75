pub mod error;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use agora_types::models::{MessageRecord, ReadReceipt, User};

/// Durable persistence operations for the messaging layer.
///
/// Authorization rules that are data invariants (receiver-only read
/// transition, sender-only delete) are enforced here, not in the gateway.
/// Only plain identifiers and records cross this boundary, so the gateway
/// can be driven against [`MemoryStore`] in tests.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Resolve the recipient by email and persist a new message.
    /// The record is durably written before any live push is attempted.
    async fn send_message(
        &self,
        sender_id: Uuid,
        receiver_email: &str,
        content: &str,
    ) -> Result<MessageRecord, StoreError>;

    /// Messages the user sent or received, newest first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// The conversation between the user and a peer, oldest first.
    async fn list_conversation(
        &self,
        user_id: Uuid,
        other_user_email: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// Set `read_at` if unset. Only the receiver may do this; re-reading an
    /// already-read message returns the existing timestamp.
    async fn mark_as_read(
        &self,
        message_id: Uuid,
        acting_user: Uuid,
    ) -> Result<ReadReceipt, StoreError>;

    /// Count of messages addressed to the user with no read timestamp.
    async fn unread_count(&self, user_id: Uuid) -> Result<i64, StoreError>;

    /// Permanently remove a message. Only the sender may do this.
    async fn delete(&self, message_id: Uuid, acting_user: Uuid) -> Result<(), StoreError>;

    /// Recipient resolution by email.
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Display-identity lookup.
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }
}
