use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use agora_types::models::{MessageRecord, ReadReceipt, User};

use crate::error::StoreError;
use crate::models::{MessageRow, UserRow, format_ts, now_micros, parse_ts, parse_uuid};
use crate::{Database, MessageStore};

/// SQLite-backed [`MessageStore`]. rusqlite is blocking, so every operation
/// runs the query on the blocking pool — a slow query stalls only the
/// calling connection's task.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(Database::open(path)?)))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(Database::open_in_memory()?)))
    }

    /// Seed a user row. Tests and tooling only; account management is the
    /// marketplace application's job.
    pub fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.db.create_user(user)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn send_message(
        &self,
        sender_id: Uuid,
        receiver_email: &str,
        content: &str,
    ) -> Result<MessageRecord, StoreError> {
        let db = self.db.clone();
        let receiver_email = receiver_email.to_string();
        let content = content.to_string();

        tokio::task::spawn_blocking(move || {
            let sender = db
                .user_by_id(&sender_id.to_string())?
                .ok_or_else(|| StoreError::NotFound(format!("sender {sender_id} not found")))?;
            let receiver = db.user_by_email(&receiver_email)?.ok_or_else(|| {
                StoreError::NotFound(format!("receiver with email {receiver_email} not found"))
            })?;

            if receiver.id == sender.id {
                return Err(StoreError::Invalid(
                    "cannot send a message to yourself".into(),
                ));
            }

            let message_id = Uuid::new_v4();
            let created_at = now_micros();
            db.insert_message(
                &message_id.to_string(),
                &sender.id,
                &receiver.id,
                &content,
                &format_ts(created_at),
            )?;

            let receiver_id = parse_uuid(&receiver.id)?;
            let sender_name = display_name(&sender);
            let receiver_name = display_name(&receiver);
            Ok(MessageRecord {
                message_id,
                sender_id,
                receiver_id,
                content,
                created_at,
                read_at: None,
                sender_email: sender.email,
                receiver_email: receiver.email,
                sender_name,
                receiver_name,
            })
        })
        .await?
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let rows = db.messages_for_user(&user_id.to_string(), limit, offset)?;
            into_records(rows)
        })
        .await?
    }

    async fn list_conversation(
        &self,
        user_id: Uuid,
        other_user_email: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let db = self.db.clone();
        let other_user_email = other_user_email.to_string();
        tokio::task::spawn_blocking(move || {
            let other = db.user_by_email(&other_user_email)?.ok_or_else(|| {
                StoreError::NotFound(format!("user with email {other_user_email} not found"))
            })?;
            let rows = db.conversation(&user_id.to_string(), &other.id, limit, offset)?;
            into_records(rows)
        })
        .await?
    }

    async fn mark_as_read(
        &self,
        message_id: Uuid,
        acting_user: Uuid,
    ) -> Result<ReadReceipt, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let meta = db
                .message_meta(&message_id.to_string())?
                .ok_or_else(|| StoreError::NotFound("message not found".into()))?;

            if meta.receiver_id != acting_user.to_string() {
                return Err(StoreError::Forbidden(
                    "only the receiver can mark a message as read".into(),
                ));
            }

            let sender_id = parse_uuid(&meta.sender_id)?;

            // Already read: return the existing timestamp, not an error.
            if let Some(existing) = meta.read_at {
                return Ok(ReadReceipt {
                    message_id,
                    sender_id,
                    read_at: parse_ts(&existing)?,
                });
            }

            let read_at = now_micros();
            db.set_read_at(&meta.id, &format_ts(read_at))?;
            Ok(ReadReceipt {
                message_id,
                sender_id,
                read_at,
            })
        })
        .await?
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.unread_count(&user_id.to_string())).await?
    }

    async fn delete(&self, message_id: Uuid, acting_user: Uuid) -> Result<(), StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let meta = db
                .message_meta(&message_id.to_string())?
                .ok_or_else(|| StoreError::NotFound("message not found".into()))?;

            if meta.sender_id != acting_user.to_string() {
                return Err(StoreError::Forbidden(
                    "only the sender can delete a message".into(),
                ));
            }

            db.delete_message(&meta.id)
        })
        .await?
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let db = self.db.clone();
        let email = email.to_string();
        tokio::task::spawn_blocking(move || db.user_by_email(&email)?.map(into_user).transpose())
            .await?
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            db.user_by_id(&id.to_string())?.map(into_user).transpose()
        })
        .await?
    }
}

fn display_name(row: &UserRow) -> String {
    format!("{} {}", row.fname, row.lname)
}

fn into_user(row: UserRow) -> Result<User, StoreError> {
    Ok(User {
        id: parse_uuid(&row.id)?,
        email: row.email,
        fname: row.fname,
        lname: row.lname,
    })
}

fn into_records(rows: Vec<MessageRow>) -> Result<Vec<MessageRecord>, StoreError> {
    rows.into_iter().map(MessageRow::into_record).collect()
}
