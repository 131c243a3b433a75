use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use agora_types::models::{MessageRecord, ReadReceipt, User};

use crate::error::StoreError;
use crate::MessageStore;

/// In-memory [`MessageStore`] with the same semantics as [`crate::SqliteStore`].
/// Backs gateway tests; nothing here survives the process.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    messages: Vec<StoredMessage>,
    seq: u64,
}

#[derive(Clone)]
struct StoredMessage {
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
    // Tie-breaker when two messages land on the same timestamp.
    seq: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.users.push(user);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Inner {
    fn user_by_id(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }

    fn record(&self, msg: &StoredMessage) -> Result<MessageRecord, StoreError> {
        let sender = self
            .user_by_id(msg.sender_id)
            .ok_or_else(|| StoreError::Corrupt(format!("sender {} missing", msg.sender_id)))?;
        let receiver = self
            .user_by_id(msg.receiver_id)
            .ok_or_else(|| StoreError::Corrupt(format!("receiver {} missing", msg.receiver_id)))?;

        Ok(MessageRecord {
            message_id: msg.id,
            sender_id: msg.sender_id,
            receiver_id: msg.receiver_id,
            content: msg.content.clone(),
            created_at: msg.created_at,
            read_at: msg.read_at,
            sender_email: sender.email.clone(),
            receiver_email: receiver.email.clone(),
            sender_name: sender.display_name(),
            receiver_name: receiver.display_name(),
        })
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn send_message(
        &self,
        sender_id: Uuid,
        receiver_email: &str,
        content: &str,
    ) -> Result<MessageRecord, StoreError> {
        let mut inner = self.lock()?;

        inner
            .user_by_id(sender_id)
            .ok_or_else(|| StoreError::NotFound(format!("sender {sender_id} not found")))?;
        let receiver_id = inner
            .user_by_email(receiver_email)
            .ok_or_else(|| {
                StoreError::NotFound(format!("receiver with email {receiver_email} not found"))
            })?
            .id;

        if receiver_id == sender_id {
            return Err(StoreError::Invalid(
                "cannot send a message to yourself".into(),
            ));
        }

        inner.seq += 1;
        let msg = StoredMessage {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            content: content.to_string(),
            created_at: Utc::now(),
            read_at: None,
            seq: inner.seq,
        };
        let record = inner.record(&msg)?;
        inner.messages.push(msg);
        Ok(record)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let inner = self.lock()?;
        let mut matched: Vec<&StoredMessage> = inner
            .messages
            .iter()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .collect();
        matched.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));
        matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|m| inner.record(m))
            .collect()
    }

    async fn list_conversation(
        &self,
        user_id: Uuid,
        other_user_email: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let inner = self.lock()?;
        let other_id = inner
            .user_by_email(other_user_email)
            .ok_or_else(|| {
                StoreError::NotFound(format!("user with email {other_user_email} not found"))
            })?
            .id;

        let mut matched: Vec<&StoredMessage> = inner
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == user_id && m.receiver_id == other_id)
                    || (m.sender_id == other_id && m.receiver_id == user_id)
            })
            .collect();
        matched.sort_by(|a, b| (a.created_at, a.seq).cmp(&(b.created_at, b.seq)));
        matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|m| inner.record(m))
            .collect()
    }

    async fn mark_as_read(
        &self,
        message_id: Uuid,
        acting_user: Uuid,
    ) -> Result<ReadReceipt, StoreError> {
        let mut inner = self.lock()?;
        let msg = inner
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| StoreError::NotFound("message not found".into()))?;

        if msg.receiver_id != acting_user {
            return Err(StoreError::Forbidden(
                "only the receiver can mark a message as read".into(),
            ));
        }

        let read_at = match msg.read_at {
            Some(existing) => existing,
            None => {
                let now = Utc::now();
                msg.read_at = Some(now);
                now
            }
        };

        Ok(ReadReceipt {
            message_id,
            sender_id: msg.sender_id,
            read_at,
        })
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.receiver_id == user_id && m.read_at.is_none())
            .count() as i64)
    }

    async fn delete(&self, message_id: Uuid, acting_user: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let idx = inner
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| StoreError::NotFound("message not found".into()))?;

        if inner.messages[idx].sender_id != acting_user {
            return Err(StoreError::Forbidden(
                "only the sender can delete a message".into(),
            ));
        }

        inner.messages.remove(idx);
        Ok(())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.user_by_email(email).cloned())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.user_by_id(id).cloned())
    }
}
