use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display identity of an account, as referenced by the messaging layer.
/// Account lifecycle (registration, profile edits) lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub fname: String,
    pub lname: String,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.fname, self.lname)
    }
}

/// A persisted message enriched with both participants' display identity.
/// This is the shape that crosses the store boundary and goes over the wire
/// in `message_received` / `message_sent` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub sender_email: String,
    pub receiver_email: String,
    pub sender_name: String,
    pub receiver_name: String,
}

/// Outcome of a read transition. `sender_id` routes the receipt back to the
/// message author; `read_at` is the (possibly pre-existing) read timestamp.
#[derive(Debug, Clone)]
pub struct ReadReceipt {
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub read_at: DateTime<Utc>,
}
