//! Database row types — these map directly to SQLite rows.
//! Distinct from the agora-types API models to keep the DB layer independent.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};

use agora_types::models::MessageRecord;

use crate::error::StoreError;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub fname: String,
    pub lname: String,
}

/// A message row joined with both participants' display identity.
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: String,
    pub read_at: Option<String>,
    pub sender_email: String,
    pub sender_fname: String,
    pub sender_lname: String,
    pub receiver_email: String,
    pub receiver_fname: String,
    pub receiver_lname: String,
}

/// The columns needed to authorize read and delete transitions.
pub struct MessageMetaRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub read_at: Option<String>,
}

impl MessageRow {
    pub fn into_record(self) -> Result<MessageRecord, StoreError> {
        let read_at = match self.read_at {
            Some(raw) => Some(parse_ts(&raw)?),
            None => None,
        };

        Ok(MessageRecord {
            message_id: parse_uuid(&self.id)?,
            sender_id: parse_uuid(&self.sender_id)?,
            receiver_id: parse_uuid(&self.receiver_id)?,
            content: self.content,
            created_at: parse_ts(&self.created_at)?,
            read_at,
            sender_email: self.sender_email,
            receiver_email: self.receiver_email,
            sender_name: format!("{} {}", self.sender_fname, self.sender_lname),
            receiver_name: format!("{} {}", self.receiver_fname, self.receiver_lname),
        })
    }
}

pub(crate) fn parse_uuid(raw: &str) -> Result<uuid::Uuid, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("bad uuid '{raw}': {e}")))
}

/// Timestamps are stored as fixed-width RFC 3339 so lexicographic ordering
/// in SQL matches chronological ordering.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Clamp to the stored precision so a timestamp handed back from an insert
/// equals the same timestamp read from its row.
pub(crate) fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond((now.nanosecond() / 1_000) * 1_000)
        .unwrap_or(now)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') carry no timezone.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{raw}': {e}")))
}
