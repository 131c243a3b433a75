use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessageRecord;

/// Events sent FROM client TO server over the messaging WebSocket.
///
/// Wire shape is `{"type": "...", "data": {...}}`. Malformed payloads fail
/// at parse time and are answered with a local `error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Send a message to another user, addressed by email.
    SendMessage {
        receiver_email: String,
        content: String,
    },

    /// Mark a received message as read.
    MarkRead { message_id: Uuid },

    /// Typing started in a conversation with the named receiver.
    /// The receiver id is optional: frames without one are dropped silently.
    TypingStart { receiver_id: Option<Uuid> },

    /// Typing stopped.
    TypingStop { receiver_id: Option<Uuid> },

    /// Ask for a fresh unread counter on this connection.
    GetUnreadCount {},
}

/// Events sent FROM server TO client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The receiver's unread counter changed (or was requested).
    UnreadCountUpdate { unread_count: i64 },

    /// A new message addressed to this user was persisted.
    MessageReceived(MessageRecord),

    /// Confirmation to the sender that their message was persisted.
    MessageSent(MessageRecord),

    /// The receiver read one of this user's messages.
    ReadReceipt {
        message_id: Uuid,
        read_at: DateTime<Utc>,
        reader_id: Uuid,
    },

    /// A peer started or stopped typing.
    TypingIndicator {
        user_id: Uuid,
        user_email: Option<String>,
        typing: bool,
    },

    /// A user came online or went offline.
    UserStatus {
        user_id: Uuid,
        status: PresenceStatus,
    },

    /// A per-event failure scoped to this connection.
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_decodes_from_wire_shape() {
        let raw = r#"{"type":"send_message","data":{"receiver_email":"b@example.com","content":"hi"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::SendMessage {
                receiver_email,
                content,
            } => {
                assert_eq!(receiver_email, "b@example.com");
                assert_eq!(content, "hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let raw = r#"{"type":"join_room","data":{"room":"general"}}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn mark_read_without_message_id_fails_to_parse() {
        let raw = r#"{"type":"mark_read","data":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn typing_start_tolerates_missing_receiver() {
        let raw = r#"{"type":"typing_start","data":{}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            event,
            ClientEvent::TypingStart { receiver_id: None }
        ));
    }

    #[test]
    fn get_unread_count_accepts_empty_data() {
        let raw = r#"{"type":"get_unread_count","data":{}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, ClientEvent::GetUnreadCount {}));
    }

    #[test]
    fn unread_update_encodes_to_wire_shape() {
        let json =
            serde_json::to_value(ServerEvent::UnreadCountUpdate { unread_count: 3 }).unwrap();
        assert_eq!(json["type"], "unread_count_update");
        assert_eq!(json["data"]["unread_count"], 3);
    }

    #[test]
    fn user_status_encodes_lowercase_status() {
        let json = serde_json::to_value(ServerEvent::UserStatus {
            user_id: Uuid::nil(),
            status: PresenceStatus::Offline,
        })
        .unwrap();
        assert_eq!(json["type"], "user_status");
        assert_eq!(json["data"]["status"], "offline");
    }
}
