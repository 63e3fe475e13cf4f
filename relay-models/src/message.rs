//! Message, reaction, and status types.
//!
//! Messages are owned by the reconciliation engine's per-chat store and are
//! mutated in place by server events matched on the message id. A deleted
//! message stays in the list with its content tombstoned so positions remain
//! stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_core::constants::DELETED_MESSAGE_PLACEHOLDER;

/// Kind of a message in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// A regular chat message.
    Chat,
    /// System notice: a member joined.
    Join,
    /// System notice: a member left.
    Leave,
    /// A message carrying an uploaded file.
    File,
}

impl MessageKind {
    /// Whether this is a system-generated membership notice.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::Join | Self::Leave)
    }
}

/// Delivery state of a message, from the sender's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Published locally, no server acknowledgement yet.
    Sending,
    /// Accepted by the server.
    #[default]
    Sent,
    /// Delivered to the recipient's client.
    Delivered,
    /// Read by the recipient.
    Read,
    /// The send failed; not retried automatically.
    Failed,
}

/// An aggregated reaction on a message.
///
/// The server sends the full aggregate per reaction type, so applying the
/// same update twice yields the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Reaction type identifier (e.g. "LIKE", "HEART").
    #[serde(rename = "type")]
    pub kind: String,
    /// Emoji rendered for this reaction type.
    #[serde(default)]
    pub emoji: String,
    /// Number of users who reacted with this type.
    #[serde(default)]
    pub count: u32,
    /// Whether the current user is among them.
    #[serde(default)]
    pub current_user_reacted: bool,
}

/// A message in a chat, as stored in the canonical per-chat list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id, unique per chat. Identity for de-duplication.
    pub id: i64,
    /// Id of the sending user.
    pub sender_id: i64,
    /// Display name of the sending user.
    #[serde(default)]
    pub sender_name: String,
    /// Message kind.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: MessageKind,
    /// Message body. Replaced by a tombstone marker on deletion.
    #[serde(default)]
    pub content: String,
    /// Server-side creation time.
    pub timestamp: DateTime<Utc>,
    /// Delivery status, meaningful only for own messages.
    #[serde(default)]
    pub status: MessageStatus,
    /// Aggregated reactions in insertion order.
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    /// Whether the message is pinned in its chat.
    #[serde(default)]
    pub is_pinned: bool,
    /// Display name of the user who pinned it.
    #[serde(default, rename = "pinnedByUsername")]
    pub pinned_by: Option<String>,
    /// Id of the message this one replies to.
    #[serde(default)]
    pub reply_to_id: Option<i64>,
    /// Display name of the replied-to sender, for preview rendering.
    #[serde(default)]
    pub reply_to_sender_name: Option<String>,
    /// Whether the content has been edited after sending.
    #[serde(default)]
    pub is_edited: bool,
    /// Whether the message was deleted (content tombstoned, entry kept).
    #[serde(default)]
    pub is_deleted: bool,
    /// Display name of the most recent reader, from read receipts.
    #[serde(default)]
    pub read_by: Option<String>,
}

fn default_kind() -> MessageKind {
    MessageKind::Chat
}

impl Message {
    /// Build a plain chat message; used by tests and fixtures.
    pub fn chat(id: i64, sender_id: i64, sender_name: &str, content: &str) -> Self {
        Self {
            id,
            sender_id,
            sender_name: sender_name.to_string(),
            kind: MessageKind::Chat,
            content: content.to_string(),
            timestamp: Utc::now(),
            status: MessageStatus::Sent,
            reactions: Vec::new(),
            is_pinned: false,
            pinned_by: None,
            reply_to_id: None,
            reply_to_sender_name: None,
            is_edited: false,
            is_deleted: false,
            read_by: None,
        }
    }

    /// Replace the content with the deletion tombstone and freeze the entry.
    pub fn tombstone(&mut self) {
        self.content = DELETED_MESSAGE_PLACEHOLDER.to_string();
        self.is_deleted = true;
        self.reactions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_parses() {
        let json = serde_json::json!({
            "id": 101,
            "senderId": 7,
            "senderName": "Alice Nguyen",
            "type": "CHAT",
            "content": "hello",
            "timestamp": "2025-03-01T09:30:00Z",
            "status": "DELIVERED",
            "reactions": [
                {"type": "LIKE", "emoji": "\u{1F44D}", "count": 2, "currentUserReacted": true}
            ],
            "isPinned": true,
            "pinnedByUsername": "bob",
            "replyToId": 99,
            "isEdited": true
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert_eq!(msg.id, 101);
        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.status, MessageStatus::Delivered);
        assert_eq!(msg.reactions.len(), 1);
        assert!(msg.reactions[0].current_user_reacted);
        assert!(msg.is_pinned);
        assert_eq!(msg.pinned_by.as_deref(), Some("bob"));
        assert_eq!(msg.reply_to_id, Some(99));
        assert!(msg.is_edited);
        assert!(!msg.is_deleted);
    }

    #[test]
    fn test_minimal_wire_format_defaults() {
        let json = serde_json::json!({
            "id": 5,
            "senderId": 1,
            "timestamp": "2025-03-01T09:30:00Z"
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.status, MessageStatus::Sent);
        assert!(msg.reactions.is_empty());
        assert!(!msg.is_pinned);
    }

    #[test]
    fn test_tombstone_replaces_content_and_keeps_entry() {
        let mut msg = Message::chat(1, 7, "alice", "secret");
        msg.reactions.push(Reaction {
            kind: "LIKE".into(),
            emoji: "\u{1F44D}".into(),
            count: 1,
            current_user_reacted: false,
        });

        msg.tombstone();
        assert_eq!(msg.content, DELETED_MESSAGE_PLACEHOLDER);
        assert!(msg.is_deleted);
        assert!(msg.reactions.is_empty());
        // Identity is unchanged
        assert_eq!(msg.id, 1);
    }

    #[test]
    fn test_system_kinds() {
        assert!(MessageKind::Join.is_system());
        assert!(MessageKind::Leave.is_system());
        assert!(!MessageKind::Chat.is_system());
        assert!(!MessageKind::File.is_system());
    }
}
