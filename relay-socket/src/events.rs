//! Wire event types and observer interfaces.
//!
//! Every frame arriving on a subscription is validated once, at the
//! boundary, into a tagged union and dispatched by tag. Handlers never see
//! raw JSON, so there are no repeated defensive-parsing branches downstream.

use serde::{Deserialize, Serialize};

use relay_core::error::{RelayError, RelayResult};
use relay_models::{ChatKey, Message, MessageKind, MessageStatus, Reaction};

/// Connection state of the socket manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to connect.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Connected and receiving events.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Raw envelope carried on every chat topic and personal queue.
#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    /// Event family: MESSAGE, TYPING, REACTION, MESSAGE_STATUS,
    /// MESSAGE_READ, MESSAGE_BATCH_READ.
    #[serde(rename = "type")]
    kind: String,
    /// Sub-action for MESSAGE (SEND/UPDATE/DELETE/PIN/UNPIN) and
    /// TYPING (START/STOP).
    #[serde(default)]
    action: Option<String>,
    /// Event payload; shape depends on the kind.
    #[serde(default)]
    data: serde_json::Value,
}

/// Pin/unpin sub-action on a MESSAGE event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinAction {
    Pin,
    Unpin,
}

/// A reaction update, in either of its two wire forms.
///
/// The delta form names the message; the snapshot form is a bare reaction
/// array scoped to the most recently reaction-targeted message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReactionUpdate {
    /// `{messageId, reactions}`.
    Delta {
        #[serde(rename = "messageId")]
        message_id: i64,
        reactions: Vec<Reaction>,
    },
    /// Bare reaction array.
    Snapshot(Vec<Reaction>),
}

/// Delivery-status update for one message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub message_id: i64,
    pub status: MessageStatus,
    /// Display name of the reader, present on read transitions.
    #[serde(default)]
    pub read_by: Option<String>,
    #[serde(default)]
    pub reader_id: Option<i64>,
}

/// Read receipt for one message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub message_id: i64,
    #[serde(default)]
    pub reader_id: Option<i64>,
    #[serde(default)]
    pub reader_name: Option<String>,
}

/// Read receipt covering several messages at once.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReadReceipt {
    pub message_ids: Vec<i64>,
    #[serde(default)]
    pub reader_id: Option<i64>,
    #[serde(default)]
    pub reader_name: Option<String>,
}

/// Raw typing payload as sent by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypingPayload {
    user_id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    is_typing: Option<bool>,
}

/// A resolved typing event: who, and whether they are typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingEvent {
    pub user_id: i64,
    pub username: String,
    pub is_typing: bool,
}

/// Presence update from the session-wide broadcast topic.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, alias = "online")]
    pub is_online: bool,
}

/// A message-affecting event on a chat topic, dispatched to the
/// reconciliation engine.
#[derive(Debug, Clone)]
pub enum MessageEvent {
    /// A new message to insert (skipped when the id already exists).
    Send(Message),
    /// Content replacement for an existing message.
    Update(Message),
    /// Logical deletion: the entry is tombstoned, not removed.
    Delete { message_id: i64 },
    /// Pin state change, carrying the updated message.
    Pin { message: Message, action: PinAction },
    /// Reaction aggregate replacement.
    Reaction(ReactionUpdate),
    /// Delivery-status update (own messages only).
    Status(StatusUpdate),
    /// Read receipt (own messages only).
    Read(ReadReceipt),
    /// Batch read receipt (own messages only).
    BatchRead(BatchReadReceipt),
}

impl MessageEvent {
    /// Human-readable label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Send(_) => "SEND",
            Self::Update(_) => "UPDATE",
            Self::Delete { .. } => "DELETE",
            Self::Pin { .. } => "PIN",
            Self::Reaction(_) => "REACTION",
            Self::Status(_) => "MESSAGE_STATUS",
            Self::Read(_) => "MESSAGE_READ",
            Self::BatchRead(_) => "MESSAGE_BATCH_READ",
        }
    }
}

/// Every event a chat subscription can carry, validated at the boundary.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Message(MessageEvent),
    Typing(TypingEvent),
}

impl ChatEvent {
    /// Parse a raw frame into a typed event.
    ///
    /// Malformed frames yield an error; the pump logs and drops them
    /// without aborting the subscription.
    pub fn parse(value: &serde_json::Value) -> RelayResult<ChatEvent> {
        let envelope: Envelope = serde_json::from_value(value.clone())?;
        let action = envelope.action.as_deref();

        match envelope.kind.as_str() {
            "MESSAGE" => match action {
                Some("SEND") | None => {
                    let message: Message = serde_json::from_value(envelope.data)?;
                    Ok(ChatEvent::Message(MessageEvent::Send(message)))
                }
                Some("UPDATE") => {
                    let message: Message = serde_json::from_value(envelope.data)?;
                    Ok(ChatEvent::Message(MessageEvent::Update(message)))
                }
                Some("DELETE") => {
                    let message_id = parse_message_id(&envelope.data)?;
                    Ok(ChatEvent::Message(MessageEvent::Delete { message_id }))
                }
                Some(pin @ ("PIN" | "UNPIN")) => {
                    let message: Message = serde_json::from_value(envelope.data)?;
                    let action = if pin == "PIN" {
                        PinAction::Pin
                    } else {
                        PinAction::Unpin
                    };
                    Ok(ChatEvent::Message(MessageEvent::Pin { message, action }))
                }
                Some(other) => Err(RelayError::Serialization(format!(
                    "unknown MESSAGE action: {other}"
                ))),
            },
            "TYPING" => {
                let payload: TypingPayload = serde_json::from_value(envelope.data)?;
                let is_typing = match action {
                    Some("START") => true,
                    Some("STOP") => false,
                    _ => payload.is_typing.ok_or_else(|| {
                        RelayError::Serialization("typing event without isTyping".into())
                    })?,
                };
                let username = payload
                    .username
                    .or(payload.full_name)
                    .ok_or_else(|| {
                        RelayError::Serialization("typing event without username".into())
                    })?;
                Ok(ChatEvent::Typing(TypingEvent {
                    user_id: payload.user_id,
                    username,
                    is_typing,
                }))
            }
            "REACTION" => {
                let update: ReactionUpdate = serde_json::from_value(envelope.data)?;
                Ok(ChatEvent::Message(MessageEvent::Reaction(update)))
            }
            "MESSAGE_STATUS" => {
                let update: StatusUpdate = serde_json::from_value(envelope.data)?;
                Ok(ChatEvent::Message(MessageEvent::Status(update)))
            }
            "MESSAGE_READ" => {
                let receipt: ReadReceipt = serde_json::from_value(envelope.data)?;
                Ok(ChatEvent::Message(MessageEvent::Read(receipt)))
            }
            "MESSAGE_BATCH_READ" => {
                let receipt: BatchReadReceipt = serde_json::from_value(envelope.data)?;
                Ok(ChatEvent::Message(MessageEvent::BatchRead(receipt)))
            }
            other => Err(RelayError::Serialization(format!(
                "unknown event type: {other}"
            ))),
        }
    }
}

/// DELETE events carry the message id either bare or wrapped.
fn parse_message_id(data: &serde_json::Value) -> RelayResult<i64> {
    if let Some(id) = data.as_i64() {
        return Ok(id);
    }
    if let Some(id) = data.as_str().and_then(|s| s.parse::<i64>().ok()) {
        return Ok(id);
    }
    if let Some(id) = data.get("id").and_then(|v| v.as_i64()) {
        return Ok(id);
    }
    Err(RelayError::Serialization(format!(
        "delete event without a message id: {data}"
    )))
}

/// Outgoing chat message payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_upload_id: Option<i64>,
}

impl OutgoingMessage {
    /// A plain chat message.
    pub fn chat(content: &str) -> Self {
        Self {
            content: content.to_string(),
            kind: MessageKind::Chat,
            reply_to_id: None,
            file_upload_id: None,
        }
    }
}

/// Observer for events scoped to one chat subscription.
///
/// Message-affecting events go to the reconciliation engine via
/// `on_message`; typing events go to the typing coordinator via
/// `on_typing`. Implementations must not block.
pub trait ChatEventObserver: Send + Sync {
    fn on_message(&self, chat: ChatKey, event: MessageEvent);
    fn on_typing(&self, chat: ChatKey, event: TypingEvent);
}

/// Observer for the session-wide global subscriptions.
pub trait GlobalEventObserver: Send + Sync {
    fn on_presence(&self, update: PresenceUpdate);
    fn on_status(&self, update: StatusUpdate);
    fn on_read(&self, receipt: ReadReceipt);
    fn on_batch_read(&self, receipt: BatchReadReceipt);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_event() {
        let frame = serde_json::json!({
            "type": "MESSAGE",
            "action": "SEND",
            "data": {
                "id": 10,
                "senderId": 7,
                "senderName": "alice",
                "type": "CHAT",
                "content": "hi",
                "timestamp": "2025-03-01T09:30:00Z"
            }
        });
        match ChatEvent::parse(&frame).unwrap() {
            ChatEvent::Message(MessageEvent::Send(msg)) => {
                assert_eq!(msg.id, 10);
                assert_eq!(msg.content, "hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_delete_event_bare_id() {
        let frame = serde_json::json!({"type": "MESSAGE", "action": "DELETE", "data": 33});
        match ChatEvent::parse(&frame).unwrap() {
            ChatEvent::Message(MessageEvent::Delete { message_id }) => {
                assert_eq!(message_id, 33)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_delete_event_string_id() {
        let frame = serde_json::json!({"type": "MESSAGE", "action": "DELETE", "data": "44"});
        match ChatEvent::parse(&frame).unwrap() {
            ChatEvent::Message(MessageEvent::Delete { message_id }) => {
                assert_eq!(message_id, 44)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_typing_with_action() {
        let frame = serde_json::json!({
            "type": "TYPING",
            "action": "START",
            "data": {"userId": 9, "username": "bob"}
        });
        match ChatEvent::parse(&frame).unwrap() {
            ChatEvent::Typing(ev) => {
                assert_eq!(ev.user_id, 9);
                assert_eq!(ev.username, "bob");
                assert!(ev.is_typing);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_typing_with_flag_and_full_name() {
        let frame = serde_json::json!({
            "type": "TYPING",
            "data": {"userId": 9, "fullName": "Bob Tran", "isTyping": false}
        });
        match ChatEvent::parse(&frame).unwrap() {
            ChatEvent::Typing(ev) => {
                assert_eq!(ev.username, "Bob Tran");
                assert!(!ev.is_typing);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_typing_missing_fields_is_error() {
        let frame = serde_json::json!({
            "type": "TYPING",
            "data": {"userId": 9, "username": "bob"}
        });
        assert!(ChatEvent::parse(&frame).is_err());
    }

    #[test]
    fn test_parse_reaction_delta() {
        let frame = serde_json::json!({
            "type": "REACTION",
            "data": {
                "messageId": 10,
                "reactions": [{"type": "LIKE", "emoji": "x", "count": 1}]
            }
        });
        match ChatEvent::parse(&frame).unwrap() {
            ChatEvent::Message(MessageEvent::Reaction(ReactionUpdate::Delta {
                message_id,
                reactions,
            })) => {
                assert_eq!(message_id, 10);
                assert_eq!(reactions.len(), 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reaction_snapshot() {
        let frame = serde_json::json!({
            "type": "REACTION",
            "data": [{"type": "LIKE", "emoji": "x", "count": 2}]
        });
        match ChatEvent::parse(&frame).unwrap() {
            ChatEvent::Message(MessageEvent::Reaction(ReactionUpdate::Snapshot(r))) => {
                assert_eq!(r[0].count, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_status_update() {
        let frame = serde_json::json!({
            "type": "MESSAGE_STATUS",
            "data": {"messageId": 5, "status": "DELIVERED"}
        });
        match ChatEvent::parse(&frame).unwrap() {
            ChatEvent::Message(MessageEvent::Status(update)) => {
                assert_eq!(update.message_id, 5);
                assert_eq!(update.status, MessageStatus::Delivered);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_batch_read() {
        let frame = serde_json::json!({
            "type": "MESSAGE_BATCH_READ",
            "data": {"messageIds": [1, 2, 3], "readerName": "bob"}
        });
        match ChatEvent::parse(&frame).unwrap() {
            ChatEvent::Message(MessageEvent::BatchRead(receipt)) => {
                assert_eq!(receipt.message_ids, vec![1, 2, 3]);
                assert_eq!(receipt.reader_name.as_deref(), Some("bob"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_type_is_error() {
        let frame = serde_json::json!({"type": "SOMETHING_ELSE", "data": {}});
        assert!(ChatEvent::parse(&frame).is_err());
    }

    #[test]
    fn test_malformed_frame_is_error_not_panic() {
        let frame = serde_json::json!({"no_type_field": true});
        assert!(ChatEvent::parse(&frame).is_err());
    }

    #[test]
    fn test_outgoing_message_wire_shape() {
        let msg = OutgoingMessage {
            reply_to_id: Some(99),
            ..OutgoingMessage::chat("hello")
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"], "hello");
        assert_eq!(json["type"], "CHAT");
        assert_eq!(json["replyToId"], 99);
        assert!(json.get("fileUploadId").is_none());
    }

    #[test]
    fn test_presence_update_parse() {
        let json = serde_json::json!({"userId": 3, "username": "carol", "isOnline": true});
        let update: PresenceUpdate = serde_json::from_value(json).unwrap();
        assert!(update.is_online);
        assert_eq!(update.user_id, 3);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }
}
