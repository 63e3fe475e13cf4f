//! Topic and destination builders for the wire contract.
//!
//! Server-to-client streams are topics; client-to-server sends go to
//! application destinations. Chat-scoped paths embed the chat kind and id.

use relay_models::ChatKey;

/// Presence broadcast topic, active for the whole session.
pub const TOPIC_USER_STATUS: &str = "/topic/user-status";

/// Personal queue carrying message-status updates for own messages.
pub const QUEUE_MESSAGE_STATUS: &str = "/user/queue/message-status";

/// Personal queue carrying read receipts for own messages.
pub const QUEUE_READ_RECEIPTS: &str = "/user/queue/read-receipts";

/// Destination for message visibility pings.
pub const DEST_VISIBILITY: &str = "/app/message/visibility";

/// The main event topic for a chat.
pub fn chat_topic(chat: &ChatKey) -> String {
    format!("/topic/{}/{}", chat.kind, chat.id)
}

/// Destination for sending a chat message.
pub fn chat_send(chat: &ChatKey) -> String {
    format!("/app/chat/{}/{}", chat.kind, chat.id)
}

/// Destination for typing signals.
pub fn chat_typing(chat: &ChatKey) -> String {
    format!("/app/chat/typing/{}/{}", chat.kind, chat.id)
}

/// Destination for the enter-chat control message.
pub fn chat_enter(chat: &ChatKey) -> String {
    format!("/app/chat/{}/{}/enter", chat.kind, chat.id)
}

/// Destination for the leave-chat control message.
pub fn chat_leave(chat: &ChatKey) -> String {
    format!("/app/chat/{}/{}/leave", chat.kind, chat.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_paths() {
        let room = ChatKey::room(5);
        assert_eq!(chat_topic(&room), "/topic/room/5");
        assert_eq!(chat_send(&room), "/app/chat/room/5");
        assert_eq!(chat_typing(&room), "/app/chat/typing/room/5");
        assert_eq!(chat_enter(&room), "/app/chat/room/5/enter");
        assert_eq!(chat_leave(&room), "/app/chat/room/5/leave");

        let conv = ChatKey::conversation(42);
        assert_eq!(chat_topic(&conv), "/topic/conversation/42");
        assert_eq!(chat_send(&conv), "/app/chat/conversation/42");
    }
}
