//! Message endpoints: history, read marks, reactions, edit/delete, pinning,
//! and page location for jump-to-message.

use relay_core::error::RelayResult;
use relay_models::{ChatKey, ChatKind, Message, Reaction};

use crate::client::ApiClient;
use crate::response::{Page, PageLocation};

/// Chat-scoped id parameters appended to message requests, so the server can
/// resolve which stream a message-level operation refers to.
fn chat_id_fields(chat: &ChatKey) -> (Option<i64>, Option<i64>) {
    match chat.kind {
        ChatKind::Room => (Some(chat.id), None),
        ChatKind::Conversation => (None, Some(chat.id)),
    }
}

impl ApiClient {
    /// Fetch one page of message history for a chat, newest first.
    pub async fn chat_messages(
        &self,
        chat: &ChatKey,
        page: u32,
        size: u32,
    ) -> RelayResult<Page<Message>> {
        let path = format!(
            "/{}s/{}/messages?page={page}&size={size}",
            chat.kind, chat.id
        );
        self.get_json(&path).await
    }

    /// Mark a single message as read.
    pub async fn mark_read(&self, message_id: i64, chat: &ChatKey) -> RelayResult<()> {
        let (room_id, conversation_id) = chat_id_fields(chat);
        let body = serde_json::json!({
            "messageId": message_id,
            "roomId": room_id,
            "conversationId": conversation_id,
        });
        self.post("/messages/read", &body).await?;
        Ok(())
    }

    /// Mark a batch of messages as read in one call.
    pub async fn mark_read_batch(&self, message_ids: &[i64], chat: &ChatKey) -> RelayResult<()> {
        let (room_id, conversation_id) = chat_id_fields(chat);
        let body = serde_json::json!({
            "messageIds": message_ids,
            "roomId": room_id,
            "conversationId": conversation_id,
        });
        self.post("/messages/read/batch", &body).await?;
        Ok(())
    }

    /// Add a reaction to a message. The resulting aggregate arrives as a
    /// REACTION event on the chat topic.
    pub async fn add_reaction(&self, message_id: i64, reaction_type: &str) -> RelayResult<()> {
        let body = serde_json::json!({
            "messageId": message_id,
            "type": reaction_type,
        });
        self.post(&format!("/messages/{message_id}/reactions"), &body)
            .await?;
        Ok(())
    }

    /// Remove the current user's reaction from a message.
    pub async fn remove_reaction(&self, message_id: i64) -> RelayResult<()> {
        self.delete(&format!("/messages/{message_id}/reactions"))
            .await?;
        Ok(())
    }

    /// Fetch the current reaction aggregate for a message.
    pub async fn list_reactions(&self, message_id: i64) -> RelayResult<Vec<Reaction>> {
        self.get_json(&format!("/messages/{message_id}/reactions"))
            .await
    }

    /// Edit a previously sent message. The body is the bare new content.
    pub async fn edit_message(&self, message_id: i64, new_content: &str) -> RelayResult<()> {
        let body = serde_json::Value::String(new_content.to_string());
        self.put(&format!("/messages/{message_id}"), &body).await?;
        Ok(())
    }

    /// Delete a message. The tombstoning arrives as a DELETE event.
    pub async fn delete_message(&self, message_id: i64) -> RelayResult<()> {
        self.delete(&format!("/messages/{message_id}")).await?;
        Ok(())
    }

    /// Pin or unpin a message.
    pub async fn set_pinned(&self, message_id: i64, pinned: bool) -> RelayResult<()> {
        self.post_empty(&format!("/messages/{message_id}/pin?pinned={pinned}"))
            .await?;
        Ok(())
    }

    /// Fetch the pinned messages for a chat.
    pub async fn pinned_messages(&self, chat: &ChatKey) -> RelayResult<Vec<Message>> {
        let param = match chat.kind {
            ChatKind::Room => format!("roomId={}", chat.id),
            ChatKind::Conversation => format!("conversationId={}", chat.id),
        };
        self.get_json(&format!("/messages/pinned?{param}")).await
    }

    /// Locate the history page containing a message, for jump-to-message.
    pub async fn locate_message_page(
        &self,
        message_id: i64,
        page_size: u32,
    ) -> RelayResult<PageLocation> {
        self.get_json(&format!("/messages/{message_id}/page?pageSize={page_size}"))
            .await
    }
}
