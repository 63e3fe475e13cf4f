//! Chat context controller.
//!
//! Serializes transitions between "no active chat" and "one active chat"
//! and fans inbound per-chat events to the reconciliation engine and the
//! typing coordinator. Activating a new chat always leaves the previous one
//! first, so at most one chat subscription is ever live.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use relay_api::ApiClient;
use relay_core::config::ChatConfig;
use relay_core::error::{RelayError, RelayResult};
use relay_models::{ChatKey, MessageKind};
use relay_socket::events::{ChatEventObserver, MessageEvent, OutgoingMessage, TypingEvent};
use relay_socket::SocketManager;

use crate::reconcile::ReconcileEngine;
use crate::typing::TypingCoordinator;

/// The message a composed reply will reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub message_id: i64,
    pub sender_name: String,
}

/// Observer wired into each chat subscription: message events go to the
/// engine, typing events to the coordinator. A pin change additionally
/// refetches the pinned summary.
struct ControllerObserver {
    api: ApiClient,
    engine: Arc<ReconcileEngine>,
    typing: TypingCoordinator,
}

impl ChatEventObserver for ControllerObserver {
    fn on_message(&self, chat: ChatKey, event: MessageEvent) {
        let pin_changed = matches!(event, MessageEvent::Pin { .. });
        self.engine.apply(chat, event);

        if pin_changed {
            let api = self.api.clone();
            let engine = self.engine.clone();
            tokio::spawn(async move {
                match api.pinned_messages(&chat).await {
                    Ok(pinned) => engine.set_pinned_summary(chat, pinned),
                    Err(e) => warn!("pinned refetch for {chat} failed: {e}"),
                }
            });
        }
    }

    fn on_typing(&self, chat: ChatKey, event: TypingEvent) {
        self.typing.handle_remote(chat, event);
    }
}

struct ControllerInner {
    api: ApiClient,
    socket: SocketManager,
    engine: Arc<ReconcileEngine>,
    typing: TypingCoordinator,
    active: Mutex<Option<ChatKey>>,
    reply_target: StdMutex<Option<ReplyTarget>>,
    history_page_size: u32,
    pinned_fetch_delay: Duration,
}

/// Chat context controller. Cheap to clone; state is shared.
#[derive(Clone)]
pub struct ChatController {
    inner: Arc<ControllerInner>,
}

impl ChatController {
    /// Create a controller.
    pub fn new(
        api: ApiClient,
        socket: SocketManager,
        engine: Arc<ReconcileEngine>,
        typing: TypingCoordinator,
        config: &ChatConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                api,
                socket,
                engine,
                typing,
                active: Mutex::new(None),
                reply_target: StdMutex::new(None),
                history_page_size: config.history_page_size,
                pinned_fetch_delay: Duration::from_millis(config.pinned_fetch_delay_ms),
            }),
        }
    }

    /// The currently active chat, if any.
    pub async fn active_chat(&self) -> Option<ChatKey> {
        *self.inner.active.lock().await
    }

    /// Activate a chat.
    ///
    /// Any previously active chat is left first; then the subscription is
    /// opened, the enter control message sent (best-effort), the newest
    /// history page fetched as a full replace, and the pinned summary
    /// refetched after a short delay so it cannot race the replace.
    pub async fn open(&self, chat: ChatKey) {
        self.leave().await;
        *self.inner.active.lock().await = Some(chat);
        info!("opening {chat}");

        if self.inner.socket.is_connected().await {
            let observer = Arc::new(ControllerObserver {
                api: self.inner.api.clone(),
                engine: self.inner.engine.clone(),
                typing: self.inner.typing.clone(),
            });
            if let Err(e) = self.inner.socket.subscribe_to_chat(chat, observer).await {
                warn!("subscription for {chat} failed: {e}");
            }
            self.inner.socket.send_chat_enter(&chat).await;
        } else {
            warn!("socket not connected; {chat} opened without live events");
        }

        match self
            .inner
            .api
            .chat_messages(&chat, 0, self.inner.history_page_size)
            .await
        {
            Ok(page) => self.inner.engine.replace_history(chat, page.content),
            Err(e) => warn!("history fetch for {chat} failed: {e}"),
        }

        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(controller.inner.pinned_fetch_delay).await;
            if controller.active_chat().await == Some(chat) {
                controller.refresh_pinned(chat).await;
            }
        });
    }

    /// Deactivate the current chat. Idempotent; safe to call repeatedly.
    pub async fn leave(&self) {
        let Some(chat) = self.inner.active.lock().await.take() else {
            return;
        };
        info!("leaving {chat}");

        self.inner.socket.send_chat_leave(&chat).await;
        self.inner.socket.unsubscribe_chat(&chat).await;
        self.inner.typing.clear_remote(chat);
        self.inner.reply_target.lock().unwrap().take();
    }

    /// Publish a chat message to the active chat.
    ///
    /// A no-op returning false on blank text, no active chat, or no
    /// connection. The sent message enters the canonical list only when the
    /// server echoes it back. On success any pending reply target is
    /// consumed and local typing is force-stopped.
    pub async fn send_message(&self, text: &str) -> bool {
        let content = text.trim();
        if content.is_empty() {
            return false;
        }
        let Some(chat) = self.active_chat().await else {
            return false;
        };
        if !self.inner.socket.is_connected().await {
            warn!("cannot send: not connected");
            return false;
        }

        let reply_to_id = self
            .inner
            .reply_target
            .lock()
            .unwrap()
            .as_ref()
            .map(|target| target.message_id);

        let message = OutgoingMessage {
            content: content.to_string(),
            kind: MessageKind::Chat,
            reply_to_id,
            file_upload_id: None,
        };

        let sent = self.inner.socket.send_chat_message(&chat, &message).await;
        if sent {
            self.inner.reply_target.lock().unwrap().take();
            self.inner.typing.force_stop(chat);
        }
        sent
    }

    /// Report a local input change; feeds the typing debounce.
    pub async fn notify_typing(&self) {
        if !self.inner.socket.is_connected().await {
            return;
        }
        if let Some(chat) = self.active_chat().await {
            self.inner.typing.handle_input(chat);
        }
    }

    /// Target a message for the next outgoing reply.
    pub fn set_reply_target(&self, message_id: i64, sender_name: &str) {
        *self.inner.reply_target.lock().unwrap() = Some(ReplyTarget {
            message_id,
            sender_name: sender_name.to_string(),
        });
    }

    /// Cancel a pending reply.
    pub fn clear_reply_target(&self) {
        self.inner.reply_target.lock().unwrap().take();
    }

    /// The pending reply target, if any.
    pub fn reply_target(&self) -> Option<ReplyTarget> {
        self.inner.reply_target.lock().unwrap().clone()
    }

    /// Mark a message as read via the REST collaborator.
    pub async fn mark_read(&self, message_id: i64) -> RelayResult<()> {
        let Some(chat) = self.active_chat().await else {
            return Err(RelayError::Validation("no active chat".into()));
        };
        self.inner.api.mark_read(message_id, &chat).await
    }

    /// Report a message entering or leaving the viewport.
    pub async fn mark_visible(&self, message_id: i64, visible: bool) -> bool {
        self.inner.socket.send_visibility(message_id, visible).await
    }

    /// Add a reaction; the new aggregate arrives as a REACTION event. The
    /// target is noted so a snapshot-form event can be scoped to it.
    pub async fn add_reaction(&self, message_id: i64, reaction_type: &str) -> RelayResult<()> {
        if let Some(chat) = self.active_chat().await {
            self.inner.engine.note_reaction_target(chat, message_id);
        }
        self.inner.api.add_reaction(message_id, reaction_type).await
    }

    /// Remove the current user's reaction.
    pub async fn remove_reaction(&self, message_id: i64) -> RelayResult<()> {
        if let Some(chat) = self.active_chat().await {
            self.inner.engine.note_reaction_target(chat, message_id);
        }
        self.inner.api.remove_reaction(message_id).await
    }

    /// Edit a message; the change arrives back as an UPDATE event.
    pub async fn edit_message(&self, message_id: i64, new_content: &str) -> RelayResult<()> {
        self.inner.api.edit_message(message_id, new_content).await
    }

    /// Delete a message; the tombstoning arrives as a DELETE event.
    pub async fn delete_message(&self, message_id: i64) -> RelayResult<()> {
        self.inner.api.delete_message(message_id).await
    }

    /// Pin or unpin a message; the state change arrives as a PIN/UNPIN
    /// event which also refetches the pinned summary.
    pub async fn toggle_pin(&self, message_id: i64, pinned: bool) -> RelayResult<()> {
        self.inner.api.set_pinned(message_id, pinned).await
    }

    /// Bring a message into the loaded history window.
    ///
    /// When the message is already loaded this is a no-op. Otherwise the
    /// locate-page endpoint finds its page, which is fetched together with
    /// the adjacent newer page for context and handed to the engine as a
    /// replace.
    pub async fn jump_to_message(&self, message_id: i64) -> RelayResult<()> {
        let Some(chat) = self.active_chat().await else {
            return Err(RelayError::Validation("no active chat".into()));
        };
        if self.inner.engine.message(&chat, message_id).is_some() {
            return Ok(());
        }

        let size = self.inner.history_page_size;
        let location = self.inner.api.locate_message_page(message_id, size).await?;
        let target = self
            .inner
            .api
            .chat_messages(&chat, location.page_number, size)
            .await?;

        // Pages are newest-first: the adjacent newer page precedes the
        // target page in the combined window.
        let mut combined = Vec::new();
        if location.page_number > 0 {
            let newer = self
                .inner
                .api
                .chat_messages(&chat, location.page_number - 1, size)
                .await?;
            combined.extend(newer.content);
        }
        combined.extend(target.content);

        self.inner.engine.replace_history(chat, combined);
        Ok(())
    }

    /// Refetch the pinned summary for a chat.
    pub async fn refresh_pinned(&self, chat: ChatKey) {
        match self.inner.api.pinned_messages(&chat).await {
            Ok(pinned) => self.inner.engine.set_pinned_summary(chat, pinned),
            Err(e) => warn!("pinned fetch for {chat} failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_target_shape() {
        let target = ReplyTarget {
            message_id: 9,
            sender_name: "alice".into(),
        };
        assert_eq!(target.message_id, 9);
        assert_eq!(target.sender_name, "alice");
    }
}
