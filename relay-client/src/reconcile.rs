//! Message reconciliation engine.
//!
//! Maintains one ordered message list per chat and applies inbound events
//! deterministically. A message's identity is its server id: the engine
//! never holds two entries for the same id, which covers the common
//! double-delivery path where a sender receives its own echo. Deletions
//! tombstone the entry in place so positions stay stable.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, warn};

use relay_models::{ChatKey, Message, MessageStatus, Reaction};
use relay_socket::events::{
    BatchReadReceipt, MessageEvent, PinAction, ReactionUpdate, ReadReceipt, StatusUpdate,
};

use crate::event_bus::{AppEvent, EventBus};

/// Canonical history for one chat: messages oldest-first plus an id index.
#[derive(Default)]
struct ChatHistory {
    messages: Vec<Message>,
    index: HashMap<i64, usize>,
}

impl ChatHistory {
    fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    fn push(&mut self, message: Message) {
        self.index.insert(message.id, self.messages.len());
        self.messages.push(message);
    }

    fn get_mut(&mut self, id: i64) -> Option<&mut Message> {
        let pos = *self.index.get(&id)?;
        self.messages.get_mut(pos)
    }
}

/// The reconciliation engine.
///
/// All mutations happen under short-lived locks never held across an await;
/// events for the same chat are applied in delivery order by the single
/// subscription pump.
pub struct ReconcileEngine {
    bus: EventBus,
    /// The local user id, set at session establishment. Status and read
    /// receipts only apply to messages this user sent.
    local_user_id: Mutex<Option<i64>>,
    chats: Mutex<HashMap<ChatKey, ChatHistory>>,
    /// Pinned-message summary per chat, refetched on pin changes.
    pinned: Mutex<HashMap<ChatKey, Vec<Message>>>,
    /// The most recently reaction-targeted message, scoping snapshot-form
    /// reaction events that arrive as a bare array.
    reaction_target: Mutex<Option<(ChatKey, i64)>>,
}

impl ReconcileEngine {
    /// Create a new engine.
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            local_user_id: Mutex::new(None),
            chats: Mutex::new(HashMap::new()),
            pinned: Mutex::new(HashMap::new()),
            reaction_target: Mutex::new(None),
        }
    }

    /// Set or clear the local identity used by the ownership guards.
    pub fn set_local_user(&self, user_id: Option<i64>) {
        *self.local_user_id.lock().unwrap() = user_id;
    }

    fn local_user(&self) -> Option<i64> {
        *self.local_user_id.lock().unwrap()
    }

    /// Snapshot of a chat's canonical list, oldest-first.
    pub fn messages(&self, chat: &ChatKey) -> Vec<Message> {
        self.chats
            .lock()
            .unwrap()
            .get(chat)
            .map(|h| h.messages.clone())
            .unwrap_or_default()
    }

    /// Look up one message by id within a chat.
    pub fn message(&self, chat: &ChatKey, id: i64) -> Option<Message> {
        self.chats
            .lock()
            .unwrap()
            .get_mut(chat)
            .and_then(|h| h.get_mut(id).map(|m| m.clone()))
    }

    /// Snapshot of a chat's pinned-message summary.
    pub fn pinned(&self, chat: &ChatKey) -> Vec<Message> {
        self.pinned
            .lock()
            .unwrap()
            .get(chat)
            .cloned()
            .unwrap_or_default()
    }

    /// Note which message reaction interactions currently target, so a
    /// snapshot-form reaction event can be scoped to it.
    pub fn note_reaction_target(&self, chat: ChatKey, message_id: i64) {
        *self.reaction_target.lock().unwrap() = Some((chat, message_id));
    }

    /// Replace a chat's list with a freshly fetched history page.
    ///
    /// Pages arrive newest-first and are reversed so the canonical list is
    /// oldest-first. Any previously retained entries (tombstones included)
    /// are dropped; they come back with the fetch if still relevant.
    pub fn replace_history(&self, chat: ChatKey, newest_first: Vec<Message>) {
        let mut history = ChatHistory::default();
        for message in newest_first.into_iter().rev() {
            if history.contains(message.id) {
                debug!("{chat}: duplicate id {} in history page, skipping", message.id);
                continue;
            }
            history.push(message);
        }
        let count = history.messages.len();
        self.chats.lock().unwrap().insert(chat, history);
        debug!("{chat}: history replaced ({count} messages)");
        self.bus.emit(AppEvent::HistoryReplaced { chat });
    }

    /// Replace a chat's pinned summary.
    pub fn set_pinned_summary(&self, chat: ChatKey, messages: Vec<Message>) {
        let count = messages.len();
        self.pinned.lock().unwrap().insert(chat, messages);
        self.bus.emit(AppEvent::PinnedSummaryChanged { chat, count });
    }

    /// Apply one message-affecting event from a chat subscription.
    pub fn apply(&self, chat: ChatKey, event: MessageEvent) {
        match event {
            MessageEvent::Send(message) => self.insert(chat, message),
            MessageEvent::Update(message) => self.update(chat, message),
            MessageEvent::Delete { message_id } => self.delete(chat, message_id),
            MessageEvent::Pin { message, action } => self.pin(chat, message, action),
            MessageEvent::Reaction(update) => self.reaction(chat, update),
            MessageEvent::Status(update) => self.status(Some(chat), update),
            MessageEvent::Read(receipt) => self.read(Some(chat), receipt),
            MessageEvent::BatchRead(receipt) => self.batch_read(Some(chat), receipt),
        }
    }

    /// Apply a status update from the personal queue (no chat scope).
    pub fn apply_status(&self, update: StatusUpdate) {
        self.status(None, update);
    }

    /// Apply a read receipt from the personal queue.
    pub fn apply_read(&self, receipt: ReadReceipt) {
        self.read(None, receipt);
    }

    /// Apply a batch read receipt from the personal queue.
    pub fn apply_batch_read(&self, receipt: BatchReadReceipt) {
        self.batch_read(None, receipt);
    }

    /// SEND: insert if the id is not already present.
    fn insert(&self, chat: ChatKey, message: Message) {
        let message_id = message.id;
        {
            let mut chats = self.chats.lock().unwrap();
            let history = chats.entry(chat).or_default();
            if history.contains(message_id) {
                debug!("{chat}: message {message_id} already present, skipping insert");
                return;
            }
            history.push(message);
        }
        self.bus.emit(AppEvent::MessageAppended { chat, message_id });
    }

    /// UPDATE: replace content and mark edited. Absent ids are logged and
    /// dropped, never a crash.
    fn update(&self, chat: ChatKey, updated: Message) {
        let message_id = updated.id;
        let applied = {
            let mut chats = self.chats.lock().unwrap();
            match chats.entry(chat).or_default().get_mut(message_id) {
                Some(existing) => {
                    existing.content = updated.content;
                    existing.is_edited = true;
                    true
                }
                None => false,
            }
        };
        if applied {
            self.bus.emit(AppEvent::MessageUpdated { chat, message_id });
        } else {
            warn!("{chat}: update for unknown message {message_id}, dropped");
        }
    }

    /// DELETE: tombstone in place; the entry is never removed.
    fn delete(&self, chat: ChatKey, message_id: i64) {
        let applied = {
            let mut chats = self.chats.lock().unwrap();
            match chats.entry(chat).or_default().get_mut(message_id) {
                Some(existing) => {
                    existing.tombstone();
                    true
                }
                None => false,
            }
        };
        if applied {
            self.bus.emit(AppEvent::MessageDeleted { chat, message_id });
        } else {
            warn!("{chat}: delete for unknown message {message_id}, dropped");
        }
    }

    /// PIN/UNPIN: set the pin state from the carried message.
    fn pin(&self, chat: ChatKey, message: Message, action: PinAction) {
        let message_id = message.id;
        let pinned = action == PinAction::Pin;
        {
            let mut chats = self.chats.lock().unwrap();
            if let Some(existing) = chats.entry(chat).or_default().get_mut(message_id) {
                existing.is_pinned = pinned;
                existing.pinned_by = if pinned { message.pinned_by.clone() } else { None };
            }
        }
        self.bus.emit(AppEvent::PinChanged {
            chat,
            message_id,
            pinned,
        });
    }

    /// REACTION: replace the reactions collection wholesale. Both forms are
    /// idempotent; applying the same aggregate twice is a no-op.
    fn reaction(&self, chat: ChatKey, update: ReactionUpdate) {
        let (message_id, reactions): (i64, Vec<Reaction>) = match update {
            ReactionUpdate::Delta {
                message_id,
                reactions,
            } => {
                self.note_reaction_target(chat, message_id);
                (message_id, reactions)
            }
            ReactionUpdate::Snapshot(reactions) => {
                match *self.reaction_target.lock().unwrap() {
                    Some((target_chat, id)) if target_chat == chat => (id, reactions),
                    _ => {
                        warn!("{chat}: snapshot reaction event without a target, dropped");
                        return;
                    }
                }
            }
        };

        let applied = {
            let mut chats = self.chats.lock().unwrap();
            match chats.entry(chat).or_default().get_mut(message_id) {
                Some(existing) => {
                    existing.reactions = reactions;
                    true
                }
                None => false,
            }
        };
        if applied {
            self.bus.emit(AppEvent::ReactionsChanged { chat, message_id });
        } else {
            warn!("{chat}: reactions for unknown message {message_id}, dropped");
        }
    }

    /// MESSAGE_STATUS: only messages the local user sent change status.
    fn status(&self, chat: Option<ChatKey>, update: StatusUpdate) {
        let Some(local_id) = self.local_user() else {
            warn!("status update before identity is known, dropped");
            return;
        };

        let changed = self.with_message(chat, update.message_id, |message| {
            if message.sender_id != local_id {
                debug!(
                    "ignoring status update for message {} not sent by local user",
                    message.id
                );
                return None;
            }
            if message.is_deleted {
                return None;
            }
            message.status = update.status;
            if let Some(reader) = &update.read_by {
                message.read_by = Some(reader.clone());
            }
            Some(update.status)
        });

        if let Some((chat, status)) = changed {
            self.bus.emit(AppEvent::MessageStatusChanged {
                chat,
                message_id: update.message_id,
                status,
            });
        }
    }

    /// MESSAGE_READ: same ownership guard; status becomes Read and the
    /// reader's display name is recorded.
    fn read(&self, chat: Option<ChatKey>, receipt: ReadReceipt) {
        let Some(local_id) = self.local_user() else {
            warn!("read receipt before identity is known, dropped");
            return;
        };

        let changed = self.with_message(chat, receipt.message_id, |message| {
            if message.sender_id != local_id || message.is_deleted {
                return None;
            }
            message.status = MessageStatus::Read;
            message.read_by = receipt.reader_name.clone();
            Some(MessageStatus::Read)
        });

        if let Some((chat, status)) = changed {
            self.bus.emit(AppEvent::MessageStatusChanged {
                chat,
                message_id: receipt.message_id,
                status,
            });
        }
    }

    /// MESSAGE_BATCH_READ: the single-receipt path applied per id.
    fn batch_read(&self, chat: Option<ChatKey>, receipt: BatchReadReceipt) {
        for message_id in &receipt.message_ids {
            self.read(
                chat,
                ReadReceipt {
                    message_id: *message_id,
                    reader_id: receipt.reader_id,
                    reader_name: receipt.reader_name.clone(),
                },
            );
        }
    }

    /// Run a mutation against a message, located either in the given chat
    /// or, for personal-queue events that carry no chat scope, in whichever
    /// chat holds the id. Returns the chat and the mutation's result.
    fn with_message<T>(
        &self,
        chat: Option<ChatKey>,
        message_id: i64,
        mutate: impl FnOnce(&mut Message) -> Option<T>,
    ) -> Option<(ChatKey, T)> {
        let mut chats = self.chats.lock().unwrap();
        match chat {
            Some(chat) => {
                let message = chats.entry(chat).or_default().get_mut(message_id)?;
                mutate(message).map(|t| (chat, t))
            }
            None => {
                for (key, history) in chats.iter_mut() {
                    if let Some(message) = history.get_mut(message_id) {
                        return mutate(message).map(|t| (*key, t));
                    }
                }
                debug!("message {message_id} not found in any chat, dropped");
                None
            }
        }
    }
}
