//! Typed event bus for intra-client communication.
//!
//! Uses tokio broadcast channels to decouple components from the rendering
//! layer. Any component can emit events without knowing who is listening,
//! and any number of subscribers can independently consume them.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use relay_models::{ChatKey, MessageStatus};

/// All client-level event types that flow through the event bus.
///
/// These are distinct from raw socket frames -- they represent processed,
/// application-meaningful state changes the rendering layer cares about.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A session was established by login, registration, or restore.
    SessionEstablished { user_id: i64, username: String },
    /// The token pair was refreshed.
    SessionRefreshed,
    /// The session was destroyed (logout or irrecoverable refresh failure).
    SessionCleared,
    /// The canonical list for a chat was replaced from a history page.
    HistoryReplaced { chat: ChatKey },
    /// A new message entered a chat's canonical list.
    MessageAppended { chat: ChatKey, message_id: i64 },
    /// An existing message's content changed (edit).
    MessageUpdated { chat: ChatKey, message_id: i64 },
    /// A message was tombstoned.
    MessageDeleted { chat: ChatKey, message_id: i64 },
    /// A message's reaction aggregate was replaced.
    ReactionsChanged { chat: ChatKey, message_id: i64 },
    /// Delivery status changed for one of the local user's messages.
    MessageStatusChanged {
        chat: ChatKey,
        message_id: i64,
        status: MessageStatus,
    },
    /// A message was pinned or unpinned.
    PinChanged {
        chat: ChatKey,
        message_id: i64,
        pinned: bool,
    },
    /// The pinned-message summary for a chat was refetched.
    PinnedSummaryChanged { chat: ChatKey, count: usize },
    /// The remote typing set for a chat changed; `summary` is the display
    /// text, absent when nobody is typing.
    TypingChanged {
        chat: ChatKey,
        summary: Option<String>,
    },
    /// A contact's presence changed.
    PresenceChanged { user_id: i64, is_online: bool },
    /// The directory listings were reloaded.
    DirectoryUpdated {
        conversations: usize,
        rooms: usize,
        contacts: usize,
    },
}

/// Client-wide event bus backed by a tokio broadcast channel.
///
/// Designed for fan-out delivery: every subscriber gets every event. Slow
/// subscribers that fall behind will receive a `Lagged` error and may miss
/// events, which is acceptable for UI-driven consumers.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to receive application events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => {
                debug!("event_bus: emitted {label} to {count} subscriber(s)");
            }
            Err(_) => {
                debug!("event_bus: no subscribers for {label}");
            }
        }
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Human-readable label for an event (for logging).
fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::SessionEstablished { .. } => "SessionEstablished",
        AppEvent::SessionRefreshed => "SessionRefreshed",
        AppEvent::SessionCleared => "SessionCleared",
        AppEvent::HistoryReplaced { .. } => "HistoryReplaced",
        AppEvent::MessageAppended { .. } => "MessageAppended",
        AppEvent::MessageUpdated { .. } => "MessageUpdated",
        AppEvent::MessageDeleted { .. } => "MessageDeleted",
        AppEvent::ReactionsChanged { .. } => "ReactionsChanged",
        AppEvent::MessageStatusChanged { .. } => "MessageStatusChanged",
        AppEvent::PinChanged { .. } => "PinChanged",
        AppEvent::PinnedSummaryChanged { .. } => "PinnedSummaryChanged",
        AppEvent::TypingChanged { .. } => "TypingChanged",
        AppEvent::PresenceChanged { .. } => "PresenceChanged",
        AppEvent::DirectoryUpdated { .. } => "DirectoryUpdated",
    }
}
