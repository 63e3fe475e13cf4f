//! Typing presence coordinator.
//!
//! Converts noisy local keystroke events into a rate-limited outgoing
//! signal, and aggregates remote per-user typing booleans into a stable
//! display set. Outgoing signals leave through an injected channel so the
//! coordinator stays decoupled from the socket layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use relay_core::constants;
use relay_models::ChatKey;
use relay_socket::events::TypingEvent;

use crate::event_bus::{AppEvent, EventBus};

/// An outgoing typing signal for a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingSignal {
    pub chat: ChatKey,
    pub typing: bool,
}

struct TypingInner {
    bus: EventBus,
    outgoing: mpsc::UnboundedSender<TypingSignal>,
    idle_timeout: Duration,
    local_user_id: Mutex<Option<i64>>,
    /// The chat the local user is currently marked as typing in.
    currently_typing: Mutex<Option<ChatKey>>,
    /// The single resettable inactivity timer.
    idle_timer: Mutex<Option<JoinHandle<()>>>,
    /// Remote typers per chat, in arrival order.
    remote: Mutex<HashMap<ChatKey, Vec<String>>>,
}

/// Typing presence coordinator. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct TypingCoordinator {
    inner: Arc<TypingInner>,
}

impl TypingCoordinator {
    /// Create a coordinator with the default inactivity window.
    pub fn new(bus: EventBus, outgoing: mpsc::UnboundedSender<TypingSignal>) -> Self {
        Self::with_idle_timeout(
            bus,
            outgoing,
            Duration::from_millis(constants::TYPING_IDLE_TIMEOUT_MS),
        )
    }

    /// Create a coordinator with a custom inactivity window.
    pub fn with_idle_timeout(
        bus: EventBus,
        outgoing: mpsc::UnboundedSender<TypingSignal>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(TypingInner {
                bus,
                outgoing,
                idle_timeout,
                local_user_id: Mutex::new(None),
                currently_typing: Mutex::new(None),
                idle_timer: Mutex::new(None),
                remote: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Set or clear the local identity; remote events for it are discarded.
    pub fn set_local_user(&self, user_id: Option<i64>) {
        *self.inner.local_user_id.lock().unwrap() = user_id;
    }

    /// Whether the local user is currently marked as typing.
    pub fn is_currently_typing(&self) -> bool {
        self.inner.currently_typing.lock().unwrap().is_some()
    }

    /// Handle one local input change in the given chat.
    ///
    /// The first change emits `typing=true` once; every change resets the
    /// inactivity timer, and only its uninterrupted expiry emits
    /// `typing=false`.
    pub fn handle_input(&self, chat: ChatKey) {
        {
            let mut current = self.inner.currently_typing.lock().unwrap();
            if *current != Some(chat) {
                self.send_signal(chat, true);
                *current = Some(chat);
            }
        }

        // Reset the single inactivity timer.
        let coordinator = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(coordinator.inner.idle_timeout).await;
            let mut current = coordinator.inner.currently_typing.lock().unwrap();
            if *current == Some(chat) {
                *current = None;
                coordinator.send_signal(chat, false);
            }
        });
        let mut guard = self.inner.idle_timer.lock().unwrap();
        if let Some(previous) = guard.replace(timer) {
            previous.abort();
        }
    }

    /// Force-emit `typing=false` immediately, bypassing the timer. Called
    /// when a message is sent.
    pub fn force_stop(&self, chat: ChatKey) {
        if let Some(timer) = self.inner.idle_timer.lock().unwrap().take() {
            timer.abort();
        }
        *self.inner.currently_typing.lock().unwrap() = None;
        self.send_signal(chat, false);
    }

    fn send_signal(&self, chat: ChatKey, typing: bool) {
        let _ = self.inner.outgoing.send(TypingSignal { chat, typing });
    }

    /// Apply a remote typing event for a chat.
    ///
    /// Events for the local identity are discarded. The set is idempotent:
    /// duplicate `true` events for the same user are harmless.
    pub fn handle_remote(&self, chat: ChatKey, event: TypingEvent) {
        if *self.inner.local_user_id.lock().unwrap() == Some(event.user_id) {
            debug!("ignoring own typing notification");
            return;
        }

        let summary = {
            let mut remote = self.inner.remote.lock().unwrap();
            let users = remote.entry(chat).or_default();
            if event.is_typing {
                if !users.contains(&event.username) {
                    users.push(event.username);
                }
            } else {
                users.retain(|name| name != &event.username);
            }
            summary_text(users)
        };

        self.inner.bus.emit(AppEvent::TypingChanged { chat, summary });
    }

    /// Names currently typing in a chat, in arrival order.
    pub fn typing_users(&self, chat: &ChatKey) -> Vec<String> {
        self.inner
            .remote
            .lock()
            .unwrap()
            .get(chat)
            .cloned()
            .unwrap_or_default()
    }

    /// Display text for a chat's typing set, absent when empty.
    pub fn summary(&self, chat: &ChatKey) -> Option<String> {
        summary_text(&self.typing_users(chat))
    }

    /// Clear the remote typing set for a chat. Called unconditionally on
    /// chat deactivation so no stale typers survive a reopen.
    pub fn clear_remote(&self, chat: ChatKey) {
        let had_typers = self
            .inner
            .remote
            .lock()
            .unwrap()
            .remove(&chat)
            .map(|users| !users.is_empty())
            .unwrap_or(false);
        if had_typers {
            self.inner
                .bus
                .emit(AppEvent::TypingChanged { chat, summary: None });
        }
    }
}

/// Three-tier display policy: one name, two names, then a count.
fn summary_text(users: &[String]) -> Option<String> {
    match users {
        [] => None,
        [one] => Some(format!("{one} is typing")),
        [a, b] => Some(format!("{a} and {b} are typing")),
        many => Some(format!("{} people are typing", many.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user_id: i64, username: &str, is_typing: bool) -> TypingEvent {
        TypingEvent {
            user_id,
            username: username.to_string(),
            is_typing,
        }
    }

    fn coordinator(
        idle: Duration,
    ) -> (TypingCoordinator, mpsc::UnboundedReceiver<TypingSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = TypingCoordinator::with_idle_timeout(EventBus::new(16), tx, idle);
        coordinator.set_local_user(Some(1));
        (coordinator, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TypingSignal>) -> Vec<TypingSignal> {
        let mut signals = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            signals.push(signal);
        }
        signals
    }

    #[tokio::test]
    async fn test_burst_emits_single_true_then_single_false() {
        let (coordinator, mut rx) = coordinator(Duration::from_millis(50));
        let chat = ChatKey::conversation(42);

        for _ in 0..10 {
            coordinator.handle_input(chat);
        }
        assert_eq!(
            drain(&mut rx),
            vec![TypingSignal { chat, typing: true }],
            "a burst emits exactly one typing=true"
        );
        assert!(coordinator.is_currently_typing());

        // Silence past the inactivity window emits exactly one false.
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(drain(&mut rx), vec![TypingSignal { chat, typing: false }]);
        assert!(!coordinator.is_currently_typing());
    }

    #[tokio::test]
    async fn test_input_resets_timer() {
        let (coordinator, mut rx) = coordinator(Duration::from_millis(80));
        let chat = ChatKey::conversation(42);

        coordinator.handle_input(chat);
        tokio::time::sleep(Duration::from_millis(40)).await;
        coordinator.handle_input(chat);
        tokio::time::sleep(Duration::from_millis(40)).await;

        // 80ms of wall time but never 80ms of silence: no false yet.
        assert_eq!(drain(&mut rx), vec![TypingSignal { chat, typing: true }]);
        assert!(coordinator.is_currently_typing());
    }

    #[tokio::test]
    async fn test_force_stop_bypasses_timer() {
        let (coordinator, mut rx) = coordinator(Duration::from_secs(60));
        let chat = ChatKey::conversation(42);

        coordinator.handle_input(chat);
        coordinator.force_stop(chat);

        assert_eq!(
            drain(&mut rx),
            vec![
                TypingSignal { chat, typing: true },
                TypingSignal { chat, typing: false },
            ]
        );
        assert!(!coordinator.is_currently_typing());
    }

    #[tokio::test]
    async fn test_remote_events_build_display_set() {
        let (coordinator, _rx) = coordinator(Duration::from_secs(60));
        let chat = ChatKey::room(5);

        coordinator.handle_remote(chat, event(2, "bob", true));
        assert_eq!(coordinator.summary(&chat).unwrap(), "bob is typing");

        coordinator.handle_remote(chat, event(3, "carol", true));
        assert_eq!(
            coordinator.summary(&chat).unwrap(),
            "bob and carol are typing"
        );

        coordinator.handle_remote(chat, event(4, "dave", true));
        assert_eq!(coordinator.summary(&chat).unwrap(), "3 people are typing");

        coordinator.handle_remote(chat, event(3, "carol", false));
        coordinator.handle_remote(chat, event(4, "dave", false));
        assert_eq!(coordinator.summary(&chat).unwrap(), "bob is typing");
    }

    #[tokio::test]
    async fn test_remote_set_is_idempotent() {
        let (coordinator, _rx) = coordinator(Duration::from_secs(60));
        let chat = ChatKey::room(5);

        coordinator.handle_remote(chat, event(2, "bob", true));
        coordinator.handle_remote(chat, event(2, "bob", true));
        assert_eq!(coordinator.typing_users(&chat), vec!["bob".to_string()]);

        coordinator.handle_remote(chat, event(2, "bob", false));
        coordinator.handle_remote(chat, event(2, "bob", false));
        assert!(coordinator.typing_users(&chat).is_empty());
    }

    #[tokio::test]
    async fn test_own_events_are_discarded() {
        let (coordinator, _rx) = coordinator(Duration::from_secs(60));
        let chat = ChatKey::room(5);

        coordinator.handle_remote(chat, event(1, "me", true));
        assert!(coordinator.typing_users(&chat).is_empty());
    }

    #[tokio::test]
    async fn test_clear_remote_drops_set() {
        let (coordinator, _rx) = coordinator(Duration::from_secs(60));
        let chat = ChatKey::room(5);

        coordinator.handle_remote(chat, event(2, "bob", true));
        coordinator.clear_remote(chat);
        assert!(coordinator.typing_users(&chat).is_empty());
        assert!(coordinator.summary(&chat).is_none());
    }

    #[test]
    fn test_summary_tiers() {
        assert_eq!(summary_text(&[]), None);
        assert_eq!(
            summary_text(&["a".into()]).unwrap(),
            "a is typing"
        );
        assert_eq!(
            summary_text(&["a".into(), "b".into()]).unwrap(),
            "a and b are typing"
        );
        assert_eq!(
            summary_text(&["a".into(), "b".into(), "c".into(), "d".into()]).unwrap(),
            "4 people are typing"
        );
    }
}
