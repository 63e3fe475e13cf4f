//! Socket connection manager.
//!
//! Owns the single transport connection, the global and per-chat
//! subscription sets, and the bounded reconnection policy. All publish
//! operations are fire-and-forget and report `false` when not connected;
//! the caller decides whether that becomes a user-visible failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use relay_core::constants;
use relay_core::error::{RelayError, RelayResult};
use relay_models::{ChatKey, User};

use crate::destinations;
use crate::events::{
    BatchReadReceipt, ChatEvent, ChatEventObserver, ConnectionState, GlobalEventObserver,
    OutgoingMessage, PresenceUpdate, ReadReceipt, StatusUpdate,
};
use crate::transport::Transport;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base delay before the first retry. Doubles per attempt.
    pub base_delay: Duration,
    /// Cap on the backoff delay.
    pub max_delay: Duration,
    /// Maximum number of handshake attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(constants::RECONNECT_BASE_DELAY_SECS),
            max_delay: Duration::from_secs(constants::RECONNECT_MAX_DELAY_SECS),
            max_attempts: constants::MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Handle identifying one live chat subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    pub id: Uuid,
    pub destination: String,
}

/// One live chat subscription: its handle and the pump task.
struct ChatSubscription {
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    reconnect: ReconnectConfig,
    state: Mutex<ConnectionState>,
    state_tx: watch::Sender<ConnectionState>,
    /// Consecutive failed handshake attempts.
    retry_count: Mutex<u32>,
    /// Bearer token used for the handshake; cleared on disconnect so
    /// post-logout retries are abandoned.
    credential: Mutex<Option<String>>,
    /// Set when the last handshake failed for authorization reasons.
    /// The caller must refresh credentials and call `connect` explicitly.
    auth_failed: AtomicBool,
    global_observer: Mutex<Option<Arc<dyn GlobalEventObserver>>>,
    global_tasks: Mutex<Vec<JoinHandle<()>>>,
    chat_subs: Mutex<HashMap<ChatKey, ChatSubscription>>,
    close_task: Mutex<Option<JoinHandle<()>>>,
    retry_task: Mutex<Option<JoinHandle<()>>>,
}

/// Socket connection manager.
///
/// State machine: Disconnected → Connecting → Connected → Disconnected on
/// close, re-entering Connecting on retry, terminal Disconnected after the
/// retry budget is spent or a manual disconnect.
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct SocketManager {
    inner: Arc<Inner>,
}

impl SocketManager {
    /// Create a new SocketManager over a transport with default
    /// reconnection behavior.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_reconnect_config(transport, ReconnectConfig::default())
    }

    /// Create a new SocketManager with custom reconnection configuration.
    pub fn with_reconnect_config(transport: Arc<dyn Transport>, config: ReconnectConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                transport,
                reconnect: config,
                state: Mutex::new(ConnectionState::Disconnected),
                state_tx,
                retry_count: Mutex::new(0),
                credential: Mutex::new(None),
                auth_failed: AtomicBool::new(false),
                global_observer: Mutex::new(None),
                global_tasks: Mutex::new(Vec::new()),
                chat_subs: Mutex::new(HashMap::new()),
                close_task: Mutex::new(None),
                retry_task: Mutex::new(None),
            }),
        }
    }

    /// Register the observer for the session-wide global subscriptions.
    pub async fn set_global_observer(&self, observer: Arc<dyn GlobalEventObserver>) {
        *self.inner.global_observer.lock().await = Some(observer);
    }

    /// Get the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.lock().await
    }

    /// Whether the manager is currently connected.
    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Update the connection state and notify watchers.
    async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.inner.state.lock().await;
        if *state != new_state {
            info!("socket state: {} -> {}", *state, new_state);
            *state = new_state;
            let _ = self.inner.state_tx.send(new_state);
        }
    }

    /// Open the connection and perform the handshake.
    ///
    /// Idempotent: a no-op resolving `true` when already Connected or
    /// Connecting, so duplicate calls cannot open duplicate sockets. On
    /// handshake success the three global subscriptions are established.
    /// An authorization rejection yields `RelayError::Auth` and no retry is
    /// scheduled; any other failure yields `RelayError::Connection` and the
    /// bounded retry loop takes over.
    pub async fn connect(&self, token: &str, identity: &User) -> RelayResult<bool> {
        // Always take the newest credential so a later retry does not use a
        // stale token.
        *self.inner.credential.lock().await = Some(token.to_string());
        self.inner.auth_failed.store(false, Ordering::SeqCst);

        let current = self.state().await;
        if current == ConnectionState::Connected || current == ConnectionState::Connecting {
            debug!("already {current}, skipping connect");
            return Ok(true);
        }

        info!("socket connecting as {}", identity.username);
        *self.inner.retry_count.lock().await = 0;

        // Tear down any stale transport before opening a new one.
        self.inner.transport.disconnect().await;

        match self.establish(token.to_string()).await {
            Ok(()) => Ok(true),
            Err(e) => {
                if !e.is_auth() {
                    self.schedule_retry();
                }
                Err(e)
            }
        }
    }

    /// One handshake attempt plus post-handshake setup. Does not schedule
    /// retries itself.
    async fn establish(&self, token: String) -> RelayResult<()> {
        self.set_state(ConnectionState::Connecting).await;

        match self.inner.transport.connect(&token).await {
            Ok(()) => {
                self.set_state(ConnectionState::Connected).await;
                *self.inner.retry_count.lock().await = 0;
                self.inner.auth_failed.store(false, Ordering::SeqCst);
                self.setup_global_subscriptions().await;
                self.spawn_close_watcher().await;
                info!("socket connected");
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected).await;
                *self.inner.retry_count.lock().await += 1;
                // Normalize to the two distinguished handshake outcomes.
                let err = match e {
                    RelayError::Auth(_) | RelayError::Connection(_) => e,
                    other if other.is_auth() => RelayError::Auth(other.to_string()),
                    other => RelayError::Connection(other.to_string()),
                };
                if err.is_auth() {
                    warn!("handshake rejected for authorization: {err}");
                    self.inner.auth_failed.store(true, Ordering::SeqCst);
                } else {
                    warn!("handshake failed: {err}");
                }
                Err(err)
            }
        }
    }

    /// Establish the session-wide subscriptions. Re-run after every
    /// successful handshake, since nothing survives a close.
    async fn setup_global_subscriptions(&self) {
        self.clear_global_subscriptions().await;

        let Some(observer) = self.inner.global_observer.lock().await.clone() else {
            debug!("no global observer registered, skipping global subscriptions");
            return;
        };

        let mut tasks = Vec::new();

        // Presence broadcast: bare payloads, no envelope.
        match self
            .inner
            .transport
            .subscribe(destinations::TOPIC_USER_STATUS)
            .await
        {
            Ok(mut rx) => {
                let obs = observer.clone();
                tasks.push(tokio::spawn(async move {
                    while let Some(frame) = rx.recv().await {
                        match serde_json::from_value::<PresenceUpdate>(frame) {
                            Ok(update) => obs.on_presence(update),
                            Err(e) => warn!("dropping malformed presence frame: {e}"),
                        }
                    }
                }));
            }
            Err(e) => warn!("presence subscription failed: {e}"),
        }

        // Personal message-status queue: enveloped MESSAGE_STATUS frames.
        match self
            .inner
            .transport
            .subscribe(destinations::QUEUE_MESSAGE_STATUS)
            .await
        {
            Ok(mut rx) => {
                let obs = observer.clone();
                tasks.push(tokio::spawn(async move {
                    while let Some(frame) = rx.recv().await {
                        match parse_enveloped::<StatusUpdate>(&frame, "MESSAGE_STATUS") {
                            Ok(update) => obs.on_status(update),
                            Err(e) => warn!("dropping malformed status frame: {e}"),
                        }
                    }
                }));
            }
            Err(e) => warn!("message-status subscription failed: {e}"),
        }

        // Personal read-receipt queue: MESSAGE_READ and MESSAGE_BATCH_READ.
        match self
            .inner
            .transport
            .subscribe(destinations::QUEUE_READ_RECEIPTS)
            .await
        {
            Ok(mut rx) => {
                let obs = observer.clone();
                tasks.push(tokio::spawn(async move {
                    while let Some(frame) = rx.recv().await {
                        let kind = frame
                            .get("type")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let result: RelayResult<()> = match kind.as_str() {
                            "MESSAGE_READ" => {
                                parse_enveloped::<ReadReceipt>(&frame, "MESSAGE_READ")
                                    .map(|r| obs.on_read(r))
                            }
                            "MESSAGE_BATCH_READ" => {
                                parse_enveloped::<BatchReadReceipt>(&frame, "MESSAGE_BATCH_READ")
                                    .map(|r| obs.on_batch_read(r))
                            }
                            other => Err(RelayError::Serialization(format!(
                                "unknown read-receipt type: {other}"
                            ))),
                        };
                        if let Err(e) = result {
                            warn!("dropping malformed read-receipt frame: {e}");
                        }
                    }
                }));
            }
            Err(e) => warn!("read-receipt subscription failed: {e}"),
        }

        *self.inner.global_tasks.lock().await = tasks;
        debug!("global subscriptions established");
    }

    /// Watch for transport closes; an unclean close clears all
    /// subscriptions and invokes the retry policy.
    async fn spawn_close_watcher(&self) {
        let mut closes = self.inner.transport.closes();
        let manager = self.clone();
        let task = tokio::spawn(async move {
            loop {
                match closes.recv().await {
                    Ok(close) if !close.clean => {
                        warn!("transport closed unexpectedly");
                        manager.handle_unclean_close().await;
                        return;
                    }
                    Ok(_) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        let mut guard = self.inner.close_task.lock().await;
        if let Some(old) = guard.replace(task) {
            old.abort();
        }
    }

    /// Unclean close: drop every subscription (the server will not
    /// redeliver missed events) and retry.
    async fn handle_unclean_close(&self) {
        if self.state().await == ConnectionState::Disconnected {
            return;
        }
        self.set_state(ConnectionState::Disconnected).await;
        self.clear_global_subscriptions().await;
        self.clear_chat_subscriptions(false).await;
        self.schedule_retry();
    }

    /// Start the bounded retry loop, replacing any prior one.
    ///
    /// Abandoned entirely when no credential is stored (post-logout) or the
    /// previous failure was an authorization error.
    fn schedule_retry(&self) {
        let manager = self.clone();
        let task = tokio::spawn(async move {
            let mut backoff_index: u32 = 0;
            loop {
                if manager.inner.auth_failed.load(Ordering::SeqCst) {
                    info!("not retrying: credentials were rejected");
                    return;
                }
                let attempts = *manager.inner.retry_count.lock().await;
                if attempts >= manager.inner.reconnect.max_attempts {
                    warn!(
                        "max connection attempts ({}) reached, giving up",
                        manager.inner.reconnect.max_attempts
                    );
                    return;
                }
                let Some(token) = manager.inner.credential.lock().await.clone() else {
                    info!("not retrying: no credential available");
                    return;
                };

                let delay = manager.reconnect_delay(backoff_index);
                info!(
                    "reconnection attempt {} in {:.1}s",
                    attempts + 1,
                    delay.as_secs_f64()
                );
                sleep(delay).await;

                let current = manager.state().await;
                if current != ConnectionState::Disconnected {
                    debug!("reconnection aborted: state is {current}");
                    return;
                }

                match manager.establish(token).await {
                    Ok(()) => {
                        info!("reconnected after {} attempt(s)", attempts + 1);
                        return;
                    }
                    Err(e) if e.is_auth() => {
                        // Caller must refresh credentials and reconnect.
                        return;
                    }
                    Err(_) => {
                        backoff_index += 1;
                    }
                }
            }
        });

        let manager = self.clone();
        tokio::spawn(async move {
            let mut guard = manager.inner.retry_task.lock().await;
            if let Some(old) = guard.replace(task) {
                old.abort();
            }
        });
    }

    /// Backoff delay for the given retry index: base doubled per attempt,
    /// capped at the configured maximum.
    pub fn reconnect_delay(&self, attempt_index: u32) -> Duration {
        let base = self.inner.reconnect.base_delay;
        let shifted = base.saturating_mul(1u32 << attempt_index.min(16));
        shifted.min(self.inner.reconnect.max_delay)
    }

    /// Open the single subscription for a chat.
    ///
    /// Calling this again for the same key first cancels the previous
    /// subscription, so a key can never hold two live subscriptions.
    /// Frames are validated once and dispatched by tag to the observer.
    pub async fn subscribe_to_chat(
        &self,
        chat: ChatKey,
        observer: Arc<dyn ChatEventObserver>,
    ) -> RelayResult<SubscriptionHandle> {
        if !self.is_connected().await {
            return Err(RelayError::Connection(
                "cannot subscribe: not connected".into(),
            ));
        }

        // Cancel any previous subscription for this key first.
        self.unsubscribe_chat(&chat).await;

        let topic = destinations::chat_topic(&chat);
        let mut rx = self.inner.transport.subscribe(&topic).await?;

        let task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                match ChatEvent::parse(&frame) {
                    Ok(ChatEvent::Message(event)) => {
                        debug!("{chat}: {} event", event.label());
                        observer.on_message(chat, event);
                    }
                    Ok(ChatEvent::Typing(event)) => observer.on_typing(chat, event),
                    Err(e) => warn!("{chat}: dropping malformed frame: {e}"),
                }
            }
        });

        let handle = SubscriptionHandle {
            id: Uuid::new_v4(),
            destination: topic,
        };
        let previous = self.inner.chat_subs.lock().await.insert(
            chat,
            ChatSubscription {
                handle: handle.clone(),
                task,
            },
        );
        if let Some(previous) = previous {
            // Concurrent subscribe for the same key; last one wins.
            previous.task.abort();
        }

        debug!("subscribed to {}", handle.destination);
        Ok(handle)
    }

    /// Cancel and remove the subscription for a chat. No-op when absent.
    pub async fn unsubscribe_chat(&self, chat: &ChatKey) {
        let removed = self.inner.chat_subs.lock().await.remove(chat);
        if let Some(sub) = removed {
            sub.task.abort();
            self.inner
                .transport
                .unsubscribe(&sub.handle.destination)
                .await;
            debug!("cleared chat subscription: {chat}");
        }
    }

    /// Number of live chat subscriptions.
    pub async fn chat_subscription_count(&self) -> usize {
        self.inner.chat_subs.lock().await.len()
    }

    async fn clear_global_subscriptions(&self) {
        let tasks = std::mem::take(&mut *self.inner.global_tasks.lock().await);
        for task in tasks {
            task.abort();
        }
    }

    async fn clear_chat_subscriptions(&self, notify_transport: bool) {
        let drained: Vec<(ChatKey, ChatSubscription)> =
            self.inner.chat_subs.lock().await.drain().collect();
        for (chat, sub) in drained {
            sub.task.abort();
            if notify_transport {
                self.inner
                    .transport
                    .unsubscribe(&sub.handle.destination)
                    .await;
            }
            debug!("cleared chat subscription: {chat}");
        }
    }

    /// Fire-and-forget publish. Returns false when not connected or the
    /// transport rejects the send; this layer never retries sends.
    pub async fn publish(&self, destination: &str, payload: serde_json::Value) -> bool {
        if !self.is_connected().await {
            debug!("publish to {destination} skipped: not connected");
            return false;
        }
        match self.inner.transport.send(destination, payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!("publish to {destination} failed: {e}");
                false
            }
        }
    }

    /// Publish a chat message to the chat's send destination.
    pub async fn send_chat_message(&self, chat: &ChatKey, message: &OutgoingMessage) -> bool {
        match serde_json::to_value(message) {
            Ok(payload) => self.publish(&destinations::chat_send(chat), payload).await,
            Err(e) => {
                warn!("failed to serialize outgoing message: {e}");
                false
            }
        }
    }

    /// Publish a typing signal for a chat.
    pub async fn send_typing(&self, chat: &ChatKey, typing: bool) -> bool {
        self.publish(
            &destinations::chat_typing(chat),
            serde_json::json!({ "typing": typing }),
        )
        .await
    }

    /// Best-effort enter-chat control message.
    pub async fn send_chat_enter(&self, chat: &ChatKey) -> bool {
        self.publish(&destinations::chat_enter(chat), serde_json::json!({}))
            .await
    }

    /// Best-effort leave-chat control message.
    pub async fn send_chat_leave(&self, chat: &ChatKey) -> bool {
        self.publish(&destinations::chat_leave(chat), serde_json::json!({}))
            .await
    }

    /// Report a message becoming visible or hidden in the viewport.
    pub async fn send_visibility(&self, message_id: i64, visible: bool) -> bool {
        self.publish(
            destinations::DEST_VISIBILITY,
            serde_json::json!({ "messageId": message_id, "visible": visible }),
        )
        .await
    }

    /// Clean shutdown: clear all subscriptions, drop the credential so no
    /// retry can fire, and close the transport. Safe to call when nothing
    /// is open.
    pub async fn disconnect(&self) {
        if let Some(task) = self.inner.retry_task.lock().await.take() {
            task.abort();
        }
        *self.inner.credential.lock().await = None;
        self.inner.auth_failed.store(false, Ordering::SeqCst);

        self.clear_global_subscriptions().await;
        self.clear_chat_subscriptions(true).await;

        if let Some(task) = self.inner.close_task.lock().await.take() {
            task.abort();
        }

        self.inner.transport.disconnect().await;
        self.set_state(ConnectionState::Disconnected).await;
        info!("socket disconnected");
    }
}

/// Parse an enveloped frame of a known type, returning its payload.
fn parse_enveloped<T: serde::de::DeserializeOwned>(
    frame: &serde_json::Value,
    expected: &str,
) -> RelayResult<T> {
    let kind = frame.get("type").and_then(|v| v.as_str()).unwrap_or_default();
    if kind != expected {
        return Err(RelayError::Serialization(format!(
            "expected {expected} frame, got {kind}"
        )));
    }
    let data = frame
        .get("data")
        .cloned()
        .ok_or_else(|| RelayError::Serialization(format!("{expected} frame without data")))?;
    Ok(serde_json::from_value(data)?)
}
