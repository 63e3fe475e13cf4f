//! Shared test harness: an in-memory transport double plus app wiring.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Mutex};

use relay_client::{MemoryStore, RelayApp};
use relay_core::config::AppConfig;
use relay_core::error::{RelayError, RelayResult};
use relay_core::constants::storage_keys;
use relay_socket::{Transport, TransportClose};

/// How the next handshake attempt should behave.
#[derive(Debug, Clone, Copy)]
pub enum ConnectBehavior {
    Succeed,
    FailAuth,
    FailConnection,
}

/// In-memory transport double.
///
/// Frames are injected per destination with [`MockTransport::push_frame`];
/// outgoing sends are recorded for assertions.
pub struct MockTransport {
    behaviors: Mutex<VecDeque<ConnectBehavior>>,
    connect_calls: AtomicUsize,
    subscriptions: Mutex<HashMap<String, mpsc::UnboundedSender<serde_json::Value>>>,
    sent: Mutex<Vec<(String, serde_json::Value)>>,
    close_tx: broadcast::Sender<TransportClose>,
}

impl MockTransport {
    /// A transport whose handshake always succeeds.
    pub fn new() -> Arc<Self> {
        Self::scripted(vec![])
    }

    /// A transport with scripted handshake outcomes; once the script is
    /// exhausted every handshake succeeds.
    pub fn scripted(behaviors: Vec<ConnectBehavior>) -> Arc<Self> {
        let (close_tx, _) = broadcast::channel(8);
        Arc::new(Self {
            behaviors: Mutex::new(behaviors.into()),
            connect_calls: AtomicUsize::new(0),
            subscriptions: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            close_tx,
        })
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub async fn subscribed_destinations(&self) -> Vec<String> {
        let mut destinations: Vec<String> =
            self.subscriptions.lock().await.keys().cloned().collect();
        destinations.sort();
        destinations
    }

    pub async fn sent(&self) -> Vec<(String, serde_json::Value)> {
        self.sent.lock().await.clone()
    }

    /// Payloads sent to one destination, in order.
    pub async fn sent_to(&self, destination: &str) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(dest, _)| dest == destination)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Deliver a server frame on a subscribed destination.
    pub async fn push_frame(&self, destination: &str, frame: serde_json::Value) {
        let subs = self.subscriptions.lock().await;
        if let Some(tx) = subs.get(destination) {
            let _ = tx.send(frame);
        }
    }

    /// Simulate an unexpected connection drop.
    pub fn drop_uncleanly(&self) {
        let _ = self.close_tx.send(TransportClose { clean: false });
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _token: &str) -> RelayResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .lock()
            .await
            .pop_front()
            .unwrap_or(ConnectBehavior::Succeed);
        match behavior {
            ConnectBehavior::Succeed => Ok(()),
            ConnectBehavior::FailAuth => Err(RelayError::Auth("401 Unauthorized".into())),
            ConnectBehavior::FailConnection => Err(RelayError::Connection("refused".into())),
        }
    }

    async fn subscribe(
        &self,
        destination: &str,
    ) -> RelayResult<mpsc::UnboundedReceiver<serde_json::Value>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions
            .lock()
            .await
            .insert(destination.to_string(), tx);
        Ok(rx)
    }

    async fn unsubscribe(&self, destination: &str) {
        self.subscriptions.lock().await.remove(destination);
    }

    async fn send(&self, destination: &str, payload: serde_json::Value) -> RelayResult<()> {
        self.sent
            .lock()
            .await
            .push((destination.to_string(), payload));
        Ok(())
    }

    async fn disconnect(&self) {
        self.subscriptions.lock().await.clear();
        let _ = self.close_tx.send(TransportClose { clean: true });
    }

    fn closes(&self) -> broadcast::Receiver<TransportClose> {
        self.close_tx.subscribe()
    }
}

/// The local test identity.
pub const LOCAL_USER_ID: i64 = 7;
pub const LOCAL_USERNAME: &str = "alice";

/// App configuration pointing REST at a closed port so network paths fail
/// fast, with short delays for test pacing.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.base_url = "http://127.0.0.1:9".into();
    config.server.api_timeout_ms = 1_000;
    config.server.api_max_retries = 0;
    config.chat.pinned_fetch_delay_ms = 10;
    // Long enough that only an explicit force-stop emits typing=false
    // during a test; the debounce itself is covered by unit tests.
    config.chat.typing_idle_timeout_ms = 10_000;
    config
}

/// Seed the credential store with a valid persisted session.
pub fn seed_session(storage: &MemoryStore) {
    use relay_client::KeyValueStore;
    storage.put(storage_keys::ACCESS_TOKEN, "at-1").unwrap();
    storage.put(storage_keys::REFRESH_TOKEN, "rt-1").unwrap();
    storage
        .put(
            storage_keys::CURRENT_USER,
            &format!(
                r#"{{"id":{LOCAL_USER_ID},"username":"{LOCAL_USERNAME}","fullName":"Alice Nguyen"}}"#
            ),
        )
        .unwrap();
}

/// Build an app over a mock transport and restore the seeded session, so
/// the socket is connected with the test identity.
pub async fn connected_app(transport: Arc<MockTransport>) -> RelayApp {
    let storage = Arc::new(MemoryStore::new());
    seed_session(&storage);
    let app = RelayApp::new(test_config(), transport, storage)
        .await
        .unwrap();
    app.restore()
        .await
        .unwrap()
        .expect("seeded session should restore");
    app
}

/// A MESSAGE/SEND frame as the server delivers it on a chat topic.
pub fn send_frame(id: i64, sender_id: i64, sender_name: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "MESSAGE",
        "action": "SEND",
        "data": {
            "id": id,
            "senderId": sender_id,
            "senderName": sender_name,
            "type": "CHAT",
            "content": content,
            "timestamp": "2025-03-01T09:30:00Z"
        }
    })
}

/// A TYPING frame as the server delivers it on a chat topic.
pub fn typing_frame(user_id: i64, username: &str, is_typing: bool) -> serde_json::Value {
    serde_json::json!({
        "type": "TYPING",
        "action": if is_typing { "START" } else { "STOP" },
        "data": { "userId": user_id, "username": username }
    })
}
