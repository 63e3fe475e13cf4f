//! Application context: explicit construction and wiring of every
//! component.
//!
//! There are no global singletons; each component is an instance created
//! here and handed to whoever needs it. The context also owns the
//! orchestration the components deliberately do not know about: the
//! connect-and-load side effect of authentication, the
//! refresh-then-reconnect path on auth failures, and logout teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use relay_api::endpoints::auth::SignUpParams;
use relay_api::ApiClient;
use relay_core::config::{AppConfig, ConfigHandle};
use relay_core::error::RelayResult;
use relay_models::Session;
use relay_socket::events::{
    BatchReadReceipt, GlobalEventObserver, PresenceUpdate, ReadReceipt, StatusUpdate,
};
use relay_socket::{ReconnectConfig, SocketManager, Transport};

use crate::chat::ChatController;
use crate::directory::Directory;
use crate::event_bus::{AppEvent, EventBus};
use crate::reconcile::ReconcileEngine;
use crate::session::SessionStore;
use crate::storage::KeyValueStore;
use crate::typing::TypingCoordinator;

/// Routes the session-wide global subscriptions into the engine and the
/// directory.
struct AppGlobalObserver {
    engine: Arc<ReconcileEngine>,
    directory: Directory,
}

impl GlobalEventObserver for AppGlobalObserver {
    fn on_presence(&self, update: PresenceUpdate) {
        self.directory.apply_presence(update);
    }

    fn on_status(&self, update: StatusUpdate) {
        self.engine.apply_status(update);
    }

    fn on_read(&self, receipt: ReadReceipt) {
        self.engine.apply_read(receipt);
    }

    fn on_batch_read(&self, receipt: BatchReadReceipt) {
        self.engine.apply_batch_read(receipt);
    }
}

/// The assembled client.
pub struct RelayApp {
    config: ConfigHandle,
    api: ApiClient,
    bus: EventBus,
    session: SessionStore,
    socket: SocketManager,
    engine: Arc<ReconcileEngine>,
    typing: TypingCoordinator,
    chat: ChatController,
    directory: Directory,
}

impl RelayApp {
    /// Construct and wire every component.
    pub async fn new(
        config: AppConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn KeyValueStore>,
    ) -> RelayResult<Self> {
        let bus = EventBus::new(256);
        let api = ApiClient::new(&config.server)?;
        let engine = Arc::new(ReconcileEngine::new(bus.clone()));
        let directory = Directory::new(bus.clone());

        let (typing_tx, mut typing_rx) = mpsc::unbounded_channel();
        let typing = TypingCoordinator::with_idle_timeout(
            bus.clone(),
            typing_tx,
            Duration::from_millis(config.chat.typing_idle_timeout_ms),
        );

        let socket = SocketManager::with_reconnect_config(
            transport,
            ReconnectConfig {
                base_delay: Duration::from_secs(config.connection.reconnect_base_delay_secs),
                max_delay: Duration::from_secs(config.connection.reconnect_max_delay_secs),
                max_attempts: config.connection.max_reconnect_attempts,
            },
        );
        socket
            .set_global_observer(Arc::new(AppGlobalObserver {
                engine: engine.clone(),
                directory: directory.clone(),
            }))
            .await;

        let session = SessionStore::new(api.clone(), storage, bus.clone());
        let chat = ChatController::new(
            api.clone(),
            socket.clone(),
            engine.clone(),
            typing.clone(),
            &config.chat,
        );

        // Pump debounced typing signals out through the socket.
        {
            let socket = socket.clone();
            tokio::spawn(async move {
                while let Some(signal) = typing_rx.recv().await {
                    socket.send_typing(&signal.chat, signal.typing).await;
                }
            });
        }

        // Reconnect with the fresh token after background refreshes; the
        // connect call is an idempotent no-op while already connected.
        {
            let socket = socket.clone();
            let session = session.clone();
            let mut events = bus.subscribe();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(AppEvent::SessionRefreshed) => {
                            if let Some(current) = session.session().await {
                                if let Err(e) = socket
                                    .connect(&current.access_token, &current.user)
                                    .await
                                {
                                    warn!("reconnect after refresh failed: {e}");
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            });
        }

        Ok(Self {
            config: ConfigHandle::new(config),
            api,
            bus,
            session,
            socket,
            engine,
            typing,
            chat,
            directory,
        })
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn session_store(&self) -> &SessionStore {
        &self.session
    }

    pub fn socket(&self) -> &SocketManager {
        &self.socket
    }

    pub fn engine(&self) -> &Arc<ReconcileEngine> {
        &self.engine
    }

    pub fn typing(&self) -> &TypingCoordinator {
        &self.typing
    }

    pub fn chat(&self) -> &ChatController {
        &self.chat
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Sign in, then connect the socket and load the directory.
    pub async fn login(&self, username: &str, password: &str) -> RelayResult<Session> {
        let session = self.session.login(username, password).await?;
        self.connect_and_load(&session).await;
        Ok(session)
    }

    /// Register, then connect the socket and load the directory.
    pub async fn register(&self, params: SignUpParams) -> RelayResult<Session> {
        let session = self.session.register(params).await?;
        self.connect_and_load(&session).await;
        Ok(session)
    }

    /// Restore a persisted session; when one exists, connect and load.
    pub async fn restore(&self) -> RelayResult<Option<Session>> {
        let Some(session) = self.session.restore().await? else {
            return Ok(None);
        };
        self.connect_and_load(&session).await;
        Ok(Some(session))
    }

    /// Explicit reconnect affordance for after the retry budget is spent.
    pub async fn reconnect(&self) -> RelayResult<bool> {
        match self.session.session().await {
            Some(session) => {
                self.socket
                    .connect(&session.access_token, &session.user)
                    .await
            }
            None => Ok(false),
        }
    }

    /// Leave the active chat, close the socket, destroy the session.
    pub async fn logout(&self) {
        self.chat.leave().await;
        self.socket.disconnect().await;
        self.session.logout().await;
        self.engine.set_local_user(None);
        self.typing.set_local_user(None);
        info!("application logged out");
    }

    /// The side effect of every successful authentication: identity handed
    /// to the guards, socket connected (with the refresh-then-reconnect
    /// path on auth rejection), directory loaded.
    async fn connect_and_load(&self, session: &Session) {
        self.engine.set_local_user(Some(session.user.id));
        self.typing.set_local_user(Some(session.user.id));

        match self
            .socket
            .connect(&session.access_token, &session.user)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_auth() => {
                info!("handshake rejected, refreshing credentials");
                match self.session.refresh().await {
                    Ok(fresh) => {
                        if let Err(e) =
                            self.socket.connect(&fresh.access_token, &fresh.user).await
                        {
                            warn!("reconnect after refresh failed: {e}");
                        }
                    }
                    Err(e) => warn!("refresh after auth rejection failed: {e}"),
                }
            }
            // The manager's bounded retry loop handles everything else.
            Err(e) => warn!("socket connect failed: {e}"),
        }

        self.directory.load(&self.api).await;
    }
}
