//! Session store: credentials, persistence, and the refresh lifecycle.
//!
//! Holds the current session, persists it across restarts through the
//! key-value store, and keeps the access token fresh on a fixed cadence.
//! All failure paths resolve to typed results; the server's own error text
//! is surfaced unchanged.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use relay_api::endpoints::auth::{AuthResponse, SignUpParams};
use relay_api::ApiClient;
use relay_core::constants::{self, storage_keys};
use relay_core::error::{RelayError, RelayResult};
use relay_models::{Session, User};

use crate::event_bus::{AppEvent, EventBus};
use crate::storage::KeyValueStore;

struct SessionInner {
    api: ApiClient,
    storage: Arc<dyn KeyValueStore>,
    bus: EventBus,
    session: RwLock<Option<Session>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    refresh_interval: Duration,
}

/// Owner of credential/identity state. Cheap to clone; state is shared.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

impl SessionStore {
    /// Create a session store with the default refresh cadence.
    pub fn new(api: ApiClient, storage: Arc<dyn KeyValueStore>, bus: EventBus) -> Self {
        Self::with_refresh_interval(
            api,
            storage,
            bus,
            Duration::from_secs(constants::TOKEN_REFRESH_INTERVAL_SECS),
        )
    }

    /// Create a session store with a custom refresh cadence.
    pub fn with_refresh_interval(
        api: ApiClient,
        storage: Arc<dyn KeyValueStore>,
        bus: EventBus,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                api,
                storage,
                bus,
                session: RwLock::new(None),
                refresh_task: Mutex::new(None),
                refresh_interval,
            }),
        }
    }

    /// The current session, if authenticated.
    pub async fn session(&self) -> Option<Session> {
        self.inner.session.read().await.clone()
    }

    /// The current user, if authenticated.
    pub async fn current_user(&self) -> Option<User> {
        self.inner.session.read().await.as_ref().map(|s| s.user.clone())
    }

    /// Whether a session is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.session.read().await.is_some()
    }

    /// Sign in with username and password.
    ///
    /// Only obviously-cheap checks run locally; the server stays
    /// authoritative, and its error text is returned untouched.
    pub async fn login(&self, username: &str, password: &str) -> RelayResult<Session> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(RelayError::Validation(
                "username and password are required".into(),
            ));
        }

        let response = self.inner.api.sign_in(username, password).await?;
        self.handle_auth_success(response).await
    }

    /// Register a new account.
    pub async fn register(&self, params: SignUpParams) -> RelayResult<Session> {
        if params.username.trim().is_empty()
            || params.email.trim().is_empty()
            || params.password.is_empty()
        {
            return Err(RelayError::Validation(
                "username, email, and password are required".into(),
            ));
        }
        if params.password.len() < constants::MIN_PASSWORD_LEN {
            return Err(RelayError::Validation(format!(
                "password must be at least {} characters",
                constants::MIN_PASSWORD_LEN
            )));
        }

        let response = self.inner.api.sign_up(&params).await?;
        self.handle_auth_success(response).await
    }

    /// Reconstruct the session from the three persisted keys.
    ///
    /// Returns `None` when any key is missing. A parse failure of the
    /// serialized user triggers a full local logout so no half-valid state
    /// survives.
    pub async fn restore(&self) -> RelayResult<Option<Session>> {
        let access_token = self.inner.storage.get(storage_keys::ACCESS_TOKEN);
        let refresh_token = self.inner.storage.get(storage_keys::REFRESH_TOKEN);
        let user_json = self.inner.storage.get(storage_keys::CURRENT_USER);

        let (Some(access_token), Some(refresh_token), Some(user_json)) =
            (access_token, refresh_token, user_json)
        else {
            debug!("no persisted session to restore");
            return Ok(None);
        };

        let user: User = match serde_json::from_str(&user_json) {
            Ok(user) => user,
            Err(e) => {
                warn!("persisted user is corrupt ({e}), clearing stored session");
                self.logout().await;
                return Ok(None);
            }
        };

        let session = Session::new(user, access_token, refresh_token);
        self.install_session(session.clone()).await;
        info!("session restored for {}", session.user.username);
        Ok(Some(session))
    }

    /// Exchange the refresh token for a new pair.
    ///
    /// Any non-success outcome (including transport failure) destroys the
    /// session; there is no silent retry of refresh itself. Retries happen
    /// only at the fixed refresh cadence.
    pub async fn refresh(&self) -> RelayResult<Session> {
        let refresh_token = match self.session().await {
            Some(session) => session.refresh_token,
            None => {
                return Err(RelayError::Auth("no session to refresh".into()));
            }
        };

        match self.inner.api.refresh(&refresh_token).await {
            Ok(response) => {
                let session = self.store_session(response).await?;
                self.inner.bus.emit(AppEvent::SessionRefreshed);
                info!("token pair refreshed");
                Ok(session)
            }
            Err(e) => {
                warn!("token refresh failed ({e}), logging out");
                self.logout().await;
                Err(e)
            }
        }
    }

    /// Destroy the session.
    ///
    /// Best-effort notifies the server; persisted storage and in-memory
    /// state are cleared unconditionally even when that call fails. This is
    /// a cleanup path, not a negotiated handshake.
    pub async fn logout(&self) {
        self.stop_refresh_task().await;

        let had_session = self.inner.session.read().await.is_some();
        if had_session {
            if let Err(e) = self.inner.api.sign_out().await {
                debug!("logout notification failed (ignored): {e}");
            }
        }

        for key in storage_keys::ALL {
            if let Err(e) = self.inner.storage.remove(key) {
                warn!("failed to clear stored {key}: {e}");
            }
        }

        *self.inner.session.write().await = None;
        self.inner.api.set_bearer_token(None).await;
        self.inner.bus.emit(AppEvent::SessionCleared);
        info!("logged out");
    }

    /// Store a successful auth response and start the refresh cadence.
    async fn handle_auth_success(&self, response: AuthResponse) -> RelayResult<Session> {
        let session = self.store_session(response).await?;
        self.inner.bus.emit(AppEvent::SessionEstablished {
            user_id: session.user.id,
            username: session.user.username.clone(),
        });
        self.start_refresh_task().await;
        info!("authenticated as {}", session.user.username);
        Ok(session)
    }

    /// Install a restored session and start the refresh cadence.
    async fn install_session(&self, session: Session) {
        self.inner
            .api
            .set_bearer_token(Some(session.access_token.clone()))
            .await;
        let user_id = session.user.id;
        let username = session.user.username.clone();
        *self.inner.session.write().await = Some(session);
        self.inner
            .bus
            .emit(AppEvent::SessionEstablished { user_id, username });
        self.start_refresh_task().await;
    }

    /// Persist the three keys and swap the in-memory session.
    async fn store_session(&self, response: AuthResponse) -> RelayResult<Session> {
        let user = response.user();
        let session = Session::new(user, response.access_token, response.refresh_token);

        self.inner
            .storage
            .put(storage_keys::ACCESS_TOKEN, &session.access_token)?;
        self.inner
            .storage
            .put(storage_keys::REFRESH_TOKEN, &session.refresh_token)?;
        self.inner.storage.put(
            storage_keys::CURRENT_USER,
            &serde_json::to_string(&session.user)?,
        )?;

        self.inner
            .api
            .set_bearer_token(Some(session.access_token.clone()))
            .await;
        *self.inner.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Start (or restart) the periodic refresh task.
    async fn start_refresh_task(&self) {
        let store = self.clone();
        let interval = self.inner.refresh_interval;
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !store.is_authenticated().await {
                    return;
                }
                if store.refresh().await.is_err() {
                    // refresh() already logged out.
                    return;
                }
            }
        });

        let mut guard = self.inner.refresh_task.lock().await;
        if let Some(previous) = guard.replace(task) {
            previous.abort();
        }
    }

    async fn stop_refresh_task(&self) {
        if let Some(task) = self.inner.refresh_task.lock().await.take() {
            task.abort();
        }
    }
}
