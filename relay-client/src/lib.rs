//! Relay Client - the coordination services tying the layers together.
//!
//! Components are explicit instances constructed at startup by
//! [`app::RelayApp`] and passed by handle to whoever needs them; there are
//! no global singletons. Exactly one implementation of each state machine
//! exists:
//! - [`session::SessionStore`] owns credentials and their refresh lifecycle
//! - [`chat::ChatController`] serializes active-chat transitions
//! - [`reconcile::ReconcileEngine`] owns the canonical per-chat message lists
//! - [`typing::TypingCoordinator`] owns typing debounce and aggregation

pub mod app;
pub mod chat;
pub mod directory;
pub mod event_bus;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod typing;

pub use app::RelayApp;
pub use chat::ChatController;
pub use event_bus::{AppEvent, EventBus};
pub use reconcile::ReconcileEngine;
pub use session::SessionStore;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use typing::{TypingCoordinator, TypingSignal};
