//! Relay Socket - the real-time messaging coordination layer.
//!
//! This crate defines the transport contract, the wire event types
//! (validated once at the boundary into a tagged union), the destination
//! scheme, and the [`SocketManager`] state machine that owns the single
//! transport connection and its subscription set.

pub mod destinations;
pub mod events;
pub mod manager;
pub mod transport;

pub use events::{
    BatchReadReceipt, ChatEvent, ChatEventObserver, ConnectionState, GlobalEventObserver,
    MessageEvent, OutgoingMessage, PinAction, PresenceUpdate, ReactionUpdate, ReadReceipt,
    StatusUpdate, TypingEvent,
};
pub use manager::{ReconnectConfig, SocketManager, SubscriptionHandle};
pub use transport::{Transport, TransportClose};
