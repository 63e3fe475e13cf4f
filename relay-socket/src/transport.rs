//! The transport contract.
//!
//! The concrete transport (socket library, framing, heartbeats) is out of
//! scope for this layer; this trait is the seam it must satisfy. The
//! manager drives exactly one transport, and the integration tests supply
//! an in-memory double.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use relay_core::error::RelayResult;

/// Notification that the transport closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportClose {
    /// True for a deliberate local close; false for an unexpected drop.
    /// Only unclean closes trigger the retry policy.
    pub clean: bool,
}

/// Contract the underlying transport must satisfy.
///
/// All operations are non-blocking tasks resuming on completion. Frames for
/// a subscription are delivered in arrival order on its channel; there is no
/// ordering guarantee across subscriptions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection and perform the handshake, carrying the bearer
    /// token as a connection-level credential.
    ///
    /// Returns `RelayError::Auth` when the handshake is rejected for
    /// authorization reasons, `RelayError::Connection` otherwise.
    async fn connect(&self, token: &str) -> RelayResult<()>;

    /// Open a subscription to a destination. Frames arrive on the returned
    /// channel until the subscription is cancelled or the transport closes.
    async fn subscribe(
        &self,
        destination: &str,
    ) -> RelayResult<mpsc::UnboundedReceiver<serde_json::Value>>;

    /// Cancel a subscription. No-op when the destination is not subscribed.
    async fn unsubscribe(&self, destination: &str);

    /// Fire-and-forget send to a destination.
    async fn send(&self, destination: &str, payload: serde_json::Value) -> RelayResult<()>;

    /// Clean close. Resolves once the transport confirms closure, or
    /// immediately when nothing is open. Emits a clean [`TransportClose`].
    async fn disconnect(&self);

    /// Subscribe to close notifications.
    fn closes(&self) -> broadcast::Receiver<TransportClose>;
}
