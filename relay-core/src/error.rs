//! Global error types for the Relay client.
//!
//! All error categories across the workspace are unified into a single
//! `RelayError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;

/// Unified error type covering all error categories in Relay.
#[derive(Error, Debug)]
pub enum RelayError {
    // -- Authentication errors --
    /// The server rejected the credentials (401/403-equivalent).
    ///
    /// Carries the server's literal error text, which is surfaced to the
    /// user unchanged.
    #[error("authentication failed: {0}")]
    Auth(String),

    // -- Connection errors --
    /// Transport-level failure (handshake, socket close, send on a dead
    /// connection). Triggers bounded retry.
    #[error("connection error: {0}")]
    Connection(String),

    // -- Validation errors --
    /// A cheap local check failed before any network call was made.
    #[error("validation error: {0}")]
    Validation(String),

    // -- Remote errors --
    /// The server rejected an otherwise-valid request. The message is the
    /// server's response body, not reinterpreted locally.
    #[error("server error (status {status}): {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Error text from the server.
        message: String,
    },

    // -- Network errors --
    /// HTTP request failed below the status-code level.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    // -- Storage errors --
    /// Key-value credential store operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RelayError {
    /// Whether this error is an authorization failure.
    ///
    /// Auth failures require a token refresh before reconnecting; they must
    /// never be retried with the same credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, RelayError::Auth(_))
            || matches!(self, RelayError::Remote { status, .. } if *status == 401 || *status == 403)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RelayError {
    fn from(e: toml::de::Error) -> Self {
        RelayError::Config(e.to_string())
    }
}
