//! User identity and session types.

use serde::{Deserialize, Serialize};

/// A user as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned user id.
    pub id: i64,
    /// Login name, unique server-side.
    pub username: String,
    /// Display name shown in chat headers and typing indicators.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// The name to display for this user: full name when present,
    /// otherwise the username.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

/// An authenticated session: the current user plus its token pair.
///
/// Owned exclusively by the session store. Created on successful
/// login/register/restore, replaced by a successful refresh, destroyed on
/// logout or irrecoverable refresh failure. Expiry is inferred by the fixed
/// refresh cadence rather than carried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The authenticated user.
    pub user: User,
    /// Bearer token attached to REST calls and the socket handshake.
    pub access_token: String,
    /// Token exchanged for a new pair at the refresh cadence.
    pub refresh_token: String,
}

impl Session {
    /// Create a session from its parts.
    pub fn new(user: User, access_token: String, refresh_token: String) -> Self {
        Self {
            user,
            access_token,
            refresh_token,
        }
    }
}
