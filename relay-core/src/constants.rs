//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Relay";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default REST API timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Maximum automatic retries for transient REST failures.
pub const API_MAX_RETRIES: u32 = 3;

/// Interval between access-token refreshes.
pub const TOKEN_REFRESH_INTERVAL_SECS: u64 = 20 * 60;

/// Inactivity window after which a local typing indicator is withdrawn.
pub const TYPING_IDLE_TIMEOUT_MS: u64 = 1_500;

/// Base delay for socket reconnection backoff.
pub const RECONNECT_BASE_DELAY_SECS: u64 = 1;

/// Cap on the socket reconnection backoff delay.
pub const RECONNECT_MAX_DELAY_SECS: u64 = 10;

/// Maximum number of socket reconnection attempts before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Heartbeat interval for the transport, both directions.
pub const HEARTBEAT_INTERVAL_MS: u64 = 25_000;

/// Default number of messages fetched per history page.
pub const HISTORY_PAGE_SIZE: u32 = 50;

/// Default page size for directory listings (conversations, rooms, contacts).
pub const DIRECTORY_PAGE_SIZE: u32 = 50;

/// Delay before fetching the pinned-message summary after opening a chat,
/// so it does not race the history replace.
pub const PINNED_FETCH_DELAY_MS: u64 = 500;

/// Minimum accepted password length for registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Content shown in place of a deleted message. The entry stays in the
/// list so indices remain stable.
pub const DELETED_MESSAGE_PLACEHOLDER: &str = "This message was deleted";

/// Keys for the persisted credential store.
pub mod storage_keys {
    /// Access token key.
    pub const ACCESS_TOKEN: &str = "access_token";
    /// Refresh token key.
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Serialized current-user key.
    pub const CURRENT_USER: &str = "current_user";

    /// All keys written on auth and cleared as a set on logout.
    pub const ALL: &[&str] = &[ACCESS_TOKEN, REFRESH_TOKEN, CURRENT_USER];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys_cover_the_credential_set() {
        assert_eq!(storage_keys::ALL.len(), 3);
        assert!(storage_keys::ALL.contains(&storage_keys::ACCESS_TOKEN));
        assert!(storage_keys::ALL.contains(&storage_keys::REFRESH_TOKEN));
        assert!(storage_keys::ALL.contains(&storage_keys::CURRENT_USER));
    }

    #[test]
    fn test_backoff_bounds() {
        assert!(RECONNECT_BASE_DELAY_SECS < RECONNECT_MAX_DELAY_SECS);
        assert_eq!(MAX_RECONNECT_ATTEMPTS, 3);
    }
}
