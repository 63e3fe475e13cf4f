//! Authentication endpoints.

use serde::{Deserialize, Serialize};

use relay_core::error::RelayResult;
use relay_models::User;

use crate::client::ApiClient;

/// Parameters for registering a new account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpParams {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Token pair and identity returned by sign-in, sign-up, and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthResponse {
    /// The identity carried by this response.
    pub fn user(&self) -> User {
        User {
            id: self.user_id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
        }
    }
}

impl ApiClient {
    /// Sign in with username and password.
    pub async fn sign_in(&self, username: &str, password: &str) -> RelayResult<AuthResponse> {
        let body = serde_json::json!({
            "username": username,
            "password": password,
        });
        self.post_json("/auth/signin", &body).await
    }

    /// Register a new account.
    pub async fn sign_up(&self, params: &SignUpParams) -> RelayResult<AuthResponse> {
        let body = serde_json::to_value(params)
            .map_err(|e| relay_core::error::RelayError::Serialization(e.to_string()))?;
        self.post_json("/auth/signup", &body).await
    }

    /// Exchange the refresh token for a new token pair.
    ///
    /// The endpoint takes the refresh token as the bare request body.
    pub async fn refresh(&self, refresh_token: &str) -> RelayResult<AuthResponse> {
        let resp = self.post_text("/auth/refresh", refresh_token).await?;
        ApiClient::parse_json(resp).await
    }

    /// Notify the server of a logout. Best-effort; the caller clears local
    /// state regardless of the outcome.
    pub async fn sign_out(&self) -> RelayResult<()> {
        self.post_empty("/auth/logout").await?;
        Ok(())
    }
}
