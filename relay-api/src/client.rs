//! HTTP client for the chat server REST API.
//!
//! Handles bearer authentication, timeout management, exponential backoff
//! retry for transient failures, and request/response lifecycle. Server
//! error bodies are passed through verbatim so the user-facing layer can
//! show them unchanged.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use relay_core::config::{AppConfig, ServerConfig};
use relay_core::error::{RelayError, RelayResult};

/// Retry configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// HTTP status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            retryable_statuses: vec![502, 503, 504],
        }
    }
}

/// Request body forms supported by the retry loop.
enum Payload<'a> {
    Empty,
    Json(&'a serde_json::Value),
    Text(&'a str),
}

/// HTTP client for communicating with the chat server.
///
/// Wraps reqwest::Client with bearer authentication, retry logic, and
/// error classification. The bearer token is shared mutable state so a
/// refresh swaps it for every subsequent request.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Base URL for the API (e.g. "https://chat.example.com/api").
    api_root: String,
    /// Current bearer token, absent until sign-in.
    bearer_token: Arc<RwLock<Option<String>>>,
    /// Default request timeout.
    timeout: Duration,
    /// Retry configuration.
    retry_config: RetryConfig,
}

impl ApiClient {
    /// Create a new ApiClient from server configuration.
    pub fn new(config: &ServerConfig) -> RelayResult<Self> {
        let base_url = AppConfig::sanitize_base_url(&config.base_url);

        let inner = Client::builder()
            .timeout(Duration::from_millis(config.api_timeout_ms))
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| RelayError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            api_root: format!("{base_url}/api"),
            bearer_token: Arc::new(RwLock::new(None)),
            timeout: Duration::from_millis(config.api_timeout_ms),
            retry_config: RetryConfig {
                max_retries: config.api_max_retries,
                ..RetryConfig::default()
            },
        })
    }

    /// Set custom retry configuration.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Get the current API root URL.
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Replace the bearer token (on sign-in/refresh) or clear it (on logout).
    pub async fn set_bearer_token(&self, token: Option<String>) {
        let mut guard = self.bearer_token.write().await;
        *guard = token;
    }

    /// Whether a bearer token is currently set.
    pub async fn has_bearer_token(&self) -> bool {
        self.bearer_token.read().await.is_some()
    }

    /// Build the full URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_root)
    }

    /// Internal: build a request for the given method, URL, and body.
    async fn build_request(
        &self,
        method: Method,
        url: &str,
        body: &Payload<'_>,
    ) -> RequestBuilder {
        let mut builder = self.inner.request(method, url).timeout(self.timeout);
        match body {
            Payload::Empty => {}
            Payload::Json(value) => builder = builder.json(value),
            Payload::Text(text) => {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, "text/plain")
                    .body(text.to_string());
            }
        }
        if let Some(token) = self.bearer_token.read().await.as_deref() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Execute a request with exponential backoff retry.
    async fn request_with_retry(
        &self,
        method: Method,
        path: &str,
        body: Payload<'_>,
    ) -> RelayResult<Response> {
        let url = self.url(path);
        debug!("{} {}", method, path);

        let mut last_error: Option<RelayError> = None;

        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                let delay = self.calculate_retry_delay(attempt - 1);
                warn!(
                    "retrying {} {} (attempt {}/{}) after {:.1}s",
                    method,
                    path,
                    attempt + 1,
                    self.retry_config.max_retries + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            let builder = self.build_request(method.clone(), &url, &body).await;

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();

                    if self
                        .retry_config
                        .retryable_statuses
                        .contains(&status.as_u16())
                        && attempt < self.retry_config.max_retries
                    {
                        warn!("retryable status {} from {}", status.as_u16(), path);
                        last_error = Some(RelayError::Remote {
                            status: status.as_u16(),
                            message: format!("retryable status {status}"),
                        });
                        continue;
                    }

                    return Self::check_status(response).await;
                }
                Err(e) => {
                    let is_retryable = e.is_timeout() || e.is_connect();
                    let err = Self::classify_error(e);

                    if is_retryable && attempt < self.retry_config.max_retries {
                        warn!("retryable error on {}: {}", path, err);
                        last_error = Some(err);
                        continue;
                    }

                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RelayError::Http("max retries exceeded".into())))
    }

    /// Calculate retry delay with exponential backoff.
    fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_config.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << attempt);
        let max_ms = self.retry_config.max_delay.as_millis() as u64;
        Duration::from_millis(delay_ms.min(max_ms))
    }

    // --- Public HTTP methods ---

    /// Execute a GET request with automatic retry.
    pub async fn get(&self, path: &str) -> RelayResult<Response> {
        self.request_with_retry(Method::GET, path, Payload::Empty)
            .await
    }

    /// Execute a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> RelayResult<Response> {
        self.request_with_retry(Method::POST, path, Payload::Json(body))
            .await
    }

    /// Execute a POST request with no body.
    pub async fn post_empty(&self, path: &str) -> RelayResult<Response> {
        self.request_with_retry(Method::POST, path, Payload::Empty)
            .await
    }

    /// Execute a POST request with a raw text body.
    ///
    /// The refresh endpoint takes the refresh token as the bare body.
    pub async fn post_text(&self, path: &str, body: &str) -> RelayResult<Response> {
        self.request_with_retry(Method::POST, path, Payload::Text(body))
            .await
    }

    /// Execute a PUT request with a JSON body.
    pub async fn put(&self, path: &str, body: &serde_json::Value) -> RelayResult<Response> {
        self.request_with_retry(Method::PUT, path, Payload::Json(body))
            .await
    }

    /// Execute a DELETE request.
    pub async fn delete(&self, path: &str) -> RelayResult<Response> {
        self.request_with_retry(Method::DELETE, path, Payload::Empty)
            .await
    }

    // --- Response helpers ---

    /// Deserialize a response body into T.
    pub async fn parse_json<T: DeserializeOwned>(response: Response) -> RelayResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| RelayError::Serialization(format!("failed to parse response: {e}")))
    }

    /// Convenience: GET + parse the body into T.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RelayResult<T> {
        let resp = self.get(path).await?;
        Self::parse_json(resp).await
    }

    /// Convenience: POST + parse the body into T.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> RelayResult<T> {
        let resp = self.post(path, body).await?;
        Self::parse_json(resp).await
    }

    /// Check the HTTP status code and convert to RelayError if needed.
    ///
    /// 401/403 become `RelayError::Auth`; any other non-success status
    /// becomes `RelayError::Remote` carrying the server's literal body.
    async fn check_status(response: Response) -> RelayResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RelayError::Auth(body));
        }

        Err(RelayError::Remote {
            status: status.as_u16(),
            message: body,
        })
    }

    /// Classify a reqwest error into a RelayError variant.
    fn classify_error(e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            RelayError::Timeout(e.to_string())
        } else if e.is_connect() {
            RelayError::Http(format!("connection failed: {e}"))
        } else {
            RelayError::Http(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            base_url: "http://localhost:8080".into(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_api_root_derivation() {
        let client = ApiClient::new(&test_config()).unwrap();
        assert_eq!(client.api_root(), "http://localhost:8080/api");
    }

    #[test]
    fn test_api_root_strips_trailing_slash() {
        let config = ServerConfig {
            base_url: "http://localhost:8080/".into(),
            ..ServerConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.api_root(), "http://localhost:8080/api");
    }

    #[test]
    fn test_retry_delay_calculation() {
        let client = ApiClient::new(&test_config()).unwrap();
        assert_eq!(client.calculate_retry_delay(0), Duration::from_secs(1));
        assert_eq!(client.calculate_retry_delay(1), Duration::from_secs(2));
        assert_eq!(client.calculate_retry_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_delay_capped() {
        let client = ApiClient::new(&test_config()).unwrap();
        let d10 = client.calculate_retry_delay(10);
        assert!(d10 <= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_bearer_token_lifecycle() {
        let client = ApiClient::new(&test_config()).unwrap();
        assert!(!client.has_bearer_token().await);

        client.set_bearer_token(Some("token-1".into())).await;
        assert!(client.has_bearer_token().await);

        client.set_bearer_token(None).await;
        assert!(!client.has_bearer_token().await);
    }
}
