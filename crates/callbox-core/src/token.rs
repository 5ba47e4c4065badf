//! Access token retrieval
//!
//! The voice SDK needs a short-lived credential issued by a backend. The
//! backend exposes it as a plain-text `GET` endpoint; the whole response body
//! is the token.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use crate::error::{CallboxError, CallboxResult};

/// Bearer credential handed to the voice SDK
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// An empty token, used when a failed fetch is passed through
    pub fn empty() -> Self {
        Self::default()
    }

    /// The raw token text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token carries no text
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never log credentials
        write!(f, "AccessToken(<{} bytes>)", self.0.len())
    }
}

/// Source of access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a fresh token
    async fn fetch_token(&self) -> CallboxResult<AccessToken>;
}

/// Fetches the token with a single HTTP `GET`
///
/// No retry and no auth header. By default the status code is not checked,
/// so an error page body would be returned as the token; enable
/// [`HttpTokenFetcher::require_success_status`] to reject non-2xx replies.
#[derive(Debug, Clone)]
pub struct HttpTokenFetcher {
    client: Client,
    url: String,
    require_success: bool,
}

impl HttpTokenFetcher {
    /// Create a fetcher for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            require_success: false,
        }
    }

    /// Build a fetcher with a request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> CallboxResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CallboxError::config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            require_success: false,
        })
    }

    /// Reject responses whose status is not 2xx
    pub fn require_success_status(mut self, require: bool) -> Self {
        self.require_success = require;
        self
    }

    /// Endpoint this fetcher calls
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenSource for HttpTokenFetcher {
    async fn fetch_token(&self) -> CallboxResult<AccessToken> {
        debug!(url = %self.url, "Requesting access token");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            error!(url = %self.url, error = %e, "Access token request failed");
            CallboxError::token_fetch(e.to_string())
        })?;

        let status = response.status();
        if self.require_success && !status.is_success() {
            error!(url = %self.url, %status, "Token endpoint returned an error status");
            return Err(CallboxError::token_fetch(format!(
                "endpoint returned {status}"
            )));
        }

        let body = response.text().await?;
        debug!(%status, token_len = body.len(), "Access token received");
        Ok(AccessToken::new(body))
    }
}

/// Token source returning a fixed value
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: AccessToken,
}

impl StaticTokenSource {
    /// Always yield `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch_token(&self) -> CallboxResult<AccessToken> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_token() {
        let token = AccessToken::new("secret-jwt");
        let printed = format!("{token:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("10 bytes"));
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticTokenSource::new("abc123");
        assert_eq!(source.fetch_token().await.unwrap().as_str(), "abc123");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_token_error() {
        // port 9 (discard) on localhost is not expected to serve HTTP
        let fetcher = HttpTokenFetcher::with_timeout(
            "http://127.0.0.1:9/accessToken",
            Duration::from_secs(2),
        )
        .unwrap();
        let err = fetcher.fetch_token().await.unwrap_err();
        assert!(matches!(err, CallboxError::TokenFetch { .. }));
    }
}
