//! OAuth2 client-credentials token for the provider API.
//!
//! [`AuthClient::access_token`] is the only place bearer tokens come from. A
//! cache hit costs no network round-trip; a miss performs one exchange
//! against `{oauth_base}/oauth2/token` and caches the result for its declared
//! lifetime minus [`SAFETY_MARGIN`].
//!
//! Concurrent misses are not coalesced: each may run its own exchange and the
//! last write wins. Every write is a whole token, so readers never observe a
//! mixture.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::cache::TokenCache;

/// Cache key holding the current provider token.
pub const ACCESS_TOKEN_KEY: &str = "provider_access_token";

/// Subtracted from the provider-declared lifetime before caching.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(10);

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication request failed: {0}")]
    Transport(String),

    #[error("authentication request timed out")]
    Timeout,

    #[error("authentication failed with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("authentication failed: malformed token response: {0}")]
    Malformed(String),
}

impl AuthError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AuthError::Timeout)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::Transport(e.to_string())
        }
    }
}

/// Token endpoint response. All fields are required; `#[serde(default)]`
/// lets `validate` report which one is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
}

impl TokenResponse {
    fn validate(&self) -> Result<(), AuthError> {
        if self.access_token.is_empty() {
            return Err(AuthError::Malformed("missing access_token".into()));
        }
        if self.token_type.is_empty() {
            return Err(AuthError::Malformed("missing token_type".into()));
        }
        if self.expires_in <= 0 {
            return Err(AuthError::Malformed(format!(
                "invalid expires_in: {}",
                self.expires_in
            )));
        }
        if self.scope.is_empty() {
            return Err(AuthError::Malformed("missing scope".into()));
        }
        Ok(())
    }

    /// How long the token may be served from cache.
    pub fn cache_ttl(&self) -> Duration {
        let lifetime = Duration::from_secs(self.expires_in.max(0) as u64);
        lifetime.saturating_sub(SAFETY_MARGIN)
    }
}

pub struct AuthClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Zeroizing<String>,
    cache: Arc<dyn TokenCache>,
}

impl AuthClient {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        oauth_base_url: &str,
        cache: Arc<dyn TokenCache>,
    ) -> anyhow::Result<Self> {
        Self::with_exchange_timeout(
            client_id,
            client_secret,
            oauth_base_url,
            cache,
            EXCHANGE_TIMEOUT,
        )
    }

    pub fn with_exchange_timeout(
        client_id: &str,
        client_secret: &str,
        oauth_base_url: &str,
        cache: Arc<dyn TokenCache>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            token_url: format!("{}/oauth2/token", oauth_base_url.trim_end_matches('/')),
            client_id: client_id.to_string(),
            client_secret: Zeroizing::new(client_secret.to_string()),
            cache,
        })
    }

    /// Return a valid access token, from cache when possible.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        match self.cache.get(ACCESS_TOKEN_KEY).await {
            Ok(Some(token)) => {
                tracing::debug!("access token served from cache");
                return Ok(token);
            }
            Ok(None) => {
                tracing::debug!("access token not cached, authenticating with provider");
            }
            Err(e) => {
                tracing::warn!(error = %e, "token cache read failed, authenticating with provider");
            }
        }

        let token = self.exchange().await?;

        let ttl = token.cache_ttl();
        if let Err(e) = self
            .cache
            .set(ACCESS_TOKEN_KEY, &token.access_token, ttl)
            .await
        {
            tracing::warn!(error = %e, "failed to cache access token");
        } else {
            tracing::debug!(ttl_secs = ttl.as_secs(), "cached access token");
        }

        Ok(token.access_token)
    }

    /// Perform one client-credentials exchange, bypassing the cache.
    pub async fn exchange(&self) -> Result<TokenResponse, AuthError> {
        let resp = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(self.client_secret.as_str()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "token exchange request failed");
                AuthError::from(e)
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status_code = status.as_u16(), response_body = %body, "authentication failed");
            return Err(AuthError::Rejected { status, body });
        }

        let body = resp.bytes().await.map_err(AuthError::from)?;
        let token: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(error = %e, "failed to decode token response");
            AuthError::Malformed(e.to_string())
        })?;
        token.validate()?;

        Ok(token)
    }
}
