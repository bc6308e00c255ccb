//! HTTP client for the identity provider's backend REST API.
//!
//! Implements both [`SigningKeySource`] (`GET {api_url}/jwks`) and
//! [`UserDirectory`] (`GET {api_url}/users/{id}`), authenticating every
//! request with the secret key as a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::{
    error::{BackendError, BackendResult},
    keys::SigningKeySource,
    secret::SecretKey,
    users::{UserDirectory, UserProfile},
};

/// Default base URL of the backend API.
pub const DEFAULT_API_URL: &str = "https://api.clerk.com/v1";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`HttpBackendClient`].
#[derive(Debug, Clone, bon::Builder)]
pub struct BackendConfig {
    /// Resolved secret key.
    secret_key: SecretKey,

    /// Base URL, without a trailing slash.
    #[builder(into, default = DEFAULT_API_URL.to_owned())]
    api_url: String,

    /// Per-request timeout.
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    request_timeout: Duration,
}

impl BackendConfig {
    /// Returns the base URL.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Backend API client.
#[derive(Clone)]
pub struct HttpBackendClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: SecretKey,
}

impl std::fmt::Debug for HttpBackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackendClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpBackendClient {
    /// Builds a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Internal`] if the underlying HTTP client cannot
    /// be constructed (e.g. TLS backend initialization failure).
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            secret_key: config.secret_key,
        })
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends an authenticated GET and decodes the JSON body.
    ///
    /// `Ok(None)` is returned for `404 Not Found`.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BackendResult<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let response =
            self.http.get(&url).bearer_auth(self.secret_key.expose()).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), path, "backend request failed");
            return Err(BackendError::http(status.as_u16(), truncate(&body, 256)));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            BackendError::serialization_with_source(format!("failed to decode {path}"), e)
        })
    }
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_owned(),
    }
}

#[async_trait]
impl SigningKeySource for HttpBackendClient {
    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_key_set(&self) -> BackendResult<JwkSet> {
        let set: JwkSet = self
            .get_json("/jwks")
            .await?
            .ok_or_else(|| BackendError::http(404, "key set endpoint not found"))?;
        tracing::debug!(keys = set.keys.len(), "fetched signing key set");
        Ok(set)
    }
}

#[async_trait]
impl UserDirectory for HttpBackendClient {
    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get_user(&self, user_id: &str) -> BackendResult<Option<UserProfile>> {
        if user_id.is_empty() || !user_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(BackendError::invalid_request(format!("invalid user id: {user_id:?}")));
        }
        self.get_json(&format!("/users/{user_id}")).await
    }
}
