//! Backend error types and result alias.
//!
//! Every call into the identity provider's REST service, and every
//! in-memory stand-in for it, maps its failures onto [`BackendError`].
//!
//! # Error Types
//!
//! - [`BackendError::MissingSecretKey`] - No backend credential configured (fatal at startup)
//! - [`BackendError::Connection`] - Network or connection-related failures
//! - [`BackendError::Timeout`] - Request exceeded its time limit
//! - [`BackendError::Http`] - The provider answered with a non-success status
//! - [`BackendError::Serialization`] - Response body could not be decoded
//! - [`BackendError::InvalidRequest`] - The caller's input was rejected before sending
//! - [`BackendError::Internal`] - Anything else
//!
//! # Example
//!
//! ```
//! use authsync_backend::{BackendError, BackendResult};
//!
//! fn fetch() -> BackendResult<Vec<u8>> {
//!     Err(BackendError::timeout())
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A shared error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur while talking to the identity provider backend.
///
/// Errors preserve their source chain via the `#[source]` attribute.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`: new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// No secret key was supplied explicitly or through the environment.
    ///
    /// Raised once, at configuration time. Never retried.
    #[error("Missing secret key: pass one explicitly or set {env_var}")]
    MissingSecretKey {
        /// Environment variable that was consulted as a fallback.
        env_var: &'static str,
    },

    /// Connection or network error.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The request timed out.
    #[error("Request timeout")]
    Timeout,

    /// The provider returned a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response summary.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the decoding failure.
        message: String,
        /// The underlying error that caused decoding to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// The request was rejected locally before reaching the provider.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the input.
        message: String,
    },

    /// Internal error that fits no other category.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },
}

impl BackendError {
    /// Creates a new `MissingSecretKey` error naming the fallback variable.
    #[must_use]
    pub fn missing_secret_key(env_var: &'static str) -> Self {
        Self::MissingSecretKey { env_var }
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Creates a new `Http` error.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `InvalidRequest` error with the given message.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Returns `true` for failures that may succeed on a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = err.status() {
            return Self::http(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return Self::serialization_with_source("failed to decode response body", err);
        }
        if err.is_connect() || err.is_request() {
            return Self::connection_with_source("request to identity provider failed", err);
        }
        Self::Internal { message: err.to_string(), source: Some(Arc::new(err)) }
    }
}
