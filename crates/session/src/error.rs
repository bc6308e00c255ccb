//! Session layer error types.
//!
//! Verification failures are not errors at this layer: they become a
//! signed-out [`Transition`](crate::session::Transition) carrying the
//! rejection. What remains is configuration, backend and user lookup
//! failures.

use authsync_backend::BackendError;
use thiserror::Error;

/// Session layer errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`: new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// No signed-in user, or the directory does not know the user.
    #[error("Missing user: {message}")]
    MissingUser {
        /// Why no user could be produced.
        message: String,
    },

    /// Backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// The session driver is no longer accepting events.
    #[error("Session driver stopped")]
    DriverStopped,

    /// Configuration rejected at construction time.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong.
        message: String,
    },
}

impl SessionError {
    /// Creates a new `MissingUser` error.
    #[must_use]
    pub fn missing_user(message: impl Into<String>) -> Self {
        Self::MissingUser { message: message.into() }
    }

    /// Creates a new `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Returns `true` for [`SessionError::MissingUser`].
    #[must_use]
    pub fn is_missing_user(&self) -> bool {
        matches!(self, Self::MissingUser { .. })
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_missing_user_display() {
        let err = SessionError::missing_user("no user is signed in");
        assert_eq!(err.to_string(), "Missing user: no user is signed in");
        assert!(err.is_missing_user());
    }

    #[test]
    fn test_backend_error_converts_and_chains() {
        let err: SessionError = BackendError::missing_secret_key("CLERK_SECRET_KEY").into();
        assert!(matches!(err, SessionError::Backend(BackendError::MissingSecretKey { .. })));
        assert!(!err.is_missing_user());
        assert!(err.source().is_some());
    }
}
