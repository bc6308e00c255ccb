//! Authentication error types.
//!
//! This module defines errors that can occur while verifying a session
//! token and fetching the signing key set.
//!
//! Every variant belongs to exactly one [`FailureClass`]. The class decides
//! how the session layer recovers: decode failures suggest a stale key set,
//! claims failures don't.

use authsync_backend::BackendError;
use thiserror::Error;

/// How a verification failure should be handled by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// The token could not be decoded or its signature did not verify
    /// against the cached key set. The key set may be stale: invalidate it
    /// (rate-limited) and clear the session.
    Decode,
    /// The signature was fine but the token is semantically invalid. Clear
    /// the session; the key set must not be invalidated.
    Claims,
    /// The key set could not be fetched. Clear the session.
    KeyFetch,
}

/// Authentication errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`: new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Malformed token - cannot be decoded.
    #[error("Invalid token format: {message}")]
    InvalidTokenFormat {
        /// What was wrong with the token.
        message: String,
    },

    /// Algorithm not in the accepted list.
    #[error("Unsupported algorithm: {message}")]
    UnsupportedAlgorithm {
        /// Which algorithm and why.
        message: String,
    },

    /// The `kid` header is malformed.
    #[error("Invalid key id: {message}")]
    InvalidKeyId {
        /// What was wrong with the key id.
        message: String,
    },

    /// No key with this `kid` in the current key set.
    #[error("Signing key not found: {kid}")]
    KeyNotFound {
        /// Key ID that was not found.
        kid: String,
    },

    /// The published key could not be turned into a verification key.
    #[error("Invalid public key: {message}")]
    InvalidPublicKey {
        /// Why the key was unusable.
        message: String,
    },

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Required claim is missing.
    #[error("Missing claim: {claim}")]
    MissingClaim {
        /// Name of the missing claim.
        claim: String,
    },

    /// Claim is present but has an unacceptable value.
    #[error("Invalid claim '{claim}': {reason}")]
    InvalidClaim {
        /// Name of the offending claim.
        claim: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Token has expired (beyond the clock-skew leeway).
    #[error("Token expired")]
    TokenExpired,

    /// Token not yet valid (`nbf` beyond the clock-skew leeway).
    #[error("Token not yet valid")]
    TokenNotYetValid,

    /// The signing key set could not be fetched from the backend.
    #[error("Key set fetch failed: {0}")]
    KeyFetch(
        /// The underlying backend error.
        #[source]
        BackendError,
    ),
}

impl AuthError {
    /// Creates a new `InvalidTokenFormat` error.
    #[must_use]
    pub fn invalid_token_format(message: impl Into<String>) -> Self {
        Self::InvalidTokenFormat { message: message.into() }
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported_algorithm(message: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm { message: message.into() }
    }

    /// Creates a new `InvalidKeyId` error.
    #[must_use]
    pub fn invalid_key_id(message: impl Into<String>) -> Self {
        Self::InvalidKeyId { message: message.into() }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `InvalidPublicKey` error.
    #[must_use]
    pub fn invalid_public_key(message: impl Into<String>) -> Self {
        Self::InvalidPublicKey { message: message.into() }
    }

    /// Creates a new `InvalidSignature` error.
    #[must_use]
    pub fn invalid_signature() -> Self {
        Self::InvalidSignature
    }

    /// Creates a new `MissingClaim` error.
    #[must_use]
    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::MissingClaim { claim: claim.into() }
    }

    /// Creates a new `InvalidClaim` error.
    #[must_use]
    pub fn invalid_claim(claim: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidClaim { claim: claim.into(), reason: reason.into() }
    }

    /// Creates a new `TokenExpired` error.
    #[must_use]
    pub fn token_expired() -> Self {
        Self::TokenExpired
    }

    /// Creates a new `TokenNotYetValid` error.
    #[must_use]
    pub fn token_not_yet_valid() -> Self {
        Self::TokenNotYetValid
    }

    /// Creates a new `KeyFetch` error.
    #[must_use]
    pub fn key_fetch(err: BackendError) -> Self {
        Self::KeyFetch(err)
    }

    /// Returns the recovery class of this error.
    #[must_use]
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::InvalidTokenFormat { .. }
            | Self::UnsupportedAlgorithm { .. }
            | Self::InvalidKeyId { .. }
            | Self::KeyNotFound { .. }
            | Self::InvalidPublicKey { .. }
            | Self::InvalidSignature => FailureClass::Decode,
            Self::MissingClaim { .. }
            | Self::InvalidClaim { .. }
            | Self::TokenExpired
            | Self::TokenNotYetValid => FailureClass::Claims,
            Self::KeyFetch(_) => FailureClass::KeyFetch,
        }
    }

    /// Shorthand for `failure_class() == FailureClass::Decode`.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        self.failure_class() == FailureClass::Decode
    }

    /// Shorthand for `failure_class() == FailureClass::Claims`.
    #[must_use]
    pub fn is_claims_error(&self) -> bool {
        self.failure_class() == FailureClass::Claims
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::invalid_signature(),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::unsupported_algorithm("algorithm does not match the signing key")
            },
            ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_) => AuthError::invalid_public_key(err.to_string()),
            ErrorKind::InvalidToken => AuthError::invalid_token_format("Invalid JWT structure"),
            _ => AuthError::invalid_token_format(format!("JWT error: {err}")),
        }
    }
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        AuthError::KeyFetch(err)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::invalid_token_format("test");
        assert_eq!(err.to_string(), "Invalid token format: test");

        let err = AuthError::token_expired();
        assert_eq!(err.to_string(), "Token expired");

        let err = AuthError::missing_claim("sub");
        assert_eq!(err.to_string(), "Missing claim: sub");

        let err = AuthError::invalid_claim("azp", "not an authorized party");
        assert_eq!(err.to_string(), "Invalid claim 'azp': not an authorized party");

        let err = AuthError::key_not_found("ins_123");
        assert_eq!(err.to_string(), "Signing key not found: ins_123");
    }

    #[rstest]
    #[case(AuthError::invalid_token_format("x"), FailureClass::Decode)]
    #[case(AuthError::unsupported_algorithm("HS256"), FailureClass::Decode)]
    #[case(AuthError::invalid_key_id("empty"), FailureClass::Decode)]
    #[case(AuthError::key_not_found("kid"), FailureClass::Decode)]
    #[case(AuthError::invalid_public_key("bad"), FailureClass::Decode)]
    #[case(AuthError::invalid_signature(), FailureClass::Decode)]
    #[case(AuthError::missing_claim("exp"), FailureClass::Claims)]
    #[case(AuthError::invalid_claim("iss", "mismatch"), FailureClass::Claims)]
    #[case(AuthError::token_expired(), FailureClass::Claims)]
    #[case(AuthError::token_not_yet_valid(), FailureClass::Claims)]
    #[case(AuthError::key_fetch(BackendError::timeout()), FailureClass::KeyFetch)]
    fn test_failure_class(#[case] err: AuthError, #[case] expected: FailureClass) {
        assert_eq!(err.failure_class(), expected);
        assert_eq!(err.is_decode_error(), expected == FailureClass::Decode);
        assert_eq!(err.is_claims_error(), expected == FailureClass::Claims);
    }

    #[test]
    fn test_error_from_jsonwebtoken() {
        let jwt_err =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature);
        let auth_err: AuthError = jwt_err.into();
        assert!(matches!(auth_err, AuthError::InvalidSignature));

        let jwt_err =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken);
        let auth_err: AuthError = jwt_err.into();
        assert!(auth_err.is_decode_error());
    }

    #[test]
    fn test_key_fetch_preserves_source_chain() {
        use std::error::Error;

        let auth_err: AuthError = BackendError::connection("connection refused").into();
        let source = auth_err.source().expect("source chain must be preserved");
        assert_eq!(source.to_string(), "Connection error: connection refused");
    }
}
