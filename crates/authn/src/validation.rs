//! JWT header validation.
//!
//! Security checks applied to the token header before any key lookup:
//! only asymmetric algorithms are accepted and the `kid` must be a plain
//! printable identifier.
//!
//! # Security
//!
//! - Strict algorithm checks to prevent algorithm substitution attacks
//! - Symmetric algorithms and "none" are always rejected
//! - Key ids are bounded in length and restricted to printable ASCII so they can be logged and
//!   compared safely

use crate::error::AuthError;

/// Forbidden JWT algorithms that are never accepted.
///
/// - `none`: No signature verification (trivially bypassable)
/// - `HS256`, `HS384`, `HS512`: Symmetric algorithms (shared secret vulnerability)
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted JWT algorithms.
///
/// Every asymmetric algorithm a published JWK can carry. The identity
/// provider signs session tokens with RS256 today; the rest are accepted so
/// that a key rotation to another key type does not need a release.
pub const ACCEPTED_ALGORITHMS: &[&str] =
    &["RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256", "ES384", "EdDSA"];

/// Maximum accepted length of a `kid` header.
pub const MAX_KID_LENGTH: usize = 256;

/// Validate JWT algorithm against security policies.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] if:
/// - Algorithm is symmetric (HS256, HS384, HS512)
/// - Algorithm is "none"
/// - Algorithm is not in [`ACCEPTED_ALGORITHMS`]
///
/// # Examples
///
/// ```
/// use authsync_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("RS256").is_ok());
/// assert!(validate_algorithm("EdDSA").is_ok());
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("none").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{alg}' is not in accepted list"
        )));
    }

    Ok(())
}

/// Validate the `kid` header before it is used for key lookup.
///
/// # Errors
///
/// Returns [`AuthError::InvalidKeyId`] if the key id is empty, longer than
/// [`MAX_KID_LENGTH`], or contains anything other than printable ASCII.
pub fn validate_kid(kid: &str) -> Result<(), AuthError> {
    if kid.is_empty() {
        return Err(AuthError::invalid_key_id("kid is empty"));
    }
    if kid.len() > MAX_KID_LENGTH {
        return Err(AuthError::invalid_key_id(format!(
            "kid is {} bytes, maximum is {MAX_KID_LENGTH}",
            kid.len()
        )));
    }
    if !kid.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(AuthError::invalid_key_id("kid contains non-printable characters"));
    }
    Ok(())
}
