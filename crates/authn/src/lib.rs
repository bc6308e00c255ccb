//! # authsync authn
//!
//! Session token verification for the auth synchronization layer.
//!
//! This crate provides:
//! - **Token verification**: header checks, signature verification against the provider's
//!   published JWK set, claims policy
//! - **Claims policy**: essential/value rules per claim plus clock-skew leeway
//! - **Key cache**: lazily fetched key set with rate-limited invalidation
//! - **Algorithm validation**: only asymmetric algorithms are accepted
//!
//! ## Failure classes
//!
//! Every [`AuthError`] maps to a [`FailureClass`]. A decode failure may
//! mean the cached key set is stale (the provider rotated keys), so callers
//! invalidate the [`KeyCache`]. A claims failure means the token itself is
//! no good and the key set is left alone.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use authsync_authn::{ClaimsPolicy, KeyCache, jwt::verify};
//! use authsync_backend::MemorySigningKeySource;
//!
//! # async fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let cache = KeyCache::new(Arc::new(MemorySigningKeySource::new()));
//! let policy = ClaimsPolicy::default();
//!
//! match verify(token, &*cache.get_keys().await?, &policy) {
//!     Ok(claims) => println!("user {}", claims.subject().unwrap_or_default()),
//!     Err(err) if err.is_decode_error() => {
//!         cache.invalidate();
//!     },
//!     Err(err) => println!("rejected: {err}"),
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Decoded session token payload.
pub mod claims;
/// Authentication error types.
pub mod error;
/// Session token verification.
pub mod jwt;
/// Signing key set cache.
pub mod key_cache;
/// Claims validation policy.
pub mod policy;
/// Header validation.
pub mod validation;

/// Test helpers (keys, JWKs, tokens).
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use claims::SessionClaims;
pub use error::{AuthError, FailureClass, Result};
pub use key_cache::{DEFAULT_MIN_RESET_INTERVAL, KeyCache};
pub use policy::{ClaimRule, ClaimsPolicy, DEFAULT_LEEWAY};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
