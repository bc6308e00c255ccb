//! # authsync backend
//!
//! Client surface of the identity provider's backend API, as consumed by
//! the session synchronization layer.
//!
//! This crate provides:
//! - **Key sources**: [`SigningKeySource`] for fetching the published JWK set
//! - **User directory**: [`UserDirectory`] for full profile lookups
//! - **HTTP client**: [`HttpBackendClient`] implementing both over REST
//! - **Credentials**: [`SecretKey`] resolution from config or environment
//!
//! In-memory implementations ([`MemorySigningKeySource`],
//! [`MemoryUserDirectory`]) back tests and local development.
//!
//! ## Example
//!
//! ```no_run
//! use authsync_backend::{BackendConfig, HttpBackendClient, SecretKey, SigningKeySource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let secret = SecretKey::resolve(None)?; // falls back to CLERK_SECRET_KEY
//! let client = HttpBackendClient::new(BackendConfig::builder().secret_key(secret).build())?;
//! let keys = client.fetch_key_set().await?;
//! println!("{} signing keys published", keys.keys.len());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Backend error types.
pub mod error;
/// REST client.
pub mod http;
/// Signing key set sources.
pub mod keys;
/// Backend API credential.
pub mod secret;
/// User profile lookup.
pub mod users;

pub use error::{BackendError, BackendResult, BoxError};
pub use http::{BackendConfig, DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT, HttpBackendClient};
pub use keys::{MemorySigningKeySource, SigningKeySource};
pub use secret::{SECRET_KEY_ENV, SecretKey};
pub use users::{EmailAddress, MemoryUserDirectory, UserDirectory, UserProfile};
