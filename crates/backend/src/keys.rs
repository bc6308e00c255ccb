//! Signing key set sources.
//!
//! The identity provider publishes the public half of its token-signing keys
//! as a JSON Web Key Set. [`SigningKeySource`] abstracts where that set comes
//! from so production (HTTP) and testing (in-memory) share one interface.
//!
//! ```no_run
//! use authsync_backend::{BackendResult, SigningKeySource};
//!
//! async fn key_ids(source: &dyn SigningKeySource) -> BackendResult<Vec<String>> {
//!     let set = source.fetch_key_set().await?;
//!     Ok(set.keys.iter().filter_map(|k| k.common.key_id.clone()).collect())
//! }
//! ```

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use parking_lot::RwLock;

use crate::error::{BackendError, BackendResult};

/// Source of the provider's published signing key set.
#[async_trait]
pub trait SigningKeySource: Send + Sync {
    /// Fetches the current key set.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the set cannot be retrieved or decoded.
    async fn fetch_key_set(&self) -> BackendResult<JwkSet>;
}

/// In-memory [`SigningKeySource`].
///
/// Counts fetches and can inject latency or failures, which makes it the
/// stand-in for the HTTP client in tests and local development.
pub struct MemorySigningKeySource {
    keys: RwLock<Vec<Jwk>>,
    fetch_count: AtomicU64,
    delay: RwLock<Option<Duration>>,
    failure: RwLock<Option<fn() -> BackendError>>,
}

impl MemorySigningKeySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::with_keys(Vec::new())
    }

    /// Creates a source that serves the given keys.
    #[must_use]
    pub fn with_keys(keys: Vec<Jwk>) -> Self {
        Self {
            keys: RwLock::new(keys),
            fetch_count: AtomicU64::new(0),
            delay: RwLock::new(None),
            failure: RwLock::new(None),
        }
    }

    /// Adds a key, replacing any existing key with the same `kid`.
    pub fn insert(&self, key: Jwk) {
        let mut keys = self.keys.write();
        keys.retain(|existing| existing.common.key_id != key.common.key_id);
        keys.push(key);
    }

    /// Removes all keys with the given `kid`.
    pub fn remove(&self, kid: &str) {
        self.keys.write().retain(|existing| existing.common.key_id.as_deref() != Some(kid));
    }

    /// Replaces the whole key set (simulates a provider-side rotation).
    pub fn replace(&self, keys: Vec<Jwk>) {
        *self.keys.write() = keys;
    }

    /// Adds artificial latency to every fetch.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Makes every fetch fail with the error produced by `factory`.
    pub fn set_failure(&self, factory: Option<fn() -> BackendError>) {
        *self.failure.write() = factory;
    }

    /// Returns how many fetches have been served (including failed ones).
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }
}

impl Default for MemorySigningKeySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SigningKeySource for MemorySigningKeySource {
    async fn fetch_key_set(&self) -> BackendResult<JwkSet> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = *self.failure.read();
        if let Some(factory) = failure {
            return Err(factory());
        }

        Ok(JwkSet { keys: self.keys.read().clone() })
    }
}
