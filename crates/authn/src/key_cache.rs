//! Signing key set cache for session token verification.
//!
//! [`KeyCache`] holds the provider's published key set between token
//! verifications. The set is fetched lazily on first use and kept until it
//! is invalidated.
//!
//! # Architecture
//!
//! ```text
//! token arrives → get_keys()
//!               → cached? return it
//!               → miss: take fetch lock (single flight)
//!                       → re-check, fetch from SigningKeySource
//!                       → store unless invalidated meanwhile
//! decode failure → invalidate()  (at most once per min_reset_interval)
//! ```
//!
//! # Rate limiting
//!
//! A token signed by a key the cache has never seen looks exactly like a
//! forged token, so decode failures trigger an invalidation. Invalidation is
//! rate-limited so a stream of bad tokens cannot turn into a stream of
//! fetches against the provider: calls within `min_reset_interval` of the
//! last honored reset are suppressed and logged.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use authsync_authn::KeyCache;
//! use authsync_backend::MemorySigningKeySource;
//!
//! # async fn example() -> Result<(), authsync_authn::AuthError> {
//! let cache = KeyCache::new(Arc::new(MemorySigningKeySource::new()));
//! let keys = cache.get_keys().await?;
//! println!("{} keys", keys.keys.len());
//! # Ok(())
//! # }
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use authsync_backend::SigningKeySource;
use fail::fail_point;
use jsonwebtoken::jwk::JwkSet;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::AuthError;

/// Default minimum interval between honored invalidations (10 seconds).
pub const DEFAULT_MIN_RESET_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Default)]
struct CacheState {
    keys: Option<Arc<JwkSet>>,
    last_reset: Option<Instant>,
}

/// Process-wide cache of the provider's signing key set.
pub struct KeyCache {
    source: Arc<dyn SigningKeySource>,
    state: Mutex<CacheState>,
    /// Serializes fetches so concurrent misses trigger one request.
    fetch_lock: tokio::sync::Mutex<()>,
    /// Bumped on every invalidation or clear. A fetch that started under an
    /// older generation returns its result but does not store it.
    generation: AtomicU64,
    min_reset_interval: Duration,

    fetches_total: AtomicU64,
    fetch_errors_total: AtomicU64,
    invalidations_total: AtomicU64,
    invalidations_suppressed_total: AtomicU64,
}

impl KeyCache {
    /// Creates a cache with [`DEFAULT_MIN_RESET_INTERVAL`].
    #[must_use]
    pub fn new(source: Arc<dyn SigningKeySource>) -> Self {
        Self::with_min_reset_interval(source, DEFAULT_MIN_RESET_INTERVAL)
    }

    /// Creates a cache with a custom invalidation rate limit.
    #[must_use]
    pub fn with_min_reset_interval(
        source: Arc<dyn SigningKeySource>,
        min_reset_interval: Duration,
    ) -> Self {
        Self {
            source,
            state: Mutex::new(CacheState::default()),
            fetch_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            min_reset_interval,
            fetches_total: AtomicU64::new(0),
            fetch_errors_total: AtomicU64::new(0),
            invalidations_total: AtomicU64::new(0),
            invalidations_suppressed_total: AtomicU64::new(0),
        }
    }

    /// Returns the cached key set, fetching it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyFetch`] if the source fails. Nothing is cached
    /// on failure, so the next call retries.
    #[tracing::instrument(skip(self))]
    pub async fn get_keys(&self) -> Result<Arc<JwkSet>, AuthError> {
        if let Some(keys) = self.cached() {
            tracing::trace!("key set cache hit");
            return Ok(keys);
        }

        let _guard = self.fetch_lock.lock().await;

        // Another caller may have fetched while we waited for the lock.
        if let Some(keys) = self.cached() {
            return Ok(keys);
        }

        let gen_before = self.generation.load(Ordering::Acquire);

        fail_point!("key-cache-before-fetch", |_| {
            Err(AuthError::key_fetch(authsync_backend::BackendError::internal(
                "injected failure before key set fetch",
            )))
        });

        self.fetches_total.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let keys = match self.source.fetch_key_set().await {
            Ok(keys) => Arc::new(keys),
            Err(err) => {
                self.fetch_errors_total.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %err, "signing key set fetch failed");
                return Err(AuthError::key_fetch(err));
            },
        };

        if self.generation.load(Ordering::Acquire) != gen_before {
            tracing::debug!("discarding fetched key set: invalidated during fetch");
            return Ok(keys);
        }

        self.state.lock().keys = Some(Arc::clone(&keys));
        tracing::debug!(
            key_count = keys.keys.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "signing key set cached"
        );
        Ok(keys)
    }

    /// Drops the cached key set, unless another invalidation was honored
    /// within the last `min_reset_interval`.
    ///
    /// Returns `true` if the cache was reset, `false` if the call was
    /// suppressed by the rate limit.
    #[tracing::instrument(skip(self))]
    pub fn invalidate(&self) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();

        if let Some(last) = state.last_reset {
            let since = now.saturating_duration_since(last);
            if since < self.min_reset_interval {
                drop(state);
                self.invalidations_suppressed_total.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    since_last_reset_ms = since.as_millis() as u64,
                    min_reset_interval_ms = self.min_reset_interval.as_millis() as u64,
                    "key set invalidation suppressed by rate limit"
                );
                return false;
            }
        }

        self.generation.fetch_add(1, Ordering::Release);
        state.keys = None;
        state.last_reset = Some(now);
        drop(state);

        self.invalidations_total.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            audit.action = "invalidate_key_set",
            audit.result = "success",
            "signing key set invalidated"
        );
        true
    }

    /// Drops the cached key set and the rate-limit history unconditionally.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::Release);
        let mut state = self.state.lock();
        state.keys = None;
        state.last_reset = None;
    }

    /// Returns `true` if a key set is currently cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.state.lock().keys.is_some()
    }

    /// Minimum interval between honored invalidations.
    #[must_use]
    pub fn min_reset_interval(&self) -> Duration {
        self.min_reset_interval
    }

    /// Number of fetches issued against the source.
    #[must_use]
    pub fn fetches_total(&self) -> u64 {
        self.fetches_total.load(Ordering::Relaxed)
    }

    /// Number of fetches that failed.
    #[must_use]
    pub fn fetch_errors_total(&self) -> u64 {
        self.fetch_errors_total.load(Ordering::Relaxed)
    }

    /// Number of honored invalidations.
    #[must_use]
    pub fn invalidations_total(&self) -> u64 {
        self.invalidations_total.load(Ordering::Relaxed)
    }

    /// Number of invalidations suppressed by the rate limit.
    #[must_use]
    pub fn invalidations_suppressed_total(&self) -> u64 {
        self.invalidations_suppressed_total.load(Ordering::Relaxed)
    }

    fn cached(&self) -> Option<Arc<JwkSet>> {
        self.state.lock().keys.clone()
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("cached", &self.is_cached())
            .field("min_reset_interval", &self.min_reset_interval)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
