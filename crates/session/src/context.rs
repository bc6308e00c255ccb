//! Process-wide shared state.
//!
//! One [`AuthContext`] is built at startup and shared by every session:
//! the signing key cache, the claims policy, the dependent handler
//! registry, the deferred-work gate and the user directory. It is passed
//! explicitly; nothing here is global.

use std::{sync::Arc, time::Duration};

use authsync_authn::{ClaimsPolicy, DEFAULT_MIN_RESET_INTERVAL, KeyCache};
use authsync_backend::{
    HttpBackendClient, MemoryUserDirectory, SecretKey, SigningKeySource, UserDirectory,
};
use parking_lot::RwLock;

use crate::{
    config::{DEFAULT_GATE_TIMEOUT, SessionConfig},
    error::Result,
    gate::{DeferredWorkGate, PageAction},
    handler::{Handler, HandlerRegistry},
    session::Session,
    user::UserState,
};

/// Shared state of the auth synchronization layer.
pub struct AuthContext {
    key_cache: KeyCache,
    claims_policy: RwLock<Arc<ClaimsPolicy>>,
    handlers: HandlerRegistry,
    gate: DeferredWorkGate<PageAction>,
    gate_timeout: RwLock<Duration>,
    user_directory: Arc<dyn UserDirectory>,
    user_state: Option<Arc<UserState>>,
}

#[bon::bon]
impl AuthContext {
    /// Builds a context around explicit backends.
    ///
    /// # Optional Fields
    ///
    /// * `user_directory` - Profile lookups (default: an empty in-memory directory).
    /// * `claims_policy` - Claims rules (default: [`ClaimsPolicy::default`]).
    /// * `gate_timeout` - Page-load auth check timeout (default: 1 second).
    /// * `key_reset_interval` - Key set invalidation rate limit (default: 10 seconds).
    /// * `register_user_state` - Register a [`UserState`] handler (default: false).
    #[builder]
    pub fn new(
        key_source: Arc<dyn SigningKeySource>,
        user_directory: Option<Arc<dyn UserDirectory>>,
        #[builder(default)] claims_policy: ClaimsPolicy,
        #[builder(default = DEFAULT_GATE_TIMEOUT)] gate_timeout: Duration,
        #[builder(default = DEFAULT_MIN_RESET_INTERVAL)] key_reset_interval: Duration,
        #[builder(default)] register_user_state: bool,
    ) -> Arc<Self> {
        let user_directory: Arc<dyn UserDirectory> =
            user_directory.unwrap_or_else(|| Arc::new(MemoryUserDirectory::new()));

        let handlers = HandlerRegistry::new();
        let user_state = register_user_state.then(|| {
            let state = Arc::new(UserState::new(Arc::clone(&user_directory)));
            handlers.register(state.handler());
            state
        });

        Arc::new(Self {
            key_cache: KeyCache::with_min_reset_interval(key_source, key_reset_interval),
            claims_policy: RwLock::new(Arc::new(claims_policy)),
            handlers,
            gate: DeferredWorkGate::new(),
            gate_timeout: RwLock::new(gate_timeout),
            user_directory,
            user_state,
        })
    }

    /// Builds a context talking to the provider's backend API.
    ///
    /// The secret key comes from the configuration or, failing that, from
    /// the `CLERK_SECRET_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Backend`](crate::SessionError::Backend) wrapping
    ///   `MissingSecretKey` if no secret is available
    /// - [`SessionError::InvalidConfig`](crate::SessionError::InvalidConfig) if
    ///   the configuration is invalid
    pub fn from_config(config: &SessionConfig) -> Result<Arc<Self>> {
        Self::from_config_with_env(config, |name| std::env::var(name).ok())
    }

    /// Same as [`from_config`](Self::from_config) with an injectable
    /// environment lookup.
    ///
    /// # Errors
    ///
    /// See [`from_config`](Self::from_config).
    pub fn from_config_with_env(
        config: &SessionConfig,
        lookup: impl FnOnce(&str) -> Option<String>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let secret_key = match config.secret_key() {
            Some(secret_key) => secret_key.clone(),
            None => SecretKey::resolve_with(None, lookup)?,
        };
        let client = Arc::new(HttpBackendClient::new(config.backend_config(secret_key))?);
        tracing::info!(api_url = config.api_url(), "auth context configured");

        Ok(Self::builder()
            .key_source(client.clone())
            .user_directory(client)
            .claims_policy(config.claims_policy())
            .gate_timeout(config.gate_timeout())
            .key_reset_interval(config.key_reset_interval())
            .register_user_state(config.register_user_state())
            .build())
    }

    /// Creates a new session bound to this context.
    #[must_use]
    pub fn session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self))
    }

    /// The signing key cache.
    #[must_use]
    pub fn key_cache(&self) -> &KeyCache {
        &self.key_cache
    }

    /// The active claims policy.
    #[must_use]
    pub fn claims_policy(&self) -> Arc<ClaimsPolicy> {
        Arc::clone(&self.claims_policy.read())
    }

    /// Replaces the claims policy. Applies to verifications that start
    /// afterwards.
    pub fn set_claims_policy(&self, policy: ClaimsPolicy) {
        *self.claims_policy.write() = Arc::new(policy);
    }

    /// The dependent handler registry.
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Registers a dependent handler. See [`HandlerRegistry::register`].
    pub fn register_handler(&self, handler: Handler) -> bool {
        self.handlers.register(handler)
    }

    /// The deferred-work gate.
    #[must_use]
    pub fn gate(&self) -> &DeferredWorkGate<PageAction> {
        &self.gate
    }

    /// How long page loads wait for the auth check.
    #[must_use]
    pub fn gate_timeout(&self) -> Duration {
        *self.gate_timeout.read()
    }

    /// Changes the page-load wait.
    pub fn set_gate_timeout(&self, timeout: Duration) {
        *self.gate_timeout.write() = timeout;
    }

    /// The user directory.
    #[must_use]
    pub fn user_directory(&self) -> &Arc<dyn UserDirectory> {
        &self.user_directory
    }

    /// The registered user state, if enabled.
    #[must_use]
    pub fn user_state(&self) -> Option<&Arc<UserState>> {
        self.user_state.as_ref()
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("key_cache", &self.key_cache)
            .field("handlers", &self.handlers)
            .field("gate", &self.gate)
            .field("gate_timeout", &self.gate_timeout())
            .finish_non_exhaustive()
    }
}
