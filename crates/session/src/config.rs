//! Configuration for the session synchronization layer.
//!
//! [`SessionConfig`] carries everything [`AuthContext::from_config`]
//! needs: where the provider's backend API lives, the credential used to
//! call it, and the timing knobs of the sync protocol.
//!
//! [`AuthContext::from_config`]: crate::context::AuthContext::from_config

use std::time::Duration;

use authsync_authn::{ClaimsPolicy, DEFAULT_LEEWAY, DEFAULT_MIN_RESET_INTERVAL};
use authsync_backend::{BackendConfig, DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT, SecretKey};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Default time a page load waits for the first auth check (1 second).
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for [`AuthContext`](crate::context::AuthContext).
///
/// The secret key is never (de)serialized. When it is not set explicitly,
/// context construction falls back to the `CLERK_SECRET_KEY` environment
/// variable.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use authsync_session::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .secret_key("sk_test_123")
///     .gate_timeout(Duration::from_millis(500))
///     .register_user_state(true)
///     .build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Backend API base URL.
    #[serde(default = "default_api_url")]
    pub(crate) api_url: String,

    /// Backend API credential.
    #[serde(skip)]
    pub(crate) secret_key: Option<SecretKey>,

    /// Per-request timeout for backend calls.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub(crate) request_timeout: Duration,

    /// How long a page load waits for the first auth check.
    #[serde(with = "humantime_serde", default = "default_gate_timeout")]
    pub(crate) gate_timeout: Duration,

    /// Minimum interval between honored key set invalidations.
    #[serde(with = "humantime_serde", default = "default_key_reset_interval")]
    pub(crate) key_reset_interval: Duration,

    /// Clock skew tolerated on time claims.
    #[serde(with = "humantime_serde", default = "default_clock_leeway")]
    pub(crate) clock_leeway: Duration,

    /// Register [`UserState`](crate::user::UserState) as a dependent handler.
    #[serde(default)]
    pub(crate) register_user_state: bool,

    /// Required `iss` claim value.
    #[serde(default)]
    pub(crate) issuer: Option<String>,

    /// Accepted `azp` claim values. Empty accepts any.
    #[serde(default)]
    pub(crate) authorized_parties: Vec<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_owned()
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_gate_timeout() -> Duration {
    DEFAULT_GATE_TIMEOUT
}

fn default_key_reset_interval() -> Duration {
    DEFAULT_MIN_RESET_INTERVAL
}

fn default_clock_leeway() -> Duration {
    DEFAULT_LEEWAY
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            secret_key: None,
            request_timeout: default_request_timeout(),
            gate_timeout: default_gate_timeout(),
            key_reset_interval: default_key_reset_interval(),
            clock_leeway: default_clock_leeway(),
            register_user_state: false,
            issuer: None,
            authorized_parties: Vec::new(),
        }
    }
}

#[bon::bon]
impl SessionConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `api_url` - Backend API base URL (default: [`DEFAULT_API_URL`]).
    /// * `secret_key` - Backend credential (default: taken from the environment later).
    ///   A blank value counts as unset.
    /// * `request_timeout` - Backend request timeout (default: 10 seconds).
    /// * `gate_timeout` - Page-load auth check timeout (default: 1 second).
    /// * `key_reset_interval` - Key set invalidation rate limit (default: 10 seconds).
    /// * `clock_leeway` - Time claim skew (default: 60 seconds).
    /// * `register_user_state` - Register the user profile handler (default: false).
    /// * `issuer` - Required `iss` claim.
    /// * `authorized_parties` - Accepted `azp` values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `api_url` is not an `http(s)` URL
    /// - any timeout or interval is zero
    #[builder]
    pub fn new(
        #[builder(into, default = DEFAULT_API_URL.to_owned())] api_url: String,
        #[builder(into)] secret_key: Option<String>,
        #[builder(default = DEFAULT_REQUEST_TIMEOUT)] request_timeout: Duration,
        #[builder(default = DEFAULT_GATE_TIMEOUT)] gate_timeout: Duration,
        #[builder(default = DEFAULT_MIN_RESET_INTERVAL)] key_reset_interval: Duration,
        #[builder(default = DEFAULT_LEEWAY)] clock_leeway: Duration,
        #[builder(default)] register_user_state: bool,
        #[builder(into)] issuer: Option<String>,
        #[builder(default)] authorized_parties: Vec<String>,
    ) -> Result<Self> {
        let secret_key = secret_key
            .filter(|s| !s.trim().is_empty())
            .map(SecretKey::new)
            .transpose()?;

        let config = Self {
            api_url,
            secret_key,
            request_timeout,
            gate_timeout,
            key_reset_interval,
            clock_leeway,
            register_user_state,
            issuer,
            authorized_parties,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants the builder enforces. Deserialized configurations
    /// are checked again at context construction.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("https://") || self.api_url.starts_with("http://")) {
            return Err(SessionError::invalid_config(format!(
                "api_url must be an http(s) URL, got {:?}",
                self.api_url
            )));
        }

        for (name, value) in [
            ("request_timeout", self.request_timeout),
            ("gate_timeout", self.gate_timeout),
            ("key_reset_interval", self.key_reset_interval),
        ] {
            if value.is_zero() {
                return Err(SessionError::invalid_config(format!("{name} must be non-zero")));
            }
        }

        Ok(())
    }

    /// Returns the backend API base URL.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Returns the explicit secret key, if one was configured.
    #[must_use]
    pub fn secret_key(&self) -> Option<&SecretKey> {
        self.secret_key.as_ref()
    }

    /// Returns the backend request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the page-load gate timeout.
    #[must_use]
    pub fn gate_timeout(&self) -> Duration {
        self.gate_timeout
    }

    /// Returns the key set invalidation rate limit.
    #[must_use]
    pub fn key_reset_interval(&self) -> Duration {
        self.key_reset_interval
    }

    /// Returns the clock skew tolerated on time claims.
    #[must_use]
    pub fn clock_leeway(&self) -> Duration {
        self.clock_leeway
    }

    /// Returns whether the user profile handler is registered.
    #[must_use]
    pub fn register_user_state(&self) -> bool {
        self.register_user_state
    }

    /// Builds the claims policy: `exp`/`nbf` required, plus the configured
    /// issuer and authorized parties.
    #[must_use]
    pub fn claims_policy(&self) -> ClaimsPolicy {
        let mut policy = ClaimsPolicy::default().with_leeway(self.clock_leeway);
        if let Some(issuer) = &self.issuer {
            policy = policy.with_issuer(issuer.clone());
        }
        if !self.authorized_parties.is_empty() {
            policy = policy.with_authorized_parties(self.authorized_parties.iter().cloned());
        }
        policy
    }

    /// Builds the HTTP client configuration around a resolved secret.
    pub(crate) fn backend_config(&self, secret_key: SecretKey) -> BackendConfig {
        BackendConfig::builder()
            .secret_key(secret_key)
            .api_url(self.api_url.clone())
            .request_timeout(self.request_timeout)
            .build()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::builder().build().unwrap();
        assert_eq!(config.api_url(), DEFAULT_API_URL);
        assert!(config.secret_key().is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.gate_timeout(), Duration::from_secs(1));
        assert_eq!(config.key_reset_interval(), Duration::from_secs(10));
        assert_eq!(config.clock_leeway(), Duration::from_secs(60));
        assert!(!config.register_user_state());
    }

    #[test]
    fn test_builder_defaults_match_default_impl() {
        let built = SessionConfig::builder().build().unwrap();
        let default = SessionConfig::default();

        assert_eq!(built.api_url, default.api_url);
        assert_eq!(built.gate_timeout, default.gate_timeout);
        assert_eq!(built.key_reset_interval, default.key_reset_interval);
        assert_eq!(built.clock_leeway, default.clock_leeway);
    }

    #[test]
    fn test_explicit_secret_key() {
        let config = SessionConfig::builder().secret_key("sk_test_abc").build().unwrap();
        assert_eq!(config.secret_key().map(SecretKey::expose), Some("sk_test_abc"));
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank(" \t")]
    fn test_blank_secret_key_is_unset(#[case] secret: &str) {
        let config = SessionConfig::builder().secret_key(secret).build().unwrap();
        assert!(config.secret_key().is_none());
    }

    #[rstest]
    #[case::not_a_url("api.clerk.com/v1")]
    #[case::wrong_scheme("ftp://api.clerk.com/v1")]
    #[case::empty("")]
    fn test_invalid_api_url_rejected(#[case] url: &str) {
        let result = SessionConfig::builder().api_url(url).build();
        assert!(matches!(result, Err(SessionError::InvalidConfig { .. })), "{url:?}");
    }

    #[test]
    fn test_zero_gate_timeout_rejected() {
        let result = SessionConfig::builder().gate_timeout(Duration::ZERO).build();
        let Err(SessionError::InvalidConfig { message }) = result else {
            panic!("expected InvalidConfig, got {result:?}");
        };
        assert!(message.contains("gate_timeout"));
    }

    #[test]
    fn test_deserialize_humantime_durations() {
        let config: SessionConfig = serde_json::from_value(serde_json::json!({
            "api_url": "http://localhost:8080/v1",
            "gate_timeout": "250ms",
            "clock_leeway": "5s",
            "register_user_state": true,
        }))
        .unwrap();

        assert_eq!(config.api_url(), "http://localhost:8080/v1");
        assert_eq!(config.gate_timeout(), Duration::from_millis(250));
        assert_eq!(config.clock_leeway(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert!(config.register_user_state());
        assert!(config.secret_key().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let result: std::result::Result<SessionConfig, _> =
            serde_json::from_value(serde_json::json!({ "gate_timout": "1s" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_secret_key_never_serialized() {
        let config = SessionConfig::builder().secret_key("sk_test_hidden").build().unwrap();
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("sk_test_hidden"));
        assert!(!rendered.contains("secret_key"));
    }

    #[test]
    fn test_claims_policy_carries_issuer_and_parties() {
        let config = SessionConfig::builder()
            .issuer("https://clerk.example.com")
            .authorized_parties(vec!["https://app.example.com".to_owned()])
            .clock_leeway(Duration::from_secs(5))
            .build()
            .unwrap();

        let policy = config.claims_policy();
        assert_eq!(policy.leeway(), Duration::from_secs(5));
        assert!(policy.rule("iss").is_some_and(|rule| rule.essential));
        assert!(policy.rule("azp").is_some());
        assert!(policy.rule("exp").is_some());
    }
}
