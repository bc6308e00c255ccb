//! Frontend bridge protocol.
//!
//! The browser SDK reports its auth state whenever it changes. The bridge
//! turns those observations into [`AuthEvent`]s for the server: a fresh
//! session token when the user is signed in, a clear otherwise. Only
//! changes are forwarded, except after a reconnect, when the server side
//! may have lost its state and the next observation is always forwarded.

use std::fmt;

use async_trait::async_trait;
use authsync_backend::BackendResult;
use serde::{Deserialize, Serialize};

/// Auth state as reported by the browser SDK.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkAuthState {
    /// The SDK finished loading. Before that `is_signed_in` is meaningless.
    pub is_loaded: bool,
    /// A user is signed in.
    pub is_signed_in: bool,
}

impl SdkAuthState {
    /// A loaded, signed-in state.
    #[must_use]
    pub fn signed_in() -> Self {
        Self { is_loaded: true, is_signed_in: true }
    }

    /// A loaded, signed-out state.
    #[must_use]
    pub fn signed_out() -> Self {
        Self { is_loaded: true, is_signed_in: false }
    }
}

/// Source of the current session token on the browser side.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns the current session token, or `None` if there is no active
    /// session. `skip_cache` forces a freshly minted token.
    async fn get_token(&self, skip_cache: bool) -> BackendResult<Option<String>>;
}

/// Event sent from the browser to the server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// Verify `token` and sign the session in.
    SetSession {
        /// The signed session token.
        token: String,
    },
    /// Sign the session out.
    ClearSession,
}

impl fmt::Debug for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetSession { .. } => {
                f.debug_struct("SetSession").field("token", &"<redacted>").finish()
            },
            Self::ClearSession => f.write_str("ClearSession"),
        }
    }
}

/// Browser-side half of the sync protocol.
pub struct FrontendBridge<P> {
    provider: P,
    /// Whether the last forwarded event was a `SetSession`.
    last_emitted: Option<bool>,
}

impl<P: TokenProvider> FrontendBridge<P> {
    /// Creates a bridge that has not forwarded anything yet.
    pub fn new(provider: P) -> Self {
        Self { provider, last_emitted: None }
    }

    /// Processes one SDK observation and returns the event to forward, if
    /// any.
    ///
    /// A signed-in observation whose token cannot be obtained is forwarded
    /// as [`AuthEvent::ClearSession`] and retried on the next observation.
    pub async fn observe(&mut self, state: SdkAuthState) -> Option<AuthEvent> {
        if !state.is_loaded || self.last_emitted == Some(state.is_signed_in) {
            return None;
        }

        let event = if state.is_signed_in {
            match self.provider.get_token(true).await {
                Ok(Some(token)) if !token.is_empty() => AuthEvent::SetSession { token },
                Ok(_) => {
                    tracing::warn!("signed in but no session token available");
                    AuthEvent::ClearSession
                },
                Err(err) => {
                    tracing::warn!(error = %err, "failed to obtain session token");
                    AuthEvent::ClearSession
                },
            }
        } else {
            AuthEvent::ClearSession
        };

        self.last_emitted = Some(matches!(event, AuthEvent::SetSession { .. }));
        Some(event)
    }

    /// Forgets what was forwarded so the next loaded observation is
    /// forwarded unconditionally.
    pub fn reconnected(&mut self) {
        tracing::debug!("bridge reconnected; next observation will be forwarded");
        self.last_emitted = None;
    }

    /// The token provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P> fmt::Debug for FrontendBridge<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrontendBridge").field("last_emitted", &self.last_emitted).finish()
    }
}
