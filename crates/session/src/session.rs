//! Per-connection session state machine.
//!
//! ```text
//!              set_session(ok)
//! NotChecked ─────────────────► SignedIn
//!     │                          │   ▲
//!     │ clear_session /          │   │ set_session(ok)
//!     │ set_session(err)         ▼   │
//!     └────────────────────────► SignedOut
//!
//! reset() returns any state to NotChecked.
//! ```
//!
//! Every verification attempt ends in a terminal state: a rejected token
//! applies the same corrective transition as an explicit sign-out, and the
//! session is marked checked either way. Transitions on one session are
//! serialized through a FIFO async lock and published on a `watch`
//! channel, which is what the deferred-work gate waits on.

use std::sync::Arc;

use authsync_authn::{AuthError, FailureClass, SessionClaims, jwt};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::{context::AuthContext, handler::Handler};

/// Coarse auth state derived from a [`SessionSnapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// No verification has completed yet.
    NotChecked,
    /// Checked, no user.
    SignedOut,
    /// Checked, with a verified user.
    SignedIn,
}

/// Point-in-time view of one session's auth state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSnapshot {
    /// The session this snapshot belongs to.
    pub session_id: Uuid,
    /// A verified user is signed in.
    pub signed_in: bool,
    /// At least one transition has completed.
    pub checked: bool,
    /// Verified claims while signed in.
    pub claims: Option<SessionClaims>,
    /// The `sub` claim while signed in.
    pub user_id: Option<String>,
}

impl SessionSnapshot {
    fn new(session_id: Uuid) -> Self {
        Self { session_id, ..Self::default() }
    }

    /// Derives the coarse status.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        match (self.checked, self.signed_in) {
            (false, _) => AuthStatus::NotChecked,
            (true, false) => AuthStatus::SignedOut,
            (true, true) => AuthStatus::SignedIn,
        }
    }
}

/// Outcome of a transition, carrying the dependent handlers the caller
/// must invoke.
#[derive(Debug)]
pub enum Transition {
    /// The token verified.
    SignedIn {
        /// Verified `sub` claim.
        user_id: String,
        /// Handlers registered at the time of the transition.
        handlers: Vec<Handler>,
    },
    /// The session was cleared.
    SignedOut {
        /// The verification failure, when the clear was corrective.
        rejected: Option<AuthError>,
        /// Handlers registered at the time of the transition.
        handlers: Vec<Handler>,
    },
}

impl Transition {
    /// The dependent handlers to invoke.
    #[must_use]
    pub fn handlers(&self) -> &[Handler] {
        match self {
            Self::SignedIn { handlers, .. } | Self::SignedOut { handlers, .. } => handlers,
        }
    }

    /// The verification failure behind a corrective sign-out.
    #[must_use]
    pub fn rejection(&self) -> Option<&AuthError> {
        match self {
            Self::SignedOut { rejected, .. } => rejected.as_ref(),
            Self::SignedIn { .. } => None,
        }
    }

    /// Returns `true` for [`Transition::SignedIn`].
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn { .. })
    }
}

/// Server-side auth state of one browser connection.
pub struct Session {
    id: Uuid,
    context: Arc<AuthContext>,
    state: watch::Sender<SessionSnapshot>,
    transitions: Mutex<()>,
}

impl Session {
    /// Creates an unchecked session bound to `context`.
    #[must_use]
    pub fn new(context: Arc<AuthContext>) -> Self {
        let id = Uuid::new_v4();
        let (state, _) = watch::channel(SessionSnapshot::new(id));
        Self { id, context, state, transitions: Mutex::new(()) }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The shared context this session verifies against.
    #[must_use]
    pub fn context(&self) -> &Arc<AuthContext> {
        &self.context
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Current coarse status.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.state.borrow().status()
    }

    /// Verified user id while signed in.
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.state.borrow().user_id.clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Verifies `token` and signs the session in.
    ///
    /// On any verification failure the session is cleared and the failure
    /// is returned inside [`Transition::SignedOut`]. A decode failure also
    /// requests a (rate-limited) key set invalidation, since the provider
    /// may have rotated its keys.
    #[tracing::instrument(skip(self, token), fields(session_id = %self.id))]
    pub async fn set_session(&self, token: &str) -> Transition {
        let _guard = self.transitions.lock().await;

        let claims = match self.verify(token).await {
            Ok(claims) => claims,
            Err(err) => {
                match err.failure_class() {
                    FailureClass::Decode => {
                        tracing::warn!(error = %err, "session token failed to decode");
                        self.context.key_cache().invalidate();
                    },
                    FailureClass::Claims => {
                        tracing::warn!(error = %err, "session token claims rejected");
                    },
                    FailureClass::KeyFetch => {
                        tracing::warn!(error = %err, "signing keys unavailable");
                    },
                }
                self.apply_signed_out();
                return Transition::SignedOut {
                    rejected: Some(err),
                    handlers: self.context.handlers().current(),
                };
            },
        };

        let user_id = claims.subject().unwrap_or_default().to_owned();
        self.state.send_modify(|state| {
            state.signed_in = true;
            state.checked = true;
            state.claims = Some(claims);
            state.user_id = Some(user_id.clone());
        });
        tracing::info!(user_id = %user_id, "session signed in");

        Transition::SignedIn { user_id, handlers: self.context.handlers().current() }
    }

    /// Signs the session out and marks it checked.
    #[tracing::instrument(skip(self), fields(session_id = %self.id))]
    pub async fn clear_session(&self) -> Transition {
        let _guard = self.transitions.lock().await;
        self.apply_signed_out();
        tracing::debug!("session cleared");
        Transition::SignedOut { rejected: None, handlers: self.context.handlers().current() }
    }

    /// Returns the session to [`AuthStatus::NotChecked`] and drops the
    /// cached signing keys. Intended for development and tests.
    pub async fn reset(&self) {
        let _guard = self.transitions.lock().await;
        self.state.send_replace(SessionSnapshot::new(self.id));
        self.context.key_cache().clear();
        tracing::debug!(session_id = %self.id, "session reset");
    }

    async fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let keys = self.context.key_cache().get_keys().await?;
        let policy = self.context.claims_policy();
        jwt::verify(token, &keys, &policy)
    }

    fn apply_signed_out(&self) {
        self.state.send_modify(|state| {
            state.signed_in = false;
            state.checked = true;
            state.claims = None;
            state.user_id = None;
        });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
