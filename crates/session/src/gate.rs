//! Deferred-work gate.
//!
//! Page content that depends on the auth state must not run before the
//! first verification of the connection has completed. Such work is
//! registered once under a [`CorrelationId`]; every page load then calls
//! [`DeferredWorkGate::await_checked`], which suspends until the session is
//! checked or a timeout elapses, and hands the work back.
//!
//! The wait is best-effort. On timeout the actions are still returned,
//! tagged [`GateOutcome::TimedOut`], so the page renders with whatever
//! state exists rather than not at all.

use std::{collections::HashMap, fmt, future::Future, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::session::{Session, SessionSnapshot};

/// Key of a registered batch of deferred work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a gate wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    /// The session was checked within the timeout.
    Checked,
    /// The timeout elapsed first.
    TimedOut,
}

/// Work handed back by [`DeferredWorkGate::await_checked`].
#[derive(Debug)]
pub struct GateRelease<A> {
    /// The registered actions, in registration order.
    pub actions: Vec<A>,
    /// How the wait ended.
    pub outcome: GateOutcome,
}

impl<A> GateRelease<A> {
    /// Returns `true` if the session was not checked in time.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.outcome == GateOutcome::TimedOut
    }
}

/// Registry of deferred work, shared by all sessions.
///
/// Entries are kept until [`unregister`](Self::unregister) so the same
/// batch is released on every page load.
pub struct DeferredWorkGate<A> {
    pending: Mutex<HashMap<CorrelationId, Vec<A>>>,
}

impl<A: Clone> DeferredWorkGate<A> {
    /// Creates an empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self { pending: Mutex::new(HashMap::new()) }
    }

    /// Stores `actions` and returns the id to await them with.
    pub fn register(&self, actions: Vec<A>) -> CorrelationId {
        let id = CorrelationId::new();
        tracing::debug!(correlation_id = %id, actions = actions.len(), "registered deferred work");
        self.pending.lock().insert(id, actions);
        id
    }

    /// Waits until `session` is checked or `timeout` elapses, then returns
    /// the actions registered under `id`.
    ///
    /// Never fails: a timeout still yields the actions. An unknown id waits
    /// the same way and yields no actions.
    #[tracing::instrument(skip(self, session), fields(session_id = %session.id()))]
    pub async fn await_checked(
        &self,
        session: &Session,
        id: CorrelationId,
        timeout: Duration,
    ) -> GateRelease<A> {
        let registered = self.pending.lock().get(&id).cloned();
        let actions = registered.unwrap_or_else(|| {
            tracing::warn!(correlation_id = %id, "no deferred work registered under this id");
            Vec::new()
        });

        let mut state = session.subscribe();
        let wait = tokio::time::timeout(timeout, state.wait_for(|s| s.checked)).await;
        let outcome = if matches!(wait, Ok(Ok(_))) {
            GateOutcome::Checked
        } else {
            tracing::warn!(
                correlation_id = %id,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "auth check did not complete in time; releasing deferred work anyway"
            );
            GateOutcome::TimedOut
        };

        GateRelease { actions, outcome }
    }

    /// Removes the entry for `id`, returning its actions.
    pub fn unregister(&self, id: CorrelationId) -> Option<Vec<A>> {
        self.pending.lock().remove(&id)
    }

    /// Number of registered entries.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<A: Clone> Default for DeferredWorkGate<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for DeferredWorkGate<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredWorkGate").field("pending", &self.pending.lock().len()).finish()
    }
}

type PageCallback = Arc<dyn Fn(SessionSnapshot) -> BoxFuture<'static, ()> + Send + Sync>;

/// A named piece of page work deferred until the auth check completes.
#[derive(Clone)]
pub struct PageAction {
    name: String,
    callback: PageCallback,
}

impl PageAction {
    /// Wraps an async callback receiving the session state at release time.
    pub fn new<F, Fut>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(SessionSnapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: PageCallback = Arc::new(move |snapshot| Box::pin(callback(snapshot)));
        Self { name: name.into(), callback }
    }

    /// Action name, for logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the action.
    pub async fn run(&self, snapshot: SessionSnapshot) {
        (self.callback)(snapshot).await;
    }
}

impl fmt::Debug for PageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAction").field("name", &self.name).finish_non_exhaustive()
    }
}
