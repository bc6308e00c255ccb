//! Per-session event loop.
//!
//! The driver plays the hosting framework's part of the protocol: it owns
//! the receiving end of a session's [`AuthEvent`] channel, applies events
//! strictly in arrival order, reports each transition as a [`Notice`] and
//! invokes the dependent handlers the transition returned. It also serves
//! page loads through the deferred-work gate.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    bridge::AuthEvent,
    error::{Result, SessionError},
    gate::{CorrelationId, GateOutcome},
    handler::dispatch,
    notice::Notice,
    session::{Session, Transition},
};

/// Capacity of a driver's inbound event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Spawns session event loops.
#[derive(Debug)]
pub struct SessionDriver;

impl SessionDriver {
    /// Starts the event loop for `session` on the current runtime.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    #[must_use]
    pub fn spawn(session: Arc<Session>, notices: mpsc::UnboundedSender<Notice>) -> DriverHandle {
        let (events_tx, mut events_rx) = mpsc::channel::<AuthEvent>(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        let looped = Arc::clone(&session);
        let looped_notices = notices.clone();
        let span = tracing::info_span!("session_driver", session_id = %session.id());
        let task = tokio::spawn(
            async move {
                loop {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => {
                            tracing::debug!("session driver shutting down");
                            break;
                        }
                        event = events_rx.recv() => {
                            let Some(event) = event else {
                                tracing::debug!("event channel closed");
                                break;
                            };
                            apply(&looped, event, &looped_notices).await;
                        }
                    }
                }
            }
            .instrument(span),
        );

        DriverHandle { session, events: events_tx, notices, cancel, task }
    }
}

async fn apply(session: &Session, event: AuthEvent, notices: &mpsc::UnboundedSender<Notice>) {
    let transition = match event {
        AuthEvent::SetSession { token } => session.set_session(&token).await,
        AuthEvent::ClearSession => session.clear_session().await,
    };

    let notice = match &transition {
        Transition::SignedIn { user_id, .. } => Notice::SignedIn { user_id: user_id.clone() },
        Transition::SignedOut { rejected: Some(err), .. } => {
            Notice::Rejected { reason: err.to_string() }
        },
        Transition::SignedOut { rejected: None, .. } => Notice::SignedOut,
    };
    // The page may be gone; the transition still stands.
    let _ = notices.send(notice);

    dispatch(transition.handlers(), &session.snapshot()).await;
}

/// Handle to a running session driver.
#[derive(Debug)]
pub struct DriverHandle {
    session: Arc<Session>,
    events: mpsc::Sender<AuthEvent>,
    notices: mpsc::UnboundedSender<Notice>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// The driven session.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Queues `event` behind any events already sent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DriverStopped`] if the loop has exited.
    pub async fn send(&self, event: AuthEvent) -> Result<()> {
        self.events.send(event).await.map_err(|_| SessionError::DriverStopped)
    }

    /// A sender for feeding events from elsewhere (e.g. a websocket task).
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<AuthEvent> {
        self.events.clone()
    }

    /// Serves a page load: waits for the auth check through the gate, then
    /// runs the page's deferred actions with the current state.
    ///
    /// A timeout is reported as [`Notice::AuthCheckTimedOut`] but the
    /// actions still run.
    pub async fn load_page(&self, id: CorrelationId) -> GateOutcome {
        let context = self.session.context();
        let timeout = context.gate_timeout();
        let release = context.gate().await_checked(&self.session, id, timeout).await;

        if release.timed_out() {
            let _ = self.notices.send(Notice::AuthCheckTimedOut);
        }

        let snapshot = self.session.snapshot();
        for action in &release.actions {
            tracing::trace!(action = action.name(), "running deferred page action");
            action.run(snapshot.clone()).await;
        }
        release.outcome
    }

    /// Stops the loop and waits for it to exit. Events still queued are
    /// dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "session driver task failed");
        }
    }
}
