//! Auth-change dispatch.
//!
//! Components that depend on the auth state (a profile loader, a
//! permissions cache, a page fragment) register a [`Handler`] once at
//! startup. Every transition returns the currently registered handlers and
//! the hosting loop invokes them with [`dispatch`]. The state machine never
//! calls handlers itself.
//!
//! Handlers are identified by their [`HandlerId`]. Registering the same id
//! twice replaces the earlier callback in place, so a component that is
//! constructed more than once still runs once per transition.

use std::{
    fmt,
    future::Future,
    hash::{Hash, Hasher},
    sync::Arc,
};

use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::session::SessionSnapshot;

/// Stable identity of a dependent handler: the owning component and the
/// function name within it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId {
    owner: String,
    function: String,
}

impl HandlerId {
    /// Creates an identity from owner and function names.
    #[must_use]
    pub fn new(owner: impl Into<String>, function: impl Into<String>) -> Self {
        Self { owner: owner.into(), function: function.into() }
    }

    /// The owning component.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The function within the owner.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.function)
    }
}

type Callback = Arc<dyn Fn(SessionSnapshot) -> BoxFuture<'static, ()> + Send + Sync>;

/// A dependent handler: an identity plus an async callback receiving the
/// post-transition snapshot.
///
/// Equality and hashing consider the [`HandlerId`] only.
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    callback: Callback,
}

impl Handler {
    /// Wraps an async callback.
    pub fn new<F, Fut>(id: HandlerId, callback: F) -> Self
    where
        F: Fn(SessionSnapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |snapshot| Box::pin(callback(snapshot)));
        Self { id, callback }
    }

    /// The handler identity.
    #[must_use]
    pub fn id(&self) -> &HandlerId {
        &self.id
    }

    /// Runs the callback.
    pub async fn invoke(&self, snapshot: SessionSnapshot) {
        (self.callback)(snapshot).await;
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("id", &self.id).finish_non_exhaustive()
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handler {}

impl Hash for Handler {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Ordered, process-wide set of dependent handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<Vec<Handler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler`. A handler with the same id is replaced in
    /// place and keeps its position.
    ///
    /// Returns `true` if the id was not registered before.
    pub fn register(&self, handler: Handler) -> bool {
        let mut handlers = self.handlers.write();
        if let Some(existing) = handlers.iter_mut().find(|h| h.id == handler.id) {
            tracing::debug!(handler = %handler.id, "replacing dependent handler");
            *existing = handler;
            return false;
        }
        tracing::debug!(handler = %handler.id, "registering dependent handler");
        handlers.push(handler);
        true
    }

    /// Removes the handler with `id`. Returns `true` if one was removed.
    pub fn unregister(&self, id: &HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|h| &h.id != id);
        handlers.len() != before
    }

    /// Snapshot of the registered handlers in registration order.
    #[must_use]
    pub fn current(&self) -> Vec<Handler> {
        self.handlers.read().clone()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.handlers.read().iter().map(|h| h.id.to_string()).collect();
        f.debug_struct("HandlerRegistry").field("handlers", &ids).finish()
    }
}

/// Invokes `handlers` one after another, in order, with `snapshot`.
pub async fn dispatch(handlers: &[Handler], snapshot: &SessionSnapshot) {
    for handler in handlers {
        tracing::trace!(handler = %handler.id, "dispatching auth change");
        handler.invoke(snapshot.clone()).await;
    }
}
