//! User profile access for signed-in sessions.

use std::{collections::HashMap, sync::Arc};

use authsync_backend::{UserDirectory, UserProfile};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{Result, SessionError},
    handler::{Handler, HandlerId},
    session::{Session, SessionSnapshot},
};

/// Fetches the full profile of the user signed in to `session`.
///
/// # Errors
///
/// - [`SessionError::MissingUser`] if nobody is signed in, or the directory
///   does not know the user
/// - [`SessionError::Backend`] if the lookup fails
#[tracing::instrument(skip(session), fields(session_id = %session.id()))]
pub async fn get_user(session: &Session) -> Result<UserProfile> {
    let directory = session.context().user_directory();
    fetch_profile(directory.as_ref(), session.user_id().as_deref()).await
}

async fn fetch_profile(
    directory: &dyn UserDirectory,
    user_id: Option<&str>,
) -> Result<UserProfile> {
    let user_id = user_id.ok_or_else(|| SessionError::missing_user("no user is signed in"))?;
    directory
        .get_user(user_id)
        .await?
        .ok_or_else(|| SessionError::missing_user(format!("user {user_id} not found")))
}

/// Display-oriented subset of a [`UserProfile`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    /// User id.
    pub user_id: String,
    /// Given name, or empty.
    pub first_name: String,
    /// Family name, or empty.
    pub last_name: String,
    /// Username, or empty.
    pub username: String,
    /// Primary email address, or empty.
    pub email_address: String,
    /// Whether the user uploaded a profile image.
    pub has_image: bool,
    /// Profile image URL, or empty.
    pub image_url: String,
}

impl From<&UserProfile> for UserSummary {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.id.clone(),
            first_name: profile.first_name.clone().unwrap_or_default(),
            last_name: profile.last_name.clone().unwrap_or_default(),
            username: profile.username.clone().unwrap_or_default(),
            email_address: profile.primary_email().unwrap_or_default().to_owned(),
            has_image: profile.has_image,
            image_url: profile.image_url.clone().unwrap_or_default(),
        }
    }
}

/// Per-session user summaries, kept current by an auth-change handler.
pub struct UserState {
    directory: Arc<dyn UserDirectory>,
    summaries: RwLock<HashMap<Uuid, UserSummary>>,
}

impl UserState {
    /// Creates an empty state backed by `directory`.
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory, summaries: RwLock::new(HashMap::new()) }
    }

    /// Identity of the handler returned by [`handler`](Self::handler).
    #[must_use]
    pub fn handler_id() -> HandlerId {
        HandlerId::new("UserState", "load_user")
    }

    /// Refreshes the summary for `session`.
    ///
    /// # Errors
    ///
    /// Returns backend errors. A missing user is not an error: the summary
    /// is reset to its default.
    pub async fn load(&self, session: &Session) -> Result<()> {
        self.refresh(&session.snapshot()).await
    }

    async fn refresh(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let summary =
            match fetch_profile(self.directory.as_ref(), snapshot.user_id.as_deref()).await {
                Ok(profile) => UserSummary::from(&profile),
                Err(SessionError::MissingUser { .. }) => UserSummary::default(),
                Err(err) => return Err(err),
            };
        self.summaries.write().insert(snapshot.session_id, summary);
        Ok(())
    }

    /// Current summary for a session, default if never loaded.
    #[must_use]
    pub fn summary(&self, session_id: Uuid) -> UserSummary {
        self.summaries.read().get(&session_id).cloned().unwrap_or_default()
    }

    /// Drops the summary of a closed session.
    pub fn forget(&self, session_id: Uuid) {
        self.summaries.write().remove(&session_id);
    }

    /// A dependent handler that refreshes the summary on every transition.
    /// Backend failures are logged and leave the previous summary in place.
    #[must_use]
    pub fn handler(self: &Arc<Self>) -> Handler {
        let state = Arc::clone(self);
        Handler::new(Self::handler_id(), move |snapshot| {
            let state = Arc::clone(&state);
            async move {
                if let Err(err) = state.refresh(&snapshot).await {
                    tracing::warn!(error = %err, "failed to load user profile");
                }
            }
        })
    }
}

impl std::fmt::Debug for UserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserState").field("sessions", &self.summaries.read().len()).finish()
    }
}
