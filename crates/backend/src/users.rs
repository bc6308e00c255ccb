//! User profile lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::BackendResult;

/// An email address attached to a user profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Provider identifier of the address.
    #[serde(default)]
    pub id: Option<String>,
    /// The address itself.
    pub email_address: String,
}

/// Full user profile as returned by the provider's backend API.
///
/// Only the fields the session layer consumes are modelled; unknown fields
/// are ignored on deserialization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User identifier (matches the token `sub` claim).
    pub id: String,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Username, if the instance uses usernames.
    #[serde(default)]
    pub username: Option<String>,
    /// All email addresses, primary first when the provider orders them so.
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    /// Identifier of the primary email address.
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    /// Whether the user uploaded a profile image.
    #[serde(default)]
    pub has_image: bool,
    /// Profile image URL (a generated avatar when `has_image` is false).
    #[serde(default)]
    pub image_url: Option<String>,
}

impl UserProfile {
    /// Returns the primary email address, or the first one listed.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        let primary = self.primary_email_address_id.as_deref().and_then(|primary| {
            self.email_addresses.iter().find(|e| e.id.as_deref() == Some(primary))
        });
        primary.or_else(|| self.email_addresses.first()).map(|e| e.email_address.as_str())
    }
}

/// Lookup of full user profiles by user id.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetches a user profile.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(profile))` if the user exists
    /// - `Ok(None)` if it doesn't
    /// - `Err(...)` on backend errors
    async fn get_user(&self, user_id: &str) -> BackendResult<Option<UserProfile>>;
}

/// In-memory [`UserDirectory`].
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a profile, keyed by its `id`.
    pub fn insert(&self, profile: UserProfile) {
        self.users.write().insert(profile.id.clone(), profile);
    }

    /// Removes a profile.
    pub fn remove(&self, user_id: &str) -> Option<UserProfile> {
        self.users.write().remove(user_id)
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_user(&self, user_id: &str) -> BackendResult<Option<UserProfile>> {
        Ok(self.users.read().get(user_id).cloned())
    }
}
