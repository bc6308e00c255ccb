//! Backend API credential.

use std::fmt;

use zeroize::Zeroizing;

use crate::error::{BackendError, BackendResult};

/// Environment variable consulted when no secret key is passed explicitly.
pub const SECRET_KEY_ENV: &str = "CLERK_SECRET_KEY";

/// Secret bearer credential for the identity provider's backend API.
///
/// The value is held in a [`Zeroizing`] buffer and never printed; `Debug`
/// shows only a redacted placeholder.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<String>);

impl SecretKey {
    /// Wraps an explicit secret.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::MissingSecretKey`] if `secret` is empty.
    pub fn new(secret: impl Into<String>) -> BackendResult<Self> {
        let secret = Zeroizing::new(secret.into());
        if secret.trim().is_empty() {
            return Err(BackendError::missing_secret_key(SECRET_KEY_ENV));
        }
        Ok(Self(secret))
    }

    /// Resolves the secret from an explicit value, falling back to
    /// [`SECRET_KEY_ENV`].
    ///
    /// A non-blank explicit value always wins, even if the environment also
    /// carries one. A blank explicit value counts as absent.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::MissingSecretKey`] if neither source yields a
    /// non-empty secret.
    pub fn resolve(explicit: Option<&str>) -> BackendResult<Self> {
        Self::resolve_with(explicit, |name| std::env::var(name).ok())
    }

    /// Same as [`resolve`](Self::resolve) with an injectable environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::MissingSecretKey`] if neither source yields a
    /// non-empty secret.
    pub fn resolve_with(
        explicit: Option<&str>,
        lookup: impl FnOnce(&str) -> Option<String>,
    ) -> BackendResult<Self> {
        if let Some(secret) = explicit.filter(|s| !s.trim().is_empty()) {
            return Self::new(secret);
        }
        match lookup(SECRET_KEY_ENV) {
            Some(secret) => Self::new(secret),
            None => Err(BackendError::missing_secret_key(SECRET_KEY_ENV)),
        }
    }

    /// Exposes the raw secret for building an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}
