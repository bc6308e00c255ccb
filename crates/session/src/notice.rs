//! User-visible notices emitted by the session driver.

use std::fmt;

use serde::Serialize;

/// Something the page should tell the user about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// A user signed in.
    SignedIn {
        /// The verified user id.
        user_id: String,
    },
    /// The user signed out.
    SignedOut,
    /// A session token was rejected and the session cleared.
    Rejected {
        /// Why the token was rejected.
        reason: String,
    },
    /// A page load gave up waiting for the auth check.
    AuthCheckTimedOut,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignedIn { user_id } => write!(f, "Signed in as {user_id}"),
            Self::SignedOut => f.write_str("Signed out"),
            Self::Rejected { reason } => write!(f, "Session rejected: {reason}"),
            Self::AuthCheckTimedOut => f.write_str("Authentication check timed out"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let notice = Notice::SignedIn { user_id: "user_1".into() };
        assert_eq!(notice.to_string(), "Signed in as user_1");
        assert_eq!(Notice::AuthCheckTimedOut.to_string(), "Authentication check timed out");
    }

    #[test]
    fn test_serialize_tagged() {
        let notice = Notice::Rejected { reason: "Token expired".into() };
        let json = serde_json::to_value(notice).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "rejected", "reason": "Token expired" }));
    }
}
