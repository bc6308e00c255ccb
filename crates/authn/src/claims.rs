//! Decoded session token payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload of a verified session token.
///
/// Session tokens carry a provider-defined, partly customizable claim set,
/// so the payload is kept as a JSON object with typed accessors for the
/// registered claims the session layer relies on.
///
/// ```json
/// {
///   "sub": "user_2abc",
///   "iss": "https://clerk.example.com",
///   "azp": "https://app.example.com",
///   "sid": "sess_2abc",
///   "exp": 1700000060,
///   "iat": 1700000000,
///   "nbf": 1699999990
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionClaims(Map<String, Value>);

impl SessionClaims {
    /// Wraps a decoded JSON object.
    #[must_use]
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Returns a claim by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns `true` if the claim is present (even if `null`).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Subject - the user id.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// Issuer.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.str_claim("iss")
    }

    /// Authorized party - the origin the token was minted for.
    #[must_use]
    pub fn authorized_party(&self) -> Option<&str> {
        self.str_claim("azp")
    }

    /// Provider session id.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.str_claim("sid")
    }

    /// Expiration time (seconds since epoch).
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.numeric_claim("exp")
    }

    /// Not-before time (seconds since epoch).
    #[must_use]
    pub fn not_before(&self) -> Option<i64> {
        self.numeric_claim("nbf")
    }

    /// Issued-at time (seconds since epoch).
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.numeric_claim("iat")
    }

    /// Borrows the raw claim map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the claims, returning the raw map.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn str_claim(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    fn numeric_claim(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(as_timestamp)
    }
}

impl From<Map<String, Value>> for SessionClaims {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}

/// Interprets a JSON value as a seconds-since-epoch timestamp.
///
/// Integers are taken as-is; floats are truncated. Anything else is `None`.
pub(crate) fn as_timestamp(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}
