//! Claims policy: which token claims are mandatory and which values are
//! acceptable.
//!
//! The policy is a map from claim name to [`ClaimRule`] plus a clock-skew
//! leeway applied to the time claims (`exp`, `nbf`, `iat`).
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use authsync_authn::policy::ClaimsPolicy;
//!
//! let policy = ClaimsPolicy::default()
//!     .with_issuer("https://clerk.example.com")
//!     .with_authorized_parties(["https://app.example.com"])
//!     .with_leeway(Duration::from_secs(30));
//!
//! assert!(policy.rule("exp").is_some_and(|r| r.essential));
//! ```

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    claims::{SessionClaims, as_timestamp},
    error::AuthError,
};

/// Default clock-skew leeway applied to time claims.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(60);

/// Validation rule for a single claim.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimRule {
    /// The claim must be present.
    #[serde(default)]
    pub essential: bool,
    /// If set, the claim must equal this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// If non-empty, the claim must be one of these values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

impl ClaimRule {
    /// A rule that only requires presence.
    #[must_use]
    pub fn essential() -> Self {
        Self { essential: true, ..Self::default() }
    }

    /// A rule requiring an exact value.
    #[must_use]
    pub fn exact(value: impl Into<Value>) -> Self {
        Self { essential: true, value: Some(value.into()), values: Vec::new() }
    }

    /// A rule accepting any of `values`; absence is allowed unless `essential`.
    #[must_use]
    pub fn one_of(values: impl IntoIterator<Item = impl Into<Value>>, essential: bool) -> Self {
        Self { essential, value: None, values: values.into_iter().map(Into::into).collect() }
    }

    fn check(&self, name: &str, claim: Option<&Value>) -> Result<(), AuthError> {
        let Some(claim) = claim else {
            if self.essential {
                return Err(AuthError::missing_claim(name));
            }
            return Ok(());
        };

        if let Some(expected) = &self.value
            && claim != expected
        {
            return Err(AuthError::invalid_claim(name, format!("expected {expected}, got {claim}")));
        }

        if !self.values.is_empty() && !self.values.contains(claim) {
            return Err(AuthError::invalid_claim(name, format!("{claim} is not an accepted value")));
        }

        Ok(())
    }
}

/// Claims validation policy.
///
/// The default requires `exp` and `nbf` and applies a 60 second leeway,
/// which matches the claims every provider-issued session token carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimsPolicy {
    /// Per-claim rules, keyed by claim name.
    #[serde(default)]
    rules: BTreeMap<String, ClaimRule>,
    /// Clock-skew leeway for `exp`, `nbf` and `iat`.
    #[serde(with = "humantime_serde", default = "default_leeway")]
    leeway: Duration,
}

fn default_leeway() -> Duration {
    DEFAULT_LEEWAY
}

impl Default for ClaimsPolicy {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert("exp".to_owned(), ClaimRule::essential());
        rules.insert("nbf".to_owned(), ClaimRule::essential());
        Self { rules, leeway: DEFAULT_LEEWAY }
    }
}

impl ClaimsPolicy {
    /// A policy with no claim rules (time claims are still checked when
    /// present).
    #[must_use]
    pub fn permissive() -> Self {
        Self { rules: BTreeMap::new(), leeway: DEFAULT_LEEWAY }
    }

    /// Sets or replaces the rule for `claim`.
    #[must_use]
    pub fn with_rule(mut self, claim: impl Into<String>, rule: ClaimRule) -> Self {
        self.rules.insert(claim.into(), rule);
        self
    }

    /// Removes the rule for `claim`.
    #[must_use]
    pub fn without_rule(mut self, claim: &str) -> Self {
        self.rules.remove(claim);
        self
    }

    /// Requires `iss` to equal `issuer`.
    #[must_use]
    pub fn with_issuer(self, issuer: impl Into<String>) -> Self {
        self.with_rule("iss", ClaimRule::exact(issuer.into()))
    }

    /// Restricts `azp` to the given origins. Tokens without `azp` pass.
    #[must_use]
    pub fn with_authorized_parties(
        self,
        parties: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let parties: Vec<String> = parties.into_iter().map(Into::into).collect();
        self.with_rule("azp", ClaimRule::one_of(parties, false))
    }

    /// Sets the clock-skew leeway.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Returns the rule for `claim`, if any.
    #[must_use]
    pub fn rule(&self, claim: &str) -> Option<&ClaimRule> {
        self.rules.get(claim)
    }

    /// Returns the clock-skew leeway.
    #[must_use]
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Validates `claims` at time `now` (seconds since epoch).
    ///
    /// Rules are checked first, in claim-name order, then the time claims.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingClaim`] if an essential claim is absent
    /// - [`AuthError::InvalidClaim`] if a claim has an unacceptable value, or a time claim is not
    ///   numeric, or `iat` is in the future
    /// - [`AuthError::TokenExpired`] if `exp + leeway < now`
    /// - [`AuthError::TokenNotYetValid`] if `nbf - leeway > now`
    pub fn validate(&self, claims: &SessionClaims, now: i64) -> Result<(), AuthError> {
        for (name, rule) in &self.rules {
            rule.check(name, claims.get(name))?;
        }

        let leeway = i64::try_from(self.leeway.as_secs()).unwrap_or(i64::MAX);

        if let Some(exp) = time_claim(claims, "exp")?
            && exp.saturating_add(leeway) < now
        {
            return Err(AuthError::token_expired());
        }

        if let Some(nbf) = time_claim(claims, "nbf")?
            && nbf.saturating_sub(leeway) > now
        {
            return Err(AuthError::token_not_yet_valid());
        }

        if let Some(iat) = time_claim(claims, "iat")?
            && iat.saturating_sub(leeway) > now
        {
            return Err(AuthError::invalid_claim("iat", "issued in the future"));
        }

        Ok(())
    }
}

/// Reads a time claim, rejecting non-numeric values.
fn time_claim(claims: &SessionClaims, name: &str) -> Result<Option<i64>, AuthError> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_timestamp(value)
            .map(Some)
            .ok_or_else(|| AuthError::invalid_claim(name, "must be a numeric timestamp")),
    }
}
