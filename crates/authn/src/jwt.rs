//! Session token verification.
//!
//! # Pipeline
//!
//! ```text
//! token → decode header → validate kid → validate algorithm
//!       → find JWK by kid → build decoding key → verify signature
//!       → claims policy (exp / nbf / iat with leeway, per-claim rules)
//!       → require non-empty sub
//! ```
//!
//! Time-claim checks are done by [`ClaimsPolicy`] rather than by
//! `jsonwebtoken`, so leeway and the essential-claim rules live in one
//! place.
//!
//! # Example
//!
//! ```no_run
//! use authsync_authn::{ClaimsPolicy, KeyCache, jwt::verify};
//!
//! # async fn example(cache: &KeyCache, token: &str) -> Result<(), authsync_authn::AuthError> {
//! let keys = cache.get_keys().await?;
//! let claims = verify(token, &keys, &ClaimsPolicy::default())?;
//! println!("signed in as {}", claims.subject().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, Header, Validation, decode, jwk::JwkSet};
use serde_json::{Map, Value};

use crate::{
    claims::SessionClaims,
    error::AuthError,
    policy::ClaimsPolicy,
    validation::{validate_algorithm, validate_kid},
};

/// Decode JWT header without verification.
///
/// # Errors
///
/// Returns an error if the JWT header cannot be decoded.
pub fn decode_jwt_header(token: &str) -> Result<Header, AuthError> {
    jsonwebtoken::decode_header(token)
        .map_err(|e| AuthError::invalid_token_format(format!("Failed to decode JWT header: {e}")))
}

/// Decode JWT claims without verification.
///
/// Only for diagnostics: nothing returned here is authenticated.
///
/// # Errors
///
/// Returns an error if:
/// - The JWT does not have exactly 3 parts
/// - The payload cannot be base64-decoded
/// - The payload is not a JSON object
pub fn decode_unverified_claims(token: &str) -> Result<SessionClaims, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::invalid_token_format("JWT must have 3 parts separated by dots"));
    }

    let payload_bytes = URL_SAFE_NO_PAD.decode(parts[1]).map_err(|e| {
        AuthError::invalid_token_format(format!("Failed to decode JWT payload: {e}"))
    })?;

    let claims: Map<String, Value> = serde_json::from_slice(&payload_bytes).map_err(|e| {
        AuthError::invalid_token_format(format!("Failed to parse JWT claims: {e}"))
    })?;

    Ok(SessionClaims::new(claims))
}

/// Verifies a session token against `keys` and `policy` at the current time.
///
/// # Errors
///
/// See [`verify_at`].
pub fn verify(
    token: &str,
    keys: &JwkSet,
    policy: &ClaimsPolicy,
) -> Result<SessionClaims, AuthError> {
    verify_at(token, keys, policy, Utc::now().timestamp())
}

/// Verifies a session token against `keys` and `policy` at time `now`
/// (seconds since epoch).
///
/// # Errors
///
/// Decode-class errors (the key set may be stale):
/// - [`AuthError::InvalidTokenFormat`] if the token is malformed
/// - [`AuthError::InvalidKeyId`] if the `kid` header is missing or malformed
/// - [`AuthError::UnsupportedAlgorithm`] if the algorithm is forbidden or unknown
/// - [`AuthError::KeyNotFound`] if no key in the set has this `kid`
/// - [`AuthError::InvalidPublicKey`] if the published key is unusable
/// - [`AuthError::InvalidSignature`] if the signature does not verify
///
/// Claims-class errors: see [`ClaimsPolicy::validate`], plus
/// [`AuthError::MissingClaim`] if `sub` is absent or empty.
#[tracing::instrument(skip(token, keys, policy))]
pub fn verify_at(
    token: &str,
    keys: &JwkSet,
    policy: &ClaimsPolicy,
    now: i64,
) -> Result<SessionClaims, AuthError> {
    let header = decode_jwt_header(token)?;

    let kid = header
        .kid
        .as_deref()
        .ok_or_else(|| AuthError::invalid_key_id("JWT header missing 'kid' field"))?;
    validate_kid(kid)?;

    let alg_str = format!("{:?}", header.alg);
    validate_algorithm(&alg_str)?;

    let jwk = keys.find(kid).ok_or_else(|| {
        tracing::debug!(kid, "no published key with this kid");
        AuthError::key_not_found(kid)
    })?;

    let decoding_key = DecodingKey::from_jwk(jwk)
        .map_err(|e| AuthError::invalid_public_key(format!("kid '{kid}': {e}")))?;

    let token_data = decode::<Map<String, Value>>(token, &decoding_key, &signature_only(&header))?;
    let claims = SessionClaims::new(token_data.claims);

    policy.validate(&claims, now)?;

    let user_id = claims
        .subject()
        .filter(|sub| !sub.is_empty())
        .ok_or_else(|| AuthError::missing_claim("sub"))?;

    tracing::debug!(kid, user_id, "session token verified");
    Ok(claims)
}

/// Validation settings that check only the signature and algorithm.
fn signature_only(header: &Header) -> Validation {
    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.leeway = 0;
    validation.required_spec_claims = HashSet::new();
    validation
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use jsonwebtoken::{Algorithm, EncodingKey};
    use serde_json::json;

    use super::*;
    use crate::{
        assert_auth_error,
        testutil::{TestSigner, craft_raw_jwt, create_signed_token, key_set, session_claims},
    };

    const NOW: i64 = 1_700_000_000;

    fn claims_at(sub: &str, now: i64) -> Value {
        json!({ "sub": sub, "iat": now, "nbf": now - 10, "exp": now + 60 })
    }

    #[test]
    fn test_verify_success() {
        let signer = TestSigner::new("ins_1");
        let keys = key_set([signer.jwk()]);

        let token = signer.sign(&claims_at("user_123", NOW));
        let claims = verify_at(&token, &keys, &ClaimsPolicy::default(), NOW).unwrap();

        assert_eq!(claims.subject(), Some("user_123"));
        assert_eq!(claims.expires_at(), Some(NOW + 60));
    }

    #[test]
    fn test_verify_with_wall_clock() {
        let signer = TestSigner::new("ins_1");
        let keys = key_set([signer.jwk()]);
        let claims = verify(&signer.token_for("user_9"), &keys, &ClaimsPolicy::default()).unwrap();
        assert_eq!(claims.subject(), Some("user_9"));
    }

    #[test]
    fn test_verify_picks_key_by_kid() {
        let current = TestSigner::new("ins_current");
        let previous = TestSigner::new("ins_previous");
        let keys = key_set([previous.jwk(), current.jwk()]);

        let token = previous.sign(&claims_at("user_1", NOW));
        assert!(verify_at(&token, &keys, &ClaimsPolicy::default(), NOW).is_ok());
    }

    #[test]
    fn test_verify_unknown_kid_is_decode_error() {
        let signer = TestSigner::new("ins_rotated_in");
        let keys = key_set([TestSigner::new("ins_old").jwk()]);

        let token = signer.sign(&claims_at("u", NOW));
        let result = verify_at(&token, &keys, &ClaimsPolicy::default(), NOW);
        assert_auth_error!(result, KeyNotFound);
        assert!(result.unwrap_err().is_decode_error());
    }

    #[test]
    fn test_verify_wrong_key_under_same_kid() {
        let signer = TestSigner::new("ins_1");
        let impostor = TestSigner::new("ins_other");
        let keys = key_set([impostor.jwk_as("ins_1")]);

        let token = signer.sign(&claims_at("u", NOW));
        let result = verify_at(&token, &keys, &ClaimsPolicy::default(), NOW);
        assert_auth_error!(result, InvalidSignature);
    }

    #[test]
    fn test_verify_missing_kid() {
        let (pkcs8_der, public_key) = crate::testutil::generate_test_keypair();
        let keys = key_set([crate::testutil::jwk_for("ins_1", &public_key)]);
        let token = create_signed_token(&pkcs8_der, None, &claims_at("u", NOW));

        let result = verify_at(&token, &keys, &ClaimsPolicy::default(), NOW);
        assert_auth_error!(result, InvalidKeyId);
    }

    #[test]
    fn test_verify_expired_is_claims_error() {
        let signer = TestSigner::new("ins_1");
        let keys = key_set([signer.jwk()]);

        // Issued two hours before NOW, expired an hour before.
        let token = signer.sign(&claims_at("u", NOW - 7200));
        let result = verify_at(&token, &keys, &ClaimsPolicy::default(), NOW);
        assert_auth_error!(result, TokenExpired);
        assert!(result.unwrap_err().is_claims_error());
    }

    #[test]
    fn test_verify_expired_within_leeway_accepted() {
        let signer = TestSigner::new("ins_1");
        let keys = key_set([signer.jwk()]);
        let token = signer.sign(&json!({ "sub": "u", "nbf": NOW - 120, "exp": NOW - 30 }));
        assert!(verify_at(&token, &keys, &ClaimsPolicy::default(), NOW).is_ok());
    }

    #[test]
    fn test_verify_requires_nbf_by_default() {
        let signer = TestSigner::new("ins_1");
        let keys = key_set([signer.jwk()]);
        let token = signer.sign(&json!({ "sub": "u", "exp": NOW + 60 }));

        let result = verify_at(&token, &keys, &ClaimsPolicy::default(), NOW);
        assert!(matches!(result, Err(AuthError::MissingClaim { ref claim }) if claim == "nbf"));
    }

    #[test]
    fn test_verify_requires_subject() {
        let signer = TestSigner::new("ins_1");
        let keys = key_set([signer.jwk()]);

        for payload in [
            json!({ "nbf": NOW, "exp": NOW + 60 }),
            json!({ "sub": "", "nbf": NOW, "exp": NOW + 60 }),
        ] {
            let result = verify_at(&signer.sign(&payload), &keys, &ClaimsPolicy::default(), NOW);
            assert!(matches!(result, Err(AuthError::MissingClaim { ref claim }) if claim == "sub"));
        }
    }

    #[test]
    fn test_verify_authorized_party_policy() {
        let signer = TestSigner::new("ins_1");
        let keys = key_set([signer.jwk()]);
        let policy = ClaimsPolicy::default().with_authorized_parties(["https://app.example.com"]);

        let mut payload = claims_at("u", NOW);
        payload["azp"] = json!("https://evil.example.com");
        let result = verify_at(&signer.sign(&payload), &keys, &policy, NOW);
        assert_auth_error!(result, InvalidClaim);
    }

    #[test]
    fn test_verify_alg_none_rejected() {
        let keys = key_set([TestSigner::new("ins_1").jwk()]);
        let token = craft_raw_jwt(
            &json!({ "alg": "none", "kid": "ins_1" }),
            &claims_at("attacker", NOW),
        );
        let result = verify_at(&token, &keys, &ClaimsPolicy::default(), NOW);
        assert!(result.unwrap_err().is_decode_error());
    }

    #[test]
    fn test_verify_hs256_rejected_before_key_lookup() {
        let keys = key_set([TestSigner::new("ins_1").jwk()]);

        let mut header = jsonwebtoken::Header::new(Algorithm::HS256);
        header.kid = Some("ins_1".into());
        let token = jsonwebtoken::encode(
            &header,
            &session_claims("attacker"),
            &EncodingKey::from_secret(b"guessed-secret"),
        )
        .unwrap();

        let result = verify_at(&token, &keys, &ClaimsPolicy::default(), NOW);
        assert_auth_error!(result, UnsupportedAlgorithm);
    }

    #[test]
    fn test_verify_tampered_payload() {
        let signer = TestSigner::new("ins_1");
        let keys = key_set([signer.jwk()]);
        let token = signer.sign(&claims_at("user_1", NOW));

        let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
        parts[1] =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims_at("user_admin", NOW)).unwrap());
        let tampered = parts.join(".");

        let result = verify_at(&tampered, &keys, &ClaimsPolicy::default(), NOW);
        assert_auth_error!(result, InvalidSignature);
    }

    #[test]
    fn test_decode_unverified_claims() {
        let signer = TestSigner::new("ins_1");
        let claims = decode_unverified_claims(&signer.token_for("user_42")).unwrap();
        assert_eq!(claims.subject(), Some("user_42"));

        assert!(decode_unverified_claims("only.two").is_err());
        assert!(decode_unverified_claims("too.many.parts.here").is_err());
    }

    /// Regression inputs from fuzzing: known-bad tokens must never panic.
    mod fuzz_regressions {
        use super::*;

        fn exercise(token: &str) -> bool {
            let _ = decode_jwt_header(token);
            let _ = decode_unverified_claims(token);
            let keys = key_set([TestSigner::new("ins_1").jwk()]);
            verify_at(token, &keys, &ClaimsPolicy::default(), NOW).is_ok()
        }

        #[test]
        fn empty_and_dots_no_panic() {
            for token in ["", ".", "..", "...", "not-a-jwt", "a]]]].b.c"] {
                assert!(!exercise(token), "{token:?} must not verify");
            }
        }

        #[test]
        fn invalid_base64_segments_no_panic() {
            assert!(!exercise("!!!.!!!.!!!"));
            assert!(!exercise("eyJhbGciOiJFZERTQSJ9.not-valid-base64.sig"));
        }

        #[test]
        fn invalid_payload_json_no_panic() {
            let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"EdDSA\",\"kid\":\"ins_1\"}");
            let payload = URL_SAFE_NO_PAD.encode(b"not-json");
            assert!(!exercise(&format!("{header}.{payload}.sig")));
        }

        #[test]
        fn hostile_kid_no_panic() {
            for kid in ["../../../etc/passwd", "key-id\u{0}injected", ""] {
                let token =
                    craft_raw_jwt(&json!({ "alg": "EdDSA", "kid": kid }), &claims_at("x", NOW));
                assert!(!exercise(&token));
            }
        }

        #[test]
        fn extreme_timestamps_no_panic() {
            let header = json!({ "alg": "EdDSA", "kid": "ins_1" });
            for payload in [
                json!({ "sub": "x", "exp": u64::MAX, "nbf": u64::MAX, "iat": u64::MAX }),
                json!({ "sub": "x", "exp": i64::MIN, "nbf": 0 }),
                json!({ "sub": "x", "exp": 1e308, "nbf": -1e308 }),
            ] {
                assert!(!exercise(&craft_raw_jwt(&header, &payload)));
            }
        }

        #[test]
        fn oversized_payload_no_panic() {
            let header = json!({ "alg": "EdDSA", "kid": "ins_1" });
            let payload = json!({ "sub": "A".repeat(100_000), "exp": NOW + 60, "nbf": NOW });
            assert!(!exercise(&craft_raw_jwt(&header, &payload)));
        }

        #[test]
        fn unicode_in_claims_no_panic() {
            let header = json!({ "alg": "EdDSA", "kid": "ins_1" });
            let payload =
                json!({ "sub": "\u{1F4A9}", "azp": "\u{202E}evil", "exp": NOW, "nbf": NOW });
            assert!(!exercise(&craft_raw_jwt(&header, &payload)));
        }
    }
}
