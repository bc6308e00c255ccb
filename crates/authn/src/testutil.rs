//! Shared test utilities for token verification testing.
//!
//! This module provides helpers for generating Ed25519 key pairs, publishing
//! them as JWKs, creating signed session tokens and crafting raw JWT strings
//! (for attack testing). It is feature-gated behind `testutil` to prevent
//! leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! authsync-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use authsync_authn::testutil::TestSigner;
//!
//! let signer = TestSigner::new("ins_test");
//! let token = signer.token_for("user_123");
//! let jwk = signer.jwk();
//! ```

#![allow(clippy::expect_used)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use jsonwebtoken::{
    Algorithm, EncodingKey, Header,
    jwk::{Jwk, JwkSet},
};
use rand_core::OsRng;
use serde_json::{Value, json};
use zeroize::Zeroizing;

/// Generates a test Ed25519 key pair.
///
/// Returns `(pkcs8_der, public_key_base64url)` where:
/// - `pkcs8_der` is the private key in PKCS#8 DER format wrapped in [`Zeroizing`] (suitable for
///   [`EncodingKey::from_ed_der`])
/// - `public_key_base64url` is the 32-byte public key encoded as base64url without padding
///   (suitable for the `x` member of an OKP JWK)
///
/// Each call generates a fresh random key pair.
pub fn generate_test_keypair() -> (Zeroizing<Vec<u8>>, String) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_key_b64 = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes());

    let private_bytes: Zeroizing<[u8; 32]> = Zeroizing::new(signing_key.to_bytes());
    let mut pkcs8_der = Zeroizing::new(vec![
        0x30, 0x2e, // SEQUENCE, 46 bytes
        0x02, 0x01, 0x00, // INTEGER version 0
        0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
        0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
        0x04, 0x22, // OCTET STRING, 34 bytes
        0x04, 0x20, // OCTET STRING, 32 bytes (the actual key)
    ]);
    pkcs8_der.extend_from_slice(&*private_bytes);

    (pkcs8_der, public_key_b64)
}

/// Builds the published (OKP / Ed25519) JWK for a public key.
///
/// # Panics
///
/// Panics if the JWK cannot be deserialized (should not happen).
pub fn jwk_for(kid: &str, public_key_b64: &str) -> Jwk {
    serde_json::from_value(json!({
        "kty": "OKP",
        "crv": "Ed25519",
        "x": public_key_b64,
        "kid": kid,
        "use": "sig",
        "alg": "EdDSA",
    }))
    .expect("valid OKP jwk")
}

/// Wraps JWKs into a key set.
#[must_use]
pub fn key_set(keys: impl IntoIterator<Item = Jwk>) -> JwkSet {
    JwkSet { keys: keys.into_iter().collect() }
}

/// Standard session claims for `sub`: issued now, valid from 10 seconds
/// ago, expiring in 60 seconds.
#[must_use]
pub fn session_claims(sub: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": sub,
        "iss": "https://clerk.test.example.com",
        "azp": "http://localhost:3000",
        "sid": "sess_test",
        "iat": now,
        "nbf": now - 10,
        "exp": now + 60,
    })
}

/// Signs arbitrary claims with an Ed25519 key in PKCS#8 DER format.
///
/// # Panics
///
/// Panics if JWT encoding fails (should not happen with valid inputs).
pub fn create_signed_token(pkcs8_der: &[u8], kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = kid.map(str::to_owned);

    let encoding_key = EncodingKey::from_ed_der(pkcs8_der);
    jsonwebtoken::encode(&header, claims, &encoding_key).expect("Failed to encode test JWT")
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The resulting JWT has the structure `{header_b64}.{payload_b64}.`
/// with an empty signature. This is useful for testing rejection of
/// malformed or attack JWTs (e.g., `alg: "none"`, algorithm confusion).
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_jwt(header_json: &Value, payload_json: &Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// An Ed25519 signing identity: a key pair plus the `kid` it is published
/// under.
pub struct TestSigner {
    kid: String,
    pkcs8_der: Zeroizing<Vec<u8>>,
    public_key_b64: String,
}

impl TestSigner {
    /// Generates a fresh key pair published under `kid`.
    #[must_use]
    pub fn new(kid: &str) -> Self {
        let (pkcs8_der, public_key_b64) = generate_test_keypair();
        Self { kid: kid.to_owned(), pkcs8_der, public_key_b64 }
    }

    /// The key id.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The public JWK.
    #[must_use]
    pub fn jwk(&self) -> Jwk {
        jwk_for(&self.kid, &self.public_key_b64)
    }

    /// The public JWK published under a different `kid` (for mismatch tests).
    #[must_use]
    pub fn jwk_as(&self, kid: &str) -> Jwk {
        jwk_for(kid, &self.public_key_b64)
    }

    /// Signs `claims` with this key, setting the `kid` header.
    #[must_use]
    pub fn sign(&self, claims: &Value) -> String {
        create_signed_token(&self.pkcs8_der, Some(&self.kid), claims)
    }

    /// A fresh, valid session token for `sub`.
    #[must_use]
    pub fn token_for(&self, sub: &str) -> String {
        self.sign(&session_claims(sub))
    }
}

/// Asserts that a [`Result<T, AuthError>`] is an `Err` matching the given
/// [`AuthError`](crate::error::AuthError) variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use authsync_authn::assert_auth_error;
/// use authsync_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::token_expired());
/// assert_auth_error!(result, TokenExpired);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
