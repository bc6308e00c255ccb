//! Fuzz target for session token parsing and verification.
//!
//! Feeds arbitrary strings as session tokens through header decoding,
//! unverified claim decoding, header validation and the full verification
//! pipeline. Every result must be either `Ok(...)` or `Err(AuthError)`.

#![no_main]

use std::sync::LazyLock;

use authsync_authn::{
    ClaimsPolicy,
    jwt::{decode_jwt_header, decode_unverified_claims, verify_at},
    validation::{validate_algorithm, validate_kid},
};
use jsonwebtoken::jwk::JwkSet;
use libfuzzer_sys::fuzz_target;

static KEYS: LazyLock<JwkSet> = LazyLock::new(|| {
    serde_json::from_str(
        r#"{"keys":[{"kty":"OKP","crv":"Ed25519","x":"11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo","kid":"ins_fuzz","use":"sig","alg":"EdDSA"}]}"#,
    )
    .unwrap_or(JwkSet { keys: Vec::new() })
});

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(header) = decode_jwt_header(token) {
        let _ = validate_algorithm(&format!("{:?}", header.alg));
        if let Some(kid) = header.kid.as_deref() {
            let _ = validate_kid(kid);
        }
    }

    if let Ok(claims) = decode_unverified_claims(token) {
        let _ = ClaimsPolicy::default().validate(&claims, 1_700_000_000);
    }

    let _ = verify_at(token, &KEYS, &ClaimsPolicy::default(), 1_700_000_000);
});
