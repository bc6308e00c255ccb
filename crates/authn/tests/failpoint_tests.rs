#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection in the authn crate.
//!
//! These tests require both `failpoints` and `testutil` features:
//! ```bash
//! cargo test -p authsync-authn --features failpoints,testutil --test failpoint_tests
//! ```

use std::sync::Arc;

use authsync_authn::{AuthError, KeyCache, testutil::TestSigner};
use authsync_backend::MemorySigningKeySource;

fn setup_cache_with_key() -> (Arc<KeyCache>, Arc<MemorySigningKeySource>) {
    let signer = TestSigner::new("fp-test-key");
    let source = Arc::new(MemorySigningKeySource::with_keys(vec![signer.jwk()]));
    (Arc::new(KeyCache::new(source.clone())), source)
}

#[tokio::test]
async fn key_fetch_failpoint_returns_key_fetch_error() {
    let scenario = fail::FailScenario::setup();
    let (cache, source) = setup_cache_with_key();

    fail::cfg("key-cache-before-fetch", "return").expect("failed to configure fail point");

    let result = cache.get_keys().await;
    assert!(matches!(result, Err(AuthError::KeyFetch(_))), "got {result:?}");
    assert_eq!(source.fetch_count(), 0, "the source must not be reached");
    assert!(!cache.is_cached());

    scenario.teardown();
}

#[tokio::test]
async fn key_fetch_recovers_after_failpoint_removed() {
    let scenario = fail::FailScenario::setup();
    let (cache, _) = setup_cache_with_key();

    fail::cfg("key-cache-before-fetch", "return").expect("failed to configure fail point");
    assert!(cache.get_keys().await.is_err());

    fail::remove("key-cache-before-fetch");
    let keys = cache.get_keys().await.expect("fetch should succeed without fail point");
    assert!(keys.find("fp-test-key").is_some());

    scenario.teardown();
}
