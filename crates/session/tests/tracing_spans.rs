//! Integration test verifying that `#[instrument]` annotations produce the
//! expected spans on the sync path, and that key set invalidation emits its
//! audit event.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use authsync_authn::testutil::TestSigner;
use authsync_backend::MemorySigningKeySource;
use authsync_session::{AuthContext, PageAction};
use tracing::{
    Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer: records span names and audit actions
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Collector {
    spans: Arc<Mutex<Vec<String>>>,
    audit_actions: Arc<Mutex<Vec<String>>>,
}

struct AuditVisitor<'a>(&'a mut Option<String>);

impl Visit for AuditVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "audit.action" {
            *self.0 = Some(value.to_owned());
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

impl<S> tracing_subscriber::Layer<S> for Collector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }

    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut action = None;
        event.record(&mut AuditVisitor(&mut action));
        if let Some(action) = action {
            self.audit_actions.lock().expect("lock poisoned").push(action);
        }
    }
}

fn context_with(signer: &TestSigner) -> Arc<AuthContext> {
    let source = Arc::new(MemorySigningKeySource::with_keys(vec![signer.jwk()]));
    AuthContext::builder().key_source(source).build()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn set_session_creates_verification_spans() {
    let collector = Collector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let signer = TestSigner::new("ins_1");
    let session = context_with(&signer).session();
    assert!(session.set_session(&signer.token_for("user_1")).await.is_signed_in());

    let recorded = spans.lock().expect("lock poisoned");
    for expected in ["set_session", "get_keys", "verify_at"] {
        assert!(
            recorded.iter().any(|s| s == expected),
            "expected a '{expected}' span, got: {recorded:?}"
        );
    }
}

#[tokio::test]
async fn clear_session_creates_span() {
    let collector = Collector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let session = context_with(&TestSigner::new("ins_1")).session();
    session.clear_session().await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "clear_session"),
        "expected a 'clear_session' span, got: {recorded:?}"
    );
}

#[tokio::test]
async fn await_checked_creates_span() {
    let collector = Collector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let context = context_with(&TestSigner::new("ins_1"));
    let session = context.session();
    session.clear_session().await;
    let id = context.gate().register(vec![PageAction::new("noop", |_| async {})]);
    context.gate().await_checked(&session, id, Duration::from_secs(1)).await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "await_checked"),
        "expected an 'await_checked' span, got: {recorded:?}"
    );
}

#[tokio::test]
async fn decode_failure_emits_invalidation_audit_event() {
    let collector = Collector::default();
    let spans = Arc::clone(&collector.spans);
    let audit_actions = Arc::clone(&collector.audit_actions);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let signer = TestSigner::new("ins_1");
    let session = context_with(&signer).session();
    let forged = TestSigner::new("ins_1").token_for("user_admin");
    session.set_session(&forged).await;
    session.set_session(&forged).await;

    // The second invalidation is rate-limited and not audited.
    let recorded = audit_actions.lock().expect("lock poisoned");
    assert_eq!(*recorded, ["invalidate_key_set"]);
    let spans = spans.lock().expect("lock poisoned");
    assert_eq!(spans.iter().filter(|s| *s == "invalidate").count(), 2);
}
