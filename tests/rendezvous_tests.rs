//! Integration tests for the worker/caller decision handoff.

use media_resolver::core::detection::BatchSnapshot;
use media_resolver::core::rendezvous::{
    Decision, DecisionRequest, Rendezvous, RequestKind, WaitOutcome,
};
use media_resolver::models::media::MediaType;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn request(kind: RequestKind) -> DecisionRequest {
    DecisionRequest {
        kind,
        snapshot: BatchSnapshot {
            group_key: "show name".to_string(),
            first_path: None,
            parsed_title: "Show Name".to_string(),
            media_type: MediaType::Series,
            seasons: vec![1],
            year: None,
            file_count: 1,
            candidates: Vec::new(),
        },
    }
}

/// Answer from another thread once the worker side has published.
fn answer_when_pending(rendezvous: Arc<Rendezvous>, answer: impl FnOnce(&Rendezvous) + Send + 'static) {
    thread::spawn(move || {
        while rendezvous.pending_request().is_none() {
            thread::sleep(Duration::from_millis(5));
        }
        answer(&rendezvous);
    });
}

// ========== HANDOFF TESTS ==========

#[test]
fn test_decision_from_another_thread() {
    let rendezvous = Arc::new(Rendezvous::new());
    answer_when_pending(rendezvous.clone(), |r| {
        assert!(r.supply(Some(Decision::MediaType(MediaType::Movie))));
    });

    let outcome = rendezvous.request(request(RequestKind::MediaType), |_| {});

    assert_eq!(outcome, WaitOutcome::Decided(Decision::MediaType(MediaType::Movie)));
    assert!(rendezvous.pending_request().is_none());
}

#[test]
fn test_explicit_skip_is_not_pending() {
    let rendezvous = Arc::new(Rendezvous::new());
    answer_when_pending(rendezvous.clone(), |r| {
        assert!(r.supply(None));
    });

    let outcome = rendezvous.request(request(RequestKind::Selection), |_| {});
    assert_eq!(outcome, WaitOutcome::Skipped);
}

#[test]
fn test_answer_during_publish_is_not_lost() {
    let rendezvous = Rendezvous::new();
    let outcome = rendezvous.request(request(RequestKind::Fallback), |published| {
        assert_eq!(published.kind, RequestKind::Fallback);
        assert!(rendezvous.supply(Some(Decision::SkipAll)));
    });
    assert_eq!(outcome, WaitOutcome::Decided(Decision::SkipAll));
}

#[test]
fn test_stray_answer_is_rejected_after_completion() {
    let rendezvous = Rendezvous::new();
    rendezvous.request(request(RequestKind::Selection), |_| {
        rendezvous.supply(None);
    });

    assert!(!rendezvous.supply(Some(Decision::SkipAll)));
}

// ========== CANCELLATION TESTS ==========

#[test]
fn test_cancel_wakes_parked_worker() {
    let rendezvous = Arc::new(Rendezvous::new());
    answer_when_pending(rendezvous.clone(), |r| r.cancel());

    let outcome = rendezvous.request(request(RequestKind::Selection), |_| {});

    assert_eq!(outcome, WaitOutcome::Cancelled);
    assert!(rendezvous.is_cancelled());
}

#[test]
fn test_cancelled_before_request_never_publishes() {
    let rendezvous = Rendezvous::new();
    rendezvous.cancel();

    let published = AtomicBool::new(false);
    let outcome = rendezvous.request(request(RequestKind::MediaType), |_| {
        published.store(true, Ordering::SeqCst);
    });

    assert_eq!(outcome, WaitOutcome::Cancelled);
    assert!(!published.load(Ordering::SeqCst));
}
