//! Cross-thread rendezvous between the scan worker and an interactive caller.
//!
//! The worker publishes a [`DecisionRequest`] and parks on a condition
//! variable until one of three things happens: a decision arrives, the scan
//! is cancelled, or the wake was spurious (it parks again). The worker never
//! polls.
//!
//! "Not answered yet" ([`Answer::Pending`]) is kept distinct from "the user
//! chose to skip" ([`Answer::Skipped`]) since both cross the boundary.

use crate::core::detection::BatchSnapshot;
use crate::models::media::MediaType;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which suspension point a request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Pick series or movie before searching.
    MediaType,
    /// Pick one of the scored candidates.
    Selection,
    /// Nothing matched: search manually or enter an ID.
    Fallback,
}

/// What the interactive caller is asked to decide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub kind: RequestKind,
    pub snapshot: BatchSnapshot,
}

/// A chosen identity reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: u64,
    pub media_type: MediaType,
    pub title: Option<String>,
}

/// A decision supplied by the interactive caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Answer to a media-type request.
    MediaType(MediaType),
    /// A chosen identity (selection or fallback).
    Select(Choice),
    /// Skip this batch and every remaining unresolved batch.
    SkipAll,
}

/// State of the decision slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Answer {
    #[default]
    Pending,
    Answered(Decision),
    Skipped,
}

/// How a parked wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Decided(Decision),
    Skipped,
    Cancelled,
}

/// Shared cooperative cancellation flag.
///
/// Only [`Rendezvous::cancel`] sets it, so parked waiters are always woken.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct Slot {
    request: Option<DecisionRequest>,
    answer: Answer,
}

/// Blocking single-slot handoff of decisions to a parked worker.
#[derive(Debug, Default)]
pub struct Rendezvous {
    slot: Mutex<Slot>,
    wake: Condvar,
    cancel: CancelFlag,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag checked by the detection state machine and the batch loop.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_set()
    }

    /// Request cancellation and wake any parked worker.
    pub fn cancel(&self) {
        let _slot = self.slot.lock();
        self.cancel.set();
        self.wake.notify_all();
    }

    /// Supply a decision for the pending request.
    ///
    /// `None` is an explicit skip. Returns false when no request is waiting
    /// for an answer; waiters are notified either way.
    pub fn supply(&self, decision: Option<Decision>) -> bool {
        let mut slot = self.slot.lock();
        let accepted = slot.request.is_some() && slot.answer == Answer::Pending;
        if accepted {
            slot.answer = match decision {
                Some(decision) => Answer::Answered(decision),
                None => Answer::Skipped,
            };
        } else {
            tracing::warn!("Decision supplied with no pending request; ignored");
        }
        self.wake.notify_all();
        accepted
    }

    /// The request the worker is currently parked on, if any.
    pub fn pending_request(&self) -> Option<DecisionRequest> {
        self.slot.lock().request.clone()
    }

    /// Publish a request and park until it is answered or cancelled.
    ///
    /// The slot is armed before `publish` runs, so an answer that arrives
    /// before the worker parks is not lost.
    pub fn request<F>(&self, request: DecisionRequest, publish: F) -> WaitOutcome
    where
        F: FnOnce(&DecisionRequest),
    {
        {
            let mut slot = self.slot.lock();
            slot.answer = Answer::Pending;
            slot.request = Some(request.clone());
        }

        if !self.is_cancelled() {
            publish(&request);
        }

        let mut slot = self.slot.lock();
        let outcome = loop {
            if self.cancel.is_set() {
                break WaitOutcome::Cancelled;
            }
            match std::mem::take(&mut slot.answer) {
                Answer::Answered(decision) => break WaitOutcome::Decided(decision),
                Answer::Skipped => break WaitOutcome::Skipped,
                Answer::Pending => {
                    self.wake.wait(&mut slot);
                }
            }
        };
        slot.request = None;
        slot.answer = Answer::Pending;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supply_without_request_is_rejected() {
        let rendezvous = Rendezvous::new();
        assert!(!rendezvous.supply(Some(Decision::SkipAll)));
        assert!(rendezvous.pending_request().is_none());
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let rendezvous = Rendezvous::new();
        let flag = rendezvous.cancel_flag();
        assert!(!flag.is_set());
        rendezvous.cancel();
        assert!(flag.is_set());
        assert!(rendezvous.is_cancelled());
    }
}
