//! Scan worker: the single background dispatch loop of a scan.
//!
//! Groups parsed files, drives each batch through the detection state
//! machine one at a time, parks on the [`Rendezvous`] at suspension points
//! and reports progress as [`ScanEvent`]s.

use crate::core::detection::{
    Action, BatchContext, BatchDetection, DetectionController, DetectionPolicy, DetectionState,
};
use crate::core::grouper::group_by_title;
use crate::core::prefetch::EpisodeTitleLanguage;
use crate::core::rendezvous::{Decision, DecisionRequest, Rendezvous, RequestKind, WaitOutcome};
use crate::models::media::{Identity, ParsedFile};
use crate::services::{EmbeddedMetadataExtractor, MetadataClient, OverrideStore};
use crate::Result;
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Progress notifications sent to the interactive caller.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    BatchStarted {
        index: usize,
        total: usize,
        group_key: String,
        file_count: usize,
    },
    /// The worker is parked until the rendezvous receives an answer.
    DecisionRequested(DecisionRequest),
    BatchFinished {
        index: usize,
        group_key: String,
        state: DetectionState,
        identity: Option<Identity>,
    },
    Finished {
        batches: usize,
        cancelled: bool,
    },
}

/// Per-scan options.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub policy: DetectionPolicy,
    /// Prefetch episode titles for confirmed series.
    pub include_episode_titles: bool,
    pub episode_language: EpisodeTitleLanguage,
}

/// Result of a whole scan, one context per batch in grouping order.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub contexts: Vec<BatchContext>,
    pub cancelled: bool,
}

impl ScanOutcome {
    fn count(&self, state: DetectionState) -> usize {
        self.contexts.iter().filter(|c| c.state == state).count()
    }

    pub fn confirmed(&self) -> usize {
        self.count(DetectionState::Confirmed)
    }

    pub fn skipped(&self) -> usize {
        self.count(DetectionState::Skipped)
    }

    pub fn unidentified(&self) -> usize {
        self.count(DetectionState::Unidentified)
    }
}

/// Drives every batch of one scan sequentially.
pub struct ScanWorker<C, O, E> {
    controller: DetectionController<C, O, E>,
    rendezvous: Arc<Rendezvous>,
    events: Sender<ScanEvent>,
    options: ScanOptions,
    skip_all: bool,
}

impl<C, O, E> ScanWorker<C, O, E>
where
    C: MetadataClient,
    O: OverrideStore,
    E: EmbeddedMetadataExtractor,
{
    pub fn new(
        controller: DetectionController<C, O, E>,
        rendezvous: Arc<Rendezvous>,
        events: Sender<ScanEvent>,
        options: ScanOptions,
    ) -> Self {
        Self {
            controller,
            rendezvous,
            events,
            options,
            skip_all: false,
        }
    }

    pub fn controller(&self) -> &DetectionController<C, O, E> {
        &self.controller
    }

    /// Resolve every title group among `files`.
    pub fn run(&mut self, files: Vec<ParsedFile>) -> ScanOutcome {
        let groups = group_by_title(files);
        let total = groups.len();
        let mut outcome = ScanOutcome::default();

        tracing::info!("Resolving {} batch(es)", total);

        for (index, group) in groups.into_iter().enumerate() {
            let mut batch = self
                .controller
                .create_batch(group.key, group.files, self.options.policy);

            self.emit(ScanEvent::BatchStarted {
                index,
                total,
                group_key: batch.group_key().to_string(),
                file_count: batch.files().len(),
            });

            if self.rendezvous.is_cancelled() {
                let _ = self.controller.skip(&mut batch);
            } else {
                self.resolve(&mut batch);
            }

            if self.options.include_episode_titles && batch.state() == DetectionState::Confirmed {
                self.controller
                    .prefetch_episodes(&mut batch, &self.options.episode_language);
            }

            self.emit(ScanEvent::BatchFinished {
                index,
                group_key: batch.group_key().to_string(),
                state: batch.state(),
                identity: batch.identity().cloned(),
            });
            outcome.contexts.push(batch.into_context());
        }

        outcome.cancelled = self.rendezvous.is_cancelled();
        self.emit(ScanEvent::Finished {
            batches: total,
            cancelled: outcome.cancelled,
        });
        outcome
    }

    fn resolve(&mut self, batch: &mut BatchDetection) {
        loop {
            let kind = match self.controller.step(batch) {
                Action::Continue => continue,
                Action::Done => return,
                Action::NeedMediaType => RequestKind::MediaType,
                Action::NeedSelection => RequestKind::Selection,
                Action::NeedFallback => RequestKind::Fallback,
            };

            if self.skip_all {
                tracing::debug!("[BATCH] '{}' skipped by skip-all", batch.group_key());
                let result = self.controller.skip(batch);
                self.check(batch, result);
                continue;
            }

            let request = DecisionRequest {
                kind,
                snapshot: batch.snapshot(),
            };
            let events = &self.events;
            let outcome = self.rendezvous.request(request, |req| {
                let _ = events.send(ScanEvent::DecisionRequested(req.clone()));
            });

            let decision = match outcome {
                // The next step observes the flag and skips the batch.
                WaitOutcome::Cancelled => continue,
                WaitOutcome::Skipped => None,
                WaitOutcome::Decided(Decision::SkipAll) => {
                    tracing::info!("Skipping all remaining unresolved batches");
                    self.skip_all = true;
                    None
                }
                WaitOutcome::Decided(decision) => Some(decision),
            };
            let result = self.apply(batch, kind, decision);
            self.check(batch, result);
        }
    }

    fn apply(
        &mut self,
        batch: &mut BatchDetection,
        kind: RequestKind,
        decision: Option<Decision>,
    ) -> Result<()> {
        match (kind, decision) {
            (RequestKind::MediaType, Some(Decision::MediaType(media_type))) => {
                self.controller.set_media_type(batch, media_type)
            }
            (RequestKind::Selection, Some(Decision::Select(choice))) => {
                self.controller.set_selection(batch, Some(choice))
            }
            (RequestKind::Selection, None) => self.controller.set_selection(batch, None),
            (RequestKind::Fallback, Some(Decision::Select(choice))) => {
                self.controller.set_fallback_result(batch, Some(choice))
            }
            (RequestKind::Fallback, None) => self.controller.set_fallback_result(batch, None),
            (_, None) => self.controller.skip(batch),
            (kind, Some(other)) => {
                tracing::warn!("Ignoring {:?} answer to a {:?} request", other, kind);
                self.controller.skip(batch)
            }
        }
    }

    fn check(&mut self, batch: &mut BatchDetection, result: Result<()>) {
        if let Err(e) = result {
            debug_assert!(!e.is_contract_violation(), "dispatch loop bug: {}", e);
            tracing::error!("[BATCH] '{}': {}", batch.group_key(), e);
            if !batch.state().is_terminal() {
                let _ = self.controller.skip(batch);
            }
        }
    }

    fn emit(&self, event: ScanEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Scan event receiver dropped");
        }
    }
}
