//! Per-batch detection state machine.
//!
//! A [`BatchDetection`] is created once per title group and driven by
//! [`DetectionController::step`] until it reports [`Action::Done`]. The
//! three `Need*` actions are suspension points: the batch does not advance
//! until the caller answers through [`DetectionController::set_media_type`],
//! [`DetectionController::set_selection`],
//! [`DetectionController::set_fallback_result`] or
//! [`DetectionController::skip`]. Re-stepping a suspended batch re-emits the
//! same action and has no side effects.

use crate::core::cleaner::clean_for_search;
use crate::core::prefetch::{self, EpisodeCache, EpisodeTitleLanguage};
use crate::core::rendezvous::{CancelFlag, Choice};
use crate::core::scorer::{is_trusted, MAX_SELECTION_CANDIDATES};
use crate::models::media::{
    Candidate, EpisodeTitle, Identity, MediaType, MetadataSource, ParsedFile, ScoredCandidate,
};
use crate::services::{EmbeddedMetadataExtractor, IdentityMatch, MetadataClient, OverrideStore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Lifecycle state of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionState {
    Parsed,
    TypePending,
    Searching,
    SelectionPending,
    Confirmed,
    Skipped,
    Unidentified,
}

impl DetectionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DetectionState::Confirmed | DetectionState::Skipped | DetectionState::Unidentified
        )
    }
}

/// What the caller must do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Call `step` again.
    Continue,
    /// Ask whether the batch is a series or a movie.
    NeedMediaType,
    /// Ask the user to pick one of the batch's candidates.
    NeedSelection,
    /// Nothing matched; ask for a manual search or ID.
    NeedFallback,
    /// The batch reached a terminal state.
    Done,
}

/// Detection policy, fixed for a batch when it is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionPolicy {
    /// Ask for the media type before every search.
    pub always_ask_media_type: bool,
    /// Ask the user to confirm even a single trusted search result.
    pub always_confirm_match: bool,
    /// Offer a manual search/ID prompt instead of giving up.
    pub interactive_fallback: bool,
}

/// Progress of the search inside the `Searching` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchPhase {
    NotStarted,
    FilenameSearched,
    EmbeddedTried,
}

/// The query a batch's most recent search used.
#[derive(Debug, Clone, PartialEq)]
struct SearchQuery {
    title: String,
    year: Option<u16>,
}

/// Mutable unit of work for one title group.
#[derive(Debug, Clone)]
pub struct BatchDetection {
    group_key: String,
    files: Vec<ParsedFile>,
    policy: DetectionPolicy,
    state: DetectionState,
    media_type: MediaType,
    identity: Option<Identity>,
    confidence: f64,
    candidates: Vec<ScoredCandidate>,
    mapped: bool,
    skipped: bool,
    metadata_source: MetadataSource,
    episode_cache: EpisodeCache,
    search_phase: SearchPhase,
    last_query: Option<SearchQuery>,
    diagnostic: Option<String>,
}

impl BatchDetection {
    pub fn group_key(&self) -> &str {
        &self.group_key
    }

    pub fn files(&self) -> &[ParsedFile] {
        &self.files
    }

    pub fn policy(&self) -> DetectionPolicy {
        self.policy
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Scored candidates; only non-empty while a selection is pending.
    pub fn candidates(&self) -> &[ScoredCandidate] {
        &self.candidates
    }

    /// Whether the identity came from a persisted manual override.
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn metadata_source(&self) -> MetadataSource {
        self.metadata_source
    }

    pub fn episode_cache(&self) -> &EpisodeCache {
        &self.episode_cache
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// Whether a `NeedFallback` answer is currently expected.
    pub fn awaiting_fallback(&self) -> bool {
        self.state == DetectionState::Searching
            && self.search_phase == SearchPhase::EmbeddedTried
            && self.policy.interactive_fallback
    }

    fn first_file(&self) -> Option<&ParsedFile> {
        self.files.first()
    }

    /// Read-only view of the fields an interactive caller decides on.
    pub fn snapshot(&self) -> BatchSnapshot {
        let seasons: BTreeSet<u16> = self.files.iter().filter_map(|f| f.season).collect();
        BatchSnapshot {
            group_key: self.group_key.clone(),
            first_path: self.first_file().map(|f| f.path.clone()),
            parsed_title: self
                .first_file()
                .map(|f| f.title_guess.clone())
                .unwrap_or_else(|| self.group_key.clone()),
            media_type: self.media_type,
            seasons: seasons.into_iter().collect(),
            year: self.files.iter().find_map(|f| f.year),
            file_count: self.files.len(),
            candidates: self.candidates.clone(),
        }
    }

    /// Convert into the immutable result consumed by formatting.
    pub fn into_context(self) -> BatchContext {
        BatchContext {
            group_key: self.group_key,
            files: self.files,
            state: self.state,
            media_type: self.media_type,
            identity: self.identity,
            confidence: self.confidence,
            mapped: self.mapped,
            metadata_source: self.metadata_source,
            episode_cache: self.episode_cache.into_values().collect(),
            diagnostic: self.diagnostic,
        }
    }

    fn finish(&mut self, state: DetectionState) -> Action {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.candidates.clear();
        match state {
            DetectionState::Confirmed => {
                if self.metadata_source != MetadataSource::EmbeddedMetadata {
                    self.metadata_source = MetadataSource::Tmdb;
                }
                if let Some(identity) = &self.identity {
                    tracing::info!(
                        "[BATCH] '{}' confirmed as {} (confidence {:.2})",
                        self.group_key,
                        identity,
                        self.confidence
                    );
                }
            }
            DetectionState::Skipped => {
                self.skipped = true;
                self.identity = None;
                self.metadata_source = MetadataSource::Inferred;
                tracing::info!("[BATCH] '{}' skipped", self.group_key);
            }
            _ => {
                self.identity = None;
                self.metadata_source = MetadataSource::Unidentified;
                tracing::info!("[BATCH] '{}' unidentified", self.group_key);
            }
        }
        Action::Done
    }

    fn confirm(&mut self, identity: Identity, confidence: f64) -> Action {
        self.media_type = identity.media_type();
        self.identity = Some(identity);
        self.confidence = confidence;
        self.finish(DetectionState::Confirmed)
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidTransition {
            operation,
            state: self.state,
        }
    }
}

/// Decision-relevant fields of a suspended batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub group_key: String,
    pub first_path: Option<PathBuf>,
    pub parsed_title: String,
    pub media_type: MediaType,
    /// Distinct seasons, ascending.
    pub seasons: Vec<u16>,
    pub year: Option<u16>,
    pub file_count: usize,
    pub candidates: Vec<ScoredCandidate>,
}

/// Immutable per-batch result handed to formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchContext {
    pub group_key: String,
    pub files: Vec<ParsedFile>,
    pub state: DetectionState,
    pub media_type: MediaType,
    pub identity: Option<Identity>,
    pub confidence: f64,
    pub mapped: bool,
    pub metadata_source: MetadataSource,
    /// Prefetched episode titles, ordered by season then episode.
    pub episode_cache: Vec<EpisodeTitle>,
    pub diagnostic: Option<String>,
}

impl BatchContext {
    /// Cached title for one episode, if it was prefetched.
    pub fn episode_title(&self, season: u16, episode: u16) -> Option<&EpisodeTitle> {
        self.episode_cache
            .iter()
            .find(|e| e.season == season && e.episode == episode)
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == DetectionState::Confirmed
    }
}

/// Drives batches through their lifecycle using the injected collaborators.
pub struct DetectionController<C, O, E> {
    client: C,
    overrides: O,
    extractor: E,
    cancel: CancelFlag,
}

impl<C, O, E> DetectionController<C, O, E>
where
    C: MetadataClient,
    O: OverrideStore,
    E: EmbeddedMetadataExtractor,
{
    pub fn new(client: C, overrides: O, extractor: E, cancel: CancelFlag) -> Self {
        Self {
            client,
            overrides,
            extractor,
            cancel,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn overrides(&self) -> &O {
        &self.overrides
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Create the unit of work for one title group.
    pub fn create_batch(
        &self,
        group_key: impl Into<String>,
        files: Vec<ParsedFile>,
        policy: DetectionPolicy,
    ) -> BatchDetection {
        let media_type = if files.iter().any(|f| f.media_type == MediaType::Series) {
            MediaType::Series
        } else {
            MediaType::Movie
        };

        BatchDetection {
            group_key: group_key.into(),
            files,
            policy,
            state: DetectionState::Parsed,
            media_type,
            identity: None,
            confidence: 0.0,
            candidates: Vec::new(),
            mapped: false,
            skipped: false,
            metadata_source: MetadataSource::Inferred,
            episode_cache: EpisodeCache::new(),
            search_phase: SearchPhase::NotStarted,
            last_query: None,
            diagnostic: None,
        }
    }

    /// Advance the batch by one transition.
    pub fn step(&mut self, batch: &mut BatchDetection) -> Action {
        if batch.state.is_terminal() {
            return Action::Done;
        }
        if self.cancel.is_set() {
            batch.diagnostic = Some("scan cancelled".to_string());
            return batch.finish(DetectionState::Skipped);
        }

        match batch.state {
            DetectionState::Parsed => self.step_parsed(batch),
            DetectionState::TypePending => Action::NeedMediaType,
            DetectionState::Searching => self.step_searching(batch),
            DetectionState::SelectionPending => Action::NeedSelection,
            DetectionState::Confirmed | DetectionState::Skipped | DetectionState::Unidentified => {
                Action::Done
            }
        }
    }

    /// Answer a `NeedMediaType` suspension.
    pub fn set_media_type(&mut self, batch: &mut BatchDetection, media_type: MediaType) -> Result<()> {
        if batch.state != DetectionState::TypePending {
            return Err(batch.invalid("set_media_type"));
        }
        tracing::debug!("[BATCH] '{}' media type set to {}", batch.group_key, media_type);
        batch.media_type = media_type;
        batch.state = DetectionState::Searching;
        Ok(())
    }

    /// Answer a `NeedSelection` suspension; `None` skips the batch.
    pub fn set_selection(&mut self, batch: &mut BatchDetection, choice: Option<Choice>) -> Result<()> {
        if batch.state != DetectionState::SelectionPending {
            return Err(batch.invalid("set_selection"));
        }
        let Some(choice) = choice else {
            batch.finish(DetectionState::Skipped);
            return Ok(());
        };

        let chosen = batch
            .candidates
            .iter()
            .find(|c| c.candidate.id == choice.id)
            .cloned();
        let confidence = chosen.as_ref().map(|c| c.confidence).unwrap_or(1.0);

        match self.fetch_identity(choice.id, choice.media_type) {
            Some(identity) => {
                batch.confirm(identity, confidence);
            }
            None => match chosen {
                Some(scored) => {
                    tracing::debug!("Using search record for {} after failed lookup", choice.id);
                    batch.confirm(scored.candidate.to_identity(choice.media_type), confidence);
                }
                None => {
                    batch.diagnostic = Some(format!(
                        "could not resolve selected {} {}",
                        choice.media_type, choice.id
                    ));
                    batch.finish(DetectionState::Unidentified);
                }
            },
        }
        Ok(())
    }

    /// Answer a `NeedFallback` suspension; `None` skips the batch.
    ///
    /// A chosen identity is persisted as a manual override for the batch's
    /// first file, so later scans resolve it without searching.
    pub fn set_fallback_result(
        &mut self,
        batch: &mut BatchDetection,
        choice: Option<Choice>,
    ) -> Result<()> {
        if !batch.awaiting_fallback() {
            return Err(batch.invalid("set_fallback_result"));
        }
        let Some(choice) = choice else {
            batch.finish(DetectionState::Skipped);
            return Ok(());
        };

        let identity = self.fetch_identity(choice.id, choice.media_type).or_else(|| {
            choice.title.as_ref().map(|title| {
                Candidate {
                    id: choice.id,
                    title: title.clone(),
                    original_title: title.clone(),
                    ..Default::default()
                }
                .to_identity(choice.media_type)
            })
        });

        let Some(identity) = identity else {
            batch.diagnostic = Some(format!(
                "could not resolve manual {} {}",
                choice.media_type, choice.id
            ));
            batch.finish(DetectionState::Unidentified);
            return Ok(());
        };

        if let Some(first) = batch.first_file() {
            let filename = first.file_name();
            if let Err(e) = self.overrides.set_id(
                &filename,
                identity.id(),
                identity.media_type(),
                Some(identity.title()),
            ) {
                tracing::warn!("Failed to persist ID mapping for {}: {}", filename, e);
            }
        }

        batch.mapped = true;
        batch.confirm(identity, 1.0);
        Ok(())
    }

    /// Skip a batch from any non-terminal state.
    pub fn skip(&mut self, batch: &mut BatchDetection) -> Result<()> {
        if batch.state.is_terminal() {
            return Err(batch.invalid("skip"));
        }
        batch.finish(DetectionState::Skipped);
        Ok(())
    }

    /// Fill the episode cache of a confirmed series batch.
    pub fn prefetch_episodes(&mut self, batch: &mut BatchDetection, language: &EpisodeTitleLanguage) {
        if batch.state != DetectionState::Confirmed {
            return;
        }
        let Some(series) = batch.identity.as_ref().and_then(Identity::as_series) else {
            return;
        };
        batch.episode_cache = prefetch::prefetch_episodes(
            &mut self.client,
            series,
            &batch.files,
            language,
            &self.cancel,
        );
    }

    fn step_parsed(&mut self, batch: &mut BatchDetection) -> Action {
        let mapping = batch
            .files
            .iter()
            .find_map(|f| self.overrides.get_id(&f.file_name()));

        if let Some((id, media_type)) = mapping {
            tracing::info!("[BATCH] '{}' has manual mapping {}:{}", batch.group_key, media_type, id);
            match self.fetch_identity(id, media_type) {
                Some(identity) => {
                    batch.mapped = true;
                    return batch.confirm(identity, 1.0);
                }
                None => {
                    tracing::warn!(
                        "Mapped ID {} for '{}' could not be resolved; searching instead",
                        id,
                        batch.group_key
                    );
                }
            }
        }

        if batch.policy.always_ask_media_type {
            batch.state = DetectionState::TypePending;
            return Action::NeedMediaType;
        }

        batch.state = DetectionState::Searching;
        Action::Continue
    }

    fn step_searching(&mut self, batch: &mut BatchDetection) -> Action {
        match batch.search_phase {
            SearchPhase::NotStarted => {
                batch.search_phase = SearchPhase::FilenameSearched;
                match self.search_by_filename(batch) {
                    Some(found) => self.accept_search(batch, found),
                    None => Action::Continue,
                }
            }
            SearchPhase::FilenameSearched => {
                batch.search_phase = SearchPhase::EmbeddedTried;
                match self.search_by_embedded_title(batch) {
                    Some(found) => {
                        batch.metadata_source = MetadataSource::EmbeddedMetadata;
                        self.accept_search(batch, found)
                    }
                    None => self.exhausted(batch),
                }
            }
            SearchPhase::EmbeddedTried => self.exhausted(batch),
        }
    }

    /// Route a successful search by raw result count, then by trust.
    fn accept_search(&mut self, batch: &mut BatchDetection, found: IdentityMatch) -> Action {
        let result_count = self.client.last_result_count();
        batch.confidence = found.confidence;

        let needs_selection = result_count > 1
            || (batch.policy.always_confirm_match && !batch.mapped)
            || !is_trusted(found.confidence);

        if needs_selection {
            let (title, year) = match &batch.last_query {
                Some(query) => (query.title.clone(), query.year),
                None => (
                    batch.first_file().map(|f| f.title_guess.clone()).unwrap_or_default(),
                    batch.first_file().and_then(|f| f.year),
                ),
            };
            batch.candidates = self.client.scored_candidates(
                &title,
                year,
                batch.media_type.is_movie(),
                MAX_SELECTION_CANDIDATES,
            );
            tracing::info!(
                "[BATCH] '{}' needs selection ({} result(s), best confidence {:.2})",
                batch.group_key,
                result_count,
                found.confidence
            );
            batch.state = DetectionState::SelectionPending;
            return Action::NeedSelection;
        }

        batch.confirm(found.identity, found.confidence)
    }

    fn exhausted(&mut self, batch: &mut BatchDetection) -> Action {
        if batch.policy.interactive_fallback {
            return Action::NeedFallback;
        }
        batch.diagnostic = Some("no match found".to_string());
        batch.finish(DetectionState::Unidentified)
    }

    /// Search with the cleaned filename, retrying once with the raw guess.
    fn search_by_filename(&mut self, batch: &mut BatchDetection) -> Option<IdentityMatch> {
        let first = batch.first_file()?.clone();
        let is_series = !batch.media_type.is_movie();

        let (cleaned, cleaned_year) = if is_series {
            clean_for_search(&first.title_guess, true)
        } else {
            clean_for_search(&first.raw_stem, false)
        };
        let query = if cleaned.is_empty() {
            first.title_guess.clone()
        } else {
            cleaned
        };
        let year = if is_series {
            None
        } else {
            cleaned_year.or(first.year)
        };

        if let Some(found) = self.search(batch, &query, year) {
            return Some(found);
        }
        if query != first.title_guess && !first.title_guess.is_empty() {
            tracing::debug!("Retrying '{}' with unmodified title '{}'", query, first.title_guess);
            let retry_year = if is_series { None } else { first.year };
            return self.search(batch, &first.title_guess, retry_year);
        }
        None
    }

    /// One-shot search with a title read from the container's tags.
    fn search_by_embedded_title(&mut self, batch: &mut BatchDetection) -> Option<IdentityMatch> {
        let path = batch.first_file()?.path.clone();
        let title = self.extractor.extract_plausible_title(&path)?;
        tracing::info!("[BATCH] '{}' trying embedded title '{}'", batch.group_key, title);

        let is_series = !batch.media_type.is_movie();
        let (cleaned, year) = clean_for_search(&title, is_series);
        let query = if cleaned.is_empty() { title } else { cleaned };
        let year = if is_series { None } else { year };

        let found = self.search(batch, &query, year)?;
        if is_trusted(found.confidence) {
            Some(found)
        } else {
            tracing::debug!(
                "Embedded title match {} rejected (confidence {:.2})",
                found.identity,
                found.confidence
            );
            None
        }
    }

    fn search(&mut self, batch: &mut BatchDetection, title: &str, year: Option<u16>) -> Option<IdentityMatch> {
        batch.last_query = Some(SearchQuery {
            title: title.to_string(),
            year,
        });
        tracing::debug!("Searching {} '{}' (year={:?})", batch.media_type, title, year);

        let result = match batch.media_type {
            MediaType::Series => self.client.search_series(title),
            MediaType::Movie => self.client.search_movie(title, year),
        };
        match result {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Search for '{}' failed: {}", title, e);
                None
            }
        }
    }

    fn fetch_identity(&mut self, id: u64, media_type: MediaType) -> Option<Identity> {
        match self.client.fetch_by_id(id, media_type) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!("Lookup of {} {} failed: {}", media_type, id, e);
                None
            }
        }
    }
}
