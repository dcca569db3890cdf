//! Candidate scoring.
//!
//! Each candidate gets two numbers:
//! - `rank_score` orders candidates and includes a small popularity tiebreaker
//! - `confidence` estimates trust in [0, 1] and ignores popularity
//!
//! Only `confidence` is compared against [`CONFIDENCE_THRESHOLD`].

use crate::models::media::{Candidate, MediaType, ScoredCandidate};
use crate::services::IdentityMatch;
use regex::Regex;
use std::sync::LazyLock;

/// Minimum confidence for accepting a match without a human.
pub const CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Number of candidates offered when a selection is requested.
pub const MAX_SELECTION_CANDIDATES: usize = 5;

const EXACT_BONUS: f64 = 0.3;
const YEAR_EXACT_BONUS: f64 = 0.25;
const YEAR_NEAR_BONUS: f64 = 0.10;
const POPULARITY_WEIGHT: f64 = 0.05;
const YEAR_CONFIDENCE_BOOST: f64 = 0.1;

static RE_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Lowercase, strip punctuation and collapse whitespace.
pub fn normalize_for_comparison(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = RE_PUNCTUATION.replace_all(&lower, "");
    RE_SPACES.replace_all(&stripped, " ").trim().to_string()
}

/// Edit-distance similarity of two titles after normalization, in [0, 1].
pub fn string_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_for_comparison(a), &normalize_for_comparison(b))
}

/// Title and optional year a batch is searched with.
#[derive(Debug, Clone, Copy)]
pub struct MatchQuery<'a> {
    pub title: &'a str,
    pub year: Option<u16>,
}

impl<'a> MatchQuery<'a> {
    pub fn new(title: &'a str, year: Option<u16>) -> Self {
        Self { title, year }
    }
}

/// Individual score components for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub title_sim: f64,
    pub exact_bonus: f64,
    pub year_bonus: f64,
    pub pop_bonus: f64,
    pub year_matched: bool,
}

impl ScoreBreakdown {
    pub fn rank_score(&self) -> f64 {
        self.title_sim + self.exact_bonus + self.year_bonus + self.pop_bonus
    }

    pub fn confidence(&self) -> f64 {
        let base = if self.exact_bonus > 0.0 { 1.0 } else { self.title_sim };
        if self.year_matched {
            (base + YEAR_CONFIDENCE_BOOST).min(1.0)
        } else {
            base.min(1.0)
        }
    }
}

/// Compute all score components for one candidate.
pub fn breakdown(query: &MatchQuery<'_>, candidate: &Candidate) -> ScoreBreakdown {
    let query_norm = normalize_for_comparison(query.title);

    let title_sim = string_similarity(query.title, &candidate.title)
        .max(string_similarity(query.title, &candidate.original_title));

    let exact = query_norm == normalize_for_comparison(&candidate.title)
        || query_norm == normalize_for_comparison(&candidate.original_title);
    let exact_bonus = if exact { EXACT_BONUS } else { 0.0 };

    let mut year_bonus = 0.0;
    let mut year_matched = false;
    if let (Some(query_year), Some(candidate_year)) = (query.year, candidate.year()) {
        match (i32::from(query_year) - i32::from(candidate_year)).abs() {
            0 => {
                year_bonus = YEAR_EXACT_BONUS;
                year_matched = true;
            }
            1 => year_bonus = YEAR_NEAR_BONUS,
            _ => {}
        }
    }

    let pop_bonus = (candidate.popularity / 1000.0).clamp(0.0, 1.0) * POPULARITY_WEIGHT;

    ScoreBreakdown {
        title_sim,
        exact_bonus,
        year_bonus,
        pop_bonus,
        year_matched,
    }
}

/// Score a single candidate.
pub fn score_candidate(query: &MatchQuery<'_>, candidate: &Candidate) -> ScoredCandidate {
    let parts = breakdown(query, candidate);

    tracing::debug!(
        "Candidate: {} (id={}, year={:?}, sim={:.2}, exact={}, rank={:.3}, confidence={:.2})",
        candidate.title,
        candidate.id,
        candidate.year(),
        parts.title_sim,
        parts.exact_bonus > 0.0,
        parts.rank_score(),
        parts.confidence()
    );

    ScoredCandidate {
        candidate: candidate.clone(),
        rank_score: parts.rank_score(),
        confidence: parts.confidence(),
    }
}

/// Score all candidates, best rank first. Ties keep service order.
pub fn score_candidates(query: &MatchQuery<'_>, candidates: &[Candidate]) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|c| score_candidate(query, c))
        .collect();
    scored.sort_by(|a, b| b.rank_score.total_cmp(&a.rank_score));
    scored
}

/// The top `max_n` scored candidates, offered for human selection.
pub fn top_candidates(
    query: &MatchQuery<'_>,
    candidates: &[Candidate],
    max_n: usize,
) -> Vec<ScoredCandidate> {
    let mut scored = score_candidates(query, candidates);
    scored.truncate(max_n);
    scored
}

/// Auto-select the top ranked candidate and report its confidence.
pub fn best_match(
    query: &MatchQuery<'_>,
    candidates: &[Candidate],
    media_type: MediaType,
) -> Option<IdentityMatch> {
    let best = score_candidates(query, candidates).into_iter().next()?;

    tracing::debug!(
        "Selected best match: {} (rank={:.3}, confidence={:.2})",
        best.candidate.title,
        best.rank_score,
        best.confidence
    );

    Some(IdentityMatch {
        identity: best.candidate.to_identity(media_type),
        confidence: best.confidence,
    })
}

/// Whether a confidence is high enough for automatic acceptance.
pub fn is_trusted(confidence: f64) -> bool {
    confidence >= CONFIDENCE_THRESHOLD
}
