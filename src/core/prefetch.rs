//! Episode title prefetch for confirmed series batches.
//!
//! Runs once per batch after it reaches `Confirmed`, so that formatting the
//! individual files later needs no network access.

use crate::core::rendezvous::CancelFlag;
use crate::models::media::{EpisodeTitle, ParsedFile, SeriesIdentity};
use crate::services::MetadataClient;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Language used for episode title requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeTitleLanguage {
    /// Whatever language the client uses for metadata.
    #[default]
    SameAsMetadata,
    /// The series' original language.
    Original,
    /// A fixed language tag (e.g. "en-US").
    Forced(String),
}

/// Episode cache keyed by `(season, episode)`.
pub type EpisodeCache = BTreeMap<(u16, u16), EpisodeTitle>;

/// Resolve the language tag to request, `None` meaning the client default.
pub fn resolve_language(policy: &EpisodeTitleLanguage, series: &SeriesIdentity) -> Option<String> {
    match policy {
        EpisodeTitleLanguage::SameAsMetadata => None,
        EpisodeTitleLanguage::Original if !series.original_language.is_empty() => {
            Some(series.original_language.clone())
        }
        EpisodeTitleLanguage::Original => None,
        EpisodeTitleLanguage::Forced(tag) => Some(tag.clone()),
    }
}

/// Distinct `(season, episode)` pairs of files mapping to exactly one episode.
///
/// Multi-episode files never get a per-episode title.
pub fn episode_pairs(files: &[ParsedFile]) -> BTreeSet<(u16, u16)> {
    files.iter().filter_map(ParsedFile::single_episode).collect()
}

/// Fetch every needed episode title once.
///
/// A failed or empty fetch is not fatal; the pair is just missing from the
/// returned cache.
pub fn prefetch_episodes<C: MetadataClient>(
    client: &mut C,
    series: &SeriesIdentity,
    files: &[ParsedFile],
    policy: &EpisodeTitleLanguage,
    cancel: &CancelFlag,
) -> EpisodeCache {
    let language = resolve_language(policy, series);
    let pairs = episode_pairs(files);
    let mut cache = EpisodeCache::new();

    tracing::debug!(
        "Prefetching {} episode title(s) for {} (language={:?})",
        pairs.len(),
        series.name,
        language
    );

    for (season, episode) in pairs {
        if cancel.is_set() {
            tracing::info!("Episode prefetch cancelled for {}", series.name);
            break;
        }
        match client.get_episode(series.id, season, episode, language.as_deref()) {
            Ok(Some(title)) => {
                cache.insert((season, episode), title);
            }
            Ok(None) => {
                tracing::debug!("No episode title for {} S{:02}E{:02}", series.name, season, episode);
            }
            Err(e) => {
                tracing::warn!(
                    "Episode fetch failed for {} S{:02}E{:02}: {}",
                    series.name,
                    season,
                    episode,
                    e
                );
            }
        }
    }

    cache
}
