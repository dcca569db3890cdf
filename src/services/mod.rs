//! External collaborators of the detection engine.
//!
//! The state machine only talks to these traits. Concrete implementations
//! live next to them: [`tmdb::TmdbClient`], [`ffprobe::FfprobeExtractor`] and
//! [`id_mapping::JsonIdMapping`].

pub mod ffprobe;
pub mod id_mapping;
pub mod tmdb;

use crate::models::media::{EpisodeTitle, Identity, MediaType, ScoredCandidate};
use crate::Result;
use std::path::Path;

/// Identity picked by a search together with its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMatch {
    pub identity: Identity,
    pub confidence: f64,
}

/// Metadata service client.
///
/// Implementations are stateful: they keep the raw result set of the most
/// recent search so that [`MetadataClient::scored_candidates`] can rank it
/// without another request. Searches take `&mut self`, so a client is never
/// driven from two threads at once.
pub trait MetadataClient {
    /// Search TV series; returns the auto-selected best match.
    fn search_series(&mut self, title: &str) -> Result<Option<IdentityMatch>>;

    /// Search movies; returns the auto-selected best match.
    fn search_movie(&mut self, title: &str, year: Option<u16>) -> Result<Option<IdentityMatch>>;

    /// Number of raw results the most recent search returned.
    fn last_result_count(&self) -> usize;

    /// Rank the most recent raw results. Never touches the network.
    fn scored_candidates(
        &self,
        title: &str,
        year: Option<u16>,
        is_movie: bool,
        max_n: usize,
    ) -> Vec<ScoredCandidate>;

    /// Fetch an identity directly by TMDB ID.
    fn fetch_by_id(&mut self, id: u64, media_type: MediaType) -> Result<Option<Identity>>;

    /// Fetch one episode title, optionally in a specific language.
    fn get_episode(
        &mut self,
        series_id: u64,
        season: u16,
        episode: u16,
        language: Option<&str>,
    ) -> Result<Option<EpisodeTitle>>;
}

/// Persisted manual-override ID map.
pub trait OverrideStore {
    /// Look up a manual override for a filename.
    fn get_id(&self, filename: &str) -> Option<(u64, MediaType)>;

    /// Persist a manual override for a filename.
    fn set_id(&mut self, filename: &str, id: u64, media_type: MediaType, title: Option<&str>) -> Result<()>;
}

/// Best-effort title extraction from a file's own container metadata.
pub trait EmbeddedMetadataExtractor {
    fn extract_plausible_title(&self, path: &Path) -> Option<String>;
}
