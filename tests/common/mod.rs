//! In-memory collaborators for driving the detection engine without TMDB,
//! ffprobe or a mapping file.

#![allow(dead_code)]

use media_resolver::core::scorer::{best_match, top_candidates, MatchQuery};
use media_resolver::models::media::{
    Candidate, EpisodeTitle, Identity, MediaType, ScoredCandidate, SeriesIdentity,
};
use media_resolver::services::{
    EmbeddedMetadataExtractor, IdentityMatch, MetadataClient, OverrideStore,
};
use media_resolver::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One recorded client call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SearchSeries(String),
    SearchMovie(String, Option<u16>),
    FetchById(u64, MediaType),
    Episode {
        series_id: u64,
        season: u16,
        episode: u16,
        language: Option<String>,
    },
}

/// Scripted metadata client. Queries are matched case-insensitively.
#[derive(Debug, Default)]
pub struct FakeMetadataClient {
    series: HashMap<String, Vec<Candidate>>,
    movies: HashMap<String, Vec<Candidate>>,
    identities: HashMap<(u64, MediaType), Identity>,
    episodes: HashMap<(u64, u16, u16), String>,
    failing_queries: HashSet<String>,
    failing_episodes: HashSet<(u16, u16)>,
    last_results: Vec<Candidate>,
    pub calls: Vec<Call>,
}

impl FakeMetadataClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, query: &str, candidates: Vec<Candidate>) -> Self {
        self.series.insert(query.to_lowercase(), candidates);
        self
    }

    pub fn with_movies(mut self, query: &str, candidates: Vec<Candidate>) -> Self {
        self.movies.insert(query.to_lowercase(), candidates);
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities
            .insert((identity.id(), identity.media_type()), identity);
        self
    }

    pub fn with_episode(mut self, series_id: u64, season: u16, episode: u16, name: &str) -> Self {
        self.episodes
            .insert((series_id, season, episode), name.to_string());
        self
    }

    /// Searches for `query` fail with a transport error.
    pub fn failing_query(mut self, query: &str) -> Self {
        self.failing_queries.insert(query.to_lowercase());
        self
    }

    pub fn failing_episode(mut self, season: u16, episode: u16) -> Self {
        self.failing_episodes.insert((season, episode));
        self
    }

    pub fn search_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::SearchSeries(_) | Call::SearchMovie(..)))
            .count()
    }

    pub fn episode_calls(&self) -> Vec<(u16, u16)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Episode { season, episode, .. } => Some((*season, *episode)),
                _ => None,
            })
            .collect()
    }

    fn run_search(
        &mut self,
        title: &str,
        year: Option<u16>,
        media_type: MediaType,
    ) -> Result<Option<IdentityMatch>> {
        let key = title.to_lowercase();
        if self.failing_queries.contains(&key) {
            self.last_results.clear();
            return Err(Error::TmdbRequest(format!("connection reset for '{}'", title)));
        }
        let results = match media_type {
            MediaType::Series => self.series.get(&key),
            MediaType::Movie => self.movies.get(&key),
        }
        .cloned()
        .unwrap_or_default();

        self.last_results = results;
        Ok(best_match(
            &MatchQuery::new(title, year),
            &self.last_results,
            media_type,
        ))
    }
}

impl MetadataClient for FakeMetadataClient {
    fn search_series(&mut self, title: &str) -> Result<Option<IdentityMatch>> {
        self.calls.push(Call::SearchSeries(title.to_string()));
        self.run_search(title, None, MediaType::Series)
    }

    fn search_movie(&mut self, title: &str, year: Option<u16>) -> Result<Option<IdentityMatch>> {
        self.calls.push(Call::SearchMovie(title.to_string(), year));
        self.run_search(title, year, MediaType::Movie)
    }

    fn last_result_count(&self) -> usize {
        self.last_results.len()
    }

    fn scored_candidates(
        &self,
        title: &str,
        year: Option<u16>,
        _is_movie: bool,
        max_n: usize,
    ) -> Vec<ScoredCandidate> {
        top_candidates(&MatchQuery::new(title, year), &self.last_results, max_n)
    }

    fn fetch_by_id(&mut self, id: u64, media_type: MediaType) -> Result<Option<Identity>> {
        self.calls.push(Call::FetchById(id, media_type));
        Ok(self.identities.get(&(id, media_type)).cloned())
    }

    fn get_episode(
        &mut self,
        series_id: u64,
        season: u16,
        episode: u16,
        language: Option<&str>,
    ) -> Result<Option<EpisodeTitle>> {
        self.calls.push(Call::Episode {
            series_id,
            season,
            episode,
            language: language.map(str::to_string),
        });
        if self.failing_episodes.contains(&(season, episode)) {
            return Err(Error::TmdbStatus {
                status: 500,
                endpoint: format!("/tv/{}/season/{}/episode/{}", series_id, season, episode),
            });
        }
        Ok(self
            .episodes
            .get(&(series_id, season, episode))
            .map(|name| EpisodeTitle {
                series_id,
                season,
                episode,
                name: name.clone(),
                overview: None,
            }))
    }
}

/// Override store keyed by exact file name.
#[derive(Debug, Default)]
pub struct FakeOverrides {
    ids: HashMap<String, (u64, MediaType)>,
    pub saved: Vec<(String, u64, MediaType, Option<String>)>,
}

impl FakeOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filename: &str, id: u64, media_type: MediaType) -> Self {
        self.ids.insert(filename.to_string(), (id, media_type));
        self
    }
}

impl OverrideStore for FakeOverrides {
    fn get_id(&self, filename: &str) -> Option<(u64, MediaType)> {
        self.ids.get(filename).copied()
    }

    fn set_id(&mut self, filename: &str, id: u64, media_type: MediaType, title: Option<&str>) -> Result<()> {
        self.ids.insert(filename.to_string(), (id, media_type));
        self.saved
            .push((filename.to_string(), id, media_type, title.map(str::to_string)));
        Ok(())
    }
}

/// Extractor returning a fixed title and counting its invocations.
#[derive(Debug, Clone, Default)]
pub struct FakeExtractor {
    title: Option<String>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeExtractor {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn returning(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            calls: Arc::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddedMetadataExtractor for FakeExtractor {
    fn extract_plausible_title(&self, _path: &Path) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.title.clone()
    }
}

/// Search record with the fields the scorer looks at.
pub fn candidate(id: u64, title: &str, date: Option<&str>, popularity: f64) -> Candidate {
    Candidate {
        id,
        title: title.to_string(),
        original_title: title.to_string(),
        date: date.map(str::to_string),
        popularity,
        original_language: Some("en".to_string()),
    }
}

pub fn series_identity(id: u64, name: &str, year: Option<u16>, language: &str) -> Identity {
    Identity::Series(SeriesIdentity {
        id,
        name: name.to_string(),
        original_name: name.to_string(),
        first_air_year: year,
        original_language: language.to_string(),
    })
}
