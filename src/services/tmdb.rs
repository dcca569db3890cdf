//! TMDB API client.
//!
//! Requests are issued with the async `reqwest` client on a private
//! current-thread runtime, so the client can be driven from the synchronous
//! scan worker thread.

use crate::core::scorer::{best_match, top_candidates, MatchQuery};
use crate::models::config::TmdbSettings;
use crate::models::media::{
    year_from_date, Candidate, EpisodeTitle, Identity, MediaType, MovieIdentity, ScoredCandidate,
    SeriesIdentity,
};
use crate::services::{IdentityMatch, MetadataClient};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// TMDB client configuration.
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    /// API key or Bearer token (JWT)
    pub api_key: String,
    pub language: String,
    /// Whether to use Bearer token authentication (API v4 style)
    pub use_bearer: bool,
    /// Minimum spacing between two requests.
    pub min_request_interval: Duration,
}

impl TmdbConfig {
    /// Create config from settings, falling back to the environment for the key.
    /// Supports both API key (v3) and Bearer token (v4) formats.
    pub fn from_settings(settings: &TmdbSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("TMDB_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or(crate::Error::TmdbApiKeyMissing)?;

        // Bearer tokens start with "eyJ" (base64 encoded JWT header)
        let use_bearer = api_key.starts_with("eyJ");

        Ok(Self {
            api_key,
            language: settings.language.clone(),
            use_bearer,
            min_request_interval: Duration::from_millis(settings.min_request_interval_ms),
        })
    }
}

/// Movie search result.
#[derive(Debug, Deserialize)]
pub struct MovieSearchResult {
    pub results: Vec<MovieSearchItem>,
}

/// Movie search item.
#[derive(Debug, Deserialize)]
pub struct MovieSearchItem {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub original_title: String,
    pub release_date: Option<String>,
    #[serde(default)]
    pub popularity: f64,
    pub original_language: Option<String>,
}

/// TV show search result.
#[derive(Debug, Deserialize)]
pub struct TvSearchResult {
    pub results: Vec<TvSearchItem>,
}

/// TV show search item.
#[derive(Debug, Deserialize)]
pub struct TvSearchItem {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub original_name: String,
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub popularity: f64,
    pub original_language: Option<String>,
}

/// Movie details.
#[derive(Debug, Deserialize)]
pub struct MovieDetails {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub original_title: String,
    pub release_date: Option<String>,
}

/// TV show details.
#[derive(Debug, Deserialize)]
pub struct TvDetails {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub original_language: String,
    pub first_air_date: Option<String>,
}

/// Episode details.
#[derive(Debug, Deserialize)]
pub struct EpisodeDetails {
    #[serde(default)]
    pub name: String,
    pub overview: Option<String>,
}

impl From<MovieSearchItem> for Candidate {
    fn from(item: MovieSearchItem) -> Self {
        Candidate {
            id: item.id,
            title: item.title,
            original_title: item.original_title,
            date: item.release_date.filter(|d| !d.is_empty()),
            popularity: item.popularity,
            original_language: item.original_language,
        }
    }
}

impl From<TvSearchItem> for Candidate {
    fn from(item: TvSearchItem) -> Self {
        Candidate {
            id: item.id,
            title: item.name,
            original_title: item.original_name,
            date: item.first_air_date.filter(|d| !d.is_empty()),
            popularity: item.popularity,
            original_language: item.original_language,
        }
    }
}

impl From<MovieDetails> for MovieIdentity {
    fn from(details: MovieDetails) -> Self {
        MovieIdentity {
            id: details.id,
            year: year_from_date(details.release_date.as_deref()),
            title: details.title,
            original_title: details.original_title,
        }
    }
}

impl From<TvDetails> for SeriesIdentity {
    fn from(details: TvDetails) -> Self {
        SeriesIdentity {
            id: details.id,
            first_air_year: year_from_date(details.first_air_date.as_deref()),
            name: details.name,
            original_name: details.original_name,
            original_language: details.original_language,
        }
    }
}

/// TMDB API client.
pub struct TmdbClient {
    config: TmdbConfig,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    last_request: Option<Instant>,
    last_raw_results: Vec<Candidate>,
}

impl TmdbClient {
    /// Create a new TMDB client.
    pub fn new(config: TmdbConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        tracing::debug!("Using TMDB language: {}", config.language);
        Ok(Self {
            config,
            client,
            runtime,
            last_request: None,
            last_raw_results: Vec::new(),
        })
    }

    /// Build a request with proper authentication.
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        if self.config.use_bearer {
            request.header("Authorization", format!("Bearer {}", self.config.api_key))
        } else {
            request
        }
    }

    /// Build URL with optional api_key parameter (only for v3 style).
    fn build_url(&self, path: &str, language: Option<&str>, extra_params: &str) -> String {
        let language = language.unwrap_or(&self.config.language);
        if self.config.use_bearer {
            format!("{}/{}?language={}{}", TMDB_BASE_URL, path, language, extra_params)
        } else {
            format!(
                "{}/{}?api_key={}&language={}{}",
                TMDB_BASE_URL, path, self.config.api_key, language, extra_params
            )
        }
    }

    /// Sleep until the minimum request spacing has elapsed.
    fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_request_interval {
                std::thread::sleep(self.config.min_request_interval - elapsed);
            }
        }
        self.last_request = Some(Instant::now());
    }

    /// GET a JSON document. `Ok(None)` means TMDB answered 404.
    fn get_json<T: DeserializeOwned>(&mut self, path: &str, url: &str) -> Result<Option<T>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.throttle();
            tracing::debug!("GET /{} (attempt {}/{})", path, attempt, MAX_ATTEMPTS);

            let request = self.build_request(url);
            let response = match self.runtime.block_on(request.send()) {
                Ok(response) => response,
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::debug!("Request error: {} (attempt {}/{})", e, attempt, MAX_ATTEMPTS);
                    std::thread::sleep(Duration::from_secs(1));
                    continue;
                }
                Err(e) => return Err(crate::Error::TmdbRequest(e.to_string())),
            };

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(1);
                if attempt >= MAX_ATTEMPTS {
                    return Err(crate::Error::TmdbStatus {
                        status: status.as_u16(),
                        endpoint: path.to_string(),
                    });
                }
                tracing::debug!("Rate limited, waiting {}s", retry_after);
                std::thread::sleep(Duration::from_secs(retry_after));
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(crate::Error::TmdbApiKeyInvalid);
            }
            if !status.is_success() {
                return Err(crate::Error::TmdbStatus {
                    status: status.as_u16(),
                    endpoint: path.to_string(),
                });
            }

            let body: T = self.runtime.block_on(response.json())?;
            return Ok(Some(body));
        }
    }

    /// Verify API key is valid.
    pub fn verify_api_key(&mut self) -> Result<bool> {
        let url = if self.config.use_bearer {
            format!("{}/authentication", TMDB_BASE_URL)
        } else {
            format!("{}/authentication?api_key={}", TMDB_BASE_URL, self.config.api_key)
        };
        self.throttle();
        let request = self.build_request(&url);
        match self.runtime.block_on(request.send()) {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Raw movie search.
    pub fn search_movie_raw(&mut self, query: &str, year: Option<u16>) -> Result<Vec<Candidate>> {
        let year_param = year.map(|y| format!("&year={}", y)).unwrap_or_default();
        let url = self.build_url(
            "search/movie",
            None,
            &format!("&query={}{}", urlencoding::encode(query), year_param),
        );
        let resp: Option<MovieSearchResult> = self.get_json("search/movie", &url)?;
        let results: Vec<Candidate> = resp
            .map(|r| r.results.into_iter().map(Candidate::from).collect())
            .unwrap_or_default();
        tracing::debug!("Found {} movie result(s) for '{}'", results.len(), query);
        Ok(results)
    }

    /// Raw TV search.
    pub fn search_tv_raw(&mut self, query: &str) -> Result<Vec<Candidate>> {
        let url = self.build_url(
            "search/tv",
            None,
            &format!("&query={}", urlencoding::encode(query)),
        );
        let resp: Option<TvSearchResult> = self.get_json("search/tv", &url)?;
        let results: Vec<Candidate> = resp
            .map(|r| r.results.into_iter().map(Candidate::from).collect())
            .unwrap_or_default();
        tracing::debug!("Found {} series result(s) for '{}'", results.len(), query);
        Ok(results)
    }

    /// Get movie details.
    pub fn get_movie_details(&mut self, movie_id: u64) -> Result<Option<MovieDetails>> {
        let path = format!("movie/{}", movie_id);
        let url = self.build_url(&path, None, "");
        self.get_json(&path, &url)
    }

    /// Get TV show details.
    pub fn get_tv_details(&mut self, tv_id: u64) -> Result<Option<TvDetails>> {
        let path = format!("tv/{}", tv_id);
        let url = self.build_url(&path, None, "");
        self.get_json(&path, &url)
    }

    /// Get episode details.
    pub fn get_episode_details(
        &mut self,
        tv_id: u64,
        season_number: u16,
        episode_number: u16,
        language: Option<&str>,
    ) -> Result<Option<EpisodeDetails>> {
        let path = format!("tv/{}/season/{}/episode/{}", tv_id, season_number, episode_number);
        let url = self.build_url(&path, language, "");
        self.get_json(&path, &url)
    }

    fn record(&mut self, results: std::result::Result<Vec<Candidate>, crate::Error>) -> Result<()> {
        match results {
            Ok(results) => {
                self.last_raw_results = results;
                Ok(())
            }
            Err(e) => {
                self.last_raw_results.clear();
                Err(e)
            }
        }
    }
}

impl MetadataClient for TmdbClient {
    fn search_series(&mut self, title: &str) -> Result<Option<IdentityMatch>> {
        let results = self.search_tv_raw(title);
        self.record(results)?;
        Ok(best_match(
            &MatchQuery::new(title, None),
            &self.last_raw_results,
            MediaType::Series,
        ))
    }

    fn search_movie(&mut self, title: &str, year: Option<u16>) -> Result<Option<IdentityMatch>> {
        let results = self.search_movie_raw(title, year);
        self.record(results)?;
        Ok(best_match(
            &MatchQuery::new(title, year),
            &self.last_raw_results,
            MediaType::Movie,
        ))
    }

    fn last_result_count(&self) -> usize {
        self.last_raw_results.len()
    }

    fn scored_candidates(
        &self,
        title: &str,
        year: Option<u16>,
        _is_movie: bool,
        max_n: usize,
    ) -> Vec<ScoredCandidate> {
        top_candidates(&MatchQuery::new(title, year), &self.last_raw_results, max_n)
    }

    fn fetch_by_id(&mut self, id: u64, media_type: MediaType) -> Result<Option<Identity>> {
        Ok(match media_type {
            MediaType::Series => self
                .get_tv_details(id)?
                .map(|d| Identity::Series(SeriesIdentity::from(d))),
            MediaType::Movie => self
                .get_movie_details(id)?
                .map(|d| Identity::Movie(MovieIdentity::from(d))),
        })
    }

    fn get_episode(
        &mut self,
        series_id: u64,
        season: u16,
        episode: u16,
        language: Option<&str>,
    ) -> Result<Option<EpisodeTitle>> {
        Ok(self
            .get_episode_details(series_id, season, episode, language)?
            .map(|details| EpisodeTitle {
                series_id,
                season,
                episode,
                name: details.name,
                overview: details.overview.filter(|o| !o.is_empty()),
            }))
    }
}
