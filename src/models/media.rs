//! Media-related data models.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Media type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Series,
    Movie,
}

impl MediaType {
    /// Whether this is a movie.
    pub fn is_movie(self) -> bool {
        self == MediaType::Movie
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Series => write!(f, "series"),
            MediaType::Movie => write!(f, "movie"),
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "series" | "tv" | "show" | "s" => Ok(MediaType::Series),
            "movie" | "film" | "m" => Ok(MediaType::Movie),
            other => Err(crate::Error::other(format!("unknown media type: {}", other))),
        }
    }
}

/// Immutable result of parsing one media filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFile {
    /// Full path to the file (the stem itself when parsed from a bare name).
    pub path: PathBuf,
    /// Filename without extension.
    pub raw_stem: String,
    /// Best-effort working title.
    pub title_guess: String,
    /// Series iff a season and at least one episode were found.
    pub media_type: MediaType,
    /// Season number (series only).
    pub season: Option<u16>,
    /// Episode numbers in filename order, without duplicates.
    pub episodes: Vec<u16>,
    /// Release year (1900-2100).
    pub year: Option<u16>,
}

impl ParsedFile {
    /// File name used for override lookups.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.raw_stem.clone())
    }

    /// The single episode this file maps to, if it maps to exactly one.
    pub fn single_episode(&self) -> Option<(u16, u16)> {
        match (self.season, self.episodes.as_slice()) {
            (Some(season), [episode]) => Some((season, *episode)),
            _ => None,
        }
    }
}

/// Raw search record returned by the metadata service.
///
/// Movie and TV results are folded into one shape: `title` is the localized
/// title or name, `date` the release or first-air date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// TMDB ID.
    pub id: u64,
    /// Localized title.
    pub title: String,
    /// Original-language title.
    pub original_title: String,
    /// Release or first-air date (YYYY-MM-DD).
    pub date: Option<String>,
    /// TMDB popularity.
    pub popularity: f64,
    /// Original language code.
    pub original_language: Option<String>,
}

impl Candidate {
    /// Year parsed from the first four characters of the date.
    pub fn year(&self) -> Option<u16> {
        year_from_date(self.date.as_deref())
    }

    /// Build the identity this candidate stands for.
    pub fn to_identity(&self, media_type: MediaType) -> Identity {
        match media_type {
            MediaType::Series => Identity::Series(SeriesIdentity {
                id: self.id,
                name: self.title.clone(),
                original_name: self.original_title.clone(),
                first_air_year: self.year(),
                original_language: self.original_language.clone().unwrap_or_default(),
            }),
            MediaType::Movie => Identity::Movie(MovieIdentity {
                id: self.id,
                title: self.title.clone(),
                original_title: self.original_title.clone(),
                year: self.year(),
            }),
        }
    }
}

/// Extract the year from a TMDB date string (YYYY-MM-DD).
pub fn year_from_date(date: Option<&str>) -> Option<u16> {
    date.filter(|d| d.len() >= 4)
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok())
}

/// A candidate with its ranking score and trust estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    /// Ordering score, includes the popularity tiebreaker.
    pub rank_score: f64,
    /// Trust estimate in [0, 1], never inflated by popularity.
    pub confidence: f64,
}

/// Canonical TV series record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesIdentity {
    pub id: u64,
    pub name: String,
    pub original_name: String,
    pub first_air_year: Option<u16>,
    pub original_language: String,
}

/// Canonical movie record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieIdentity {
    pub id: u64,
    pub title: String,
    pub original_title: String,
    pub year: Option<u16>,
}

/// The accepted canonical record a batch resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Identity {
    Series(SeriesIdentity),
    Movie(MovieIdentity),
}

impl Identity {
    pub fn id(&self) -> u64 {
        match self {
            Identity::Series(s) => s.id,
            Identity::Movie(m) => m.id,
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            Identity::Series(_) => MediaType::Series,
            Identity::Movie(_) => MediaType::Movie,
        }
    }

    /// Localized display title.
    pub fn title(&self) -> &str {
        match self {
            Identity::Series(s) => &s.name,
            Identity::Movie(m) => &m.title,
        }
    }

    pub fn year(&self) -> Option<u16> {
        match self {
            Identity::Series(s) => s.first_air_year,
            Identity::Movie(m) => m.year,
        }
    }

    pub fn as_series(&self) -> Option<&SeriesIdentity> {
        match self {
            Identity::Series(s) => Some(s),
            Identity::Movie(_) => None,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.year() {
            Some(year) => write!(f, "{} ({}) [{}:{}]", self.title(), year, self.media_type(), self.id()),
            None => write!(f, "{} [{}:{}]", self.title(), self.media_type(), self.id()),
        }
    }
}

/// Episode title record fetched during prefetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeTitle {
    pub series_id: u64,
    pub season: u16,
    pub episode: u16,
    /// Episode name.
    pub name: String,
    /// Overview.
    pub overview: Option<String>,
}

/// Where a batch's identity ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    /// Matched through a TMDB search or manual ID.
    Tmdb,
    /// Matched after searching with a title read from container tags.
    EmbeddedMetadata,
    /// Nothing resolved yet; filename data only.
    #[default]
    Inferred,
    /// Search exhausted without a match.
    Unidentified,
}
