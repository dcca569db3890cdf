//! Persisted manual TMDB ID overrides.
//!
//! Stored as JSON in the scanned folder. Keys are normalised filename stems,
//! so renamed releases of the same file still hit.

use crate::models::media::MediaType;
use crate::services::OverrideStore;
use crate::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Mapping file name inside the media folder.
pub const MAPPING_FILE: &str = ".media_resolver_ids.json";

static RE_SYMBOLS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_TMDB_TV_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"themoviedb\.org/tv/(\d+)").unwrap());
static RE_TMDB_MOVIE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"themoviedb\.org/movie/(\d+)").unwrap());
static RE_SHORT_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(tv|series|movie):(\d+)$").unwrap());

/// One stored override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub tmdb_id: u64,
    pub media_type: MediaType,
    pub title: Option<String>,
    pub original_filename: String,
    #[serde(default)]
    pub mapped_at: Option<DateTime<Utc>>,
}

/// A parsed TMDB reference; the media type is unknown for a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmdbReference {
    pub id: u64,
    pub media_type: Option<MediaType>,
}

/// Parse a TMDB URL, a `tv:`/`series:`/`movie:` reference or a bare ID.
pub fn parse_tmdb_reference(input: &str) -> Result<TmdbReference> {
    let input = input.trim();
    let invalid = || crate::Error::InvalidReference(input.to_string());
    let parse_id = |digits: &str| digits.parse::<u64>().map_err(|_| invalid());

    if let Some(caps) = RE_TMDB_TV_URL.captures(input) {
        return Ok(TmdbReference {
            id: parse_id(&caps[1])?,
            media_type: Some(MediaType::Series),
        });
    }
    if let Some(caps) = RE_TMDB_MOVIE_URL.captures(input) {
        return Ok(TmdbReference {
            id: parse_id(&caps[1])?,
            media_type: Some(MediaType::Movie),
        });
    }
    if let Some(caps) = RE_SHORT_REF.captures(input) {
        let media_type = if caps[1].eq_ignore_ascii_case("movie") {
            MediaType::Movie
        } else {
            MediaType::Series
        };
        return Ok(TmdbReference {
            id: parse_id(&caps[2])?,
            media_type: Some(media_type),
        });
    }
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        return Ok(TmdbReference {
            id: parse_id(input)?,
            media_type: None,
        });
    }

    Err(invalid())
}

/// Normalise a filename into a mapping key.
pub fn normalize_key(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let name = RE_SYMBOLS.replace_all(&stem.to_lowercase(), " ").into_owned();
    RE_SPACES.replace_all(&name, " ").trim().to_string()
}

/// JSON-file backed override store.
#[derive(Debug, Clone)]
pub struct JsonIdMapping {
    path: PathBuf,
    entries: BTreeMap<String, MappingEntry>,
}

impl JsonIdMapping {
    /// Load the mapping file of `dir`. A missing or corrupt file yields an
    /// empty store.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(MAPPING_FILE);
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt mapping file {:?}: {}", path, e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &BTreeMap<String, MappingEntry> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)
            .map_err(|e| crate::Error::MappingStore(format!("{}: {}", self.path.display(), e)))
    }

    /// Look up the entry for a filename: exact key first, then a key that
    /// contains or is contained in it.
    pub fn lookup(&self, filename: &str) -> Option<&MappingEntry> {
        let key = normalize_key(filename);
        if key.is_empty() {
            return None;
        }
        self.entries.get(&key).or_else(|| {
            self.entries
                .iter()
                .find(|(mapped, _)| !mapped.is_empty() && (key.contains(mapped.as_str()) || mapped.contains(key.as_str())))
                .map(|(_, entry)| entry)
        })
    }

    /// Remove the exact mapping for a filename. Returns whether one existed.
    pub fn remove(&mut self, filename: &str) -> Result<bool> {
        let key = normalize_key(filename);
        if self.entries.remove(&key).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }
}

impl OverrideStore for JsonIdMapping {
    fn get_id(&self, filename: &str) -> Option<(u64, MediaType)> {
        self.lookup(filename).map(|e| (e.tmdb_id, e.media_type))
    }

    fn set_id(&mut self, filename: &str, id: u64, media_type: MediaType, title: Option<&str>) -> Result<()> {
        let key = normalize_key(filename);
        tracing::debug!("Mapping '{}' -> {}:{}", key, media_type, id);
        self.entries.insert(
            key,
            MappingEntry {
                tmdb_id: id,
                media_type,
                title: title.map(str::to_string),
                original_filename: filename.to_string(),
                mapped_at: Some(Utc::now()),
            },
        );
        self.save()
    }
}
