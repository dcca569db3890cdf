//! Structural filename parser.
//!
//! Extracts from a filename stem:
//! - Season and episode numbers (S01E04, S01E04E05, 1x04, Season 1 Episode 4)
//! - Release year (last plausible 19xx/20xx token)
//! - A working title with quality/codec/source/audio/group noise removed
//!
//! Parsing never fails: when nothing useful can be extracted the normalized
//! stem itself becomes the title guess.

use crate::models::media::{MediaType, ParsedFile};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Noise tokens removed from the working title, applied in order.
static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Quality
        r"(?i)\b(720p|1080p|2160p|4k|uhd)\b",
        // Source
        r"(?i)\b(web[- ]?dl|webrip|blu[- ]?ray|bdrip|brrip|hdtv|hdrip|dvdrip|dvd)\b",
        // Codec
        r"(?i)\b(x264|x265|h\.?264|h\.?265|hevc|avc|xvid|divx)\b",
        // Audio
        r"(?i)\b(aac|ac3|dts|dd5\.?1|atmos|truehd)\b",
        // Language/subtitle tags
        r"(?i)\b(dual[- ]?lat|latino|castellano|spanish|english|sub(bed|s)?|multi)\b",
        // HDR
        r"(?i)\b(hdr|hdr10\+?|dolby[- ]?vision|dv)\b",
        // Edition tags
        r"(?i)\b(repack|proper|extended|unrated|directors?[- ]?cut|theatrical)\b",
        r"(?i)\b(remux|hybrid)\b",
        // Release group after a trailing dash, or in brackets
        r"(?i)-[a-z0-9]+$",
        r"\[[^\]]+\]",
        r"(?i)\([^)]*(?:rip|sub|dub|lat)[^)]*\)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid noise pattern"))
    .collect()
});

/// S01E04E05
static RE_MULTI_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[sS](\d{1,2})[eE](\d{1,2})(?:[eE]\d{1,2})+").unwrap());

static RE_EPISODE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[eE](\d{1,2})").unwrap());

/// Single-episode anchors, most specific first.
static EPISODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // S01E04, S1E4
        r"[sS](\d{1,2})[eE](\d{1,2})",
        // 1x04
        r"\b(\d{1,2})x(\d{2})\b",
        // Season 1 Episode 4
        r"[sS]eason\s*(\d{1,2})\s*[eE]pisode\s*(\d{1,2})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid episode pattern"))
    .collect()
});

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());

static RE_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._]").unwrap());
static RE_DASH_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--+").unwrap());
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_EDGE_DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\s\-]+|[\s\-]+$").unwrap());
static RE_EMPTY_GROUPS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\s*\)|\[\s*\]").unwrap());

/// Replace dots and underscores with spaces and collapse whitespace.
///
/// Single dashes survive so that trailing release groups stay detectable.
pub fn normalize_separators(name: &str) -> String {
    let normalized = RE_SEPARATORS.replace_all(name, " ");
    let normalized = RE_DASH_RUNS.replace_all(&normalized, " ");
    RE_SPACES.replace_all(&normalized, " ").trim().to_string()
}

/// Remove quality, codec and release group tags.
pub fn remove_noise(name: &str) -> String {
    let mut result = name.to_string();
    for pattern in NOISE_PATTERNS.iter() {
        result = pattern.replace_all(&result, "").into_owned();
    }
    RE_SPACES.replace_all(&result, " ").trim().to_string()
}

/// Cut the matched range out of `name`.
fn cut(name: &str, start: usize, end: usize) -> String {
    format!("{}{}", &name[..start], &name[end..]).trim().to_string()
}

/// Extract season and episode numbers.
///
/// Returns `(season, episodes, remaining_name)`. Repeated episode numbers are
/// collapsed, so `S01E04E04` yields the single episode 4 and the file is then
/// treated as a single-episode file (its episode title gets prefetched).
pub fn extract_episodes(name: &str) -> (Option<u16>, Vec<u16>, String) {
    if let Some(caps) = RE_MULTI_EPISODE.captures(name) {
        let full = caps.get(0).expect("match 0 always present");
        let season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let mut episodes: Vec<u16> = Vec::new();
        for ep in RE_EPISODE_NUMBER
            .captures_iter(full.as_str())
            .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
        {
            if !episodes.contains(&ep) {
                episodes.push(ep);
            }
        }
        if season.is_some() && !episodes.is_empty() {
            return (season, episodes, cut(name, full.start(), full.end()));
        }
    }

    for pattern in EPISODE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(name) {
            let full = caps.get(0).expect("match 0 always present");
            let season = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
            if let (Some(season), Some(episode)) = (season, episode) {
                return (Some(season), vec![episode], cut(name, full.start(), full.end()));
            }
        }
    }

    (None, Vec::new(), name.to_string())
}

/// Extract the last plausible year.
///
/// Returns `(year, remaining_name)`.
pub fn extract_year(name: &str) -> (Option<u16>, String) {
    if let Some(m) = RE_YEAR.find_iter(name).last() {
        if let Ok(year) = m.as_str().parse::<u16>() {
            if (1900..=2100).contains(&year) {
                return (Some(year), cut(name, m.start(), m.end()));
            }
        }
    }
    (None, name.to_string())
}

/// Trim edge dashes, drop empty brackets and collapse spaces.
pub fn clean_title(title: &str) -> String {
    let title = RE_EDGE_DASHES.replace_all(title, "");
    let title = RE_EMPTY_GROUPS.replace_all(&title, "");
    RE_SPACES.replace_all(&title, " ").trim().to_string()
}

/// Parse a bare filename stem (no extension).
pub fn parse_stem(stem: &str) -> ParsedFile {
    build(Path::new(stem), stem)
}

/// Parse a media file path.
pub fn parse_filename(path: &Path) -> ParsedFile {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    build(path, &stem)
}

fn build(path: &Path, raw_stem: &str) -> ParsedFile {
    let name = normalize_separators(raw_stem);

    let (season, episodes, name) = extract_episodes(&name);
    let media_type = if season.is_some() && !episodes.is_empty() {
        MediaType::Series
    } else {
        MediaType::Movie
    };

    let (year, name) = extract_year(&name);
    let name = remove_noise(&name);

    let mut title_guess = clean_title(&name);
    if title_guess.is_empty() {
        title_guess = clean_title(&normalize_separators(raw_stem));
    }

    tracing::debug!(
        "Parsed '{}' -> title='{}', type={}, season={:?}, episodes={:?}, year={:?}",
        raw_stem,
        title_guess,
        media_type,
        season,
        episodes,
        year
    );

    ParsedFile {
        path: path.to_path_buf(),
        raw_stem: raw_stem.to_string(),
        title_guess,
        media_type,
        season,
        episodes,
        year,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_separators("Show.Name_S01E04"), "Show Name S01E04");
        assert_eq!(normalize_separators("A--B  C"), "A B C");
        assert_eq!(normalize_separators("x264-GROUP"), "x264-GROUP");
    }

    #[test]
    fn test_extract_year_takes_last() {
        let (year, rest) = extract_year("Blade Runner 2049 2017");
        assert_eq!(year, Some(2017));
        assert_eq!(rest, "Blade Runner 2049");
    }

    #[test]
    fn test_resolution_is_not_a_1x_anchor() {
        let (season, episodes, _) = extract_episodes("Movie 1920x1080");
        assert_eq!(season, None);
        assert!(episodes.is_empty());
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title(" - Title () [ ] - "), "Title");
    }
}
