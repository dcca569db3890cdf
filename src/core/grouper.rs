//! Title batch grouping.
//!
//! Every file sharing a normalized title stem must resolve to the same
//! identity, so files are clustered before any TMDB work happens.

use crate::models::media::ParsedFile;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Episode anchors; text from the anchor onwards is per-episode.
static RE_EPISODE_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[sS]\d{1,2}[eE]\d{1,2}|\b\d{1,2}x\d{1,2}\b|[sS]eason\s*\d{1,2}\s*[eE]pisode\s*\d{1,2}")
        .unwrap()
});

static RE_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._]").unwrap());
static RE_DASH_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--+").unwrap());
static RE_SYMBOLS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Files that resolve together.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleGroup {
    /// Normalized grouping key.
    pub key: String,
    /// Files in scan order.
    pub files: Vec<ParsedFile>,
}

/// Derive the grouping key from a raw filename stem.
///
/// Only the text before the episode anchor counts, so episode titles never
/// split a series. Stems without an anchor use the whole normalized stem.
pub fn group_key(raw_stem: &str) -> String {
    let name = RE_SEPARATORS.replace_all(raw_stem, " ");
    let name = RE_DASH_RUNS.replace_all(&name, " ");

    let name = match RE_EPISODE_ANCHOR.find(&name) {
        Some(m) => &name[..m.start()],
        None => &name[..],
    };

    let name = RE_SYMBOLS.replace_all(&name.to_lowercase(), " ").into_owned();
    RE_SPACES.replace_all(&name, " ").trim().to_string()
}

/// Group parsed files by title key, preserving first-seen order.
pub fn group_by_title(files: Vec<ParsedFile>) -> Vec<TitleGroup> {
    let mut groups: Vec<TitleGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for file in files {
        let key = group_key(&file.raw_stem);
        match index.get(&key) {
            Some(&i) => groups[i].files.push(file),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(TitleGroup {
                    key,
                    files: vec![file],
                });
            }
        }
    }

    for group in &groups {
        tracing::info!("[BATCH] Group '{}': {} file(s)", group.key, group.files.len());
    }

    groups
}
