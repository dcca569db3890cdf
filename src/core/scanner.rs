//! Media file discovery.
//!
//! Finds the video files of a folder that take part in identity resolution.
//! Extras, featurettes and samples are left out since they never carry the
//! main title.

use crate::core::parser::parse_filename;
use crate::models::media::ParsedFile;
use crate::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

/// Supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "m4v", "ts", "m2ts", "flv", "webm", "mpg", "mpeg", "vob",
    "ogv", "ogm", "divx", "xvid", "3gp", "mts", "rmvb", "asf", "f4v",
];

/// Folder names whose contents are bonus material.
const EXTRAS_DIRS: &[&str] = &[
    "extras",
    "extra",
    "featurettes",
    "featurette",
    "behind the scenes",
    "behindthescenes",
    "deleted scenes",
    "deletedscenes",
    "making of",
    "makingof",
    "bonus",
    "special features",
    "sample",
    "samples",
];

/// Result of scanning a folder.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Video files to resolve, sorted by path.
    pub files: Vec<PathBuf>,
    /// Video files left out as extras or samples.
    pub skipped_extras: usize,
    /// Total files visited.
    pub total_files_scanned: usize,
}

impl ScanResult {
    /// Parse every found file.
    pub fn parse_all(&self) -> Vec<ParsedFile> {
        self.files.iter().map(|p| parse_filename(p)).collect()
    }
}

fn is_video_extension(ext: &str) -> bool {
    let ext_lower = ext.to_lowercase();
    VIDEO_EXTENSIONS.contains(&ext_lower.as_str())
}

/// Whether a path relative to the scan root lies in an extras folder.
fn is_in_extras_directory(relative: &Path) -> bool {
    let Some(parent) = relative.parent() else {
        return false;
    };
    parent.components().any(|component| {
        let std::path::Component::Normal(name) = component else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        EXTRAS_DIRS.contains(&name.as_str())
            || name.ends_with(".extras")
            || name.ends_with("-extras")
            || name.contains(".extras-")
            || name.ends_with(".sample")
            || name.ends_with("-sample")
    })
}

/// `sample` as a standalone token of the stem.
static RE_SAMPLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[\s._\-\[(])sample(?:[\s._\-\])]|$)").unwrap());

/// Sample clips ("movie-sample.mkv"), but not titles like "Free.Samples".
fn is_sample_filename(filename: &str) -> bool {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    RE_SAMPLE_TOKEN.is_match(&stem)
}

fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| is_video_extension(&ext.to_string_lossy()))
        .unwrap_or(false)
}

/// Find the video files of `path`, descending into subfolders when
/// `recursive` is set.
///
/// A single video file is accepted as a one-file scan.
pub fn find_media_files(path: &Path, recursive: bool) -> Result<ScanResult> {
    if !path.exists() {
        return Err(crate::Error::PathNotFound(path.display().to_string()));
    }
    if path.is_file() {
        let mut result = ScanResult {
            total_files_scanned: 1,
            ..Default::default()
        };
        if has_video_extension(path) {
            result.files.push(path.to_path_buf());
        }
        tracing::info!("Scanning single file: {}", path.display());
        return Ok(result);
    }
    if !path.is_dir() {
        return Err(crate::Error::NotADirectory(path.display().to_string()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut result = ScanResult::default();

    for entry in WalkDir::new(path)
        .follow_links(false)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        result.total_files_scanned += 1;
        let entry_path = entry.path();

        if !has_video_extension(entry_path) {
            continue;
        }

        let relative = entry_path.strip_prefix(path).unwrap_or(entry_path);
        let filename = entry.file_name().to_string_lossy();
        if is_in_extras_directory(relative) || is_sample_filename(&filename) {
            tracing::debug!("Skipping extra: {}", entry_path.display());
            result.skipped_extras += 1;
            continue;
        }

        result.files.push(entry_path.to_path_buf());
    }

    result.files.sort();

    tracing::info!(
        "Scanned {} files: {} videos, {} extras skipped",
        result.total_files_scanned,
        result.files.len(),
        result.skipped_extras
    );

    Ok(result)
}
