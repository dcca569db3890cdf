//! FFprobe service for reading titles embedded in container metadata.
//!
//! Used as a last resort when the filename search finds nothing: many files
//! carry the real title in Matroska tags or MP4 atoms.

use crate::services::EmbeddedMetadataExtractor;
use crate::Result;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_ATTEMPTS: u32 = 2;
const PROBE_ARGS: &[&str] = &["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"];

/// Tag keys in title priority order.
const TAG_KEYS: &[&str] = &[
    "format_title",
    "stream_title",
    "format_description",
    "format_comment",
    "format_artist",
    "format_encoder",
];

const FORMAT_TAGS: &[&str] = &["title", "comment", "description", "artist", "encoder"];

const REJECT_EXACT: &[&str] = &[
    "video",
    "audio",
    "media",
    "untitled",
    "new project",
    "track",
    "output",
    "default",
    "sample",
    "test",
    "clip",
    "recording",
];

const REJECT_PREFIXES: &[&str] = &["vid_", "img_", "dsc_", "mov_", "rec_", "cap_"];

static RE_TOOL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:ffmpeg|handbrake|mkvmerge|mkvtoolnix|libx264|libx265|lavf|lavc|lame|x264|x265|xvid|divx|hevc|avc|matroska|webm|mp4box|gpac)\b",
    )
    .unwrap()
});
static RE_CAMERA_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2,5}[\d_]+$").unwrap());
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

/// FFprobe output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

/// FFprobe stream information.
#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_type: String,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// FFprobe format information.
#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Check if ffprobe is installed.
pub fn is_installed() -> bool {
    Command::new("ffprobe")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Get ffprobe version.
pub fn get_version() -> Result<String> {
    let output = Command::new("ffprobe").arg("-version").output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or("unknown");

    Ok(first_line.to_string())
}

/// Tag lookup that accepts both `title` and `TITLE` spellings.
fn tag<'a>(tags: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    tags.get(key)
        .or_else(|| tags.get(&key.to_uppercase()))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Flatten ffprobe JSON into `format_*` / `stream_title` tag values.
pub fn collect_tags(json: &[u8]) -> Result<HashMap<String, String>> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;
    let mut tags = HashMap::new();

    for key in FORMAT_TAGS {
        if let Some(value) = tag(&probe.format.tags, key) {
            tags.insert(format!("format_{}", key), value.to_string());
        }
    }

    if let Some(title) = probe
        .streams
        .iter()
        .filter(|s| s.codec_type == "video")
        .find_map(|s| tag(&s.tags, "title"))
    {
        tags.insert("stream_title".to_string(), title.to_string());
    }

    Ok(tags)
}

/// Run ffprobe on a file and collect its tags.
///
/// A probe that hangs is killed after five seconds and retried once.
pub fn probe_tags(path: &Path) -> Result<HashMap<String, String>> {
    probe_with(path, PROBE_TIMEOUT, ffprobe_command)
}

fn ffprobe_command(path: &Path) -> tokio::process::Command {
    let mut command = tokio::process::Command::new("ffprobe");
    command.args(PROBE_ARGS).arg(path);
    command
}

fn probe_with<F>(path: &Path, timeout: Duration, make_command: F) -> Result<HashMap<String, String>>
where
    F: Fn(&Path) -> tokio::process::Command,
{
    if !path.is_file() {
        return Err(crate::Error::PathNotFound(path.display().to_string()));
    }

    for attempt in 1..=PROBE_ATTEMPTS {
        match run_with_timeout(make_command(path), timeout)? {
            Some(stdout) => return collect_tags(&stdout),
            None => tracing::debug!(
                "ffprobe timeout (attempt {}/{}): {}",
                attempt,
                PROBE_ATTEMPTS,
                path.display()
            ),
        }
    }

    Err(crate::Error::FfprobeFailed(format!("timed out on {}", path.display())))
}

/// Run `command` to completion on a private current-thread runtime.
///
/// The child is killed when `timeout` elapses first, which yields `Ok(None)`.
fn run_with_timeout(mut command: tokio::process::Command, timeout: Duration) -> Result<Option<Vec<u8>>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let output = match runtime.block_on(tokio::time::timeout(timeout, command.output())) {
        Ok(output) => output.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => crate::Error::FfprobeNotFound,
            _ => crate::Error::Io(e),
        })?,
        Err(_) => return Ok(None),
    };

    if !output.status.success() {
        return Err(crate::Error::FfprobeFailed(format!("exit status {}", output.status)));
    }

    Ok(Some(output.stdout))
}

/// Whether a tag value looks like a real media title.
///
/// Needs three or more words, a year, or two capitalised words. Generic
/// words, camera file names and tool or codec names never qualify.
pub fn is_plausible_title(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }

    let lower = text.to_lowercase();
    if REJECT_EXACT.contains(&lower.as_str()) {
        return false;
    }
    if REJECT_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return false;
    }
    if RE_TOOL_NAME.is_match(text) || RE_CAMERA_NAME.is_match(text) {
        return false;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() >= 3 || RE_YEAR.is_match(text) {
        return true;
    }

    words.len() == 2
        && words
            .iter()
            .all(|w| w.chars().next().is_some_and(char::is_uppercase))
}

/// First plausible title in tag priority order.
pub fn find_best_title(tags: &HashMap<String, String>) -> Option<String> {
    TAG_KEYS
        .iter()
        .filter_map(|key| tags.get(*key))
        .find(|value| is_plausible_title(value))
        .cloned()
}

/// [`EmbeddedMetadataExtractor`] backed by the ffprobe binary.
#[derive(Debug, Clone, Default)]
pub struct FfprobeExtractor {
    enabled: bool,
}

impl FfprobeExtractor {
    /// Extractor that probes only when ffprobe is on the PATH.
    pub fn detect() -> Self {
        let enabled = is_installed();
        if !enabled {
            tracing::debug!("ffprobe not available; embedded title fallback disabled");
        }
        Self { enabled }
    }

    /// Extractor that never probes.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl EmbeddedMetadataExtractor for FfprobeExtractor {
    fn extract_plausible_title(&self, path: &Path) -> Option<String> {
        if !self.enabled {
            return None;
        }
        match probe_tags(path) {
            Ok(tags) => {
                let title = find_best_title(&tags);
                tracing::debug!("Embedded title for {}: {:?}", path.display(), title);
                title
            }
            Err(e) => {
                tracing::debug!("ffprobe failed for {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_titles() {
        assert!(is_plausible_title("The Grand Budapest Hotel"));
        assert!(is_plausible_title("Breaking Bad"));
        assert!(is_plausible_title("Heat 1995"));
        assert!(!is_plausible_title("breaking bad"));
        assert!(!is_plausible_title("Inception"));
    }

    #[test]
    fn test_rejected_titles() {
        assert!(!is_plausible_title(""));
        assert!(!is_plausible_title("Untitled"));
        assert!(!is_plausible_title("VID_20240101_120000"));
        assert!(!is_plausible_title("DSC00123"));
        assert!(!is_plausible_title("Lavf58.76.100"));
        assert!(!is_plausible_title("Encoded with HandBrake 1.6"));
    }

    #[test]
    fn test_collect_tags() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "tags": {"title": "English 5.1"}},
                {"codec_type": "video", "tags": {"TITLE": "Stream Title Here"}}
            ],
            "format": {"tags": {"title": "  ", "COMMENT": "A comment", "encoder": "libebml"}}
        }"#;
        let tags = collect_tags(json).unwrap();

        assert_eq!(tags.get("stream_title").map(String::as_str), Some("Stream Title Here"));
        assert_eq!(tags.get("format_comment").map(String::as_str), Some("A comment"));
        assert!(!tags.contains_key("format_title"));
    }

    #[test]
    fn test_find_best_title_priority() {
        let mut tags = HashMap::new();
        tags.insert("format_comment".to_string(), "Ripped by Someone Else".to_string());
        tags.insert("stream_title".to_string(), "The Big Lebowski".to_string());
        tags.insert("format_title".to_string(), "video".to_string());

        assert_eq!(find_best_title(&tags), Some("The Big Lebowski".to_string()));
    }

    #[cfg(unix)]
    fn command(program: &str, args: &[&str]) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(program);
        command.args(args);
        command
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_command_is_killed_at_timeout() {
        let started = std::time::Instant::now();
        let output = run_with_timeout(command("sleep", &["5"]), Duration::from_millis(100)).unwrap();

        assert!(output.is_none());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_hanging_ffprobe_run_is_retried_then_fails() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let file = tempfile::NamedTempFile::new().unwrap();
        let spawned = AtomicUsize::new(0);
        let result = probe_with(file.path(), Duration::from_millis(100), |_| {
            spawned.fetch_add(1, Ordering::SeqCst);
            command("sleep", &["5"])
        });

        assert!(matches!(result, Err(crate::Error::FfprobeFailed(ref msg)) if msg.starts_with("timed out")));
        assert_eq!(spawned.load(Ordering::SeqCst), PROBE_ATTEMPTS as usize);
    }

    #[cfg(unix)]
    #[test]
    fn test_tag_output_is_parsed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let json = r#"{"format": {"tags": {"title": "The Big Lebowski"}}}"#;
        let tags = probe_with(file.path(), PROBE_TIMEOUT, |_| command("echo", &[json])).unwrap();

        assert_eq!(tags.get("format_title").map(String::as_str), Some("The Big Lebowski"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_an_error() {
        let result = run_with_timeout(command("false", &[]), PROBE_TIMEOUT);
        assert!(matches!(result, Err(crate::Error::FfprobeFailed(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_is_collected() {
        let output = run_with_timeout(command("echo", &["{}"]), PROBE_TIMEOUT).unwrap();
        assert_eq!(output.as_deref(), Some(&b"{}\n"[..]));
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let result = run_with_timeout(command_missing(), PROBE_TIMEOUT);
        assert!(matches!(result, Err(crate::Error::FfprobeNotFound)));
    }

    fn command_missing() -> tokio::process::Command {
        tokio::process::Command::new("media-resolver-no-such-binary")
    }

    #[test]
    fn test_missing_file_fails_before_spawning() {
        let result = probe_tags(Path::new("/nonexistent/movie.mkv"));
        assert!(matches!(result, Err(crate::Error::PathNotFound(_))));
    }

    #[test]
    fn test_disabled_extractor_returns_nothing() {
        let extractor = FfprobeExtractor::disabled();
        assert!(!extractor.is_enabled());
        assert_eq!(extractor.extract_plausible_title(Path::new("/nonexistent.mkv")), None);
    }
}
