//! FFprobe preflight check.

use super::CheckResult;
use crate::services::ffprobe;

/// Check if ffprobe is installed. Without it the embedded title fallback is
/// simply skipped.
pub fn check() -> CheckResult {
    if ffprobe::is_installed() {
        match ffprobe::get_version() {
            Ok(version) => CheckResult::ok("ffprobe", &format!("installed ({})", version)),
            Err(_) => CheckResult::ok("ffprobe", "installed"),
        }
    } else {
        CheckResult::fail(
            "ffprobe",
            "not found, embedded title fallback disabled",
            "Install FFmpeg: sudo apt install ffmpeg",
        )
        .optional()
    }
}
