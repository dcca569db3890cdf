//! Preflight checks module.

mod ffprobe;
mod tmdb;

use crate::models::config::TmdbSettings;
use colored::Colorize;

/// Result of a preflight check.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub success: bool,
    /// A failed optional check only degrades the scan.
    pub required: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckResult {
    pub fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            required: true,
            message: message.to_string(),
            hint: None,
        }
    }

    pub fn fail(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            required: true,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    /// Mark this check as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Run all preflight checks.
pub fn run_preflight_checks(settings: &TmdbSettings) -> Vec<CheckResult> {
    vec![tmdb::check(settings), ffprobe::check()]
}

/// Print preflight check results.
pub fn print_results(results: &[CheckResult]) {
    for result in results {
        if result.success {
            println!(
                "{} {}: {}",
                "[OK]".green(),
                result.name.bold(),
                result.message
            );
        } else {
            let tag = if result.required {
                "[FAIL]".red()
            } else {
                "[WARN]".yellow()
            };
            println!("{} {}: {}", tag, result.name.bold(), result.message);
            if let Some(ref hint) = result.hint {
                println!("  {} {}", "->".yellow(), hint);
            }
        }
    }
}

/// Check if every required preflight check passed.
pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.success || !r.required)
}
