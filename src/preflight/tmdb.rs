//! TMDB API preflight check.

use super::CheckResult;
use crate::models::config::TmdbSettings;
use crate::services::tmdb::{TmdbClient, TmdbConfig};

/// Check if TMDB API is accessible with the configured key.
pub fn check(settings: &TmdbSettings) -> CheckResult {
    let config = match TmdbConfig::from_settings(settings) {
        Ok(config) => config,
        Err(_) => {
            return CheckResult::fail(
                "TMDB API",
                "API key not configured",
                "Set TMDB_API_KEY or tmdb.api_key in config.toml",
            )
        }
    };

    match TmdbClient::new(config).and_then(|mut client| client.verify_api_key()) {
        Ok(true) => CheckResult::ok("TMDB API", "connected"),
        Ok(false) => CheckResult::fail(
            "TMDB API",
            "invalid API key or unreachable",
            "Check your TMDB_API_KEY and network connection",
        ),
        Err(_) => CheckResult::fail(
            "TMDB API",
            "connection failed",
            "Check your network connection",
        ),
    }
}
