//! Configuration model.

use crate::core::detection::DetectionPolicy;
use crate::core::prefetch::EpisodeTitleLanguage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TMDB configuration.
    pub tmdb: TmdbSettings,
    /// Detection policy applied to every batch of a scan.
    pub detection: DetectionPolicy,
    /// Episode title prefetch configuration.
    pub episodes: EpisodeSettings,
    /// Scan configuration.
    pub scan: ScanSettings,
}

/// TMDB configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbSettings {
    /// API key or bearer token.
    pub api_key: Option<String>,
    /// Language for responses.
    pub language: String,
    /// Minimum spacing between requests in milliseconds.
    pub min_request_interval_ms: u64,
}

/// Episode title configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeSettings {
    /// Whether to prefetch episode titles for confirmed series.
    pub include_titles: bool,
    /// Language policy for episode titles.
    pub language: EpisodeTitleLanguage,
}

/// Scan configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Descend into subdirectories.
    pub recursive: bool,
}

impl Default for TmdbSettings {
    fn default() -> Self {
        Self {
            api_key: std::env::var("TMDB_API_KEY").ok(),
            language: "en-US".to_string(),
            min_request_interval_ms: 250,
        }
    }
}

impl Default for EpisodeSettings {
    fn default() -> Self {
        Self {
            include_titles: true,
            language: EpisodeTitleLanguage::SameAsMetadata,
        }
    }
}

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media_resolver")
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> crate::Result<Config> {
    let mut config: Config = toml::from_str(content)?;
    if config.tmdb.api_key.is_none() {
        config.tmdb.api_key = std::env::var("TMDB_API_KEY").ok();
    }
    Ok(config)
}

/// Load configuration from file.
pub fn load_config() -> Config {
    let config_path = config_dir().join("config.toml");

    if config_path.exists() {
        match std::fs::read_to_string(&config_path) {
            Ok(content) => match parse_config(&content) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Ignoring invalid config {:?}: {}", config_path, e),
            },
            Err(e) => tracing::warn!("Cannot read config {:?}: {}", config_path, e),
        }
    }

    Config::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.tmdb.language, "en-US");
        assert_eq!(config.tmdb.min_request_interval_ms, 250);
        assert!(config.episodes.include_titles);
        assert!(!config.detection.always_ask_media_type);
        assert!(!config.scan.recursive);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = parse_config(
            r#"
[tmdb]
language = "de-DE"

[detection]
always_confirm_match = true
interactive_fallback = true

[episodes]
language = { forced = "en-US" }
"#,
        )
        .unwrap();

        assert_eq!(config.tmdb.language, "de-DE");
        assert_eq!(config.tmdb.min_request_interval_ms, 250);
        assert!(config.detection.always_confirm_match);
        assert!(config.detection.interactive_fallback);
        assert!(!config.detection.always_ask_media_type);
        assert_eq!(
            config.episodes.language,
            EpisodeTitleLanguage::Forced("en-US".to_string())
        );
    }

    #[test]
    fn test_parse_invalid_config() {
        assert!(parse_config("[tmdb\nlanguage = ").is_err());
    }
}
