//! Error types for the media resolver.

use crate::core::detection::DetectionState;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media resolver.
#[derive(Error, Debug)]
pub enum Error {
    // Preflight errors
    #[error("ffprobe not found. Install FFmpeg: sudo apt install ffmpeg")]
    FfprobeNotFound,

    #[error("TMDB API key not configured. Set TMDB_API_KEY environment variable")]
    TmdbApiKeyMissing,

    #[error("TMDB API key invalid")]
    TmdbApiKeyInvalid,

    // File system errors
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    // TMDB errors
    #[error("TMDB request failed: {0}")]
    TmdbRequest(String),

    #[error("TMDB returned HTTP {status} for {endpoint}")]
    TmdbStatus { status: u16, endpoint: String },

    // Embedded metadata errors
    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    // Override store errors
    #[error("Invalid TMDB reference: {0}")]
    InvalidReference(String),

    #[error("ID mapping store error: {0}")]
    MappingStore(String),

    // Caller contract violations
    #[error("{operation} is not valid while the batch is {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: DetectionState,
    },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Config errors
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Whether this error signals a malformed dispatch loop rather than bad data.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::InvalidTransition { .. })
    }
}
