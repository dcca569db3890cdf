//! Media Resolver Library
//!
//! Resolves folders of ambiguously named video files to canonical movie and
//! TV identities on TMDB, asking a human only when a match cannot be trusted.

pub mod cli;
pub mod core;
pub mod error;
pub mod models;
pub mod preflight;
pub mod services;

pub use error::{Error, Result};
