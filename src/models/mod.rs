//! Data models shared across the resolver.

pub mod config;
pub mod media;
