//! CLI command implementations.

pub mod mapping;
pub mod scan;
