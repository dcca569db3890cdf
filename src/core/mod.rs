//! Core identity resolution modules.

pub mod cleaner;
pub mod detection;
pub mod grouper;
pub mod parser;
pub mod prefetch;
pub mod rendezvous;
pub mod scanner;
pub mod scorer;
pub mod worker;
