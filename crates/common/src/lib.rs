//! MediaScribe Common Utilities
//!
//! Shared infrastructure for all MediaScribe crates:
//! - Error taxonomy (conversion / transcription / validation) and result aliases
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
