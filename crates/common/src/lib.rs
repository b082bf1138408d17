//! Reframe Common Utilities
//!
//! Shared infrastructure for all Reframe crates:
//! - Error types and result aliases
//! - Frame clock and progress utilities for per-frame processing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
