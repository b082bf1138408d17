//! Reframe Core: the smart framing engine
//!
//! Turns per-frame subject detections into a jitter-free vertical crop:
//! - **Normalizer:** clean, threshold, and deduplicate raw detections
//! - **Tracker:** follow one primary subject through gaps and crowds
//! - **Smoother:** EMA crop trajectory with hard cuts on re-acquisition
//! - **Zoom:** slow, bounded oscillating zoom chosen once per clip
//! - **Compositor:** resolve the final zoomed window inside the frame
//!
//! This crate is pure computation with no I/O and no platform dependencies.
//! Each clip gets its own [`FramingEngine`]; nothing is shared between clips.

pub mod compositor;
pub mod config;
pub mod engine;
pub mod normalizer;
pub mod smoother;
pub mod tracker;
pub mod zoom;

pub use config::FramingConfig;
pub use engine::{plan_clip, FramingEngine};
