//! Reframe Model
//!
//! Defines the core data contracts for the framing engine:
//! - **Geometry:** frame sizes, aspect ratios, bounding boxes, crop windows
//! - **Detections:** per-frame subject detections as supplied by an external detector
//! - **Trajectory:** the per-frame framing decisions produced for a clip
//!
//! All coordinates are in source-frame pixels, origin at the top-left.

pub mod detection;
pub mod geometry;
pub mod trajectory;

pub use detection::*;
pub use geometry::*;
pub use trajectory::*;
