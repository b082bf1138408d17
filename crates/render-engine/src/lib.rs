//! Reframe Render Engine
//!
//! Decodes source frames, applies per-frame framing decisions, and encodes
//! the vertical output.
//!
//! # Pipeline Architecture
//!
//! ```text
//! input.mp4 / frames/ ──▶ FrameSource ──┐
//!                                       ├── FramingEngine (or saved Trajectory)
//! detections.jsonl ─────────────────────┘         │
//!                                                 ├── Crop + Resize (FrameCompositor)
//!                                                 ▼
//!                                            FrameSink ──▶ output.mp4 / frames/
//! ```

pub mod compositor;
pub mod ffmpeg;
pub mod frame;
pub mod render;
pub mod sink;
pub mod source;

pub use compositor::FrameCompositor;
pub use frame::Frame;
pub use render::{
    render_clip, PlanSource, ProgressCallback, RenderOptions, RenderProgress, RenderReport,
};
pub use sink::{FfmpegSink, FrameSink, ImageSequenceSink};
pub use source::{FfmpegSource, FrameSource, ImageSequenceSource, SourceInfo};
