//! Frame clock and timing utilities.
//!
//! Every stage of the framing pipeline runs on a fixed frame rate. This
//! module provides utilities for:
//! - Converting frame indices to timestamps
//! - Converting durations (coasting budgets, zoom periods) to frame counts
//! - Measuring render throughput
//! - Throttling progress reports

use std::time::Instant;

/// Converts between frame indices and media time at a fixed frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    /// Create a clock for the given frame rate.
    ///
    /// Non-finite or non-positive rates fall back to 30 fps, the rate most
    /// upstream decoders report for unknown streams.
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            30.0
        };
        Self { fps }
    }

    /// Frames per second.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Presentation time of a frame in seconds.
    pub fn timestamp_secs(&self, frame_index: u64) -> f64 {
        frame_index as f64 / self.fps
    }

    /// Number of whole frames covering a duration (rounded to nearest, at least 1
    /// for any positive duration).
    pub fn frames_for_secs(&self, secs: f64) -> u64 {
        if !secs.is_finite() || secs <= 0.0 {
            return 0;
        }
        ((secs * self.fps).round() as u64).max(1)
    }
}

/// Wall-clock timer for a processing run.
#[derive(Debug, Clone)]
pub struct RunTimer {
    started: Instant,
}

impl RunTimer {
    /// Start a timer anchored to now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Seconds elapsed since start.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Processing throughput for `frames` processed so far.
    pub fn frames_per_sec(&self, frames: u64) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed <= f64::EPSILON {
            return 0.0;
        }
        frames as f64 / elapsed
    }

    /// Estimated seconds remaining given progress so far.
    pub fn eta_secs(&self, done: u64, total: u64) -> f64 {
        if done == 0 || total <= done {
            return 0.0;
        }
        let per_frame = self.elapsed_secs() / done as f64;
        per_frame * (total - done) as f64
    }
}

/// Emits a tick every `interval` frames.
#[derive(Debug)]
pub struct ProgressGate {
    interval: u64,
    last_tick: Option<u64>,
}

impl ProgressGate {
    /// Create a gate ticking every `interval` frames (minimum 1).
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            last_tick: None,
        }
    }

    /// Check whether progress should be reported at this frame.
    /// The first call always returns true.
    pub fn should_tick(&mut self, frame_index: u64) -> bool {
        match self.last_tick {
            None => {
                self.last_tick = Some(frame_index);
                true
            }
            Some(last) if frame_index >= last + self.interval => {
                self.last_tick = Some(frame_index);
                true
            }
            _ => false,
        }
    }
}
