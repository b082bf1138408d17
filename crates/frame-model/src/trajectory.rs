//! Per-frame framing decisions for a clip.
//!
//! A trajectory holds exactly one [`FramePlan`] per input frame. It is the
//! contract between the framing engine and the renderer, and can be saved
//! as JSON for inspection or re-rendering.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geometry::{AspectRatio, BoundingBox, CropWindow, FrameSize, Point2D};

/// Opaque identity of a tracked subject, unique within one tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u32);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject-{}", self.0)
    }
}

/// Tracker state for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// No subject acquired yet.
    #[default]
    Searching,
    /// The active subject was matched this frame.
    Active,
    /// The active subject was missed; its last box is held.
    Coasting,
    /// The coasting budget ran out; the default crop is used.
    Lost,
}

impl TrackingState {
    /// Whether a subject drives the crop in this state.
    pub fn has_subject(&self) -> bool {
        matches!(self, Self::Active | Self::Coasting)
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Searching => "searching",
            Self::Active => "active",
            Self::Coasting => "coasting",
            Self::Lost => "lost",
        };
        f.write_str(name)
    }
}

/// The framing decision for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePlan {
    /// Zero-based frame index.
    pub frame: u64,

    /// Presentation time in seconds.
    pub time_secs: f64,

    /// Tracker state after evaluating this frame.
    pub state: TrackingState,

    /// Subject driving the crop, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectId>,

    /// Subject box the tracker followed this frame (held box while coasting).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_box: Option<BoundingBox>,

    /// Point the crop was asked to center on.
    pub target: Point2D,

    /// Smoothed, frame-clamped crop window before zoom.
    pub window: CropWindow,

    /// Zoom factor produced by the zoom generator.
    pub zoom: f64,

    /// Window actually extracted from the frame.
    pub final_window: CropWindow,

    /// Zoom actually applied after compositor limits.
    pub effective_zoom: f64,

    /// The smoother jumped straight to the target on this frame.
    #[serde(default)]
    pub hard_cut: bool,

    /// The frame could not satisfy the aspect at full height and fell back
    /// to the largest centered window.
    #[serde(default)]
    pub degraded: bool,
}

/// The full framing trajectory for one clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Schema version.
    pub version: String,

    /// Creation timestamp (RFC 3339).
    pub created_at: String,

    /// Source frame dimensions.
    pub source: FrameSize,

    /// Output frame dimensions.
    pub output: FrameSize,

    /// Target aspect ratio of every window.
    pub aspect: AspectRatio,

    /// Clip frame rate.
    pub fps: f64,

    /// Seed used for the zoom generator.
    pub zoom_seed: u64,

    /// One plan per frame, in frame order.
    pub frames: Vec<FramePlan>,
}

impl Trajectory {
    pub fn new(
        source: FrameSize,
        output: FrameSize,
        aspect: AspectRatio,
        fps: f64,
        zoom_seed: u64,
    ) -> Self {
        Self {
            version: "1.0".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            source,
            output,
            aspect,
            fps,
            zoom_seed,
            frames: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Duration covered by the trajectory in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.fps <= 0.0 {
            return 0.0;
        }
        self.frames.len() as f64 / self.fps
    }

    /// Plan for a specific frame.
    pub fn plan(&self, frame: u64) -> Option<&FramePlan> {
        usize::try_from(frame).ok().and_then(|i| self.frames.get(i))
    }

    /// Aggregate statistics.
    pub fn summary(&self) -> TrajectorySummary {
        let mut summary = TrajectorySummary::default();
        let mut subjects = BTreeSet::new();
        let mut prev_state: Option<TrackingState> = None;

        for plan in &self.frames {
            match plan.state {
                TrackingState::Searching => summary.searching_frames += 1,
                TrackingState::Active => summary.active_frames += 1,
                TrackingState::Coasting => summary.coasting_frames += 1,
                TrackingState::Lost => summary.lost_frames += 1,
            }
            if let Some(prev) = prev_state {
                if prev != plan.state {
                    summary.state_changes += 1;
                }
            }
            prev_state = Some(plan.state);

            if plan.hard_cut {
                summary.hard_cuts += 1;
            }
            if plan.degraded {
                summary.degraded_frames += 1;
            }
            if let Some(id) = plan.subject {
                subjects.insert(id);
            }

            summary.min_zoom = Some(
                summary
                    .min_zoom
                    .map_or(plan.effective_zoom, |z| z.min(plan.effective_zoom)),
            );
            summary.max_zoom = Some(
                summary
                    .max_zoom
                    .map_or(plan.effective_zoom, |z| z.max(plan.effective_zoom)),
            );
        }

        summary.frames = self.frames.len();
        summary.subjects = subjects.len();
        summary
    }

    /// Load a trajectory from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrajectoryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| TrajectoryError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| TrajectoryError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save the trajectory as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TrajectoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TrajectoryError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| TrajectoryError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| TrajectoryError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Aggregate statistics over a trajectory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectorySummary {
    pub frames: usize,
    pub searching_frames: usize,
    pub active_frames: usize,
    pub coasting_frames: usize,
    pub lost_frames: usize,
    pub state_changes: usize,
    pub hard_cuts: usize,
    pub degraded_frames: usize,
    pub subjects: usize,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
}

/// Errors that can occur when reading or writing trajectories.
#[derive(Debug, thiserror::Error)]
pub enum TrajectoryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(frame: u64, state: TrackingState, subject: Option<u32>, zoom: f64) -> FramePlan {
        let window = CropWindow::new(960.0, 540.0, 607.5, 1080.0);
        FramePlan {
            frame,
            time_secs: frame as f64 / 30.0,
            state,
            subject: subject.map(SubjectId),
            subject_box: None,
            target: window.center(),
            window,
            zoom,
            final_window: window.zoomed(zoom),
            effective_zoom: zoom,
            hard_cut: false,
            degraded: false,
        }
    }

    fn sample() -> Trajectory {
        let mut t = Trajectory::new(
            FrameSize::new(1920, 1080),
            FrameSize::new(1080, 1920),
            AspectRatio::VERTICAL,
            30.0,
            7,
        );
        t.frames = vec![
            plan(0, TrackingState::Searching, None, 1.0),
            FramePlan {
                hard_cut: true,
                ..plan(1, TrackingState::Active, Some(0), 1.05)
            },
            plan(2, TrackingState::Coasting, Some(0), 1.1),
            plan(3, TrackingState::Lost, None, 1.15),
            FramePlan {
                hard_cut: true,
                ..plan(4, TrackingState::Active, Some(1), 1.2)
            },
        ];
        t
    }

    #[test]
    fn test_summary_counts() {
        let summary = sample().summary();
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.active_frames, 2);
        assert_eq!(summary.coasting_frames, 1);
        assert_eq!(summary.lost_frames, 1);
        assert_eq!(summary.searching_frames, 1);
        assert_eq!(summary.state_changes, 4);
        assert_eq!(summary.hard_cuts, 2);
        assert_eq!(summary.subjects, 2);
        assert_eq!(summary.min_zoom, Some(1.0));
        assert_eq!(summary.max_zoom, Some(1.2));
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&TrackingState::Coasting).unwrap();
        assert_eq!(json, "\"coasting\"");
        assert!(TrackingState::Coasting.has_subject());
        assert!(!TrackingState::Lost.has_subject());
    }

    #[test]
    fn test_plan_lookup_and_duration() {
        let t = sample();
        assert_eq!(t.plan(3).unwrap().state, TrackingState::Lost);
        assert!(t.plan(10).is_none());
        assert!((t.duration_secs() - 5.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_subject_id_is_transparent() {
        let json = serde_json::to_string(&SubjectId(3)).unwrap();
        assert_eq!(json, "3");
        assert_eq!(SubjectId(3).to_string(), "subject-3");
    }
}
