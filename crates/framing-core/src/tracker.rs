//! Primary subject tracking.
//!
//! The tracker keeps exactly one active subject across frames. Candidates are
//! matched by proximity to the subject's last known position, not by raw
//! confidence, so a brief, more confident detection elsewhere in the frame
//! does not steal the crop.
//!
//! ```text
//!   Searching ──detection──▶ Active ◀──match── Coasting
//!                              │                  │
//!                              └──miss──▶ Coasting┘
//!                                                 │ budget exhausted
//!   Lost ──detection (new identity)──▶ Active ◀───┘ via Lost
//! ```
//!
//! A detection present on the frame the budget runs out is acquired at once
//! as a new identity, so Lost only lasts while the frame is empty.

use std::collections::VecDeque;

use reframe_common::clock::FrameClock;
use reframe_model::detection::Detection;
use reframe_model::geometry::{BoundingBox, FrameSize, Point2D};
use reframe_model::trajectory::{SubjectId, TrackingState};
use serde::{Deserialize, Serialize};

/// Configuration for the subject tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Matching gate as a fraction of the frame diagonal.
    pub gate_distance_frac: f64,

    /// How long a missed subject is held before it is declared lost.
    pub coast_secs: f64,

    /// Explicit coasting budget in frames; overrides `coast_secs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coast_frames: Option<u64>,

    /// Number of recent detections kept per subject.
    pub history_len: usize,

    /// Keypoints at or above this visibility contribute to the target point.
    pub keypoint_visibility_threshold: f64,

    /// Candidates whose distances differ by less than this many pixels are
    /// considered equally close.
    pub tie_distance_px: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gate_distance_frac: 0.15,
            coast_secs: 1.0,
            coast_frames: None,
            history_len: 30,
            keypoint_visibility_threshold: 0.5,
            tie_distance_px: 1.0,
        }
    }
}

impl TrackerConfig {
    /// Coasting budget in frames at the clip's frame rate.
    pub fn coast_budget(&self, clock: &FrameClock) -> u64 {
        self.coast_frames
            .unwrap_or_else(|| clock.frames_for_secs(self.coast_secs))
    }
}

/// What changed on this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// State unchanged (or Active → Coasting on a first miss).
    None,
    /// A new subject identity was acquired from Searching or Lost.
    Acquired,
    /// The active subject was matched again after coasting.
    Reacquired,
    /// The coasting budget ran out.
    Lost,
    /// The coasting budget ran out and a new identity was acquired in the
    /// same frame.
    Replaced,
}

/// The subject currently driving the crop.
#[derive(Debug, Clone)]
pub struct TrackedSubject {
    pub id: SubjectId,
    history: VecDeque<Detection>,
    history_len: usize,
    last_box: BoundingBox,
    last_target: Point2D,
    missed_frames: u64,
    matched_frames: u64,
}

impl TrackedSubject {
    fn new(id: SubjectId, detection: &Detection, target: Point2D, history_len: usize) -> Self {
        let mut subject = Self {
            id,
            history: VecDeque::new(),
            history_len: history_len.max(1),
            last_box: detection.bbox,
            last_target: target,
            missed_frames: 0,
            matched_frames: 0,
        };
        subject.observe(detection, target);
        subject
    }

    fn observe(&mut self, detection: &Detection, target: Point2D) {
        if self.history.len() == self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(detection.clone());
        self.last_box = detection.bbox;
        self.last_target = target;
        self.missed_frames = 0;
        self.matched_frames += 1;
    }

    /// Last matched box (held while coasting).
    pub fn last_box(&self) -> BoundingBox {
        self.last_box
    }

    /// Last target point (held while coasting).
    pub fn last_target(&self) -> Point2D {
        self.last_target
    }

    /// Consecutive frames without a match.
    pub fn missed_frames(&self) -> u64 {
        self.missed_frames
    }

    /// Total frames in which this subject was matched.
    pub fn matched_frames(&self) -> u64 {
        self.matched_frames
    }

    /// Recent detections, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Detection> {
        self.history.iter()
    }
}

/// Result of one tracker step.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerUpdate {
    pub state: TrackingState,
    pub subject: Option<SubjectId>,
    /// Box the crop should follow (held box while coasting).
    pub subject_box: Option<BoundingBox>,
    /// Point the crop should center on.
    pub target: Option<Point2D>,
    pub transition: Transition,
}

impl TrackerUpdate {
    /// The smoother must jump straight to the new target.
    pub fn is_hard_cut(&self) -> bool {
        matches!(self.transition, Transition::Acquired | Transition::Replaced)
    }
}

/// Frame-synchronous single-subject tracker.
#[derive(Debug, Clone)]
pub struct SubjectTracker {
    config: TrackerConfig,
    gate_px: f64,
    coast_budget: u64,
    state: TrackingState,
    active: Option<TrackedSubject>,
    next_id: u32,
}

impl SubjectTracker {
    pub fn new(config: TrackerConfig, frame: FrameSize, clock: &FrameClock) -> Self {
        let gate_px = config.gate_distance_frac * frame.diagonal();
        let coast_budget = config.coast_budget(clock);
        Self {
            config,
            gate_px,
            coast_budget,
            state: TrackingState::Searching,
            active: None,
            next_id: 0,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn active_subject(&self) -> Option<&TrackedSubject> {
        self.active.as_ref()
    }

    pub fn gate_px(&self) -> f64 {
        self.gate_px
    }

    pub fn coast_budget(&self) -> u64 {
        self.coast_budget
    }

    /// Evaluate one frame of normalized detections.
    pub fn step(&mut self, detections: &[Detection]) -> TrackerUpdate {
        let visibility = self.config.keypoint_visibility_threshold;

        let transition = match self.active.as_mut() {
            Some(subject) if self.state.has_subject() => {
                let anchor = subject.last_box.center();
                match select_match(detections, anchor, self.gate_px, self.config.tie_distance_px)
                {
                    Some(idx) => {
                        let detection = &detections[idx];
                        subject.observe(detection, subject_point(detection, visibility));
                        let transition = if self.state == TrackingState::Coasting {
                            Transition::Reacquired
                        } else {
                            Transition::None
                        };
                        self.state = TrackingState::Active;
                        transition
                    }
                    None => {
                        subject.missed_frames += 1;
                        if subject.missed_frames > self.coast_budget {
                            self.active = None;
                            self.state = TrackingState::Lost;
                            if self.acquire(detections) {
                                Transition::Replaced
                            } else {
                                Transition::Lost
                            }
                        } else {
                            self.state = TrackingState::Coasting;
                            Transition::None
                        }
                    }
                }
            }
            _ => {
                if self.acquire(detections) {
                    Transition::Acquired
                } else {
                    Transition::None
                }
            }
        };

        let subject = self.active.as_ref();
        TrackerUpdate {
            state: self.state,
            subject: subject.map(|s| s.id),
            subject_box: subject.map(|s| s.last_box),
            target: subject.map(|s| s.last_target),
            transition,
        }
    }

    /// Start a new identity on the best candidate. Returns false when there
    /// is none.
    fn acquire(&mut self, detections: &[Detection]) -> bool {
        let Some(idx) = select_initial(detections) else {
            return false;
        };
        let detection = &detections[idx];
        let id = SubjectId(self.next_id);
        self.next_id += 1;
        self.active = Some(TrackedSubject::new(
            id,
            detection,
            subject_point(detection, self.config.keypoint_visibility_threshold),
            self.config.history_len,
        ));
        self.state = TrackingState::Active;
        true
    }
}

/// Point the crop centers on for a detection: the mean of sufficiently
/// visible keypoints, or the box center.
pub fn subject_point(detection: &Detection, min_visibility: f64) -> Point2D {
    detection
        .visible_keypoint_center(min_visibility)
        .unwrap_or_else(|| detection.bbox.center())
}

/// Initial choice when no subject is active: largest box, then higher
/// confidence. Earlier candidates win exact ties.
pub fn select_initial(candidates: &[Detection]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .reduce(|best, next| {
            let ord = next
                .1
                .bbox
                .area()
                .total_cmp(&best.1.bbox.area())
                .then(next.1.confidence.total_cmp(&best.1.confidence));
            if ord.is_gt() {
                next
            } else {
                best
            }
        })
        .map(|(idx, _)| idx)
}

/// Nearest candidate to `anchor` within `gate` pixels.
///
/// Candidates within `tie_px` of the nearest distance are equally close;
/// among those the larger box wins, then the higher confidence.
pub fn select_match(
    candidates: &[Detection],
    anchor: Point2D,
    gate: f64,
    tie_px: f64,
) -> Option<usize> {
    let gated: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(idx, d)| (idx, d.bbox.center().distance_to(&anchor)))
        .filter(|(_, dist)| *dist <= gate)
        .collect();

    let nearest = gated
        .iter()
        .map(|(_, dist)| *dist)
        .min_by(|a, b| a.total_cmp(b))?;

    let tied: Vec<usize> = gated
        .iter()
        .filter(|(_, dist)| *dist <= nearest + tie_px.max(0.0))
        .map(|(idx, _)| *idx)
        .collect();

    let tied_candidates: Vec<Detection> = tied.iter().map(|&i| candidates[i].clone()).collect();
    select_initial(&tied_candidates).map(|i| tied[i])
}
