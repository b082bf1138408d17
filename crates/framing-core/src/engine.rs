//! Per-frame framing pipeline.
//!
//! ```text
//! raw detections → normalize → track → smooth → zoom → compose → FramePlan
//! ```
//!
//! A [`FramingEngine`] owns all state for one clip and is discarded when the
//! clip ends. Engines for different clips share nothing and can run on
//! separate threads.

use reframe_common::clock::FrameClock;
use reframe_common::error::{ReframeError, ReframeResult};
use reframe_model::detection::{Detection, DetectionTimeline};
use reframe_model::geometry::FrameSize;
use reframe_model::trajectory::{FramePlan, Trajectory};

use crate::compositor::{compose, is_feasible};
use crate::config::FramingConfig;
use crate::normalizer::{DetectionNormalizer, NormalizeStats};
use crate::smoother::CropSmoother;
use crate::tracker::{SubjectTracker, Transition};
use crate::zoom::{ZoomGenerator, ZoomParams};

/// Counters accumulated over a clip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    pub frames: u64,
    pub normalize: NormalizeStats,
    pub acquisitions: u64,
    pub reacquisitions: u64,
    pub losses: u64,
    pub degraded_frames: u64,
}

/// Framing engine for a single clip.
#[derive(Debug, Clone)]
pub struct FramingEngine {
    config: FramingConfig,
    source: FrameSize,
    clock: FrameClock,
    seed: u64,
    normalizer: DetectionNormalizer,
    tracker: SubjectTracker,
    smoother: CropSmoother,
    zoom: ZoomGenerator,
    zoom_ceiling: f64,
    next_frame: u64,
    stats: EngineStats,
}

impl FramingEngine {
    /// Create an engine, drawing a zoom seed unless the config fixes one.
    pub fn new(config: FramingConfig, source: FrameSize, fps: f64) -> ReframeResult<Self> {
        let seed = config.zoom.resolve_seed();
        Self::with_seed(config, source, fps, seed)
    }

    /// Create an engine with an explicit zoom seed.
    pub fn with_seed(
        config: FramingConfig,
        source: FrameSize,
        fps: f64,
        seed: u64,
    ) -> ReframeResult<Self> {
        config.validate()?;
        if !source.is_valid() {
            return Err(ReframeError::config(format!(
                "source frame size {source} must be non-zero"
            )));
        }

        let clock = FrameClock::new(fps);
        if !is_feasible(source, config.aspect) {
            tracing::warn!(
                source = %source,
                aspect = %config.aspect,
                "Source is narrower than the target aspect; using a centered crop without zoom"
            );
        }

        let normalizer = DetectionNormalizer::new(config.normalizer.clone());
        let tracker = SubjectTracker::new(config.tracker.clone(), source, &clock);
        let smoother = CropSmoother::new(config.smoother.clone(), source, config.aspect);
        let zoom = ZoomGenerator::new(&config.zoom, &clock, seed);
        let zoom_ceiling = config.zoom.zoom_ceiling();

        tracing::debug!(
            source = %source,
            fps = clock.fps(),
            seed,
            gate_px = tracker.gate_px(),
            coast_frames = tracker.coast_budget(),
            zoom_amplitude = zoom.params().amplitude,
            zoom_period_secs = zoom.params().period_secs,
            "Framing engine ready"
        );

        Ok(Self {
            config,
            source,
            clock,
            seed,
            normalizer,
            tracker,
            smoother,
            zoom,
            zoom_ceiling,
            next_frame: 0,
            stats: EngineStats::default(),
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn source(&self) -> FrameSize {
        self.source
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn config(&self) -> &FramingConfig {
        &self.config
    }

    pub fn zoom_params(&self) -> ZoomParams {
        self.zoom.params()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Index of the next frame `process` will evaluate.
    pub fn next_frame(&self) -> u64 {
        self.next_frame
    }

    /// An empty trajectory carrying this engine's clip metadata.
    pub fn new_trajectory(&self) -> Trajectory {
        Trajectory::new(
            self.source,
            self.config.output,
            self.config.aspect,
            self.clock.fps(),
            self.seed,
        )
    }

    /// Evaluate the next frame.
    pub fn process(&mut self, raw: &[Detection]) -> FramePlan {
        let frame = self.next_frame;
        self.next_frame += 1;
        self.stats.frames += 1;

        let (detections, normalize) = self.normalizer.normalize_with_stats(raw, self.source);
        self.stats.normalize.merge(&normalize);

        let update = self.tracker.step(&detections);
        match update.transition {
            Transition::Acquired => {
                self.stats.acquisitions += 1;
                if let Some(id) = update.subject {
                    tracing::debug!(frame, subject = %id, "Subject acquired (hard cut)");
                }
            }
            Transition::Reacquired => {
                self.stats.reacquisitions += 1;
                tracing::debug!(frame, "Subject reacquired after coasting");
            }
            Transition::Lost => {
                self.stats.losses += 1;
                tracing::debug!(frame, "Subject lost; returning to default crop");
            }
            Transition::Replaced => {
                self.stats.losses += 1;
                self.stats.acquisitions += 1;
                if let Some(id) = update.subject {
                    tracing::debug!(frame, subject = %id, "Subject lost and replaced (hard cut)");
                }
            }
            Transition::None => {}
        }

        let target = self
            .smoother
            .target_window(update.target, update.subject_box.as_ref());
        let hard_cut = update.is_hard_cut();
        let smoothed = self.smoother.update(&target, hard_cut);

        let zoom = self.zoom.next_state();
        let composition = compose(
            &smoothed.window,
            zoom.factor,
            self.source,
            self.config.aspect,
            self.zoom_ceiling,
        );
        if composition.degraded {
            self.stats.degraded_frames += 1;
        }

        FramePlan {
            frame,
            time_secs: self.clock.timestamp_secs(frame),
            state: update.state,
            subject: update.subject,
            subject_box: update.subject_box,
            target: update.target.unwrap_or_else(|| target.center()),
            window: smoothed.window,
            zoom: zoom.factor,
            final_window: composition.window,
            effective_zoom: composition.effective_zoom,
            hard_cut,
            degraded: composition.degraded,
        }
    }
}

/// Plan a whole clip from a detection timeline.
///
/// `frame_count` frames are planned; frames without detection records are
/// treated as empty. `seed` overrides the config's zoom seed.
pub fn plan_clip(
    config: &FramingConfig,
    source: FrameSize,
    fps: f64,
    detections: &DetectionTimeline,
    frame_count: u64,
    seed: Option<u64>,
) -> ReframeResult<Trajectory> {
    let seed = seed.unwrap_or_else(|| config.zoom.resolve_seed());
    let mut engine = FramingEngine::with_seed(config.clone(), source, fps, seed)?;
    let mut trajectory = engine.new_trajectory();
    trajectory.frames.reserve(frame_count as usize);

    for frame in 0..frame_count {
        let plan = engine.process(detections.get(frame));
        trajectory.frames.push(plan);
    }

    let stats = engine.stats();
    tracing::info!(
        frames = stats.frames,
        acquisitions = stats.acquisitions,
        losses = stats.losses,
        degraded = stats.degraded_frames,
        discarded = stats.normalize.malformed + stats.normalize.below_threshold,
        seed,
        "Clip planned"
    );

    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reframe_model::geometry::{AspectRatio, BoundingBox, CropWindow};
    use reframe_model::trajectory::TrackingState;

    const HD: FrameSize = FrameSize {
        width: 1920,
        height: 1080,
    };

    fn person(cx: f64) -> Detection {
        Detection::new(BoundingBox::centered(cx, 540.0, 200.0, 600.0), 0.9)
    }

    #[test]
    fn test_frames_are_numbered_and_timed() {
        let mut engine = FramingEngine::with_seed(FramingConfig::default(), HD, 25.0, 1).unwrap();
        let a = engine.process(&[]);
        let b = engine.process(&[]);
        assert_eq!(a.frame, 0);
        assert_eq!(b.frame, 1);
        assert!((b.time_secs - 0.04).abs() < 1e-12);
        assert_eq!(engine.next_frame(), 2);
    }

    #[test]
    fn test_searching_uses_centered_default() {
        let mut engine = FramingEngine::with_seed(FramingConfig::default(), HD, 30.0, 1).unwrap();
        let plan = engine.process(&[]);
        assert_eq!(plan.state, TrackingState::Searching);
        assert_eq!(
            plan.window,
            CropWindow::largest_centered(HD, AspectRatio::VERTICAL)
        );
        assert!(!plan.hard_cut);
        assert_eq!(plan.effective_zoom, 1.0);
    }

    #[test]
    fn test_acquisition_is_hard_cut() {
        let mut engine = FramingEngine::with_seed(FramingConfig::default(), HD, 30.0, 1).unwrap();
        engine.process(&[]);
        let plan = engine.process(&[person(1200.0)]);
        assert_eq!(plan.state, TrackingState::Active);
        assert!(plan.hard_cut);
        assert_eq!(plan.window.center_x, 1200.0);
        assert_eq!(engine.stats().acquisitions, 1);
    }

    #[test]
    fn test_exhausted_budget_cuts_to_new_subject_same_frame() {
        let mut config = FramingConfig::default();
        config.tracker.coast_frames = Some(2);
        let mut engine = FramingEngine::with_seed(config, HD, 30.0, 1).unwrap();
        engine.process(&[person(300.0)]);
        engine.process(&[person(1600.0)]);
        engine.process(&[person(1600.0)]);

        let plan = engine.process(&[person(1600.0)]);
        assert_eq!(plan.state, TrackingState::Active);
        assert!(plan.hard_cut);
        assert_eq!(plan.window.center_x, 1600.0);
        assert_eq!(engine.stats().losses, 1);
        assert_eq!(engine.stats().acquisitions, 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = FramingConfig::default();
        config.smoother.smoothing_factor = 2.0;
        assert!(FramingEngine::with_seed(config, HD, 30.0, 1).is_err());
        let empty = FrameSize::new(0, 10);
        assert!(FramingEngine::with_seed(FramingConfig::default(), empty, 30.0, 1).is_err());
    }

    #[test]
    fn test_plan_clip_covers_every_frame() {
        let timeline = DetectionTimeline::new();
        let trajectory =
            plan_clip(&FramingConfig::default(), HD, 30.0, &timeline, 45, Some(3)).unwrap();
        assert_eq!(trajectory.len(), 45);
        assert_eq!(trajectory.zoom_seed, 3);
        assert_eq!(trajectory.aspect, AspectRatio::VERTICAL);
        assert!(trajectory
            .frames
            .iter()
            .all(|p| p.state == TrackingState::Searching));
    }

    #[test]
    fn test_zero_frames_is_empty_trajectory() {
        let timeline = DetectionTimeline::new();
        let trajectory =
            plan_clip(&FramingConfig::default(), HD, 30.0, &timeline, 0, Some(3)).unwrap();
        assert!(trajectory.is_empty());
    }
}
