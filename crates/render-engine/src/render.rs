//! Render loop: decode, plan, composite and encode one clip.
//!
//! The loop is frame-synchronous. Each decoded frame is either planned on
//! the fly by a fresh [`FramingEngine`] or looked up in a precomputed
//! [`Trajectory`], then cropped/resized and handed to the sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reframe_common::clock::{ProgressGate, RunTimer};
use reframe_common::error::{ReframeError, ReframeResult};
use reframe_core::config::FramingConfig;
use reframe_core::engine::FramingEngine;
use reframe_model::detection::DetectionTimeline;
use reframe_model::trajectory::{FramePlan, Trajectory};

use crate::compositor::FrameCompositor;
use crate::sink::FrameSink;
use crate::source::FrameSource;

/// Where per-frame crop plans come from.
#[derive(Debug, Clone, Copy)]
pub enum PlanSource<'a> {
    /// Plan each frame from detections while rendering.
    Detections(&'a DetectionTimeline),
    /// Replay a trajectory computed earlier (e.g. by `reframe plan`).
    Trajectory(&'a Trajectory),
}

/// Render loop options.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Zoom seed override. Ignored when replaying a trajectory.
    pub seed: Option<u64>,
    /// Frames between progress reports.
    pub progress_interval: u64,
    /// Checked once per frame; when set the clip is abandoned.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            seed: None,
            progress_interval: 100,
            cancel: None,
        }
    }
}

impl RenderOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Progress snapshot passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderProgress {
    pub frames_rendered: u64,
    pub total_frames: Option<u64>,
    pub frames_per_sec: f64,
    /// Zero when the total is unknown.
    pub eta_secs: f64,
}

pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send + Sync>;

/// Outcome of a finished render.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub frames: u64,
    pub elapsed_secs: f64,
    pub frames_per_sec: f64,
    pub degraded_frames: u64,
    /// Plans for every rendered frame.
    pub trajectory: Trajectory,
}

enum Planner<'a> {
    Live {
        engine: Box<FramingEngine>,
        detections: &'a DetectionTimeline,
    },
    Replay(&'a Trajectory),
}

impl Planner<'_> {
    fn plan(&mut self, frame: u64) -> ReframeResult<FramePlan> {
        match self {
            Planner::Live { engine, detections } => Ok(engine.process(detections.get(frame))),
            Planner::Replay(trajectory) => trajectory.plan(frame).cloned().ok_or_else(|| {
                ReframeError::render(format!(
                    "Trajectory has {} frame(s) but the source has more (frame {frame})",
                    trajectory.len()
                ))
            }),
        }
    }
}

/// Render one clip from `source` into `sink`.
///
/// On error or cancellation the sink is aborted and nothing is kept.
pub fn render_clip(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    config: &FramingConfig,
    plans: PlanSource<'_>,
    options: &RenderOptions,
    progress: Option<&ProgressCallback>,
) -> ReframeResult<RenderReport> {
    match render_frames(source, sink, config, plans, options, progress) {
        Ok(report) => Ok(report),
        Err(err) => {
            sink.abort();
            if err.is_cancelled() {
                tracing::info!("{err}");
            }
            Err(err)
        }
    }
}

fn render_frames(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    config: &FramingConfig,
    plans: PlanSource<'_>,
    options: &RenderOptions,
    progress: Option<&ProgressCallback>,
) -> ReframeResult<RenderReport> {
    let info = source.info();

    if !info.size.is_valid() {
        // Only an empty image sequence has no frame size.
        if let Some(frame) = source.next_frame()? {
            return Err(ReframeError::decode(format!(
                "Source reported no frame size but produced frame {}",
                frame.index
            )));
        }
        sink.finish()?;
        let seed = match plans {
            PlanSource::Trajectory(replay) => replay.zoom_seed,
            PlanSource::Detections(_) => options
                .seed
                .unwrap_or_else(|| config.zoom.resolve_seed()),
        };
        tracing::info!("Source has no frames; nothing rendered");
        return Ok(RenderReport {
            frames: 0,
            elapsed_secs: 0.0,
            frames_per_sec: 0.0,
            degraded_frames: 0,
            trajectory: Trajectory::new(info.size, config.output, config.aspect, info.fps, seed),
        });
    }

    let (mut planner, mut trajectory, output) = match plans {
        PlanSource::Detections(detections) => {
            let seed = options
                .seed
                .unwrap_or_else(|| config.zoom.resolve_seed());
            let engine = FramingEngine::with_seed(config.clone(), info.size, info.fps, seed)?;
            let trajectory = engine.new_trajectory();
            let planner = Planner::Live {
                engine: Box::new(engine),
                detections,
            };
            (planner, trajectory, config.output)
        }
        PlanSource::Trajectory(replay) => {
            if replay.source != info.size {
                return Err(ReframeError::render(format!(
                    "Trajectory was planned for {} but the source is {}",
                    replay.source, info.size
                )));
            }
            let mut trajectory = replay.clone();
            trajectory.frames.clear();
            (Planner::Replay(replay), trajectory, replay.output)
        }
    };

    let compositor = FrameCompositor::new(output, config.resample);
    let timer = RunTimer::start();
    let mut gate = ProgressGate::new(options.progress_interval);
    let mut degraded = 0u64;

    tracing::info!(
        source = %info.size,
        output = %output,
        fps = info.fps,
        frames = ?info.frame_count,
        seed = trajectory.zoom_seed,
        "Rendering clip"
    );

    while let Some(frame) = source.next_frame()? {
        if options.is_cancelled() {
            return Err(ReframeError::Cancelled {
                frames: sink.frames_written(),
            });
        }
        if frame.size() != info.size {
            return Err(ReframeError::decode(format!(
                "Frame {} is {}, expected {}",
                frame.index,
                frame.size(),
                info.size
            )));
        }

        let plan = planner.plan(frame.index)?;
        if plan.degraded {
            // Live planning already warned when the engine was built.
            if degraded == 0 && matches!(planner, Planner::Replay(_)) {
                tracing::warn!(
                    frame = frame.index,
                    source = %info.size,
                    "Source is narrower than the target aspect; using centered crop"
                );
            }
            degraded += 1;
        }

        let output_frame = compositor.compose(&frame.image, &plan.final_window);
        sink.write_frame(&output_frame)?;
        trajectory.frames.push(plan);

        let rendered = sink.frames_written();
        if gate.should_tick(rendered) {
            let snapshot = RenderProgress {
                frames_rendered: rendered,
                total_frames: info.frame_count,
                frames_per_sec: timer.frames_per_sec(rendered),
                eta_secs: info
                    .frame_count
                    .map(|total| timer.eta_secs(rendered, total))
                    .unwrap_or(0.0),
            };
            tracing::info!(
                frames = rendered,
                total = ?info.frame_count,
                fps = format!("{:.1}", snapshot.frames_per_sec),
                eta_secs = format!("{:.1}", snapshot.eta_secs),
                "Render progress"
            );
            if let Some(callback) = progress {
                callback(snapshot);
            }
        }
    }

    sink.finish()?;

    let frames = sink.frames_written();
    let elapsed_secs = timer.elapsed_secs();
    let frames_per_sec = timer.frames_per_sec(frames);
    tracing::info!(
        frames,
        degraded,
        elapsed_secs = format!("{elapsed_secs:.2}"),
        fps = format!("{frames_per_sec:.1}"),
        "Render finished"
    );

    Ok(RenderReport {
        frames,
        elapsed_secs,
        frames_per_sec,
        degraded_frames: degraded,
        trajectory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::source::SourceInfo;
    use image::{Rgb, RgbImage};
    use reframe_core::engine::plan_clip;
    use reframe_model::geometry::FrameSize;

    struct SyntheticSource {
        info: SourceInfo,
        next: u64,
        total: u64,
    }

    impl SyntheticSource {
        fn new(width: u32, height: u32, total: u64) -> Self {
            Self {
                info: SourceInfo {
                    size: FrameSize::new(width, height),
                    fps: 30.0,
                    frame_count: Some(total),
                },
                next: 0,
                total,
            }
        }
    }

    impl FrameSource for SyntheticSource {
        fn info(&self) -> SourceInfo {
            self.info
        }

        fn next_frame(&mut self) -> ReframeResult<Option<Frame>> {
            if self.next >= self.total {
                return Ok(None);
            }
            let index = self.next;
            self.next += 1;
            let size = self.info.size;
            let image = RgbImage::from_pixel(size.width, size.height, Rgb([10, 20, 30]));
            Ok(Some(Frame::new(index, index as f64 / 30.0, image)))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        frames: Vec<RgbImage>,
        finished: bool,
        aborted: bool,
    }

    impl FrameSink for MemorySink {
        fn write_frame(&mut self, image: &RgbImage) -> ReframeResult<()> {
            self.frames.push(image.clone());
            Ok(())
        }

        fn finish(&mut self) -> ReframeResult<()> {
            self.finished = true;
            Ok(())
        }

        fn abort(&mut self) {
            self.aborted = true;
            self.frames.clear();
        }

        fn frames_written(&self) -> u64 {
            self.frames.len() as u64
        }
    }

    fn small_config() -> FramingConfig {
        FramingConfig {
            output: FrameSize::new(18, 32),
            ..FramingConfig::default()
        }
    }

    #[test]
    fn test_renders_every_frame_at_output_size() {
        let mut source = SyntheticSource::new(64, 36, 5);
        let mut sink = MemorySink::default();
        let detections = DetectionTimeline::new();
        let options = RenderOptions {
            seed: Some(3),
            ..RenderOptions::default()
        };

        let report = render_clip(
            &mut source,
            &mut sink,
            &small_config(),
            PlanSource::Detections(&detections),
            &options,
            None,
        )
        .unwrap();

        assert_eq!(report.frames, 5);
        assert_eq!(report.trajectory.len(), 5);
        assert_eq!(report.trajectory.zoom_seed, 3);
        assert!(sink.finished);
        assert!(sink.frames.iter().all(|f| f.dimensions() == (18, 32)));
    }

    #[test]
    fn test_zero_frames_is_not_an_error() {
        let mut source = SyntheticSource::new(64, 36, 0);
        let mut sink = MemorySink::default();
        let detections = DetectionTimeline::new();

        let report = render_clip(
            &mut source,
            &mut sink,
            &small_config(),
            PlanSource::Detections(&detections),
            &RenderOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(report.frames, 0);
        assert!(report.trajectory.is_empty());
    }

    #[test]
    fn test_cancel_aborts_sink() {
        let mut source = SyntheticSource::new(64, 36, 10);
        let mut sink = MemorySink::default();
        let detections = DetectionTimeline::new();
        let options = RenderOptions {
            cancel: Some(Arc::new(AtomicBool::new(true))),
            ..RenderOptions::default()
        };

        let err = render_clip(
            &mut source,
            &mut sink,
            &small_config(),
            PlanSource::Detections(&detections),
            &options,
            None,
        )
        .unwrap_err();

        assert!(matches!(err, ReframeError::Cancelled { frames: 0 }));
        assert!(sink.aborted);
        assert!(!sink.finished);
    }

    #[test]
    fn test_replay_matches_planned_trajectory() {
        let config = small_config();
        let detections = DetectionTimeline::new();
        let planned = plan_clip(
            &config,
            FrameSize::new(64, 36),
            30.0,
            &detections,
            4,
            Some(9),
        )
        .unwrap();

        let mut source = SyntheticSource::new(64, 36, 4);
        let mut sink = MemorySink::default();
        let report = render_clip(
            &mut source,
            &mut sink,
            &config,
            PlanSource::Trajectory(&planned),
            &RenderOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(report.frames, 4);
        assert_eq!(report.trajectory.frames, planned.frames);
    }

    #[test]
    fn test_short_trajectory_is_an_error() {
        let config = small_config();
        let detections = DetectionTimeline::new();
        let planned = plan_clip(
            &config,
            FrameSize::new(64, 36),
            30.0,
            &detections,
            2,
            Some(9),
        )
        .unwrap();

        let mut source = SyntheticSource::new(64, 36, 3);
        let mut sink = MemorySink::default();
        let err = render_clip(
            &mut source,
            &mut sink,
            &config,
            PlanSource::Trajectory(&planned),
            &RenderOptions::default(),
            None,
        )
        .unwrap_err();

        assert!(matches!(err, ReframeError::Render { .. }));
        assert!(sink.aborted);
    }

    #[test]
    fn test_replay_rejects_other_source_size() {
        let config = small_config();
        let planned = plan_clip(
            &config,
            FrameSize::new(64, 36),
            30.0,
            &DetectionTimeline::new(),
            2,
            Some(1),
        )
        .unwrap();

        let mut source = SyntheticSource::new(32, 18, 2);
        let mut sink = MemorySink::default();
        let result = render_clip(
            &mut source,
            &mut sink,
            &config,
            PlanSource::Trajectory(&planned),
            &RenderOptions::default(),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_progress_callback_fires() {
        use std::sync::atomic::AtomicU64;

        let mut source = SyntheticSource::new(64, 36, 6);
        let mut sink = MemorySink::default();
        let detections = DetectionTimeline::new();
        let options = RenderOptions {
            progress_interval: 2,
            ..RenderOptions::default()
        };
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&ticks);
        let callback: ProgressCallback = Box::new(move |p| {
            assert_eq!(p.total_frames, Some(6));
            counter.fetch_add(1, Ordering::Relaxed);
        });

        render_clip(
            &mut source,
            &mut sink,
            &small_config(),
            PlanSource::Detections(&detections),
            &options,
            Some(&callback),
        )
        .unwrap();

        // frames 1, 3, 5
        assert_eq!(ticks.load(Ordering::Relaxed), 3);
    }
}
