//! Render a vertical clip.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reframe_common::config::AppConfig;
use reframe_model::detection::DetectionTimeline;
use reframe_model::geometry::FrameSize;
use reframe_model::trajectory::Trajectory;
use reframe_render::ffmpeg::{is_video_path, FfmpegTools};
use reframe_render::{
    render_clip, FfmpegSink, FfmpegSource, FrameSink, FrameSource, ImageSequenceSink,
    ImageSequenceSource, PlanSource, ProgressCallback, RenderOptions, RenderReport,
};
use serde::Deserialize;

use super::{load_detections, load_framing_config};

/// One clip to render. Also the entry type of a batch manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderJob {
    pub input: PathBuf,
    #[serde(default)]
    pub detections: Option<PathBuf>,
    #[serde(default)]
    pub trajectory: Option<PathBuf>,
    pub output: PathBuf,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub config: Option<PathBuf>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl RenderJob {
    /// Resolve relative paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.input);
        resolve(&mut self.output);
        for path in [&mut self.detections, &mut self.trajectory, &mut self.config]
            .into_iter()
            .flatten()
        {
            resolve(path);
        }
    }
}

pub async fn run(app: AppConfig, job: RenderJob) -> anyhow::Result<()> {
    println!("Rendering: {}", job.input.display());
    println!("  Output: {}", job.output.display());

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_ctrl_c_handler(Arc::clone(&cancel));

    let progress_cb: ProgressCallback = Box::new(|p| {
        match p.total_frames {
            Some(total) if total > 0 => print!(
                "\r  Progress: {:.1}% ({}/{} frames, {:.1} fps, ETA: {:.0}s)  ",
                p.frames_rendered as f64 / total as f64 * 100.0,
                p.frames_rendered,
                total,
                p.frames_per_sec,
                p.eta_secs,
            ),
            _ => print!(
                "\r  Progress: {} frames ({:.1} fps)  ",
                p.frames_rendered, p.frames_per_sec
            ),
        }
        let _ = std::io::stdout().flush();
    });

    let output = job.output.clone();
    let report = tokio::task::spawn_blocking(move || {
        render_job(&app, &job, Some(cancel), Some(&progress_cb))
    })
    .await
    .map_err(|e| anyhow::anyhow!("Render task failed: {e}"))?;

    match report {
        Ok(report) => {
            println!("\nRender complete: {}", output.display());
            println!(
                "  {} frame(s) in {:.1}s ({:.1} fps)",
                report.frames, report.elapsed_secs, report.frames_per_sec
            );
            if report.degraded_frames > 0 {
                println!(
                    "  {} frame(s) used the centered fallback crop",
                    report.degraded_frames
                );
            }
            Ok(())
        }
        Err(e) => {
            println!("\nRender failed: {e}");
            Err(e)
        }
    }
}

/// Set the cancel flag on Ctrl-C.
pub(crate) fn spawn_ctrl_c_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling render");
            cancel.store(true, Ordering::Relaxed);
        }
    });
}

enum Plans {
    Detections(DetectionTimeline),
    Trajectory(Trajectory),
}

impl Plans {
    fn as_source(&self) -> PlanSource<'_> {
        match self {
            Plans::Detections(timeline) => PlanSource::Detections(timeline),
            Plans::Trajectory(trajectory) => PlanSource::Trajectory(trajectory),
        }
    }
}

/// Render one job on the current thread.
pub fn render_job(
    app: &AppConfig,
    job: &RenderJob,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<&ProgressCallback>,
) -> anyhow::Result<RenderReport> {
    let mut config = load_framing_config(app, job.config.as_deref())?;
    if job.width.is_some() || job.height.is_some() {
        config.output = FrameSize::new(
            job.width.unwrap_or(config.output.width),
            job.height.unwrap_or(config.output.height),
        );
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid output size: {e}"))?;
    }

    let plans = match (&job.trajectory, &job.detections) {
        (Some(path), _) => Plans::Trajectory(
            Trajectory::load(path)
                .map_err(|e| anyhow::anyhow!("Failed to load trajectory: {e}"))?,
        ),
        (None, Some(path)) => Plans::Detections(load_detections(path)?),
        (None, None) => {
            return Err(anyhow::anyhow!(
                "{}: either detections or a trajectory is required",
                job.input.display()
            ))
        }
    };

    let tools = FfmpegTools::from_defaults(&app.render);
    let (mut source, has_audio): (Box<dyn FrameSource>, bool) = if job.input.is_dir() {
        let fps = job.fps.unwrap_or(app.render.sequence_fps);
        let source = ImageSequenceSource::open(&job.input, fps)
            .map_err(|e| anyhow::anyhow!("Failed to open frames: {e}"))?;
        (Box::new(source), false)
    } else {
        let source = FfmpegSource::open(&job.input, &tools)
            .map_err(|e| anyhow::anyhow!("Failed to open video: {e}"))?;
        let has_audio = source.has_audio();
        (Box::new(source), has_audio)
    };
    let info = source.info();

    let output_size = match &plans {
        Plans::Trajectory(trajectory) => trajectory.output,
        Plans::Detections(_) => config.output,
    };
    let mut sink: Box<dyn FrameSink> = if is_video_path(&job.output) {
        let sink = FfmpegSink::new(&job.output, output_size, info.fps, tools);
        if has_audio {
            Box::new(sink.with_audio_from(&job.input))
        } else {
            Box::new(sink)
        }
    } else {
        Box::new(
            ImageSequenceSink::create(&job.output)
                .map_err(|e| anyhow::anyhow!("Failed to create output directory: {e}"))?,
        )
    };

    let options = RenderOptions {
        seed: job.seed,
        progress_interval: app.render.progress_interval_frames,
        cancel,
    };

    render_clip(
        source.as_mut(),
        sink.as_mut(),
        &config,
        plans.as_source(),
        &options,
        progress,
    )
    .map_err(|e| anyhow::anyhow!("Failed to render {}: {e}", job.input.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_paths_resolve_against_base() {
        let mut job: RenderJob = serde_json::from_str(
            r#"{"input": "clips/a.mp4", "detections": "a.jsonl", "output": "/abs/out.mp4"}"#,
        )
        .unwrap();
        job.resolve_paths(Path::new("/data"));
        assert_eq!(job.input, PathBuf::from("/data/clips/a.mp4"));
        assert_eq!(job.detections, Some(PathBuf::from("/data/a.jsonl")));
        assert_eq!(job.output, PathBuf::from("/abs/out.mp4"));
        assert!(job.trajectory.is_none());
    }

    #[test]
    fn test_job_requires_plans() {
        let job: RenderJob =
            serde_json::from_str(r#"{"input": "frames", "output": "out"}"#).unwrap();
        let err = render_job(&AppConfig::default(), &job, None, None).unwrap_err();
        assert!(err.to_string().contains("detections or a trajectory"));
    }
}
