//! Compute a framing trajectory from detections.

use std::path::PathBuf;

use reframe_common::config::AppConfig;
use reframe_core::engine::plan_clip;
use reframe_model::geometry::FrameSize;

use super::{load_detections, load_framing_config};

#[allow(clippy::too_many_arguments)]
pub fn run(
    app: &AppConfig,
    detections: PathBuf,
    width: u32,
    height: u32,
    fps: f64,
    frames: Option<u64>,
    config: Option<PathBuf>,
    seed: Option<u64>,
    output: PathBuf,
) -> anyhow::Result<()> {
    let config = load_framing_config(app, config.as_deref())?;
    let timeline = load_detections(&detections)?;
    let source = FrameSize::new(width, height);
    let frames = frames.unwrap_or_else(|| timeline.last_frame().map_or(0, |last| last + 1));

    println!("Planning {} frame(s) from {}", frames, detections.display());
    println!("  Source: {source} @ {fps}fps");
    println!("  Aspect: {}", config.aspect);

    let trajectory = plan_clip(&config, source, fps, &timeline, frames, seed)
        .map_err(|e| anyhow::anyhow!("Failed to plan clip: {e}"))?;
    trajectory
        .save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to save trajectory: {e}"))?;

    let summary = trajectory.summary();
    println!("  Zoom seed: {}", trajectory.zoom_seed);
    println!(
        "  States: {} active, {} coasting, {} lost, {} searching",
        summary.active_frames,
        summary.coasting_frames,
        summary.lost_frames,
        summary.searching_frames
    );
    println!("  Hard cuts: {}", summary.hard_cuts);
    if summary.degraded_frames > 0 {
        println!(
            "  Degraded: {} frame(s) (source narrower than {})",
            summary.degraded_frames, config.aspect
        );
    }
    println!("\nTrajectory written to {}", output.display());

    Ok(())
}
