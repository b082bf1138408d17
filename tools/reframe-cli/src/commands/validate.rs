//! Validate a detection stream against a source frame size.

use std::path::PathBuf;

use reframe_common::config::AppConfig;
use reframe_core::normalizer::{DetectionNormalizer, NormalizeStats};
use reframe_model::geometry::FrameSize;

use super::{load_detections, load_framing_config};

pub fn run(
    app: &AppConfig,
    detections: PathBuf,
    width: u32,
    height: u32,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("Validating detections at: {}", detections.display());

    let config = load_framing_config(app, config.as_deref())?;
    let timeline = load_detections(&detections)?;
    let frame = FrameSize::new(width, height);
    if !frame.is_valid() {
        return Err(anyhow::anyhow!("Frame size {frame} must be non-zero"));
    }

    let normalizer = DetectionNormalizer::new(config.normalizer.clone());
    let mut totals = NormalizeStats::default();
    let mut frames_without_subject = 0usize;
    for (_, raw) in timeline.iter() {
        let (kept, stats) = normalizer.normalize_with_stats(raw, frame);
        if kept.is_empty() {
            frames_without_subject += 1;
        }
        totals.merge(&stats);
    }

    println!("  Records: {}", timeline.frame_count());
    match timeline.last_frame() {
        Some(last) => println!("  Frames covered: 0-{last}"),
        None => println!("  Frames covered: none"),
    }
    println!("  Detections: {}", totals.input);
    println!("  Kept: {}", totals.kept);
    println!("  Below threshold: {}", totals.below_threshold);
    println!("  Suppressed duplicates: {}", totals.suppressed);
    println!("  Malformed: {}", totals.malformed);
    println!("  Keypoints dropped: {}", totals.keypoints_dropped);
    println!(
        "  Records with no usable detection: {}",
        frames_without_subject
    );

    if totals.malformed == 0 {
        println!("\nDetection stream is valid.");
    } else {
        println!(
            "\n{} malformed detection(s) will be discarded during framing.",
            totals.malformed
        );
    }

    Ok(())
}
