//! Show trajectory statistics.

use std::path::PathBuf;

use reframe_model::trajectory::Trajectory;

const MAX_LISTED_TRANSITIONS: usize = 40;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let trajectory =
        Trajectory::load(&path).map_err(|e| anyhow::anyhow!("Failed to load trajectory: {e}"))?;
    let summary = trajectory.summary();

    println!("Trajectory: {}", path.display());
    println!("  Version: {}", trajectory.version);
    println!("  Created: {}", trajectory.created_at);
    println!(
        "  Source: {} @ {}fps ({:.1}s)",
        trajectory.source,
        trajectory.fps,
        trajectory.duration_secs()
    );
    println!("  Output: {} ({})", trajectory.output, trajectory.aspect);
    println!("  Zoom seed: {}", trajectory.zoom_seed);
    println!();

    println!("Frames: {}", summary.frames);
    println!("  Active: {}", summary.active_frames);
    println!("  Coasting: {}", summary.coasting_frames);
    println!("  Lost: {}", summary.lost_frames);
    println!("  Searching: {}", summary.searching_frames);
    println!("  Degraded: {}", summary.degraded_frames);
    println!();

    println!("Subjects: {}", summary.subjects);
    println!("Hard cuts: {}", summary.hard_cuts);
    if let (Some(min), Some(max)) = (summary.min_zoom, summary.max_zoom) {
        println!("Zoom range: {min:.3} - {max:.3}");
    }
    println!();

    println!("Transitions: {}", summary.state_changes);
    let transitions: Vec<_> = trajectory
        .frames
        .windows(2)
        .filter(|pair| pair[0].state != pair[1].state)
        .map(|pair| (&pair[0], &pair[1]))
        .collect();
    for (prev, next) in transitions.iter().take(MAX_LISTED_TRANSITIONS) {
        let subject = next
            .subject
            .map(|id| format!(" [{id}]"))
            .unwrap_or_default();
        println!(
            "  {:>6} ({:>7.2}s): {} -> {}{}{}",
            next.frame,
            next.time_secs,
            prev.state,
            next.state,
            subject,
            if next.hard_cut { " (cut)" } else { "" }
        );
    }
    if transitions.len() > MAX_LISTED_TRANSITIONS {
        println!(
            "  ... {} more",
            transitions.len() - MAX_LISTED_TRANSITIONS
        );
    }

    Ok(())
}
