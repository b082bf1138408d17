//! Write the default framing config.

use std::path::PathBuf;

use reframe_core::config::FramingConfig;

pub fn run(output: PathBuf, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "{} already exists (use --force to overwrite)",
            output.display()
        ));
    }

    let config = FramingConfig::default();
    config
        .save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write config: {e}"))?;

    println!("Framing config written to {}", output.display());
    println!("  Aspect: {}", config.aspect);
    println!("  Output: {}", config.output);
    println!(
        "  Smoothing: {} (max step {:?})",
        config.smoother.smoothing_factor, config.smoother.max_step_frac
    );
    println!("  Coast budget: {}s", config.tracker.coast_secs);
    println!(
        "  Zoom: {:?}, up to {}x",
        config.zoom.waveform, config.zoom.max_zoom
    );

    Ok(())
}
