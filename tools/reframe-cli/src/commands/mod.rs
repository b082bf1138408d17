pub mod batch;
pub mod check;
pub mod info;
pub mod init;
pub mod plan;
pub mod render;
pub mod validate;

use std::path::Path;

use reframe_common::config::AppConfig;
use reframe_core::config::FramingConfig;
use reframe_model::detection::DetectionTimeline;

/// Framing config from `--config`, else the app config's default file, else
/// built-in defaults.
pub(crate) fn load_framing_config(
    app: &AppConfig,
    path: Option<&Path>,
) -> anyhow::Result<FramingConfig> {
    match path.or(app.framing_config.as_deref()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading framing config");
            FramingConfig::load(path).map_err(|e| {
                anyhow::anyhow!("Failed to load framing config {}: {e}", path.display())
            })
        }
        None => Ok(FramingConfig::default()),
    }
}

pub(crate) fn load_detections(path: &Path) -> anyhow::Result<DetectionTimeline> {
    DetectionTimeline::load(path).map_err(|e| anyhow::anyhow!("Failed to load detections: {e}"))
}
