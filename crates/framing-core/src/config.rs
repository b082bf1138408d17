//! Engine configuration.
//!
//! One [`FramingConfig`] is supplied per run and never mutated. Every field
//! has a default, so a partial JSON file (or `{}`) is a valid config.

use std::path::Path;

use reframe_common::error::{ReframeError, ReframeResult};
use reframe_model::geometry::{AspectRatio, FrameSize};
use serde::{Deserialize, Serialize};

use crate::normalizer::NormalizerConfig;
use crate::smoother::{CropSizing, SmootherConfig};
use crate::tracker::TrackerConfig;
use crate::zoom::ZoomConfig;

/// Largest accepted `tracker.history_len`.
pub const MAX_HISTORY_LEN: usize = 10_000;

/// Resampling filter used when scaling the crop to the output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    #[default]
    Lanczos3,
    CatmullRom,
    Triangle,
}

/// Complete configuration of the framing engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Target aspect ratio of the crop.
    pub aspect: AspectRatio,

    /// Output resolution.
    pub output: FrameSize,

    pub resample: ResampleFilter,
    pub normalizer: NormalizerConfig,
    pub tracker: TrackerConfig,
    pub smoother: SmootherConfig,
    pub zoom: ZoomConfig,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            aspect: AspectRatio::VERTICAL,
            output: FrameSize::new(1080, 1920),
            resample: ResampleFilter::default(),
            normalizer: NormalizerConfig::default(),
            tracker: TrackerConfig::default(),
            smoother: SmootherConfig::default(),
            zoom: ZoomConfig::default(),
        }
    }
}

impl FramingConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> ReframeResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReframeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| ReframeError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> ReframeResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject out-of-range values before any frame is processed.
    pub fn validate(&self) -> ReframeResult<()> {
        if !self.aspect.is_valid() {
            return Err(ReframeError::config(format!(
                "aspect ratio {} must have non-zero sides",
                self.aspect
            )));
        }
        if !self.output.is_valid() {
            return Err(ReframeError::config(format!(
                "output size {} must be non-zero",
                self.output
            )));
        }

        let n = &self.normalizer;
        check_range("normalizer.confidence_threshold", n.confidence_threshold, 0.0, 1.0)?;
        check_open_closed("normalizer.dedup_iou_threshold", n.dedup_iou_threshold, 0.0, 1.0)?;
        check_min("normalizer.min_box_size_px", n.min_box_size_px, 0.0)?;

        let t = &self.tracker;
        check_open_closed("tracker.gate_distance_frac", t.gate_distance_frac, 0.0, f64::MAX)?;
        check_min("tracker.coast_secs", t.coast_secs, 0.0)?;
        check_range(
            "tracker.keypoint_visibility_threshold",
            t.keypoint_visibility_threshold,
            0.0,
            1.0,
        )?;
        check_min("tracker.tie_distance_px", t.tie_distance_px, 0.0)?;
        if !(1..=MAX_HISTORY_LEN).contains(&t.history_len) {
            return Err(ReframeError::config(format!(
                "tracker.history_len must be between 1 and {MAX_HISTORY_LEN}, got {}",
                t.history_len
            )));
        }

        let s = &self.smoother;
        check_open_closed("smoother.smoothing_factor", s.smoothing_factor, 0.0, 1.0)?;
        if let Some(frac) = s.max_step_frac {
            check_open_closed("smoother.max_step_frac", frac, 0.0, 1.0)?;
        }
        if let CropSizing::Subject {
            scale,
            min_height_frac,
        } = s.sizing
        {
            check_open_closed("smoother.sizing.scale", scale, 0.0, f64::MAX)?;
            check_open_closed("smoother.sizing.min_height_frac", min_height_frac, 0.0, 1.0)?;
        }

        let z = &self.zoom;
        check_min("zoom.max_zoom", z.max_zoom, 1.0)?;
        check_min("zoom.amplitude_min", z.amplitude_min, 0.0)?;
        check_min("zoom.amplitude_max", z.amplitude_max, z.amplitude_min)?;
        check_open_closed("zoom.period_min_secs", z.period_min_secs, 0.0, f64::MAX)?;
        check_min("zoom.period_max_secs", z.period_max_secs, z.period_min_secs)?;
        check_open_closed("zoom.min_visible_area", z.min_visible_area, 0.0, 1.0)?;

        Ok(())
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> ReframeResult<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ReframeError::config(format!(
            "{name} must be in [{min}, {max}], got {value}"
        )))
    }
}

fn check_open_closed(name: &str, value: f64, min: f64, max: f64) -> ReframeResult<()> {
    if value.is_finite() && value > min && value <= max {
        Ok(())
    } else if max == f64::MAX {
        Err(ReframeError::config(format!(
            "{name} must be greater than {min}, got {value}"
        )))
    } else {
        Err(ReframeError::config(format!(
            "{name} must be in ({min}, {max}], got {value}"
        )))
    }
}

fn check_min(name: &str, value: f64, min: f64) -> ReframeResult<()> {
    if value.is_finite() && value >= min {
        Ok(())
    } else {
        Err(ReframeError::config(format!(
            "{name} must be at least {min}, got {value}"
        )))
    }
}
