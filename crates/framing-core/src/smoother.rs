//! Crop trajectory smoothing.
//!
//! Exponential moving average over the crop center and size, with hard cuts
//! when the tracker switches to a new subject identity.
//!
//! The filter state is never clamped. Each output window is clamped to the
//! frame after smoothing, so a subject near the frame edge does not drag the
//! filter into a biased position.

use reframe_model::geometry::{
    largest_fitting_size, AspectRatio, BoundingBox, CropWindow, FrameSize, Point2D,
};
use serde::{Deserialize, Serialize};

/// How the crop height is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CropSizing {
    /// Crop height equals the largest height that fits the frame.
    #[default]
    FullHeight,
    /// Crop height follows the subject box.
    Subject {
        /// Crop height as a multiple of the subject box height.
        scale: f64,
        /// Lower bound as a fraction of the frame height.
        min_height_frac: f64,
    },
}

impl CropSizing {
    /// Target crop height for a subject box (or the default crop when there
    /// is no subject).
    pub fn target_height(
        &self,
        frame: FrameSize,
        aspect: AspectRatio,
        subject_box: Option<&BoundingBox>,
    ) -> f64 {
        let (_, max_height) = largest_fitting_size(frame, aspect);
        match (self, subject_box) {
            (Self::Subject { scale, min_height_frac }, Some(bbox)) => {
                let min_height = (min_height_frac * frame.h()).min(max_height);
                (bbox.height * scale).clamp(min_height, max_height)
            }
            _ => max_height,
        }
    }
}

/// Configuration for the crop smoother.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    /// Weight of the new target in the EMA (0 = frozen, 1 = no smoothing).
    pub smoothing_factor: f64,

    /// Per-frame limit on EMA steps: a fraction of the frame width for the
    /// center and of the frame height for vertical motion and size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_step_frac: Option<f64>,

    pub sizing: CropSizing,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.1,
            max_step_frac: Some(0.05),
            sizing: CropSizing::default(),
        }
    }
}

/// Filter state, threaded frame to frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SmoothedState {
    pub center_x: f64,
    pub center_y: f64,
    pub height: f64,
    /// Change in `center_x` on the last step.
    pub dx: f64,
    /// Change in `center_y` on the last step.
    pub dy: f64,
    /// Change in `height` on the last step.
    pub dh: f64,
}

impl SmoothedState {
    fn at(target: &CropWindow) -> Self {
        Self {
            center_x: target.center_x,
            center_y: target.center_y,
            height: target.height,
            ..Default::default()
        }
    }
}

/// Output of one smoothing step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedWindow {
    /// Smoothed window clamped to the frame.
    pub window: CropWindow,
    /// The filter was reset to the target on this step.
    pub reset: bool,
    /// Clamping moved or shrank the window.
    pub clamped: bool,
}

/// EMA crop smoother for one clip.
#[derive(Debug, Clone)]
pub struct CropSmoother {
    config: SmootherConfig,
    frame: FrameSize,
    aspect: AspectRatio,
    state: Option<SmoothedState>,
}

impl CropSmoother {
    pub fn new(config: SmootherConfig, frame: FrameSize, aspect: AspectRatio) -> Self {
        Self {
            config,
            frame,
            aspect,
            state: None,
        }
    }

    /// Current filter state, if any frame has been processed.
    pub fn state(&self) -> Option<&SmoothedState> {
        self.state.as_ref()
    }

    /// The centered default crop used while no subject is tracked.
    pub fn default_window(&self) -> CropWindow {
        CropWindow::largest_centered(self.frame, self.aspect)
    }

    /// Unsmoothed window the crop should move toward.
    pub fn target_window(
        &self,
        target: Option<Point2D>,
        subject_box: Option<&BoundingBox>,
    ) -> CropWindow {
        match target {
            Some(point) => {
                let height = self
                    .config
                    .sizing
                    .target_height(self.frame, self.aspect, subject_box);
                CropWindow::from_height(point.x, point.y, height, self.aspect)
            }
            None => self.default_window(),
        }
    }

    /// Advance the filter one frame toward `target`.
    ///
    /// With `hard_cut` (or on the very first frame) the filter jumps straight
    /// to the target.
    pub fn update(&mut self, target: &CropWindow, hard_cut: bool) -> SmoothedWindow {
        let next = match self.state {
            Some(prev) if !hard_cut => self.step(&prev, target),
            _ => SmoothedState::at(target),
        };
        let reset = hard_cut || self.state.is_none();
        self.state = Some(next);

        let raw = CropWindow::from_height(next.center_x, next.center_y, next.height, self.aspect);
        let clamped = raw.clamp_to(self.frame);
        SmoothedWindow {
            window: clamped.window,
            reset,
            clamped: clamped.shrunk || clamped.translated,
        }
    }

    fn step(&self, prev: &SmoothedState, target: &CropWindow) -> SmoothedState {
        let alpha = self.config.smoothing_factor.clamp(0.0, 1.0);
        let (limit_x, limit_y) = match self.config.max_step_frac {
            Some(frac) => (frac * self.frame.w(), frac * self.frame.h()),
            None => (f64::INFINITY, f64::INFINITY),
        };

        let dx = (alpha * (target.center_x - prev.center_x)).clamp(-limit_x, limit_x);
        let dy = (alpha * (target.center_y - prev.center_y)).clamp(-limit_y, limit_y);
        let dh = (alpha * (target.height - prev.height)).clamp(-limit_y, limit_y);

        SmoothedState {
            center_x: prev.center_x + dx,
            center_y: prev.center_y + dy,
            height: prev.height + dh,
            dx,
            dy,
            dh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: FrameSize = FrameSize {
        width: 1920,
        height: 1080,
    };

    fn smoother(config: SmootherConfig) -> CropSmoother {
        CropSmoother::new(config, HD, AspectRatio::VERTICAL)
    }

    fn unlimited() -> SmootherConfig {
        SmootherConfig {
            max_step_frac: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_update_initializes_to_target() {
        let mut s = smoother(unlimited());
        let target = s.target_window(Some(Point2D::new(700.0, 540.0)), None);
        let out = s.update(&target, false);
        assert!(out.reset);
        assert_eq!(out.window, target);
        assert_eq!(s.state().unwrap().center_x, 700.0);
    }

    #[test]
    fn test_ema_moves_by_smoothing_factor() {
        let mut s = smoother(unlimited());
        s.update(&s.target_window(Some(Point2D::new(700.0, 540.0)), None), false);

        let target = s.target_window(Some(Point2D::new(900.0, 540.0)), None);
        let out = s.update(&target, false);
        assert!(!out.reset);
        assert!((out.window.center_x - 720.0).abs() < 1e-9);
        assert!((s.state().unwrap().dx - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_step_limit_bounds_motion() {
        let mut s = smoother(SmootherConfig {
            smoothing_factor: 0.5,
            max_step_frac: Some(0.01),
            ..Default::default()
        });
        s.update(&s.target_window(Some(Point2D::new(400.0, 540.0)), None), false);
        let out = s.update(&s.target_window(Some(Point2D::new(1500.0, 540.0)), None), false);
        assert!((out.window.center_x - (400.0 + 19.2)).abs() < 1e-9);
    }

    #[test]
    fn test_hard_cut_jumps_to_target() {
        let mut s = smoother(SmootherConfig::default());
        s.update(&s.target_window(Some(Point2D::new(400.0, 540.0)), None), false);
        s.update(&s.target_window(Some(Point2D::new(500.0, 540.0)), None), false);

        let target = s.target_window(Some(Point2D::new(1500.0, 540.0)), None);
        let out = s.update(&target, true);
        assert!(out.reset);
        assert_eq!(s.state().unwrap().center_x, 1500.0);
        assert_eq!(s.state().unwrap().dx, 0.0);
        assert_eq!(out.window.center_x, 1500.0);
    }

    #[test]
    fn test_clamp_does_not_feed_back() {
        let mut s = smoother(unlimited());
        // Window half-width is 303.75; a target at x=50 is clamped on output.
        let target = s.target_window(Some(Point2D::new(50.0, 540.0)), None);
        let out = s.update(&target, false);
        assert!(out.clamped);
        assert!((out.window.center_x - 303.75).abs() < 1e-9);
        assert_eq!(s.state().unwrap().center_x, 50.0);

        let out = s.update(&target, false);
        assert_eq!(s.state().unwrap().center_x, 50.0);
        assert!(out.window.fits_within(HD));
    }

    #[test]
    fn test_default_window_is_centered_full_height() {
        let s = smoother(SmootherConfig::default());
        let window = s.target_window(None, None);
        assert_eq!(window.center_x, 960.0);
        assert_eq!(window.height, 1080.0);
        assert!(window.has_aspect(AspectRatio::VERTICAL));
    }

    #[test]
    fn test_subject_sizing_bounds() {
        let sizing = CropSizing::Subject {
            scale: 1.5,
            min_height_frac: 0.5,
        };
        let small = BoundingBox::new(0.0, 0.0, 50.0, 100.0);
        let medium = BoundingBox::new(0.0, 0.0, 200.0, 500.0);
        let huge = BoundingBox::new(0.0, 0.0, 400.0, 1000.0);
        let aspect = AspectRatio::VERTICAL;
        assert_eq!(sizing.target_height(HD, aspect, Some(&small)), 540.0);
        assert_eq!(sizing.target_height(HD, aspect, Some(&medium)), 750.0);
        assert_eq!(sizing.target_height(HD, aspect, Some(&huge)), 1080.0);
        assert_eq!(sizing.target_height(HD, aspect, None), 1080.0);
    }

    #[test]
    fn test_sizing_serializes_tagged() {
        let json = serde_json::to_string(&CropSizing::FullHeight).unwrap();
        assert_eq!(json, r#"{"mode":"full_height"}"#);
        let parsed: CropSizing =
            serde_json::from_str(r#"{"mode":"subject","scale":1.4,"min_height_frac":0.4}"#)
                .unwrap();
        assert_eq!(
            parsed,
            CropSizing::Subject {
                scale: 1.4,
                min_height_frac: 0.4
            }
        );
    }
}
