//! Final window resolution.
//!
//! Combines the smoothed crop window with the zoom factor. The zoomed window
//! keeps the crop's center; when it cannot fit, the zoom gives way, never the
//! center or the aspect ratio.

use reframe_model::geometry::{AspectRatio, CropWindow, FrameSize, GEOMETRY_EPSILON};

/// The window to extract and the zoom that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composition {
    pub window: CropWindow,
    pub effective_zoom: f64,
    /// The frame cannot hold a full-height window at the target aspect.
    pub degraded: bool,
}

/// Whether a full-height window at `aspect` fits the frame.
pub fn is_feasible(frame: FrameSize, aspect: AspectRatio) -> bool {
    frame.aspect() + GEOMETRY_EPSILON >= aspect.value()
}

/// Resolve the final extraction window for one frame.
///
/// `ceiling` is the largest zoom allowed (see `ZoomConfig::zoom_ceiling`).
pub fn compose(
    window: &CropWindow,
    zoom: f64,
    frame: FrameSize,
    aspect: AspectRatio,
    ceiling: f64,
) -> Composition {
    if !is_feasible(frame, aspect) {
        return Composition {
            window: CropWindow::largest_centered(frame, aspect),
            effective_zoom: 1.0,
            degraded: true,
        };
    }

    let base = if window.has_aspect(aspect) {
        *window
    } else {
        CropWindow::from_height(window.center_x, window.center_y, window.height, aspect)
    };
    let base = base.clamp_to(frame).window;

    let mut zoom = if zoom.is_finite() {
        zoom.clamp(1.0, ceiling.max(1.0))
    } else {
        1.0
    };

    loop {
        let candidate = base.zoomed(zoom);
        if candidate.fits_within(frame) && candidate.has_aspect(aspect) {
            return Composition {
                window: candidate,
                effective_zoom: zoom,
                degraded: false,
            };
        }
        if zoom <= 1.0 {
            break;
        }
        zoom = 1.0 + (zoom - 1.0) / 2.0;
        if zoom - 1.0 < 1e-4 {
            zoom = 1.0;
        }
    }

    Composition {
        window: CropWindow::largest_centered(frame, aspect),
        effective_zoom: 1.0,
        degraded: true,
    }
}
