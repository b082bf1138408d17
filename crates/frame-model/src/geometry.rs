//! Geometry types for subject boxes and crop windows.
//!
//! All coordinates are in source-frame pixels: `(0.0, 0.0)` is the top-left
//! corner, `(width, height)` the bottom-right corner of the frame.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tolerance used for containment and aspect-ratio checks.
pub const GEOMETRY_EPSILON: f64 = 1e-6;

/// Dimensions of a source or output frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width as float.
    pub fn w(&self) -> f64 {
        self.width as f64
    }

    /// Height as float.
    pub fn h(&self) -> f64 {
        self.height as f64
    }

    /// Width divided by height.
    pub fn aspect(&self) -> f64 {
        self.w() / self.h().max(1.0)
    }

    /// Length of the frame diagonal in pixels.
    pub fn diagonal(&self) -> f64 {
        (self.w().powi(2) + self.h().powi(2)).sqrt()
    }

    /// The frame center.
    pub fn center(&self) -> Point2D {
        Point2D::new(self.w() / 2.0, self.h() / 2.0)
    }

    /// Whether both dimensions are non-zero.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A target aspect ratio expressed as an integer `width:height` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// The 9:16 portrait ratio used by short-form vertical video.
    pub const VERTICAL: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height.
    pub fn value(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::VERTICAL
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| format!("expected W:H, got '{s}'"))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("bad width in '{s}'"))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("bad height in '{s}'"))?;
        let ratio = AspectRatio::new(width, height);
        if !ratio.is_valid() {
            return Err(format!("aspect ratio terms must be positive, got '{s}'"));
        }
        Ok(ratio)
    }
}

/// A 2D point in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a box of the given size centered on `(cx, cy)`.
    pub fn centered(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(self.cx(), self.cy())
    }

    /// Whether all four components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Compute Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Intersect the box with the frame rectangle.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn clip_to(&self, frame: FrameSize) -> Option<BoundingBox> {
        let x1 = self.x.max(0.0);
        let y1 = self.y.max(0.0);
        let x2 = self.x2().min(frame.w());
        let y2 = self.y2().min(frame.h());

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
    }
}

/// An aspect-locked crop rectangle in source-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropWindow {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropWindow {
    pub fn new(center_x: f64, center_y: f64, width: f64, height: f64) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
        }
    }

    /// Create a window of the given height whose width follows `aspect`.
    pub fn from_height(center_x: f64, center_y: f64, height: f64, aspect: AspectRatio) -> Self {
        Self::new(center_x, center_y, height * aspect.value(), height)
    }

    /// The largest window with the given aspect that fits the frame, centered.
    pub fn largest_centered(frame: FrameSize, aspect: AspectRatio) -> Self {
        let (width, height) = largest_fitting_size(frame, aspect);
        let center = frame.center();
        Self::new(center.x, center.y, width, height)
    }

    pub fn left(&self) -> f64 {
        self.center_x - self.width / 2.0
    }

    pub fn top(&self) -> f64 {
        self.center_y - self.height / 2.0
    }

    pub fn right(&self) -> f64 {
        self.center_x + self.width / 2.0
    }

    pub fn bottom(&self) -> f64 {
        self.center_y + self.height / 2.0
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(self.center_x, self.center_y)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Width divided by height.
    pub fn aspect(&self) -> f64 {
        if self.height <= 0.0 {
            return 0.0;
        }
        self.width / self.height
    }

    /// Whether the window's aspect matches `aspect` within tolerance.
    pub fn has_aspect(&self, aspect: AspectRatio) -> bool {
        (self.aspect() - aspect.value()).abs() <= 1e-6 * aspect.value().max(1.0)
    }

    /// Whether the window lies entirely inside the frame.
    pub fn fits_within(&self, frame: FrameSize) -> bool {
        self.left() >= -GEOMETRY_EPSILON
            && self.top() >= -GEOMETRY_EPSILON
            && self.right() <= frame.w() + GEOMETRY_EPSILON
            && self.bottom() <= frame.h() + GEOMETRY_EPSILON
    }

    /// Scale the window about its center, keeping the aspect ratio.
    ///
    /// A zoom of 2.0 halves both dimensions.
    pub fn zoomed(&self, zoom: f64) -> CropWindow {
        let zoom = if zoom.is_finite() && zoom > 0.0 {
            zoom
        } else {
            1.0
        };
        Self::new(
            self.center_x,
            self.center_y,
            self.width / zoom,
            self.height / zoom,
        )
    }

    /// Shrink (aspect-preserving) and translate the window so it lies
    /// inside the frame.
    pub fn clamp_to(&self, frame: FrameSize) -> ClampedWindow {
        let mut width = self.width.max(0.0);
        let mut height = self.height.max(0.0);
        let mut shrunk = false;

        let scale = if width > 0.0 && height > 0.0 {
            (frame.w() / width).min(frame.h() / height)
        } else {
            1.0
        };
        if scale < 1.0 {
            width *= scale;
            height *= scale;
            shrunk = true;
        }

        let center_x = clamp_center(self.center_x, width, frame.w());
        let center_y = clamp_center(self.center_y, height, frame.h());
        let translated = (center_x - self.center_x).abs() > GEOMETRY_EPSILON
            || (center_y - self.center_y).abs() > GEOMETRY_EPSILON;

        ClampedWindow {
            window: CropWindow::new(center_x, center_y, width, height),
            shrunk,
            translated,
        }
    }

    /// Convert to an integer pixel rectangle inside the frame.
    ///
    /// The rectangle is at least one pixel in each dimension.
    pub fn to_pixel_rect(&self, frame: FrameSize) -> PixelRect {
        let width = (self.width.round().max(1.0) as u32).min(frame.width.max(1));
        let height = (self.height.round().max(1.0) as u32).min(frame.height.max(1));
        let max_x = frame.width.saturating_sub(width);
        let max_y = frame.height.saturating_sub(height);
        let x = (self.left().round().max(0.0) as u32).min(max_x);
        let y = (self.top().round().max(0.0) as u32).min(max_y);
        PixelRect {
            x,
            y,
            width,
            height,
        }
    }
}

/// Result of clamping a window to the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampedWindow {
    pub window: CropWindow,
    /// The window had to be shrunk to fit.
    pub shrunk: bool,
    /// The window had to be moved to fit.
    pub translated: bool,
}

/// Integer pixel rectangle used for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest `(width, height)` with the given aspect that fits the frame.
pub fn largest_fitting_size(frame: FrameSize, aspect: AspectRatio) -> (f64, f64) {
    let ratio = aspect.value();
    if frame.aspect() >= ratio {
        let height = frame.h();
        (height * ratio, height)
    } else {
        let width = frame.w();
        (width, width / ratio)
    }
}

fn clamp_center(center: f64, extent: f64, limit: f64) -> f64 {
    let half = extent / 2.0;
    if half * 2.0 >= limit {
        return limit / 2.0;
    }
    let center = if center.is_finite() { center } else { limit / 2.0 };
    center.clamp(half, limit - half)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: FrameSize = FrameSize {
        width: 1920,
        height: 1080,
    };

    #[test]
    fn test_aspect_ratio_parse() {
        let ratio: AspectRatio = "9:16".parse().unwrap();
        assert_eq!(ratio, AspectRatio::VERTICAL);
        assert!((ratio.value() - 0.5625).abs() < 1e-12);
        assert!("9x16".parse::<AspectRatio>().is_err());
        assert!("0:16".parse::<AspectRatio>().is_err());
        assert_eq!(AspectRatio::new(4, 5).to_string(), "4:5");
    }

    #[test]
    fn test_bbox_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-9);
        assert_eq!(a.iou(&BoundingBox::new(20.0, 20.0, 5.0, 5.0)), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bbox_clip() {
        let frame = FrameSize::new(100, 100);
        let clipped = BoundingBox::new(-10.0, 90.0, 30.0, 30.0)
            .clip_to(frame)
            .unwrap();
        assert_eq!(clipped, BoundingBox::new(0.0, 90.0, 20.0, 10.0));
        assert!(BoundingBox::new(150.0, 0.0, 10.0, 10.0)
            .clip_to(frame)
            .is_none());
    }

    #[test]
    fn test_largest_centered_landscape() {
        let window = CropWindow::largest_centered(HD, AspectRatio::VERTICAL);
        assert!((window.height - 1080.0).abs() < 1e-9);
        assert!((window.width - 607.5).abs() < 1e-9);
        assert!((window.center_x - 960.0).abs() < 1e-9);
        assert!(window.fits_within(HD));
        assert!(window.has_aspect(AspectRatio::VERTICAL));
    }

    #[test]
    fn test_largest_centered_narrow_frame() {
        let frame = FrameSize::new(500, 1000);
        let window = CropWindow::largest_centered(frame, AspectRatio::VERTICAL);
        assert!((window.width - 500.0).abs() < 1e-9);
        assert!((window.height - 500.0 * 16.0 / 9.0).abs() < 1e-9);
        assert!(window.fits_within(frame));
    }

    #[test]
    fn test_clamp_translates_without_shrinking() {
        let window = CropWindow::from_height(50.0, 540.0, 1080.0, AspectRatio::VERTICAL);
        let clamped = window.clamp_to(HD);
        assert!(clamped.translated);
        assert!(!clamped.shrunk);
        assert!((clamped.window.left() - 0.0).abs() < 1e-9);
        assert!(clamped.window.fits_within(HD));
    }

    #[test]
    fn test_clamp_shrinks_oversized_window() {
        let window = CropWindow::from_height(960.0, 540.0, 1400.0, AspectRatio::VERTICAL);
        let clamped = window.clamp_to(HD);
        assert!(clamped.shrunk);
        assert!((clamped.window.height - 1080.0).abs() < 1e-9);
        assert!(clamped.window.has_aspect(AspectRatio::VERTICAL));
        assert!(clamped.window.fits_within(HD));
    }

    #[test]
    fn test_zoomed_keeps_center_and_aspect() {
        let window = CropWindow::from_height(900.0, 540.0, 1080.0, AspectRatio::VERTICAL);
        let zoomed = window.zoomed(1.2);
        assert_eq!(zoomed.center(), window.center());
        assert!((zoomed.height - 900.0).abs() < 1e-9);
        assert!(zoomed.has_aspect(AspectRatio::VERTICAL));
    }

    #[test]
    fn test_pixel_rect_stays_inside() {
        let window = CropWindow::new(1919.6, 540.0, 607.5, 1080.0);
        let rect = window.to_pixel_rect(HD);
        assert!(rect.x + rect.width <= 1920);
        assert!(rect.y + rect.height <= 1080);
        assert_eq!(rect.height, 1080);
        assert_eq!(rect.width, 608);
    }

    proptest::proptest! {
        #[test]
        fn prop_clamped_window_fits_and_keeps_aspect(
            cx in -500.0f64..2500.0,
            cy in -500.0f64..1600.0,
            height in 10.0f64..3000.0,
        ) {
            let window = CropWindow::from_height(cx, cy, height, AspectRatio::VERTICAL);
            let clamped = window.clamp_to(HD).window;
            proptest::prop_assert!(clamped.fits_within(HD));
            proptest::prop_assert!(clamped.has_aspect(AspectRatio::VERTICAL));
        }
    }

    #[test]
    fn test_point_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
        assert_eq!(b.distance_to(&b), 0.0);
    }
}
