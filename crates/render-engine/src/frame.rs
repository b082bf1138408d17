//! Decoded frames.

use image::RgbImage;
use reframe_model::geometry::FrameSize;

/// One decoded RGB frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based frame index.
    pub index: u64,
    /// Presentation time in seconds.
    pub timestamp_secs: f64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, timestamp_secs: f64, image: RgbImage) -> Self {
        Self {
            index,
            timestamp_secs,
            image,
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }
}
