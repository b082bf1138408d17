//! Frame compositor: extracts the crop window and scales it to the output.

use image::imageops::{self, FilterType};
use image::RgbImage;
use reframe_core::config::ResampleFilter;
use reframe_model::geometry::{CropWindow, FrameSize};

/// Crops and resizes source frames to the output resolution.
#[derive(Debug, Clone)]
pub struct FrameCompositor {
    output: FrameSize,
    filter: FilterType,
}

impl FrameCompositor {
    pub fn new(output: FrameSize, resample: ResampleFilter) -> Self {
        Self {
            output,
            filter: filter_type(resample),
        }
    }

    pub fn output(&self) -> FrameSize {
        self.output
    }

    /// Extract `window` from `source` and scale it to the output size.
    pub fn compose(&self, source: &RgbImage, window: &CropWindow) -> RgbImage {
        let frame = FrameSize::new(source.width(), source.height());
        let rect = window.to_pixel_rect(frame);
        let cropped =
            imageops::crop_imm(source, rect.x, rect.y, rect.width, rect.height).to_image();

        if cropped.width() == self.output.width && cropped.height() == self.output.height {
            return cropped;
        }
        imageops::resize(&cropped, self.output.width, self.output.height, self.filter)
    }
}

fn filter_type(resample: ResampleFilter) -> FilterType {
    match resample {
        ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        ResampleFilter::CatmullRom => FilterType::CatmullRom,
        ResampleFilter::Triangle => FilterType::Triangle,
    }
}
