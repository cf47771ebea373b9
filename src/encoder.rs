use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use tracing::debug;

use crate::errors::{Result, SegOverlayError};
use crate::tensor::{InputTensor, INPUT_SIZE};

/// Resampling used to bring the source image to the model resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ResizeFilter {
    Nearest,
    /// Smoothing resample, closest to a platform "filtered" bitmap scale.
    #[default]
    Bilinear,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
        }
    }
}

/// Converts decoded images into the model's normalised, channel-planar input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TensorEncoder {
    filter: ResizeFilter,
}

impl TensorEncoder {
    pub const fn new(filter: ResizeFilter) -> Self {
        Self { filter }
    }

    pub const fn filter(&self) -> ResizeFilter {
        self.filter
    }

    /// Resize to `512 x 512`, drop alpha, scale to `[0, 1]` and lay the
    /// channels out as R plane, G plane, B plane.
    pub fn encode(&self, image: &DynamicImage) -> Result<InputTensor> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(SegOverlayError::invalid_image(format!(
                "source image is {width}x{height}"
            )));
        }

        let resized = self.resize(image.to_rgb8());
        let size = INPUT_SIZE as u32;
        if resized.dimensions() != (size, size) {
            let (w, h) = resized.dimensions();
            return Err(SegOverlayError::invalid_image(format!(
                "resampling produced {w}x{h} instead of {size}x{size}"
            )));
        }

        // as_ndarray3 yields (channel, y, x) over the interleaved buffer
        let tensor = resized
            .as_ndarray3()
            .slice_move(s![NewAxis, .., .., ..])
            .mapv(|v| f32::from(v) / 255.0);

        debug!(
            source_width = width,
            source_height = height,
            filter = ?self.filter,
            "encoded input tensor"
        );
        InputTensor::from_array(tensor)
    }

    fn resize(&self, image: RgbImage) -> RgbImage {
        let size = INPUT_SIZE as u32;
        if image.dimensions() == (size, size) {
            return image;
        }
        imageops::resize(&image, size, size, self.filter.into())
    }
}
