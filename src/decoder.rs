use image::{Rgba, RgbaImage};
use ndarray::ArrayViewD;
use rayon::prelude::*;
use tracing::debug;

use crate::errors::{Result, SegOverlayError};
use crate::tensor::OutputTensor;

/// Scores strictly above this value are part of the mask.
pub const MASK_THRESHOLD: f32 = 0.5;
/// Opaque red used for masked pixels.
pub const HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Fully transparent black used everywhere else.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Turns single-class segmentation scores into a two-colour RGBA mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskDecoder {
    threshold: f32,
    highlight: Rgba<u8>,
}

impl Default for MaskDecoder {
    fn default() -> Self {
        Self {
            threshold: MASK_THRESHOLD,
            highlight: HIGHLIGHT,
        }
    }
}

impl MaskDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a tensor whose shape has already been validated.
    ///
    /// The mask has the tensor's own `W x H`, whatever the input resolution was.
    pub fn decode(&self, output: &OutputTensor) -> Result<RgbaImage> {
        let (height, width) = (output.height(), output.width());
        let (mask_width, mask_height) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(SegOverlayError::unexpected_shape(
                    "spatial dimensions that fit in u32",
                    output.descriptor().dims(),
                ))
            }
        };

        let scores = output.scores();
        let row_len = width * 4;
        let mut buffer = vec![0u8; row_len * height];
        buffer
            .par_chunks_exact_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
                    pixel.copy_from_slice(&self.classify(scores[[y, x]]).0);
                }
            });

        let highlighted = buffer.chunks_exact(4).filter(|p| p[3] != 0).count();
        debug!(width, height, highlighted, "decoded mask");

        RgbaImage::from_raw(mask_width, mask_height, buffer).ok_or_else(|| {
            SegOverlayError::unexpected_shape(
                "a buffer matching the mask dimensions",
                output.descriptor().dims(),
            )
        })
    }

    /// Validate an arbitrary engine output and decode it.
    pub fn decode_array(&self, output: ArrayViewD<'_, f32>) -> Result<RgbaImage> {
        let output = OutputTensor::from_dyn(output.to_owned())?;
        self.decode(&output)
    }

    fn classify(&self, score: f32) -> Rgba<u8> {
        if score > self.threshold {
            self.highlight
        } else {
            TRANSPARENT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::prelude::*;

    fn output(h: usize, w: usize, values: Vec<f32>) -> Result<OutputTensor> {
        OutputTensor::from_array(Array4::from_shape_vec((1, 1, h, w), values)?)
    }

    #[test]
    fn test_all_zero_scores_are_transparent() -> Result<()> {
        let mask = MaskDecoder::new().decode(&output(4, 4, vec![0.0; 16])?)?;
        assert_eq!(mask.dimensions(), (4, 4));
        assert!(mask.pixels().all(|p| *p == TRANSPARENT));
        Ok(())
    }

    #[test]
    fn test_two_by_two_scores() -> Result<()> {
        // rows are y, columns are x
        let mask = MaskDecoder::new().decode(&output(2, 2, vec![0.9, 0.1, 0.6, 0.4])?)?;
        assert_eq!(*mask.get_pixel(0, 0), HIGHLIGHT);
        assert_eq!(*mask.get_pixel(1, 0), TRANSPARENT);
        assert_eq!(*mask.get_pixel(0, 1), HIGHLIGHT);
        assert_eq!(*mask.get_pixel(1, 1), TRANSPARENT);
        Ok(())
    }

    #[test]
    fn test_threshold_is_strict() -> Result<()> {
        let above = 0.5 + f32::EPSILON;
        let mask = MaskDecoder::new().decode(&output(1, 2, vec![0.5, above])?)?;
        assert_eq!(*mask.get_pixel(0, 0), TRANSPARENT);
        assert_eq!(*mask.get_pixel(1, 0), HIGHLIGHT);
        Ok(())
    }

    #[test]
    fn test_dimensions_follow_tensor_not_input() -> Result<()> {
        let values = (0..6 * 10).map(|i| (i % 2) as f32).collect();
        let mask = MaskDecoder::new().decode(&output(6, 10, values)?)?;
        assert_eq!(mask.dimensions(), (10, 6));
        assert_eq!(*mask.get_pixel(1, 0), HIGHLIGHT);
        assert_eq!(*mask.get_pixel(0, 5), TRANSPARENT);
        Ok(())
    }

    #[test]
    fn test_decoding_is_idempotent() -> Result<()> {
        let values = (0..64 * 48).map(|i| ((i * 37) % 100) as f32 / 100.0).collect();
        let tensor = output(48, 64, values)?;
        let decoder = MaskDecoder::new();
        let first = decoder.decode(&tensor)?;
        let second = decoder.decode(&tensor)?;
        assert_eq!(first.as_raw(), second.as_raw());
        Ok(())
    }

    #[test]
    fn test_nan_scores_are_transparent() -> Result<()> {
        let mask = MaskDecoder::new().decode(&output(1, 1, vec![f32::NAN])?)?;
        assert_eq!(*mask.get_pixel(0, 0), TRANSPARENT);
        Ok(())
    }

    #[test]
    fn test_malformed_shapes_fail() {
        let decoder = MaskDecoder::new();
        let missing_dim = ArrayD::<f32>::zeros(IxDyn(&[1, 4, 4]));
        let multi_class = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 4, 4]));

        for tensor in [missing_dim, multi_class] {
            assert!(matches!(
                decoder.decode_array(tensor.view()),
                Err(SegOverlayError::UnexpectedOutputShape { .. })
            ));
        }
    }

    #[test]
    fn test_decode_array_accepts_valid_shape() -> Result<()> {
        let tensor = ArrayD::<f32>::from_elem(IxDyn(&[1, 1, 3, 5]), 0.75);
        let mask = MaskDecoder::new().decode_array(tensor.view())?;
        assert_eq!(mask.dimensions(), (5, 3));
        assert!(mask.pixels().all(|p| *p == HIGHLIGHT));
        Ok(())
    }
}
