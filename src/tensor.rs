//! Fixed-shape tensors exchanged with the inference engine.
//!
//! The input is always `[1, 3, 512, 512]` in channel-planar, row-major
//! order. The output is validated once when it leaves the engine, so the
//! mask decoder never has to inspect shapes itself.

use ndarray::prelude::*;

use crate::errors::{Result, SegOverlayError};

/// Spatial resolution the model consumes.
pub const INPUT_SIZE: usize = 512;
/// Colour channels of the model input, in R, G, B order.
pub const INPUT_CHANNELS: usize = 3;
/// Full input shape: batch, channels, height, width.
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE];
/// Number of `f32` values in one input tensor.
pub const INPUT_LEN: usize = INPUT_CHANNELS * INPUT_SIZE * INPUT_SIZE;

const MASK_LAYOUT: &str = "[1, 1, H, W] with H > 0 and W > 0";

/// Rank and per-dimension sizes of a tensor, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescriptor {
    dims: Vec<usize>,
}

impl TensorDescriptor {
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: dims.to_vec(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Interpret the descriptor as a single-class mask `[1, 1, H, W]`.
    pub fn mask_shape(&self) -> Result<MaskShape> {
        match self.dims.as_slice() {
            &[1, 1, height, width] if height > 0 && width > 0 => Ok(MaskShape { height, width }),
            dims => Err(SegOverlayError::unexpected_shape(MASK_LAYOUT, dims)),
        }
    }
}

/// Spatial size of a validated mask tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskShape {
    pub height: usize,
    pub width: usize,
}

/// Normalised model input.
///
/// Invariant: the array has shape [`INPUT_SHAPE`] and is stored in standard
/// (C-contiguous) layout, so the flat buffer is the R plane followed by the
/// G plane and the B plane.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    pub fn from_array(data: Array4<f32>) -> Result<Self> {
        if data.shape() != INPUT_SHAPE {
            return Err(SegOverlayError::invalid_image(format!(
                "input tensor must have shape {:?}, got {:?}",
                INPUT_SHAPE,
                data.shape()
            )));
        }
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Ok(Self { data })
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Flat channel-planar buffer of length [`INPUT_LEN`].
    pub fn as_slice(&self) -> &[f32] {
        debug_assert!(
            self.data.is_standard_layout(),
            "InputTensor must stay in standard layout"
        );
        self.data.as_slice().unwrap_or_default()
    }

    /// One `512 x 512` plane: 0 = red, 1 = green, 2 = blue.
    pub fn plane(&self, channel: usize) -> ArrayView2<'_, f32> {
        self.data.slice(s![0, channel, .., ..])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Raw model output, validated to the single-class mask layout.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    data: Array4<f32>,
    shape: MaskShape,
}

impl OutputTensor {
    /// Validate an engine output of arbitrary rank.
    pub fn from_dyn(data: ArrayD<f32>) -> Result<Self> {
        let shape = TensorDescriptor::new(data.shape()).mask_shape()?;
        let data = data.into_dimensionality::<Ix4>()?;
        Ok(Self { data, shape })
    }

    pub fn from_array(data: Array4<f32>) -> Result<Self> {
        Self::from_dyn(data.into_dyn())
    }

    pub fn descriptor(&self) -> TensorDescriptor {
        TensorDescriptor::new(self.data.shape())
    }

    pub fn shape(&self) -> MaskShape {
        self.shape
    }

    pub fn height(&self) -> usize {
        self.shape.height
    }

    pub fn width(&self) -> usize {
        self.shape.width
    }

    /// Scores at `[0, 0, y, x]`.
    pub fn scores(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![0, 0, .., ..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_shape_accepts_single_class() -> Result<()> {
        let shape = TensorDescriptor::new(&[1, 1, 4, 3]).mask_shape()?;
        assert_eq!(
            shape,
            MaskShape {
                height: 4,
                width: 3
            }
        );
        Ok(())
    }

    #[test]
    fn test_mask_shape_rejects_other_layouts() {
        let rejected: [&[usize]; 6] = [
            &[1, 512, 512],
            &[1, 2, 512, 512],
            &[2, 1, 512, 512],
            &[1, 1, 0, 512],
            &[1, 1, 512, 0],
            &[1, 1, 1, 512, 512],
        ];
        for dims in rejected {
            let result = TensorDescriptor::new(dims).mask_shape();
            assert!(
                matches!(
                    result,
                    Err(SegOverlayError::UnexpectedOutputShape { ref actual, .. }) if actual == dims
                ),
                "shape {dims:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_input_tensor_requires_fixed_shape() {
        let result = InputTensor::from_array(Array4::zeros((1, 3, 256, 256)));
        assert!(matches!(result, Err(SegOverlayError::InvalidImage { .. })));
    }

    #[test]
    fn test_input_tensor_normalises_layout() -> Result<()> {
        // build in (h, w, c) memory order, then permute to (1, c, h, w)
        let hwc = Array3::from_shape_fn((INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS), |(_, _, c)| {
            c as f32
        });
        let chw = hwc.permuted_axes([2, 0, 1]).insert_axis(Axis(0));
        assert!(!chw.is_standard_layout());

        let tensor = InputTensor::from_array(chw)?;
        let plane = INPUT_SIZE * INPUT_SIZE;
        let flat = tensor.as_slice();
        assert_eq!(flat.len(), INPUT_LEN);
        assert!(flat[..plane].iter().all(|&v| v == 0.0));
        assert!(flat[plane..2 * plane].iter().all(|&v| v == 1.0));
        assert!(flat[2 * plane..].iter().all(|&v| v == 2.0));
        Ok(())
    }

    #[test]
    fn test_input_tensor_slice_matches_logical_order() -> Result<()> {
        // reversed-stride view: logical order differs from memory order
        let source = Array4::from_shape_fn(INPUT_SHAPE, |(_, c, y, x)| {
            (c * INPUT_SIZE * INPUT_SIZE + y * INPUT_SIZE + x) as f32
        });
        let flipped = source.slice(s![.., ..;-1, .., ..]).to_owned();
        let reversed = flipped.slice(s![.., ..;-1, .., ..]);
        let tensor = InputTensor::from_array(reversed.to_owned())?;

        let flat = tensor.as_slice();
        assert_eq!(flat.len(), INPUT_LEN);
        assert!(flat.iter().copied().eq(source.iter().copied()));
        assert!(tensor.view().is_standard_layout());
        Ok(())
    }

    #[test]
    fn test_output_tensor_exposes_scores() -> Result<()> {
        let data = Array4::from_shape_vec((1, 1, 2, 3), vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5])?;
        let output = OutputTensor::from_array(data)?;
        assert_eq!(output.height(), 2);
        assert_eq!(output.width(), 3);
        assert_eq!(output.scores()[[1, 2]], 0.5);
        assert_eq!(output.descriptor().rank(), 4);
        Ok(())
    }

    #[test]
    fn test_output_tensor_rejects_missing_dimension() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[1, 4, 4]));
        assert!(matches!(
            OutputTensor::from_dyn(data),
            Err(SegOverlayError::UnexpectedOutputShape { .. })
        ));
    }
}
