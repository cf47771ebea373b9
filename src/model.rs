use std::path::Path;
use std::time::Instant;

use ndarray::Array4;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    errors::{Result, SegOverlayError},
    tensor::{InputTensor, OutputTensor, INPUT_SHAPE},
    traits::InferenceEngine,
};

/// ONNX Runtime session for a single-input, single-class segmentation model.
pub struct Model {
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

impl Model {
    pub fn new(model_path: &Path, num_threads: usize, device_id: Option<i32>) -> Result<Self> {
        let mut builder = SessionBuilder::new()
            .map_err(|e| SegOverlayError::engine("session builder initialisation", e))?
            .with_intra_threads(num_threads)
            .map_err(|e| SegOverlayError::engine("intra-op thread configuration", e))?;

        if let Some(device_id) = device_id {
            builder = builder
                .with_execution_providers([
                    TensorRTExecutionProvider::default()
                        .with_device_id(device_id)
                        .build(),
                    CUDAExecutionProvider::default()
                        .with_device_id(device_id)
                        .build(),
                ])
                .map_err(|e| SegOverlayError::engine("execution provider registration", e))?;
        }

        let mut session = builder
            .with_memory_pattern(true)
            .map_err(|e| SegOverlayError::engine("memory pattern configuration", e))?
            .commit_from_file(model_path)
            .map_err(|e| {
                SegOverlayError::engine(format!("model load: {}", model_path.display()), e)
            })?;

        let input = session.inputs.first().ok_or_else(|| {
            SegOverlayError::engine("input binding discovery", "model declares no inputs")
        })?;
        let input_name = input.name.clone();
        if let Some(shape) = input.input_type.tensor_shape() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            check_input_dims(&dims)?;
        }

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| {
                SegOverlayError::engine("output binding discovery", "model declares no outputs")
            })?;

        info!(
            model = %model_path.display(),
            input = %input_name,
            output = %output_name,
            "model loaded"
        );

        // initialize model
        let data = Array4::<f32>::zeros(INPUT_SHAPE);
        session
            .run(ort::inputs![input_name.as_str() => TensorRef::from_array_view(&data)
                .map_err(|e| SegOverlayError::engine("warm-up tensor creation", e))?])
            .map_err(|e| SegOverlayError::engine("warm-up run", e))?;

        Ok(Self {
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

impl InferenceEngine for Model {
    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn run(&self, input: &InputTensor) -> Result<OutputTensor> {
        let started = Instant::now();
        let view = input.view();
        let layout = view.as_standard_layout();

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => TensorRef::from_array_view(&layout)
                .map_err(|e| SegOverlayError::engine("input tensor creation", e))?])
            .map_err(|e| SegOverlayError::engine("session run", e))?;

        let scores = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| SegOverlayError::engine("output extraction", e))?
            .to_owned();

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            output_shape = ?scores.shape(),
            "inference finished"
        );
        OutputTensor::from_dyn(scores)
    }
}

/// Static input dimensions must match `[1, 3, 512, 512]`; dynamic axes
/// (reported as non-positive) are accepted.
fn check_input_dims(dims: &[i64]) -> Result<()> {
    let matches = dims.len() == INPUT_SHAPE.len()
        && dims
            .iter()
            .zip(INPUT_SHAPE)
            .all(|(&actual, expected)| actual <= 0 || actual as usize == expected);
    if matches {
        Ok(())
    } else {
        Err(SegOverlayError::engine(
            "input binding validation",
            format!("model expects input {dims:?}, pipeline produces {INPUT_SHAPE:?}"),
        ))
    }
}
