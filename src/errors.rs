use std::path::PathBuf;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for the segmentation overlay pipeline.
///
/// The first three variants are the ones the tensor pipeline itself can
/// produce. The rest cover the glue around it (asset loading, the model
/// cache, writing outputs, configuration and task cancellation). None of
/// them are retried: every error is terminal for the current run.
#[derive(Error, Debug)]
pub enum SegOverlayError {
    #[error("Invalid image: {reason}")]
    InvalidImage { reason: String },

    #[error("Unexpected output shape: expected {expected}, got {actual:?}")]
    UnexpectedOutputShape {
        expected: String,
        actual: Vec<usize>,
    },

    #[error("Inference engine error: {operation} failed")]
    InferenceEngine {
        operation: String,
        #[source]
        source: BoxedSource,
    },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: BoxedSource,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Segmentation was cancelled before a result was published")]
    Cancelled,

    #[error("Segmentation worker stopped without a result: {message}")]
    WorkerPanicked { message: String },
}

pub type Result<T> = std::result::Result<T, SegOverlayError>;

impl SegOverlayError {
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            reason: reason.into(),
        }
    }

    pub fn unexpected_shape(expected: impl Into<String>, actual: &[usize]) -> Self {
        Self::UnexpectedOutputShape {
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }

    pub fn engine<E>(operation: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxedSource>,
    {
        Self::InferenceEngine {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Call sites that know the path and operation should build
/// `SegOverlayError::FileSystem` themselves; this is the fallback.
impl From<std::io::Error> for SegOverlayError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

/// Convert image crate errors to image processing errors.
impl From<image::ImageError> for SegOverlayError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// ONNX Runtime failures are opaque to the pipeline and surface unchanged
/// as inference engine errors.
impl From<ort::Error> for SegOverlayError {
    fn from(err: ort::Error) -> Self {
        Self::InferenceEngine {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors only arise when a tensor returned by the engine is reshaped,
/// so they are reported as an output shape mismatch.
impl From<ndarray::ShapeError> for SegOverlayError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::UnexpectedOutputShape {
            expected: format!("a reshapeable tensor ({err})"),
            actual: Vec::new(),
        }
    }
}
