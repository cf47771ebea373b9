pub mod assets;
pub mod config;
pub mod decoder;
pub mod display;
pub mod encoder;
pub mod errors;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod tensor;
pub mod traits;

pub mod mocks;

pub use config::Config;
pub use decoder::MaskDecoder;
pub use encoder::{ResizeFilter, TensorEncoder};
pub use errors::{Result, SegOverlayError};
pub use model::Model;
pub use pipeline::{Segmentation, SegmentationPipeline, SegmentationTask};
pub use tensor::{InputTensor, MaskShape, OutputTensor, TensorDescriptor};
pub use traits::*;
