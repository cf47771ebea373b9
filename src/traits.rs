use crate::errors::Result;
use crate::tensor::{InputTensor, OutputTensor};

/// Black-box model execution.
///
/// Implementations validate the raw output once at this boundary, so callers
/// only ever see a well-formed [`OutputTensor`] or an error.
pub trait InferenceEngine: Send + Sync {
    /// Name of the input binding the model expects.
    fn input_name(&self) -> &str;

    /// Run the model on one input tensor.
    fn run(&self, input: &InputTensor) -> Result<OutputTensor>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn input_name(&self) -> &str {
        (**self).input_name()
    }

    fn run(&self, input: &InputTensor) -> Result<OutputTensor> {
        (**self).run(input)
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for std::sync::Arc<E> {
    fn input_name(&self) -> &str {
        (**self).input_name()
    }

    fn run(&self, input: &InputTensor) -> Result<OutputTensor> {
        (**self).run(input)
    }
}
