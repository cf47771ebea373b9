use std::sync::{Arc, Barrier};

use ndarray::prelude::*;

use crate::errors::{Result, SegOverlayError};
use crate::tensor::{InputTensor, OutputTensor};
use crate::traits::InferenceEngine;

/// Engine whose score is the red channel of the input, so anything redder
/// than half intensity ends up in the mask.
#[derive(Debug, Clone)]
pub struct RedChannelEngine {
    input_name: String,
}

impl Default for RedChannelEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RedChannelEngine {
    pub fn new() -> Self {
        Self {
            input_name: "input".to_string(),
        }
    }
}

impl InferenceEngine for RedChannelEngine {
    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn run(&self, input: &InputTensor) -> Result<OutputTensor> {
        let scores = input
            .plane(0)
            .to_owned()
            .insert_axis(Axis(0))
            .insert_axis(Axis(0));
        OutputTensor::from_array(scores)
    }
}

/// Engine that returns the same raw output for every call, validated the way
/// a real engine output is.
#[derive(Debug, Clone)]
pub struct FixedOutputEngine {
    output: ArrayD<f32>,
}

impl FixedOutputEngine {
    pub fn new(output: ArrayD<f32>) -> Self {
        Self { output }
    }
}

impl InferenceEngine for FixedOutputEngine {
    fn input_name(&self) -> &str {
        "input"
    }

    fn run(&self, _input: &InputTensor) -> Result<OutputTensor> {
        OutputTensor::from_dyn(self.output.clone())
    }
}

/// Engine that always fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingEngine;

impl InferenceEngine for FailingEngine {
    fn input_name(&self) -> &str {
        "input"
    }

    fn run(&self, _input: &InputTensor) -> Result<OutputTensor> {
        Err(SegOverlayError::engine("session run", "mock engine failure"))
    }
}

/// Engine that blocks inside `run` until released.
///
/// `run` first waits on `started` (so the caller knows inference is in
/// progress), then on `release`, then answers like [`RedChannelEngine`].
/// Both barriers have two parties: the engine and the caller.
#[derive(Debug, Clone)]
pub struct GatedEngine {
    started: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl Default for GatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GatedEngine {
    pub fn new() -> Self {
        Self {
            started: Arc::new(Barrier::new(2)),
            release: Arc::new(Barrier::new(2)),
        }
    }

    /// Block until the engine has entered `run`.
    pub fn wait_started(&self) {
        self.started.wait();
    }

    /// Let a blocked `run` finish.
    pub fn release(&self) {
        self.release.wait();
    }
}

impl InferenceEngine for GatedEngine {
    fn input_name(&self) -> &str {
        "input"
    }

    fn run(&self, input: &InputTensor) -> Result<OutputTensor> {
        self.started.wait();
        self.release.wait();
        RedChannelEngine::new().run(input)
    }
}

/// Engine that panics inside `run`.
#[derive(Debug, Clone, Copy)]
pub struct PanickingEngine;

impl InferenceEngine for PanickingEngine {
    fn input_name(&self) -> &str {
        "input"
    }

    fn run(&self, _input: &InputTensor) -> Result<OutputTensor> {
        panic!("mock engine panicked")
    }
}
