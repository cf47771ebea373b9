//! Encode, infer, decode as one sequential unit of work.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, RgbaImage};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::decoder::MaskDecoder;
use crate::encoder::TensorEncoder;
use crate::errors::{Result, SegOverlayError};
use crate::traits::InferenceEngine;

/// The two images handed to the display layer.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub original: DynamicImage,
    pub mask: RgbaImage,
}

pub struct SegmentationPipeline<E: InferenceEngine> {
    engine: E,
    encoder: TensorEncoder,
    decoder: MaskDecoder,
}

impl<E: InferenceEngine> SegmentationPipeline<E> {
    pub fn new(engine: E, encoder: TensorEncoder) -> Self {
        Self {
            engine,
            encoder,
            decoder: MaskDecoder::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Produce the mask for `image`. Either the whole mask is returned or
    /// nothing is.
    pub fn segment(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let started = Instant::now();
        let input = self.encoder.encode(image)?;
        debug!(binding = self.engine.input_name(), "running inference");
        let output = self.engine.run(&input)?;
        let mask = self.decoder.decode(&output)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            mask_width = mask.width(),
            mask_height = mask.height(),
            "segmentation finished"
        );
        Ok(mask)
    }

    pub fn run(&self, original: DynamicImage) -> Result<Segmentation> {
        let mask = self.segment(&original)?;
        Ok(Segmentation { original, mask })
    }
}

impl<E: InferenceEngine + 'static> SegmentationPipeline<E> {
    /// Run the pipeline on tokio's blocking pool.
    ///
    /// The result is delivered at most once through the returned task. Once
    /// the task is cancelled, a result that arrives later is dropped.
    pub fn spawn(self: &Arc<Self>, original: DynamicImage) -> SegmentationTask {
        let pipeline = Arc::clone(self);
        let token = CancellationToken::new();
        let (sender, receiver) = oneshot::channel();

        let worker_token = token.clone();
        let handle = tokio::task::spawn_blocking(move || {
            if worker_token.is_cancelled() {
                debug!("segmentation cancelled before start");
                return;
            }
            let result = pipeline.run(original);
            if worker_token.is_cancelled() {
                debug!("segmentation cancelled; discarding late result");
                return;
            }
            if sender.send(result).is_err() {
                debug!("segmentation receiver dropped; discarding result");
            }
        });

        SegmentationTask {
            receiver,
            token,
            handle,
        }
    }
}

/// Handle to an in-flight segmentation.
pub struct SegmentationTask {
    receiver: oneshot::Receiver<Result<Segmentation>>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SegmentationTask {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the single result.
    ///
    /// Returns `Err(Cancelled)` when the task was cancelled first, and
    /// `Err(WorkerPanicked)` when the worker died without publishing anything.
    pub async fn outcome(self) -> Result<Segmentation> {
        let Self {
            receiver,
            token,
            handle,
        } = self;

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(SegOverlayError::Cancelled),
            received = receiver => match received {
                Ok(result) => result,
                Err(_) => Err(SegOverlayError::Cancelled),
            },
        };

        if token.is_cancelled() {
            // the blocking worker cannot be interrupted; let it finish on its own
            drop(handle);
            return result;
        }

        match handle.await {
            Ok(()) => result,
            Err(e) => {
                let message = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                };
                warn!(%message, "segmentation worker panicked");
                Err(SegOverlayError::WorkerPanicked { message })
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}

/// Tear down the runtime that ran a segmentation.
///
/// Dropping a runtime waits for every blocking task, including an inference
/// whose result was already discarded. After a cancellation the runtime is
/// shut down in the background instead, so the process can exit right away.
pub fn shutdown_runtime(runtime: Runtime, cancelled: bool) {
    if cancelled {
        debug!("shutting down runtime without waiting for inference");
        runtime.shutdown_background();
    } else {
        drop(runtime);
    }
}
