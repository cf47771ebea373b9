use std::{sync::Arc, time::Duration};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use seg_overlay::{
    assets, display, logging, pipeline::shutdown_runtime, Config, Model, SegOverlayError,
    Segmentation, SegmentationPipeline, TensorEncoder,
};

fn main() -> Result<()> {
    let config = Config::parse();
    logging::init(config.verbose, config.log_filter.as_deref());

    ensure!(config.model_path.exists(), "Model path does not exist");
    ensure!(config.image.exists(), "Image path does not exist");
    let format = config.output_format()?;

    let model_path = match &config.cache_dir {
        Some(cache_dir) => assets::cache_model(&config.model_path, cache_dir)
            .context("Failed to cache model")?,
        None => config.model_path.clone(),
    };

    let model = Model::new(&model_path, config.threads, config.device_id)
        .with_context(|| format!("Failed to load model: {}", model_path.display()))?;
    let image = assets::load_image(&config.image)
        .with_context(|| format!("Failed to open image: {}", config.image.display()))?;

    let pipeline = Arc::new(SegmentationPipeline::new(
        model,
        TensorEncoder::new(config.filter),
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let outcome = runtime.block_on(segment(&pipeline, image, &config));
    let cancelled = matches!(outcome, Err(SegOverlayError::Cancelled));
    shutdown_runtime(runtime, cancelled);

    let segmentation = match outcome {
        Ok(segmentation) => segmentation,
        Err(SegOverlayError::Cancelled) => {
            info!("segmentation cancelled; nothing written");
            return Ok(());
        }
        Err(e) => return Err(e).context("Segmentation failed"),
    };

    let paths = display::save_outputs(
        &segmentation,
        &config.output_dir,
        &config.output_stem(),
        format,
    )
    .context("Failed to save outputs")?;

    info!(
        overlay = %paths.overlay.display(),
        layout = %paths.layout.display(),
        "done"
    );
    Ok(())
}

async fn segment(
    pipeline: &Arc<SegmentationPipeline<Model>>,
    image: image::DynamicImage,
    config: &Config,
) -> seg_overlay::Result<Segmentation> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("segmenting {}", config.image.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let task = pipeline.spawn(image);
    let token = task.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; discarding segmentation");
            token.cancel();
        }
    });

    let outcome = task.outcome().await;
    interrupt.abort();
    spinner.finish_and_clear();
    outcome
}
