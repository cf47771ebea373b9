use std::path::PathBuf;
use std::thread;

use clap::{ArgAction, Parser};
use image::ImageFormat;

use crate::encoder::ResizeFilter;
use crate::errors::{Result, SegOverlayError};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Image to segment
    pub image: PathBuf,

    #[arg(short, long)]
    pub model_path: PathBuf,

    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Copy the model here once and load it from the copy
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    #[arg(short, long, default_value = "png", value_parser = check_format)]
    pub format: String,

    #[arg(long, value_enum, default_value_t = ResizeFilter::Bilinear)]
    pub filter: ResizeFilter,

    /// GPU device for the TensorRT/CUDA execution providers
    #[arg(short, long)]
    pub device_id: Option<i32>,

    #[arg(short, long, default_value_t = default_threads())]
    pub threads: usize,

    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// tracing filter directive, overrides RUST_LOG and -v
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl Config {
    pub fn output_format(&self) -> Result<ImageFormat> {
        ImageFormat::from_extension(&self.format).ok_or_else(|| SegOverlayError::Configuration {
            message: format!("{} is not a known image format", self.format),
        })
    }

    /// File stem used for every written view.
    pub fn output_stem(&self) -> String {
        self.image
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    }
}

fn default_threads() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

fn check_format(s: &str) -> std::result::Result<String, String> {
    let supported: Vec<_> = ImageFormat::all()
        .filter(|f| f.writing_enabled())
        .flat_map(|f| f.extensions_str())
        .map(|s| format!("`{}`", s))
        .collect();
    let supported_message = format!("Supported formats: {}", supported.join(", "));

    let format = ImageFormat::from_extension(s)
        .ok_or(format!("{} is not supported. {}", s, supported_message))?;
    if !format.writing_enabled() {
        return Err(format!("{} is not supported. {}", s, supported_message));
    }

    Ok(s.to_string())
}
