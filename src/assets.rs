use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{debug, info};

use crate::errors::{Result, SegOverlayError};

/// Decode a raster image from disk.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let image = image::open(path).map_err(|e| SegOverlayError::ImageProcessing {
        path: path.display().to_string(),
        operation: "image load".to_string(),
        source: Box::new(e),
    })?;
    if image.width() == 0 || image.height() == 0 {
        return Err(SegOverlayError::invalid_image(format!(
            "{} decoded to an empty image",
            path.display()
        )));
    }
    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "image loaded"
    );
    Ok(image)
}

/// Copy the model artifact into `cache_dir` unless a copy is already there,
/// and return the cached path.
///
/// The copy goes through a temporary file and a rename, so an interrupted
/// copy never leaves a truncated model behind.
pub fn cache_model(source: &Path, cache_dir: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| SegOverlayError::Configuration {
            message: format!("model path {} has no file name", source.display()),
        })?;
    let cached = cache_dir.join(file_name);

    if cached.is_file() {
        debug!(path = %cached.display(), "model already cached");
        return Ok(cached);
    }

    fs::create_dir_all(cache_dir).map_err(|e| SegOverlayError::FileSystem {
        path: cache_dir.to_path_buf(),
        operation: "cache directory creation".to_string(),
        source: e,
    })?;

    let mut partial = cached.clone().into_os_string();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    fs::copy(source, &partial).map_err(|e| SegOverlayError::FileSystem {
        path: source.to_path_buf(),
        operation: "model copy".to_string(),
        source: e,
    })?;
    fs::rename(&partial, &cached).map_err(|e| SegOverlayError::FileSystem {
        path: cached.clone(),
        operation: "model cache commit".to_string(),
        source: e,
    })?;

    info!(source = %source.display(), cached = %cached.display(), "model cached");
    Ok(cached)
}
