//! File-backed display surface: the original, the mask, the mask laid over
//! the original, and both stacked on one canvas.

use std::fs;
use std::path::{Path, PathBuf};

use image::{imageops, imageops::FilterType, DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::info;

use crate::errors::{Result, SegOverlayError};
use crate::pipeline::Segmentation;

/// Vertical space between the two stacked images.
pub const LAYOUT_GAP: u32 = 16;

/// Draw the mask over the original, scaling the mask to the original's size.
pub fn compose_overlay(original: &DynamicImage, mask: &RgbaImage) -> RgbaImage {
    let mut canvas = original.to_rgba8();
    let (width, height) = canvas.dimensions();
    if mask.dimensions() == (width, height) {
        imageops::overlay(&mut canvas, mask, 0, 0);
    } else {
        let scaled = imageops::resize(mask, width, height, FilterType::Nearest);
        imageops::overlay(&mut canvas, &scaled, 0, 0);
    }
    canvas
}

/// Place `top` above `bottom`, both centred horizontally on a transparent canvas.
pub fn stack_vertically(top: &RgbaImage, bottom: &RgbaImage, gap: u32) -> RgbaImage {
    let width = top.width().max(bottom.width());
    let height = top.height() + gap + bottom.height();
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

    let centre = |image_width: u32| i64::from((width - image_width) / 2);
    imageops::overlay(&mut canvas, top, centre(top.width()), 0);
    imageops::overlay(
        &mut canvas,
        bottom,
        centre(bottom.width()),
        i64::from(top.height() + gap),
    );
    canvas
}

/// Paths written by [`save_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPaths {
    pub original: PathBuf,
    pub mask: PathBuf,
    pub overlay: PathBuf,
    pub layout: PathBuf,
}

/// Write every view of a segmentation into `output_dir` as `<stem>_<view>.<ext>`.
pub fn save_outputs(
    segmentation: &Segmentation,
    output_dir: &Path,
    stem: &str,
    format: ImageFormat,
) -> Result<DisplayPaths> {
    fs::create_dir_all(output_dir).map_err(|e| SegOverlayError::FileSystem {
        path: output_dir.to_path_buf(),
        operation: "output directory creation".to_string(),
        source: e,
    })?;

    let extension = format
        .extensions_str()
        .first()
        .copied()
        .ok_or_else(|| SegOverlayError::Configuration {
            message: format!("{format:?} has no file extension"),
        })?;
    let path_for = |view: &str| output_dir.join(format!("{stem}_{view}.{extension}"));

    let original_rgba = segmentation.original.to_rgba8();
    let overlay = compose_overlay(&segmentation.original, &segmentation.mask);
    let layout = stack_vertically(&original_rgba, &segmentation.mask, LAYOUT_GAP);

    let paths = DisplayPaths {
        original: path_for("original"),
        mask: path_for("mask"),
        overlay: path_for("overlay"),
        layout: path_for("layout"),
    };

    save(original_rgba, &paths.original, format)?;
    save(segmentation.mask.clone(), &paths.mask, format)?;
    save(overlay, &paths.overlay, format)?;
    save(layout, &paths.layout, format)?;

    info!(output_dir = %output_dir.display(), stem, "outputs written");
    Ok(paths)
}

fn save(image: RgbaImage, path: &Path, format: ImageFormat) -> Result<()> {
    // JPEG has no alpha channel
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image).to_rgb8()),
        _ => DynamicImage::ImageRgba8(image),
    };
    image
        .save_with_format(path, format)
        .map_err(|e| SegOverlayError::ImageProcessing {
            path: path.display().to_string(),
            operation: "image save".to_string(),
            source: Box::new(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{HIGHLIGHT, TRANSPARENT};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn grey(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
    }

    fn left_column_mask(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            if x == 0 {
                HIGHLIGHT
            } else {
                TRANSPARENT
            }
        })
    }

    #[test]
    fn test_overlay_keeps_unmasked_pixels() {
        let overlay = compose_overlay(&grey(4, 4), &left_column_mask(4, 4));
        assert_eq!(*overlay.get_pixel(0, 2), HIGHLIGHT);
        assert_eq!(*overlay.get_pixel(3, 2), Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn test_overlay_scales_mask_to_original() {
        let overlay = compose_overlay(&grey(8, 8), &left_column_mask(2, 2));
        assert_eq!(overlay.dimensions(), (8, 8));
        assert_eq!(*overlay.get_pixel(0, 0), HIGHLIGHT);
        assert_eq!(*overlay.get_pixel(3, 7), HIGHLIGHT);
        assert_eq!(*overlay.get_pixel(4, 0), Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn test_stack_vertically_layout() {
        let top = RgbaImage::from_pixel(4, 2, HIGHLIGHT);
        let bottom = RgbaImage::from_pixel(2, 3, Rgba([0, 255, 0, 255]));
        let stacked = stack_vertically(&top, &bottom, 1);

        assert_eq!(stacked.dimensions(), (4, 6));
        assert_eq!(*stacked.get_pixel(0, 0), HIGHLIGHT);
        assert_eq!(*stacked.get_pixel(0, 2), TRANSPARENT);
        assert_eq!(*stacked.get_pixel(0, 3), TRANSPARENT);
        assert_eq!(*stacked.get_pixel(1, 3), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_save_outputs_writes_all_views() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let segmentation = Segmentation {
            original: grey(6, 6),
            mask: left_column_mask(3, 3),
        };

        let paths = save_outputs(&segmentation, temp_dir.path(), "dog", ImageFormat::Png)?;
        for path in [&paths.original, &paths.mask, &paths.overlay, &paths.layout] {
            assert!(path.is_file(), "{} missing", path.display());
        }
        assert_eq!(paths.mask, temp_dir.path().join("dog_mask.png"));

        let layout = image::open(&paths.layout)?;
        assert_eq!((layout.width(), layout.height()), (6, 6 + LAYOUT_GAP + 3));
        Ok(())
    }

    #[test]
    fn test_save_outputs_as_jpeg() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let segmentation = Segmentation {
            original: grey(8, 8),
            mask: left_column_mask(8, 8),
        };
        let paths = save_outputs(&segmentation, temp_dir.path(), "dog", ImageFormat::Jpeg)?;
        assert_eq!(paths.overlay, temp_dir.path().join("dog_overlay.jpg"));
        assert!(paths.overlay.is_file());
        Ok(())
    }
}
