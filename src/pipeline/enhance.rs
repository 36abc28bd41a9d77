//! Image enhancement for the blur-retry attempt.
//!
//! A deterministic pixel pipeline aimed at scanned paper: luminance →
//! Gaussian denoise → adaptive binarisation → morphological closing →
//! bounded downscale. The output is written beside the source under a
//! distinct name so the original stays available for diagnostics.
//!
//! Failure here must never fail the request: the caller is mid-retry and an
//! unenhanced original is still a usable input, so any internal error
//! degrades to returning the source path unchanged.

use crate::config::ExtractionConfig;
use image::imageops::FilterType;
use image::DynamicImage;
use imageproc::contrast::adaptive_threshold;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sigma equivalent of a 5×5 Gaussian kernel (0.3·((k−1)/2 − 1) + 0.8).
const DENOISE_SIGMA: f32 = 1.1;

/// Radius for adaptive thresholding; an 11-pixel block.
const THRESHOLD_BLOCK_RADIUS: u32 = 5;

/// Enhance a scanned image for a second extraction attempt.
///
/// Returns the path of the new `<stem>_enhanced.jpg` artifact, or the
/// original path unchanged if anything goes wrong.
pub fn enhance_image(source: &Path, config: &ExtractionConfig) -> PathBuf {
    match try_enhance(source, config.max_image_pixels) {
        Ok(enhanced) => {
            debug!("Enhanced {} → {}", source.display(), enhanced.display());
            enhanced
        }
        Err(e) => {
            warn!("Enhancement failed for {}: {}", source.display(), e);
            source.to_path_buf()
        }
    }
}

fn try_enhance(source: &Path, max_pixels: u32) -> Result<PathBuf, image::ImageError> {
    let gray = image::open(source)?.to_luma8();

    let denoised = gaussian_blur_f32(&gray, DENOISE_SIGMA);
    let binarised = adaptive_threshold(&denoised, THRESHOLD_BLOCK_RADIUS);
    // Closing reconnects strokes that binarisation thinned apart.
    let closed = close(&binarised, Norm::LInf, 1);

    let (width, height) = closed.dimensions();
    let longest = width.max(height);
    let result = if longest > max_pixels {
        let scale = max_pixels as f32 / longest as f32;
        let new_width = ((width as f32 * scale).round() as u32).max(1);
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        debug!(
            "Downscaling enhanced image {}x{} → {}x{}",
            width, height, new_width, new_height
        );
        DynamicImage::ImageLuma8(closed).resize_exact(new_width, new_height, FilterType::Triangle)
    } else {
        DynamicImage::ImageLuma8(closed)
    };

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let output = source
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}_enhanced.jpg"));

    result.to_luma8().save(&output)?;
    Ok(output)
}
