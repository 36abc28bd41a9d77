//! PDF rasterisation: render every page to a JPEG artifact via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! thread-pool thread, preventing the Tokio workers from stalling during
//! CPU-heavy rendering.
//!
//! ## Why files, not in-memory images?
//!
//! Downstream stages (enhancement, re-encoding for the retry attempt) work
//! on paths: the enhancer must write its artifact beside the source, and a
//! failed page leaves its render on disk only for the lifetime of the
//! per-document temp directory. Pages are named `{stem}_page_{n}.jpg`.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Count the pages of a PDF without rendering anything.
pub async fn page_count(pdf_path: &Path) -> Result<usize, ExtractError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || page_count_blocking(&path))
        .await
        .map_err(|e| ExtractError::Internal(format!("Page-count task panicked: {}", e)))?
}

fn page_count_blocking(pdf_path: &Path) -> Result<usize, ExtractError> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| ExtractError::InvalidPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;
    Ok(document.pages().len() as usize)
}

/// Rasterise every page of a PDF into JPEG files under `out_dir`.
///
/// Returns the artifact paths in page order.
pub async fn rasterize_pdf(
    pdf_path: &Path,
    out_dir: &Path,
    config: &ExtractionConfig,
) -> Result<Vec<PathBuf>, ExtractError> {
    let path = pdf_path.to_path_buf();
    let dir = out_dir.to_path_buf();
    let max_pixels = config.max_render_pixels;

    tokio::task::spawn_blocking(move || rasterize_blocking(&path, &dir, max_pixels))
        .await
        .map_err(|e| ExtractError::Internal(format!("Render task panicked: {}", e)))?
}

fn rasterize_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    max_pixels: u32,
) -> Result<Vec<PathBuf>, ExtractError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| ExtractError::InvalidPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let mut artifacts = Vec::with_capacity(total_pages);

    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ExtractError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| ExtractError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?;

        let image = bitmap.as_image();
        let artifact = out_dir.join(format!("{}_page_{}.jpg", stem, idx + 1));
        image
            .to_rgb8()
            .save(&artifact)
            .map_err(|e| ExtractError::RasterisationFailed {
                page: idx + 1,
                detail: format!("Failed to write page image: {}", e),
            })?;

        debug!(
            "Rendered page {} → {} ({}x{} px)",
            idx + 1,
            artifact.display(),
            image.width(),
            image.height()
        );
        artifacts.push(artifact);
    }

    Ok(artifacts)
}
