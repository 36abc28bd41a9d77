//! Top-level document processing entry points.
//!
//! A caller hands over a filename and raw bytes; everything else — staging,
//! dispatch, provider resolution, per-page orchestration, aggregation,
//! persistence, progress — happens here. Pages of a multi-page document are
//! processed **sequentially**: progress notices must reach the caller in
//! page order, and the inference capability is rate- and cost-sensitive, so
//! the design trades throughput for determinism and cost predictability.
//!
//! Outcomes are three-valued:
//! * `Ok(Some(stored))` — extraction produced a result (delivered through
//!   the sink and returned);
//! * `Ok(None)` — a designed rejection (not an invoice, unreadable); the
//!   specific reason already went to the sink;
//! * `Err(_)` — fatal for this request (bad PDF, no provider configured).

use crate::aggregate::combine_page_results;
use crate::config::{ExtractionConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::error::ExtractError;
use crate::persist::{self, StoredResult};
use crate::pipeline::llm::{OpenAiVision, VisionModel};
use crate::pipeline::render;
use crate::progress::{NoticeLevel, ProgressSink, StatusMessage};
use crate::retry::extract_with_retry;
use crate::schema::{ExtractionData, PageInfo, PageResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// How a submitted file is routed, decided by extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Multi-page pipeline: rasterise, extract per page, aggregate.
    Pdf,
    /// Single-image pipeline: extract once with retry.
    Image,
}

impl DocumentKind {
    /// `"pdf"` (case-insensitive) routes to the multi-page pipeline; every
    /// other extension is treated as an image.
    pub fn from_name(file_name: &str) -> Self {
        match extension_of(file_name).as_str() {
            "pdf" => DocumentKind::Pdf,
            _ => DocumentKind::Image,
        }
    }
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Process one uploaded document end to end.
///
/// This is the primary entry point for the library.
pub async fn process_document(
    file_name: &str,
    bytes: &[u8],
    config: &ExtractionConfig,
    sink: &dyn ProgressSink,
) -> Result<Option<StoredResult>, ExtractError> {
    info!("Processing document: {}", file_name);

    let ext = extension_of(file_name);
    sink.notice(
        NoticeLevel::Success,
        &format!("File format: {}", ext.to_ascii_uppercase()),
    );

    let vision = match resolve_vision(config) {
        Ok(vision) => vision,
        Err(e) => {
            sink.notice(NoticeLevel::Error, &e.to_string());
            close(sink, NoticeLevel::Error, "No vision provider configured.");
            return Err(e);
        }
    };

    let outcome = match DocumentKind::from_name(file_name) {
        DocumentKind::Pdf => {
            sink.notice(NoticeLevel::Info, "PDF file detected");
            process_pdf(vision.as_ref(), file_name, bytes, config, sink).await
        }
        DocumentKind::Image => {
            sink.notice(NoticeLevel::Info, "Image detected");
            process_image(vision.as_ref(), file_name, bytes, config, sink).await
        }
    };

    match &outcome {
        Ok(Some(_)) => close(
            sink,
            NoticeLevel::Success,
            "File uploaded and processed successfully!",
        ),
        Ok(None) => close(sink, NoticeLevel::Error, "File could not be processed."),
        Err(e) => close(sink, NoticeLevel::Error, &e.to_string()),
    }
    outcome
}

fn close(sink: &dyn ProgressSink, level: NoticeLevel, message: &str) {
    sink.status(&StatusMessage {
        message: message.to_string(),
        level,
        finished: true,
    });
}

/// Single-image pipeline: stage, extract with retry, report, persist.
async fn process_image(
    vision: &dyn VisionModel,
    file_name: &str,
    bytes: &[u8],
    config: &ExtractionConfig,
    sink: &dyn ProgressSink,
) -> Result<Option<StoredResult>, ExtractError> {
    let staged = stage_upload(file_name, bytes)?;

    let result = extract_with_retry(vision, staged.path(), config, sink).await;
    let Some(result) = result else {
        sink.notice(
            NoticeLevel::Error,
            "Failed to process invoice even after preprocessing",
        );
        return Ok(None);
    };

    // Quality summary, mirroring what the model reported.
    let quality = &result.quality_assessment;
    if quality.quality_too_poor {
        sink.notice(
            NoticeLevel::Warning,
            "Image quality was initially poor - preprocessing was applied",
        );
    }
    sink.notice(NoticeLevel::Info, "Quality assessment:");
    sink.notice(
        NoticeLevel::Info,
        &format!("- Readability: {}", quality.readability_score),
    );
    sink.notice(
        NoticeLevel::Info,
        &format!("- Can extract data: {}", quality.can_extract_data),
    );
    if !quality.quality_issues.is_empty() {
        sink.notice(NoticeLevel::Info, "Quality issues detected:");
        for issue in &quality.quality_issues {
            sink.notice(NoticeLevel::Info, &format!("  - {}", issue));
        }
    }

    let stored = deliver_and_persist(
        ExtractionData::Invoice(Box::new(result)),
        file_name,
        config,
        sink,
    )
    .await;
    Ok(Some(stored))
}

/// Multi-page pipeline: rasterise, extract per page, aggregate, persist.
async fn process_pdf(
    vision: &dyn VisionModel,
    file_name: &str,
    bytes: &[u8],
    config: &ExtractionConfig,
    sink: &dyn ProgressSink,
) -> Result<Option<StoredResult>, ExtractError> {
    let staged = stage_upload(file_name, bytes)?;

    let pages = match render::page_count(staged.path()).await {
        Ok(0) | Err(_) => {
            sink.notice(NoticeLevel::Error, "Invalid PDF or no pages found");
            return Err(ExtractError::InvalidPdf {
                path: PathBuf::from(file_name),
                detail: "no readable pages".to_string(),
            });
        }
        Ok(pages) => pages,
    };
    sink.notice(
        NoticeLevel::Info,
        &format!("PDF detected with {} pages", pages),
    );

    // Page artifacts live in a per-document temp directory; dropping it
    // removes them, and removal failures are swallowed by design.
    let page_dir = tempfile::tempdir()
        .map_err(|e| ExtractError::Internal(format!("tempdir: {e}")))?;
    let image_paths = match render::rasterize_pdf(staged.path(), page_dir.path(), config).await {
        Ok(paths) => paths,
        Err(e) => {
            sink.notice(NoticeLevel::Error, "Failed to convert PDF pages");
            return Err(e);
        }
    };
    sink.notice(
        NoticeLevel::Success,
        &format!("Successfully converted {} pages to images", image_paths.len()),
    );

    let combined = process_page_images(vision, &image_paths, file_name, config, sink).await;
    sink.notice(
        NoticeLevel::Info,
        &format!(
            "Combined line items: {}",
            combined.combined_data.line_items.len()
        ),
    );
    sink.notice(NoticeLevel::Success, "PDF processed successfully!");
    sink.notice(
        NoticeLevel::Success,
        &format!(
            "Summary: {}/{} pages processed",
            combined.pdf_info.successful_pages, combined.pdf_info.total_pages
        ),
    );

    let stored = deliver_and_persist(
        ExtractionData::Combined(Box::new(combined)),
        file_name,
        config,
        sink,
    )
    .await;
    Ok(Some(stored))
}

/// Run the retry orchestrator over pre-rasterised page images, in order,
/// and aggregate the outcomes.
///
/// Pages are strictly sequential: the results accumulator is owned by this
/// task and appended to in page order, and a page failure isolates to a
/// placeholder entry rather than aborting the rest.
pub async fn process_page_images(
    vision: &dyn VisionModel,
    image_paths: &[PathBuf],
    source_pdf: &str,
    config: &ExtractionConfig,
    sink: &dyn ProgressSink,
) -> crate::schema::CombinedInvoice {
    let total = image_paths.len();
    let mut page_results: Vec<PageResult> = Vec::with_capacity(total);

    for (idx, image_path) in image_paths.iter().enumerate() {
        let page_number = (idx + 1) as u32;
        sink.notice(
            NoticeLevel::Info,
            &format!("Processing page {}/{}...", page_number, total),
        );

        let page_info = PageInfo {
            page_number,
            total_pages: total as u32,
            source_pdf: source_pdf.to_string(),
            page_image: image_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            processing_failed: false,
        };

        match extract_with_retry(vision, image_path, config, sink).await {
            Some(result) => {
                sink.notice(
                    NoticeLevel::Success,
                    &format!(
                        "Page {} processed - Vendor: {}, Line items: {}",
                        page_number,
                        result.invoice_header.vendor_name,
                        result.line_items.len()
                    ),
                );
                page_results.push(PageResult::extracted(page_info, result));
            }
            None => {
                sink.notice(
                    NoticeLevel::Warning,
                    &format!("Page {} processing failed", page_number),
                );
                page_results.push(PageResult::failed(page_info, "Page processing failed"));
            }
        }
    }

    sink.notice(
        NoticeLevel::Info,
        &format!("Total processed results: {}", page_results.len()),
    );
    combine_page_results(page_results, source_pdf)
}

/// Build the persistence wrapper, deliver it, then try to write artifacts.
///
/// The wrapper is built before any file I/O so a persistence failure is
/// reported as a warning while the result still reaches the caller.
async fn deliver_and_persist(
    data: ExtractionData,
    file_name: &str,
    config: &ExtractionConfig,
    sink: &dyn ProgressSink,
) -> StoredResult {
    let stored = persist::wrap_result(data, file_name);
    sink.result(&stored);

    if !config.persist {
        return stored;
    }

    let saved: Result<_, crate::error::PersistError> = async {
        let individual = persist::save_individual(&stored, &config.results_dir).await?;
        let (_, total) =
            persist::append_master(&stored.extraction_data, file_name, &config.results_dir).await?;
        Ok((individual, total))
    }
    .await;

    match saved {
        Ok((individual, total)) => {
            sink.notice(NoticeLevel::Success, "Results automatically saved:");
            sink.notice(
                NoticeLevel::Success,
                &format!(
                    "Individual file: {}",
                    individual
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                ),
            );
            sink.notice(
                NoticeLevel::Success,
                &format!(
                    "Master file: {} (Total: {} documents)",
                    persist::MASTER_FILE,
                    total
                ),
            );
            sink.notice(
                NoticeLevel::Success,
                &format!("Location: {}/", config.results_dir.display()),
            );
        }
        Err(e) => {
            warn!("Persistence failed for {}: {}", file_name, e);
            sink.notice(NoticeLevel::Error, &format!("Failed to save results: {}", e));
            sink.notice(
                NoticeLevel::Success,
                "Invoice processed successfully (but not saved)",
            );
        }
    }

    stored
}

/// Write the uploaded bytes to a temp file carrying the original extension,
/// so downstream stages see the right artifact type. The file is removed
/// when the handle drops.
fn stage_upload(file_name: &str, bytes: &[u8]) -> Result<tempfile::NamedTempFile, ExtractError> {
    let staging_err = |e: std::io::Error| ExtractError::StagingFailed {
        name: file_name.to_string(),
        source: e,
    };

    let ext = extension_of(file_name);
    let suffix = format!(".{ext}");
    let mut builder = tempfile::Builder::new();
    if !ext.is_empty() {
        builder.suffix(&suffix);
    }
    let mut staged = builder.tempfile().map_err(staging_err)?;
    staged.write_all(bytes).map_err(staging_err)?;
    Ok(staged)
}

/// Resolve the vision capability, from most-specific to least-specific.
///
/// 1. **Pre-built capability** (`config.vision`) — the caller constructed it
///    entirely; used as-is. The injection point for tests and middleware.
/// 2. **Environment credential** — `OPENAI_API_KEY`, with the model from
///    `config.model`, then `OPENAI_MODEL`, then the documented default, and
///    the endpoint from `config.api_base`, then `OPENAI_BASE_URL`, then the
///    public OpenAI API.
///
/// Failure means no credential could be found anywhere: fatal for this
/// request, reported to the caller, never a process crash.
fn resolve_vision(config: &ExtractionConfig) -> Result<Arc<dyn VisionModel>, ExtractError> {
    if let Some(ref vision) = config.vision {
        return Ok(Arc::clone(vision));
    }

    let model = config
        .model
        .clone()
        .or_else(|| std::env::var("OPENAI_MODEL").ok().filter(|m| !m.is_empty()))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let api_base = config
        .api_base
        .clone()
        .or_else(|| std::env::var("OPENAI_BASE_URL").ok().filter(|u| !u.is_empty()))
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

    let api_key = std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ExtractError::ProviderNotConfigured {
            provider: "openai".to_string(),
            hint: "Set OPENAI_API_KEY (and optionally OPENAI_MODEL / OPENAI_BASE_URL),\n\
                   or inject a pre-built vision capability via the config."
                .to_string(),
        })?;

    let vision = OpenAiVision::new(&api_base, api_key, model, config.temperature)?;
    Ok(Arc::new(vision))
}
