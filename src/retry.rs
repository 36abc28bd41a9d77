//! Quality-driven retry orchestration for a single image.
//!
//! State machine per image:
//!
//! ```text
//! Start ──▶ Attempt1 ──▶ Good ───────────────▶ Accepted (first result)
//!              │
//!              ├─▶ NotInvoice / NoData / BlurTooBad ──▶ Rejected (None)
//!              │
//!              └─▶ BlurMaybe ──▶ enhance ──▶ Attempt2
//!                                              │
//!                                              ├─▶ NotInvoice / BlurTooBad ──▶ Rejected
//!                                              └─▶ anything else ──▶ Accepted (second result)
//! ```
//!
//! At most two extraction attempts are ever issued per image — there is no
//! third round, bounding cost and latency. Rejections are designed negative
//! outcomes: each surfaces a specific user-facing reason through the sink
//! and yields `None`, never an error.

use crate::config::ExtractionConfig;
use crate::pipeline::enhance::enhance_image;
use crate::pipeline::llm::{extract_invoice, VisionModel};
use crate::progress::{NoticeLevel, ProgressSink};
use crate::quality::{classify, QualityVerdict};
use crate::schema::ExtractionResult;
use std::path::Path;
use tracing::{debug, info};

/// Extract an invoice from one image, retrying once on borderline quality.
pub async fn extract_with_retry(
    model: &dyn VisionModel,
    image_path: &Path,
    config: &ExtractionConfig,
    sink: &dyn ProgressSink,
) -> Option<ExtractionResult> {
    sink.notice(
        NoticeLevel::Info,
        "Step 1: Extracting from the original image...",
    );
    let first = extract_invoice(model, image_path, config, false).await;

    match classify(first.as_ref()) {
        QualityVerdict::NoData => {
            sink.notice(
                NoticeLevel::Error,
                "No data could be extracted from the image.",
            );
            None
        }
        QualityVerdict::NotInvoice => {
            sink.notice(
                NoticeLevel::Error,
                "Uploaded file is not a valid invoice. Please upload a proper invoice document.",
            );
            None
        }
        QualityVerdict::BlurTooBad => {
            sink.notice(
                NoticeLevel::Error,
                "Uploaded invoice is too blurry or unreadable.",
            );
            None
        }
        QualityVerdict::Good => {
            debug!("First attempt accepted for {}", image_path.display());
            first
        }
        QualityVerdict::BlurMaybe => {
            sink.notice(
                NoticeLevel::Warning,
                "Uploaded invoice is blurry; attempting enhancement.",
            );
            let enhanced = enhance_image(image_path, config);
            info!(
                "Retrying extraction with enhanced image {}",
                enhanced.display()
            );
            sink.notice(
                NoticeLevel::Info,
                "Step 2: Extracting from the enhanced image...",
            );
            let second = extract_invoice(model, &enhanced, config, true).await;

            // The enhanced artifact is owned by this retry round; remove it
            // once the second attempt is done, keeping the original intact.
            if enhanced != image_path {
                let _ = std::fs::remove_file(&enhanced);
            }

            match classify(second.as_ref()) {
                QualityVerdict::NotInvoice => {
                    sink.notice(
                        NoticeLevel::Error,
                        "Uploaded file is not a valid invoice after enhancement.",
                    );
                    None
                }
                QualityVerdict::BlurTooBad => {
                    sink.notice(
                        NoticeLevel::Error,
                        "Uploaded invoice is too blurry even after enhancement.",
                    );
                    None
                }
                // Good, still-borderline, or anything unexpected: accept the
                // second result as-is. There is no third attempt.
                _ => second,
            }
        }
    }
}
