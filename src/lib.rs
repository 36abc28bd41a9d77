//! # invoice2json
//!
//! Extract structured invoice data from scans and multi-page PDFs using
//! Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Template-based invoice parsers break on every new vendor layout, and
//! classic OCR loses the table structure that makes an invoice an invoice.
//! Instead this crate hands each page image to a VLM with a fixed extraction
//! schema and concentrates on the part models cannot do for you: deciding
//! whether an extraction is trustworthy, enhancing and retrying when it is
//! not, and merging per-page extractions into one coherent record with
//! deterministic conflict-resolution rules.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (filename + bytes)
//!  │
//!  ├─ 1. Dispatch   "pdf" → multi-page, anything else → single image
//!  ├─ 2. Render     rasterise PDF pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Extract    per page: VLM call → JSON repair → simplified fallback
//!  ├─ 4. Classify   self-reported quality → accept / enhance-and-retry / reject
//!  ├─ 5. Aggregate  merge pages: main-page headers, tagged line items,
//!  │                accreting terms and payment details
//!  └─ 6. Persist    individual JSON artifact + append-only master log
//! ```
//!
//! Progress notices, the final payload, and the closing status flow through
//! the [`ProgressSink`] seam, so the same pipeline serves a duplex socket, a
//! CLI, or a test harness unchanged.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice2json::{process_document, ExtractionConfig, NoopProgressSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider resolved from OPENAI_API_KEY / OPENAI_MODEL.
//!     let config = ExtractionConfig::default();
//!     let bytes = std::fs::read("invoice.pdf")?;
//!     let outcome = process_document("invoice.pdf", &bytes, &config, &NoopProgressSink).await?;
//!     match outcome {
//!         Some(stored) => println!("{}", serde_json::to_string_pretty(&stored)?),
//!         None => eprintln!("document rejected (not an invoice / unreadable)"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice2json` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! invoice2json = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod aggregate;
pub mod config;
pub mod error;
pub mod persist;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod quality;
pub mod retry;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use aggregate::combine_page_results;
pub use config::{ExtractionConfig, ExtractionConfigBuilder, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use error::{ExtractError, PersistError};
pub use persist::{ResultMetadata, StoredResult};
pub use pipeline::currency::Currency;
pub use pipeline::encode::ImageData;
pub use pipeline::llm::{OpenAiVision, VisionModel};
pub use process::{process_document, process_page_images, DocumentKind};
pub use progress::{
    ChannelProgressSink, FinalPayload, NoopProgressSink, NoticeLevel, ProgressSink, StatusMessage,
    TransportEvent,
};
pub use quality::{classify, QualityVerdict};
pub use retry::extract_with_retry;
pub use schema::{
    CombinedData, CombinedInvoice, ExtractionData, ExtractionResult, LineItem, PageInfo,
    PageResult, PdfInfo, ProcessingSummary, QualityAssessment,
};
