//! Error types for the invoice2json library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal for the request**: processing cannot proceed
//!   at all (unreadable input, invalid PDF, provider not configured).
//!   Returned as `Err(ExtractError)` from the top-level `process_*`
//!   functions. Model-side trouble is deliberately NOT here: a response that
//!   fails to parse degrades to the simplified fallback and ultimately to a
//!   `None` extraction, never to an error.
//!
//! * [`PersistError`] — **Recoverable**: writing the result artifacts failed
//!   after the extraction itself succeeded. Reported to the caller as a
//!   warning while the computed result is still delivered, so secondary I/O
//!   trouble can never withhold a good extraction.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the invoice2json library.
///
/// Quality rejections ("not an invoice", "too blurry") are designed negative
/// outcomes, not errors; they surface as progress notices and a `None`
/// result instead.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The uploaded bytes could not be staged as a temporary file.
    #[error("Failed to stage uploaded file '{name}': {source}")]
    StagingFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF could not be opened or contains no pages.
    #[error("Invalid PDF or no pages found: '{path}' ({detail})")]
    InvalidPdf { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// No inference credential/model could be resolved for this request.
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The inference API rejected or failed the call.
    #[error("Vision API error: {message}")]
    ApiError { message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A recoverable persistence failure.
///
/// Saving results is secondary to producing them: callers receive this as a
/// warning notice alongside the already-computed result, and tests can
/// assert the failure occurred instead of it being silently swallowed.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Could not create the results directory.
    #[error("Failed to create results directory '{path}': {source}")]
    DirCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write an individual result file.
    #[error("Failed to write result file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The master results file could not be rewritten.
    #[error("Failed to update master results file '{path}': {source}")]
    MasterRewriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialised to JSON.
    #[error("Failed to serialise result: {0}")]
    Serialise(#[from] serde_json::Error),
}
