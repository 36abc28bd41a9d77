//! Quality classification of an extraction attempt.
//!
//! The model self-reports how readable the image was; this module maps that
//! assessment onto one of five verdicts that drive the retry state machine
//! in [`crate::retry`]. Pure function of the assessment — no I/O, no side
//! effects — so every branch is unit-testable.
//!
//! Rule order matters and is first-match-wins: "not an invoice" outranks
//! "too blurry", which outranks "maybe recoverable with enhancement".

use crate::schema::ExtractionResult;

/// The retry decision derived from one extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityVerdict {
    /// No extraction was produced at all (both parse paths failed).
    NoData,
    /// The model says the image is not an invoice; retrying cannot help.
    NotInvoice,
    /// Unreadable beyond what enhancement could recover.
    BlurTooBad,
    /// Borderline readability; worth one enhancement-and-retry round.
    BlurMaybe,
    /// Trustworthy; accept as-is.
    Good,
}

/// Classify an extraction attempt's self-reported quality.
///
/// Rules, evaluated in order:
/// 1. absent result → [`QualityVerdict::NoData`]
/// 2. cannot extract AND `"not invoice"` listed → [`QualityVerdict::NotInvoice`]
/// 3. cannot extract, OR quality too poor, OR readability "low"
///    → [`QualityVerdict::BlurTooBad`]
/// 4. readability "medium" → [`QualityVerdict::BlurMaybe`]
/// 5. otherwise → [`QualityVerdict::Good`]
///
/// Issue matching is case- and whitespace-insensitive.
pub fn classify(result: Option<&ExtractionResult>) -> QualityVerdict {
    let Some(result) = result else {
        return QualityVerdict::NoData;
    };

    let qa = &result.quality_assessment;
    let can_extract = qa.can_extract_data;
    let quality_too_poor = qa.quality_too_poor;
    let readability = qa.readability_score.trim().to_lowercase();
    let not_invoice = qa
        .quality_issues
        .iter()
        .any(|issue| issue.trim().to_lowercase() == "not invoice");

    if !can_extract && not_invoice {
        return QualityVerdict::NotInvoice;
    }
    if !can_extract || quality_too_poor || readability == "low" {
        return QualityVerdict::BlurTooBad;
    }
    if quality_too_poor || readability == "medium" {
        return QualityVerdict::BlurMaybe;
    }
    QualityVerdict::Good
}
