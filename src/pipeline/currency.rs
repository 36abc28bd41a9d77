//! Currency resolution and normalisation.
//!
//! The extraction prompt asks the model to keep currency symbols verbatim in
//! every amount field; this stage turns those scattered signals into one
//! canonical display string written to both `invoice_header.currency` and
//! `financial_summary.currency`.
//!
//! Resolution order, first hit wins:
//! 1. a symbol/code/word inside an amount field (most reliable — it sits
//!    next to the number it qualifies);
//! 2. an explicit `currency` field the model already filled in;
//! 3. Indian-tax indicators (CGST/SGST/IGST, GSTIN, PAN) implying INR;
//! 4. the configured default.
//!
//! The whole pass is idempotent: the canonical display strings themselves
//! contain the symbols the marker table recognises, so a second run resolves
//! to the same currency.

use crate::schema::{is_informative, ExtractionResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A currency the normaliser can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    Inr,
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    /// Canonical display string written into the extraction record.
    pub fn display(self) -> &'static str {
        match self {
            Currency::Inr => "Rupees (₹)",
            Currency::Usd => "US Dollars ($)",
            Currency::Eur => "Euros (€)",
            Currency::Gbp => "British Pounds (£)",
        }
    }
}

/// Literal markers recognised inside amount text, checked in this order.
/// `"Rs."` precedes `"Rs"` so the longer spelling wins its prefix.
const CURRENCY_MARKERS: &[(&str, Currency)] = &[
    ("₹", Currency::Inr),
    ("Rs.", Currency::Inr),
    ("Rs", Currency::Inr),
    ("INR", Currency::Inr),
    ("Rupees", Currency::Inr),
    ("rupees", Currency::Inr),
    ("$", Currency::Usd),
    ("USD", Currency::Usd),
    ("Dollars", Currency::Usd),
    ("€", Currency::Eur),
    ("EUR", Currency::Eur),
    ("Euros", Currency::Eur),
    ("£", Currency::Gbp),
    ("GBP", Currency::Gbp),
    ("Pounds", Currency::Gbp),
];

/// Find the first recognised marker in a piece of amount text.
fn marker_in(text: &str) -> Option<Currency> {
    CURRENCY_MARKERS
        .iter()
        .find(|(marker, _)| text.contains(marker))
        .map(|&(_, currency)| currency)
}

/// Fields with `"N/A"` count as present for the tax heuristic only when they
/// actually carry a value.
fn tax_indicator(value: &str) -> bool {
    value != "N/A"
}

/// Resolve the invoice currency and write its canonical display string into
/// both the header and the financial summary. Idempotent.
pub fn normalize_currency(result: &mut ExtractionResult, default: Currency) {
    let resolved = detect(result).unwrap_or_else(|| {
        debug!("No currency signal found, falling back to {:?}", default);
        default
    });

    result.invoice_header.currency = resolved.display().to_string();
    result.financial_summary.currency = resolved.display().to_string();
}

fn detect(result: &ExtractionResult) -> Option<Currency> {
    // 1. Symbols next to amounts, in a fixed scan order.
    let summary = &result.financial_summary;
    let mut amounts: Vec<&str> = vec![
        &summary.total_amount,
        &summary.subtotal,
        &summary.amount_in_words,
    ];
    for item in &result.line_items {
        amounts.push(&item.unit_price);
        amounts.push(&item.total_price);
    }
    for amount in amounts {
        if !is_informative(amount) {
            continue;
        }
        if let Some(currency) = marker_in(amount) {
            debug!("Currency {:?} resolved from amount '{}'", currency, amount);
            return Some(currency);
        }
    }

    // 2. Explicit currency fields. Running the same marker table over them
    //    also recognises our own canonical display strings, which is what
    //    makes a second normalisation pass resolve identically.
    for field in [&result.invoice_header.currency, &summary.currency] {
        if is_informative(field) {
            if let Some(currency) = marker_in(field) {
                return Some(currency);
            }
        }
    }

    // 3. Indian-tax indicators imply INR.
    let has_indian_tax = tax_indicator(&summary.cgst)
        || tax_indicator(&summary.sgst)
        || tax_indicator(&summary.igst)
        || tax_indicator(&result.invoice_header.vendor_gst_number)
        || tax_indicator(&result.invoice_header.vendor_pan);
    if has_indian_tax {
        debug!("Currency resolved to INR from Indian tax indicators");
        return Some(Currency::Inr);
    }

    None
}
