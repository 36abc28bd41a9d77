//! Typed records for extracted invoice data.
//!
//! The vision model returns duck-shaped JSON; this module pins it down as
//! explicit record types, one per section, validated at the parse boundary.
//! Two conventions apply everywhere:
//!
//! * **Sentinel `"N/A"`** — a leaf field the model could not determine holds
//!   the literal string `"N/A"`, never null and never an omitted key. Merge
//!   and classification logic must treat it as "no information", which is
//!   distinct from the empty string.
//! * **Lenient parsing** — models occasionally emit a string or object where
//!   a list belongs. Those fields deserialize through [`lenient_string_list`]
//!   so a malformed section degrades to "empty" instead of failing the whole
//!   document.

use serde::{Deserialize, Deserializer, Serialize};

/// Serde default for sentinel-valued string fields.
fn na() -> String {
    "N/A".to_string()
}

fn default_true() -> bool {
    true
}

/// True when a field value carries actual information: non-empty and not the
/// `"N/A"` sentinel.
pub fn is_informative(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty() && v != "N/A"
}

/// Accept a JSON list of anything, stringify the entries, and coerce any
/// non-list value (string, object, null) to an empty list.
pub(crate) fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let list = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(list)
}


/// Build a section's all-sentinel default by deserializing an empty object,
/// so the serde field defaults stay the single source of truth.
fn empty_section<T: serde::de::DeserializeOwned>() -> T {
    serde_json::from_str("{}").expect("all section fields carry serde defaults")
}

// ── Per-attempt extraction record ────────────────────────────────────────

/// The canonical structured invoice record returned by one extraction attempt.
///
/// Every section is optional on the wire; a missing section deserializes to
/// its all-sentinel default so downstream code never branches on absence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub quality_assessment: QualityAssessment,
    #[serde(default)]
    pub invoice_header: InvoiceHeader,
    #[serde(default)]
    pub customer_details: CustomerDetails,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub financial_summary: FinancialSummary,
    #[serde(default)]
    pub payment_details: PaymentDetails,
    #[serde(default)]
    pub terms_and_conditions: TermsAndConditions,
    #[serde(default)]
    pub additional_info: AdditionalInfo,
    #[serde(default)]
    pub detection_metadata: DetectionMetadata,
}

/// Self-reported quality signals inside an extraction result.
///
/// Drives every retry decision (see [`crate::quality`]); never persisted on
/// its own. `can_extract_data` defaults to true when the model omits it —
/// absence of a complaint is treated as confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    #[serde(default)]
    pub quality_too_poor: bool,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub quality_issues: Vec<String>,
    #[serde(default)]
    pub readability_score: String,
    #[serde(default = "default_true")]
    pub can_extract_data: bool,
    #[serde(default)]
    pub preprocessing_recommended: bool,
}

impl Default for QualityAssessment {
    fn default() -> Self {
        Self {
            quality_too_poor: false,
            quality_issues: Vec::new(),
            readability_score: String::new(),
            can_extract_data: true,
            preprocessing_recommended: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceHeader {
    #[serde(default = "na")]
    pub vendor_name: String,
    #[serde(default = "na")]
    pub vendor_address: String,
    #[serde(default = "na")]
    pub vendor_phone: String,
    #[serde(default = "na")]
    pub vendor_email: String,
    #[serde(default = "na")]
    pub vendor_website: String,
    #[serde(default = "na")]
    pub vendor_gst_number: String,
    #[serde(default = "na")]
    pub vendor_pan: String,
    #[serde(default = "na")]
    pub invoice_number: String,
    #[serde(default = "na")]
    pub invoice_date: String,
    #[serde(default = "na")]
    pub due_date: String,
    #[serde(default = "na")]
    pub purchase_order_number: String,
    #[serde(default = "na")]
    pub reference_number: String,
    #[serde(default = "na")]
    pub currency: String,
}

impl Default for InvoiceHeader {
    fn default() -> Self {
        empty_section()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default = "na")]
    pub customer_name: String,
    #[serde(default = "na")]
    pub customer_address: String,
    #[serde(default = "na")]
    pub customer_phone: String,
    #[serde(default = "na")]
    pub customer_email: String,
    #[serde(default = "na")]
    pub customer_gst_number: String,
    #[serde(default = "na")]
    pub customer_pan: String,
    #[serde(default = "na")]
    pub billing_address: String,
    #[serde(default = "na")]
    pub shipping_address: String,
    #[serde(default = "na")]
    pub customer_contact_person: String,
}

impl Default for CustomerDetails {
    fn default() -> Self {
        empty_section()
    }
}

/// One invoice line. Created per extraction call, mutated only to attach
/// `source_page` during aggregation, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default = "na")]
    pub item_number: String,
    #[serde(default = "na")]
    pub description: String,
    #[serde(default = "na")]
    pub hsn_sac_code: String,
    #[serde(default = "na")]
    pub quantity: String,
    #[serde(default = "na")]
    pub unit: String,
    #[serde(default = "na")]
    pub unit_price: String,
    #[serde(default = "na")]
    pub discount: String,
    #[serde(default = "na")]
    pub tax_rate: String,
    #[serde(default = "na")]
    pub tax_amount: String,
    #[serde(default = "na")]
    pub total_price: String,
    /// Page the item came from; attached during multi-page aggregation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,
}

impl Default for LineItem {
    fn default() -> Self {
        empty_section()
    }
}

impl LineItem {
    /// True when at least one field carries information. Items that are all
    /// empty or sentinel are dropped during aggregation.
    pub fn is_informative(&self) -> bool {
        [
            &self.item_number,
            &self.description,
            &self.hsn_sac_code,
            &self.quantity,
            &self.unit,
            &self.unit_price,
            &self.discount,
            &self.tax_rate,
            &self.tax_amount,
            &self.total_price,
        ]
        .iter()
        .any(|v| is_informative(v))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSummary {
    #[serde(default = "na")]
    pub subtotal: String,
    #[serde(default = "na")]
    pub total_discount: String,
    #[serde(default = "na")]
    pub taxable_amount: String,
    #[serde(default = "na")]
    pub cgst: String,
    #[serde(default = "na")]
    pub sgst: String,
    #[serde(default = "na")]
    pub igst: String,
    #[serde(default = "na")]
    pub cess: String,
    #[serde(default = "na")]
    pub other_charges: String,
    #[serde(default = "na")]
    pub shipping_charges: String,
    #[serde(default = "na")]
    pub total_tax_amount: String,
    #[serde(default = "na")]
    pub round_off: String,
    #[serde(default = "na")]
    pub total_amount: String,
    #[serde(default = "na")]
    pub amount_in_words: String,
    #[serde(default = "na")]
    pub currency: String,
}

impl Default for FinancialSummary {
    fn default() -> Self {
        empty_section()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default = "na")]
    pub payment_terms: String,
    #[serde(default = "na")]
    pub payment_method: String,
    #[serde(default = "na")]
    pub bank_name: String,
    #[serde(default = "na")]
    pub account_number: String,
    #[serde(default = "na")]
    pub ifsc_code: String,
    #[serde(default = "na")]
    pub branch: String,
    #[serde(default = "na")]
    pub upi_id: String,
    #[serde(default = "na")]
    pub advance_paid: String,
    #[serde(default = "na")]
    pub balance_due: String,
}

impl Default for PaymentDetails {
    fn default() -> Self {
        empty_section()
    }
}

/// Terms text accumulates across pages during aggregation, so scalar fields
/// start empty rather than sentinel-valued when merged (see
/// [`crate::aggregate`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermsAndConditions {
    #[serde(default = "na")]
    pub payment_terms: String,
    #[serde(default = "na")]
    pub delivery_terms: String,
    #[serde(default = "na")]
    pub warranty_terms: String,
    #[serde(default = "na")]
    pub return_policy: String,
    #[serde(default = "na")]
    pub late_payment_charges: String,
    #[serde(default = "na")]
    pub jurisdiction: String,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub other_conditions: Vec<String>,
}

impl Default for TermsAndConditions {
    fn default() -> Self {
        empty_section()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalInfo {
    #[serde(default = "na")]
    pub notes: String,
    #[serde(default = "na")]
    pub special_instructions: String,
    #[serde(default = "na")]
    pub delivery_date: String,
    #[serde(default = "na")]
    pub place_of_supply: String,
    #[serde(default = "na")]
    pub reverse_charge: String,
    #[serde(default = "na")]
    pub document_type: String,
    #[serde(default = "na")]
    pub series: String,
    #[serde(default = "na")]
    pub authorised_signatory: String,
    #[serde(default = "na")]
    pub stamp_or_seal: String,
    #[serde(default = "na")]
    pub qr_code_present: String,
}

impl Default for AdditionalInfo {
    fn default() -> Self {
        empty_section()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionMetadata {
    #[serde(default)]
    pub tables_detected: bool,
    #[serde(default)]
    pub handwriting_detected: bool,
    #[serde(default)]
    pub logo_detected: bool,
    #[serde(default)]
    pub stamp_detected: bool,
    #[serde(default)]
    pub signature_detected: bool,
    #[serde(default)]
    pub barcode_qr_detected: bool,
    #[serde(default)]
    pub multi_page_document: bool,
    #[serde(default = "na")]
    pub document_quality: String,
    #[serde(default = "na")]
    pub extraction_confidence: String,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub unclear_fields: Vec<String>,
    /// Set to `"simplified"` when the reduced-schema fallback produced the
    /// record.
    #[serde(default = "na")]
    pub extraction_method: String,
}

impl Default for DetectionMetadata {
    fn default() -> Self {
        empty_section()
    }
}

// ── Per-page and combined records ────────────────────────────────────────

/// Position of one page result inside its source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub page_number: u32,
    pub total_pages: u32,
    pub source_pdf: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub page_image: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub processing_failed: bool,
}

/// One rasterized page's outcome: a flattened [`ExtractionResult`] plus page
/// metadata, or a minimal failure record carrying `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub page_info: PageInfo,
    #[serde(flatten)]
    pub data: Option<ExtractionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResult {
    pub fn extracted(page_info: PageInfo, data: ExtractionResult) -> Self {
        Self {
            page_info,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(mut page_info: PageInfo, error: impl Into<String>) -> Self {
        page_info.processing_failed = true;
        Self {
            page_info,
            data: None,
            error: Some(error.into()),
        }
    }

    /// A page counts as successful when no error was recorded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Document-level counters for a combined multi-page result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfInfo {
    pub source_pdf: String,
    pub total_pages: usize,
    pub successful_pages: usize,
    pub failed_pages: usize,
    pub processing_date: String,
}

/// The merged record built from all successful pages.
///
/// Quality and detection sections are deliberately absent: they describe one
/// image, not a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombinedData {
    #[serde(default)]
    pub invoice_header: InvoiceHeader,
    #[serde(default)]
    pub customer_details: CustomerDetails,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub financial_summary: FinancialSummary,
    #[serde(default)]
    pub payment_details: PaymentDetails,
    #[serde(default)]
    pub terms_and_conditions: TermsAndConditions,
    #[serde(default)]
    pub additional_info: AdditionalInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub total_line_items_found: usize,
    pub pages_with_line_items: usize,
    /// `"high"` when every page succeeded, `"medium"` on partial success,
    /// `"low"` when no page succeeded.
    pub overall_quality: String,
}

/// The single merged record representing an entire multi-page document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedInvoice {
    pub pdf_info: PdfInfo,
    pub combined_data: CombinedData,
    pub page_by_page_results: Vec<PageResult>,
    pub processing_summary: ProcessingSummary,
}

/// What a processed document ultimately yields: a direct extraction for a
/// single image, or a combined record for a multi-page source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractionData {
    Combined(Box<CombinedInvoice>),
    Invoice(Box<ExtractionResult>),
}
