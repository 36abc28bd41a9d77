//! Merge per-page extractions into one coherent invoice record.
//!
//! Field-level precedence rules, applied deterministically:
//!
//! * **Header-like sections** (invoice header, customer details, financial
//!   summary, additional info) come verbatim from the *main page* — the
//!   first successful page that actually names a vendor, since invoices
//!   carry their identity on page one.
//! * **Line items** concatenate across pages in page order; an item whose
//!   every field is empty or sentinel is noise and is dropped; every kept
//!   item is tagged with its originating page.
//! * **Terms and payment details** accrete across ALL pages: the first
//!   informative value wins a scalar slot, and a later *different* value is
//!   appended as `"first | second"` rather than overwritten — conflicting
//!   statements are preserved for a human to resolve, never silently lost.
//!
//! Failed pages stay in the output as placeholders and feed the
//! overall-quality verdict; they contribute nothing to the merge.

use crate::schema::{
    is_informative, CombinedData, CombinedInvoice, PageResult, PaymentDetails, PdfInfo,
    ProcessingSummary, TermsAndConditions,
};
use chrono::Local;
use tracing::debug;

/// Merge an ordered sequence of page results into a [`CombinedInvoice`].
pub fn combine_page_results(page_results: Vec<PageResult>, pdf_filename: &str) -> CombinedInvoice {
    let successful: Vec<&PageResult> = page_results.iter().filter(|p| p.is_success()).collect();
    let failed_count = page_results.len() - successful.len();

    // The main page anchors the header-like sections: first page with a
    // named vendor, else the first successful page at all.
    let main_page = successful
        .iter()
        .find(|p| {
            p.data
                .as_ref()
                .is_some_and(|d| d.invoice_header.vendor_name != "N/A")
        })
        .or_else(|| successful.first())
        .copied();

    let mut line_items = Vec::new();
    for page in &successful {
        let Some(data) = page.data.as_ref() else {
            continue;
        };
        for item in &data.line_items {
            if !item.is_informative() {
                continue;
            }
            let mut tagged = item.clone();
            tagged.source_page = Some(page.page_info.page_number);
            line_items.push(tagged);
        }
    }

    let mut combined_terms = empty_terms();
    for page in &successful {
        if let Some(data) = page.data.as_ref() {
            merge_terms(&mut combined_terms, &data.terms_and_conditions);
        }
    }

    let mut combined_payment = main_page
        .and_then(|p| p.data.as_ref())
        .map(|d| d.payment_details.clone())
        .unwrap_or_default();
    for page in &successful {
        if let Some(data) = page.data.as_ref() {
            merge_payment(&mut combined_payment, &data.payment_details);
        }
    }

    let main_data = main_page.and_then(|p| p.data.as_ref());
    let pages_with_line_items = successful
        .iter()
        .filter(|p| p.data.as_ref().is_some_and(|d| !d.line_items.is_empty()))
        .count();

    let overall_quality = if successful.len() == page_results.len() {
        "high"
    } else if !successful.is_empty() {
        "medium"
    } else {
        "low"
    };

    debug!(
        "Combined {} page(s): {} line item(s), quality {}",
        page_results.len(),
        line_items.len(),
        overall_quality
    );

    let pdf_info = PdfInfo {
        source_pdf: pdf_filename.to_string(),
        total_pages: page_results.len(),
        successful_pages: successful.len(),
        failed_pages: failed_count,
        processing_date: Local::now().to_rfc3339(),
    };
    let processing_summary = ProcessingSummary {
        total_line_items_found: line_items.len(),
        pages_with_line_items,
        overall_quality: overall_quality.to_string(),
    };
    let combined_data = CombinedData {
        invoice_header: main_data.map(|d| d.invoice_header.clone()).unwrap_or_default(),
        customer_details: main_data
            .map(|d| d.customer_details.clone())
            .unwrap_or_default(),
        line_items,
        financial_summary: main_data
            .map(|d| d.financial_summary.clone())
            .unwrap_or_default(),
        payment_details: combined_payment,
        terms_and_conditions: combined_terms,
        additional_info: main_data.map(|d| d.additional_info.clone()).unwrap_or_default(),
    };

    CombinedInvoice {
        pdf_info,
        combined_data,
        processing_summary,
        page_by_page_results: page_results,
    }
}

/// Accretion starts from empty slots, not sentinels: a field no page spoke
/// to stays visibly blank in the combined record.
fn empty_terms() -> TermsAndConditions {
    TermsAndConditions {
        payment_terms: String::new(),
        delivery_terms: String::new(),
        warranty_terms: String::new(),
        return_policy: String::new(),
        late_payment_charges: String::new(),
        jurisdiction: String::new(),
        other_conditions: Vec::new(),
    }
}

/// First informative value wins the slot; a later different value accretes
/// as `"first | second"`; an equal value is a no-op.
fn merge_scalar(slot: &mut String, value: &str) {
    if !is_informative(value) {
        return;
    }
    if !is_informative(slot) {
        *slot = value.to_string();
    } else if slot != value {
        *slot = format!("{slot} | {value}");
    }
}

fn merge_terms(combined: &mut TermsAndConditions, page: &TermsAndConditions) {
    merge_scalar(&mut combined.payment_terms, &page.payment_terms);
    merge_scalar(&mut combined.delivery_terms, &page.delivery_terms);
    merge_scalar(&mut combined.warranty_terms, &page.warranty_terms);
    merge_scalar(&mut combined.return_policy, &page.return_policy);
    merge_scalar(
        &mut combined.late_payment_charges,
        &page.late_payment_charges,
    );
    merge_scalar(&mut combined.jurisdiction, &page.jurisdiction);
    for condition in &page.other_conditions {
        // Duplicates are kept on purpose: identical wording on two pages is
        // still two statements in the source document.
        if is_informative(condition) {
            combined.other_conditions.push(condition.clone());
        }
    }
}

fn merge_payment(combined: &mut PaymentDetails, page: &PaymentDetails) {
    merge_scalar(&mut combined.payment_terms, &page.payment_terms);
    merge_scalar(&mut combined.payment_method, &page.payment_method);
    merge_scalar(&mut combined.bank_name, &page.bank_name);
    merge_scalar(&mut combined.account_number, &page.account_number);
    merge_scalar(&mut combined.ifsc_code, &page.ifsc_code);
    merge_scalar(&mut combined.branch, &page.branch);
    merge_scalar(&mut combined.upi_id, &page.upi_id);
    merge_scalar(&mut combined.advance_paid, &page.advance_paid);
    merge_scalar(&mut combined.balance_due, &page.balance_due);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ExtractionResult, LineItem, PageInfo};

    fn page_info(page_number: u32, total_pages: u32) -> PageInfo {
        PageInfo {
            page_number,
            total_pages,
            source_pdf: "scan.pdf".to_string(),
            page_image: format!("scan_page_{page_number}.jpg"),
            processing_failed: false,
        }
    }

    fn page(page_number: u32, total_pages: u32, data: ExtractionResult) -> PageResult {
        PageResult::extracted(page_info(page_number, total_pages), data)
    }

    fn failed_page(page_number: u32, total_pages: u32) -> PageResult {
        PageResult::failed(page_info(page_number, total_pages), "Page processing failed")
    }

    fn item(description: &str) -> LineItem {
        LineItem {
            description: description.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn main_page_is_first_with_a_named_vendor() {
        let mut page1 = ExtractionResult::default(); // vendor stays "N/A"
        page1.customer_details.customer_name = "Page One Customer".to_string();
        let mut page2 = ExtractionResult::default();
        page2.invoice_header.vendor_name = "Acme Corp".to_string();
        page2.customer_details.customer_name = "Page Two Customer".to_string();
        let page3 = ExtractionResult::default();

        let combined = combine_page_results(
            vec![page(1, 3, page1), page(2, 3, page2), page(3, 3, page3)],
            "scan.pdf",
        );

        assert_eq!(combined.combined_data.invoice_header.vendor_name, "Acme Corp");
        // Header-like sections travel with the main page, not page 1.
        assert_eq!(
            combined.combined_data.customer_details.customer_name,
            "Page Two Customer"
        );
    }

    #[test]
    fn falls_back_to_first_successful_page_without_vendor() {
        let mut page1 = ExtractionResult::default();
        page1.invoice_header.invoice_number = "INV-1".to_string();
        let combined = combine_page_results(
            vec![page(1, 2, page1), page(2, 2, ExtractionResult::default())],
            "scan.pdf",
        );
        assert_eq!(combined.combined_data.invoice_header.invoice_number, "INV-1");
    }

    #[test]
    fn line_items_concatenate_in_page_order_with_source_tags() {
        let mut page1 = ExtractionResult::default();
        page1.line_items.push(item("Bolts"));
        page1.line_items.push(LineItem::default()); // all-sentinel, dropped
        let mut page2 = ExtractionResult::default();
        page2.line_items.push(item("Nuts"));
        page2.line_items.push(item("Washers"));

        let combined = combine_page_results(
            vec![page(1, 2, page1), page(2, 2, page2)],
            "scan.pdf",
        );

        let items = &combined.combined_data.line_items;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].description, "Bolts");
        assert_eq!(items[0].source_page, Some(1));
        assert_eq!(items[1].description, "Nuts");
        assert_eq!(items[1].source_page, Some(2));
        assert_eq!(items[2].description, "Washers");
        assert_eq!(combined.processing_summary.total_line_items_found, 3);
        assert_eq!(combined.processing_summary.pages_with_line_items, 2);
    }

    #[test]
    fn conflicting_payment_terms_accrete_instead_of_overwriting() {
        let mut page_a = ExtractionResult::default();
        page_a.invoice_header.vendor_name = "Acme Corp".to_string();
        page_a.payment_details.payment_terms = "Net 30".to_string();
        let mut page_b = ExtractionResult::default();
        page_b.payment_details.payment_terms = "Net 45".to_string();

        let combined = combine_page_results(
            vec![page(1, 2, page_a), page(2, 2, page_b)],
            "scan.pdf",
        );

        assert_eq!(
            combined.combined_data.payment_details.payment_terms,
            "Net 30 | Net 45"
        );
    }

    #[test]
    fn equal_values_do_not_duplicate() {
        let mut page_a = ExtractionResult::default();
        page_a.terms_and_conditions.jurisdiction = "Mumbai".to_string();
        let mut page_b = ExtractionResult::default();
        page_b.terms_and_conditions.jurisdiction = "Mumbai".to_string();

        let combined = combine_page_results(
            vec![page(1, 2, page_a), page(2, 2, page_b)],
            "scan.pdf",
        );

        assert_eq!(combined.combined_data.terms_and_conditions.jurisdiction, "Mumbai");
    }

    #[test]
    fn other_conditions_concatenate_allowing_duplicates() {
        let mut page_a = ExtractionResult::default();
        page_a.terms_and_conditions.other_conditions =
            vec!["Goods once sold".to_string(), "N/A".to_string()];
        let mut page_b = ExtractionResult::default();
        page_b.terms_and_conditions.other_conditions =
            vec!["Goods once sold".to_string(), "Subject to stock".to_string()];

        let combined = combine_page_results(
            vec![page(1, 2, page_a), page(2, 2, page_b)],
            "scan.pdf",
        );

        assert_eq!(
            combined.combined_data.terms_and_conditions.other_conditions,
            vec!["Goods once sold", "Goods once sold", "Subject to stock"]
        );
    }

    #[test]
    fn terms_accrete_across_all_pages_not_just_main() {
        let mut page_a = ExtractionResult::default();
        page_a.invoice_header.vendor_name = "Acme Corp".to_string();
        let mut page_b = ExtractionResult::default();
        page_b.terms_and_conditions.warranty_terms = "12 months".to_string();

        let combined = combine_page_results(
            vec![page(1, 2, page_a), page(2, 2, page_b)],
            "scan.pdf",
        );

        assert_eq!(
            combined.combined_data.terms_and_conditions.warranty_terms,
            "12 months"
        );
        // A field no page spoke to stays blank, not sentinel.
        assert_eq!(combined.combined_data.terms_and_conditions.return_policy, "");
    }

    #[test]
    fn failed_pages_lower_quality_and_are_counted() {
        let mut page1 = ExtractionResult::default();
        page1.invoice_header.vendor_name = "Acme Corp".to_string();
        page1.line_items.push(item("Bolts"));

        let combined = combine_page_results(
            vec![page(1, 2, page1), failed_page(2, 2)],
            "scan.pdf",
        );

        assert_eq!(combined.pdf_info.total_pages, 2);
        assert_eq!(combined.pdf_info.successful_pages, 1);
        assert_eq!(combined.pdf_info.failed_pages, 1);
        assert_eq!(combined.processing_summary.overall_quality, "medium");
        assert_eq!(combined.page_by_page_results.len(), 2);
        assert!(combined.page_by_page_results[1].error.is_some());
    }

    #[test]
    fn quality_is_high_when_all_pages_succeed_and_low_when_none_do() {
        let all_good = combine_page_results(
            vec![page(1, 1, ExtractionResult::default())],
            "scan.pdf",
        );
        assert_eq!(all_good.processing_summary.overall_quality, "high");

        let all_bad = combine_page_results(
            vec![failed_page(1, 2), failed_page(2, 2)],
            "scan.pdf",
        );
        assert_eq!(all_bad.processing_summary.overall_quality, "low");
        assert_eq!(all_bad.pdf_info.successful_pages, 0);
        // No main page: header-like sections fall back to sentinels.
        assert_eq!(all_bad.combined_data.invoice_header.vendor_name, "N/A");
    }
}
