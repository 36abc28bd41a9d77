//! End-to-end integration tests for invoice2json.
//!
//! These drive the public API with a scripted vision capability instead of a
//! live provider, so they are deterministic, offline, and assert the
//! pipeline's observable contract: dispatch, retry bounds, page isolation,
//! aggregation, and the transport event sequence.

use async_trait::async_trait;
use invoice2json::{
    extract_with_retry, process_document, process_page_images, ChannelProgressSink,
    ExtractError, ExtractionConfig, ExtractionData, ImageData, NoopProgressSink, NoticeLevel,
    TransportEvent, VisionModel,
};
use serde_json::json;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Scripted vision capability: pops one canned response per call.
struct ScriptedVision {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedVision {
    fn new(responses: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for ScriptedVision {
    async fn describe_image(
        &self,
        _prompt: &str,
        _image: ImageData,
        _max_tokens: usize,
    ) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or(Err("script exhausted".to_string()));
        next.map_err(|message| ExtractError::ApiError { message })
    }
}

fn invoice_response(readability: &str, vendor: &str, total: &str) -> String {
    json!({
        "quality_assessment": {
            "quality_too_poor": false,
            "quality_issues": [],
            "readability_score": readability,
            "can_extract_data": true,
            "preprocessing_recommended": false
        },
        "invoice_header": {"vendor_name": vendor, "invoice_number": "INV-2024-001"},
        "line_items": [{
            "description": "Consulting services",
            "quantity": "10",
            "unit_price": "$12.00",
            "total_price": "$120.00"
        }],
        "financial_summary": {"total_amount": total, "subtotal": total}
    })
    .to_string()
}

fn png_bytes() -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image::GrayImage::from_pixel(24, 24, image::Luma([230]))
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn page_images(dir: &tempfile::TempDir, count: usize) -> Vec<PathBuf> {
    (1..=count)
        .map(|n| {
            let path = dir.path().join(format!("scan_page_{n}.jpg"));
            image::GrayImage::from_pixel(24, 24, image::Luma([230]))
                .save(&path)
                .unwrap();
            path
        })
        .collect()
}

fn test_config(vision: Arc<ScriptedVision>, results_dir: &std::path::Path) -> ExtractionConfig {
    ExtractionConfig::builder()
        .vision(vision)
        .results_dir(results_dir)
        .build()
        .unwrap()
}

// ── Single-image pipeline ────────────────────────────────────────────────────

#[tokio::test]
async fn clean_image_first_pass_yields_direct_extraction() {
    let results = tempfile::tempdir().unwrap();
    let vision = ScriptedVision::new(vec![Ok(invoice_response(
        "high",
        "Acme Corp",
        "$120.00",
    ))]);
    let config = test_config(vision.clone(), results.path());
    let (sink, mut rx) = ChannelProgressSink::new();

    let stored = process_document("invoice.png", &png_bytes(), &config, &sink)
        .await
        .unwrap()
        .expect("clean image produces a result");

    // Exactly one inference call, a direct (non-combined) record, clean
    // quality, and the verbatim amount with its currency still in place.
    assert_eq!(vision.call_count(), 1);
    let ExtractionData::Invoice(invoice) = &stored.extraction_data else {
        panic!("single image must yield a direct extraction result");
    };
    assert!(!invoice.quality_assessment.quality_too_poor);
    assert_eq!(invoice.financial_summary.total_amount, "$120.00");
    assert_eq!(invoice.invoice_header.currency, "US Dollars ($)");
    assert_eq!(invoice.financial_summary.currency, "US Dollars ($)");

    // Transport contract: notices, then exactly one payload, one closing
    // status with finished=true.
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let payloads = events
        .iter()
        .filter(|e| matches!(e, TransportEvent::Result(_)))
        .count();
    assert_eq!(payloads, 1);
    match events.last().expect("events emitted") {
        TransportEvent::Status(status) => {
            assert!(status.finished);
            assert_eq!(status.level, NoticeLevel::Success);
        }
        other => panic!("stream must end with a status, got {other:?}"),
    }
}

#[tokio::test]
async fn borderline_image_is_enhanced_and_retried_once() {
    let results = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let image = page_images(&dir, 1).remove(0);

    let vision = ScriptedVision::new(vec![
        Ok(invoice_response("medium", "Blur Traders", "₹5,000")),
        Ok(invoice_response("high", "Blur Traders", "₹5,000")),
    ]);
    let config = test_config(vision.clone(), results.path());

    let result = extract_with_retry(vision.as_ref(), &image, &config, &NoopProgressSink)
        .await
        .expect("second attempt accepted");

    assert_eq!(vision.call_count(), 2, "at most two attempts per image");
    assert_eq!(result.invoice_header.currency, "Rupees (₹)");
}

#[tokio::test]
async fn unreadable_image_rejects_without_retry() {
    let results = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let image = page_images(&dir, 1).remove(0);

    let vision = ScriptedVision::new(vec![Ok(json!({
        "quality_assessment": {
            "quality_too_poor": true,
            "quality_issues": ["severe motion blur"],
            "readability_score": "low",
            "can_extract_data": true,
            "preprocessing_recommended": true
        }
    })
    .to_string())]);
    let config = test_config(vision.clone(), results.path());

    let result = extract_with_retry(vision.as_ref(), &image, &config, &NoopProgressSink).await;
    assert!(result.is_none());
    assert_eq!(
        vision.call_count(),
        1,
        "a hard rejection must not spend a second call"
    );
}

// ── Multi-page pipeline ──────────────────────────────────────────────────────

#[tokio::test]
async fn failing_page_is_isolated_and_counted() {
    let results = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let images = page_images(&dir, 2);

    // Page 1 extracts cleanly; page 2 returns garbage for both the full and
    // the simplified attempt, becoming a placeholder failure.
    let vision = ScriptedVision::new(vec![
        Ok(invoice_response("high", "Acme Corp", "$240.00")),
        Ok("complete nonsense".to_string()),
        Ok("still nonsense".to_string()),
    ]);
    let config = test_config(vision.clone(), results.path());

    let combined =
        process_page_images(vision.as_ref(), &images, "scan.pdf", &config, &NoopProgressSink)
            .await;

    assert_eq!(combined.pdf_info.total_pages, 2);
    assert_eq!(combined.pdf_info.successful_pages, 1);
    assert_eq!(combined.pdf_info.failed_pages, 1);
    assert_eq!(combined.processing_summary.overall_quality, "medium");
    assert_eq!(combined.page_by_page_results.len(), 2);
    assert!(combined.page_by_page_results[0].is_success());
    assert!(combined.page_by_page_results[1].error.is_some());

    // Line items come only from the surviving page, tagged with its number.
    assert_eq!(combined.combined_data.line_items.len(), 1);
    assert_eq!(combined.combined_data.line_items[0].source_page, Some(1));
}

#[tokio::test]
async fn pages_merge_with_accreting_terms() {
    let results = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let images = page_images(&dir, 3);

    let page1 = json!({
        "quality_assessment": {"readability_score": "high"},
        "invoice_header": {"vendor_name": "N/A"},
        "line_items": [{"description": "Freight", "total_price": "$30.00"}],
        "payment_details": {"payment_terms": "Net 30"}
    })
    .to_string();
    let page2 = json!({
        "quality_assessment": {"readability_score": "high"},
        "invoice_header": {"vendor_name": "Acme Corp"},
        "financial_summary": {"total_amount": "$270.00"},
        "terms_and_conditions": {"other_conditions": ["Goods once sold cannot be returned"]}
    })
    .to_string();
    let page3 = json!({
        "quality_assessment": {"readability_score": "high"},
        "terms_and_conditions": {"other_conditions": ["Subject to Mumbai jurisdiction"]}
    })
    .to_string();

    let vision = ScriptedVision::new(vec![Ok(page1), Ok(page2), Ok(page3)]);
    let config = test_config(vision.clone(), results.path());

    let combined =
        process_page_images(vision.as_ref(), &images, "scan.pdf", &config, &NoopProgressSink)
            .await;

    // Main page is the first one that names a vendor — page 2.
    assert_eq!(combined.combined_data.invoice_header.vendor_name, "Acme Corp");
    assert_eq!(
        combined.combined_data.financial_summary.total_amount,
        "$270.00"
    );
    // Payment details accrete from every page, not just the main one.
    assert_eq!(combined.combined_data.payment_details.payment_terms, "Net 30");
    // List-valued terms concatenate across pages.
    assert_eq!(
        combined.combined_data.terms_and_conditions.other_conditions,
        vec![
            "Goods once sold cannot be returned",
            "Subject to Mumbai jurisdiction"
        ]
    );
    assert_eq!(combined.processing_summary.overall_quality, "high");
    assert_eq!(combined.processing_summary.total_line_items_found, 1);
    assert_eq!(combined.processing_summary.pages_with_line_items, 1);
}

#[tokio::test]
async fn combined_record_serialises_with_wire_shape() {
    let results = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let images = page_images(&dir, 1);

    let vision = ScriptedVision::new(vec![Ok(invoice_response(
        "high",
        "Acme Corp",
        "$99.00",
    ))]);
    let config = test_config(vision.clone(), results.path());

    let combined =
        process_page_images(vision.as_ref(), &images, "scan.pdf", &config, &NoopProgressSink)
            .await;
    let json = serde_json::to_value(&combined).unwrap();

    assert_eq!(json["pdf_info"]["source_pdf"], "scan.pdf");
    assert!(json["combined_data"]["line_items"].is_array());
    assert!(json["page_by_page_results"].is_array());
    assert_eq!(
        json["page_by_page_results"][0]["page_info"]["page_number"],
        1
    );
    // Successful page results flatten the extraction sections inline.
    assert_eq!(
        json["page_by_page_results"][0]["invoice_header"]["vendor_name"],
        "Acme Corp"
    );
    assert_eq!(json["processing_summary"]["overall_quality"], "high");
}
