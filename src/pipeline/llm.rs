//! Vision-model interaction: one extraction attempt per call.
//!
//! This module owns the narrow seam to the inference capability. The
//! [`VisionModel`] trait is the whole contract — "given an image and an
//! instruction, return text" — so tests and custom middleware can stand in
//! for the real provider without touching retry or parsing logic.
//!
//! ## Recovery ladder
//!
//! A response is expected to be JSON but is not guaranteed well-formed:
//!
//! 1. parse the cleaned/repaired full-schema response;
//! 2. on failure, re-ask with the reduced schema and a smaller generation
//!    cap, then expand the summary back into the full record shape;
//! 3. if that fails too, the attempt yields `None` — "this image could not
//!    be processed", which the classifier maps to a page failure, never an
//!    error.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::encode::ImageData;
use crate::pipeline::{currency, encode, repair};
use crate::prompts;
use crate::schema::{
    lenient_string_list, CustomerDetails, ExtractionResult, FinancialSummary, InvoiceHeader,
    LineItem, QualityAssessment, TermsAndConditions,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// The inference capability: one user turn of instruction text plus one
/// inlined image, answered with free text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn describe_image(
        &self,
        prompt: &str,
        image: ImageData,
        max_tokens: usize,
    ) -> Result<String, ExtractError>;
}

/// Production [`VisionModel`] speaking the OpenAI-compatible
/// chat-completions protocol.
///
/// The same wire shape is served by OpenAI itself and by the usual
/// compatible gateways (Azure, OpenRouter, a local Ollama), so swapping the
/// provider is a matter of pointing `api_base` elsewhere.
pub struct OpenAiVision {
    client: reqwest::Client,
    chat_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiVision {
    pub fn new(
        api_base: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, ExtractError> {
        // A vision call over a dense page can legitimately take minutes;
        // anything past this is a stuck connection, not a slow model.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            chat_url: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }
}

#[async_trait]
impl VisionModel for OpenAiVision {
    async fn describe_image(
        &self,
        prompt: &str,
        image: ImageData,
        max_tokens: usize,
    ) -> Result<String, ExtractError> {
        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {
                        "url": image.to_data_url(),
                        "detail": image.detail,
                    }},
                ],
            }],
            "temperature": self.temperature,
            "max_tokens": max_tokens,
        });

        let response = self
            .client
            .post(&self.chat_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractError::ApiError {
                message: if e.is_connect() || e.is_timeout() {
                    format!("could not reach {}: {e}", self.chat_url)
                } else {
                    format!("request failed: {e}")
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::ApiError {
                message: format!(
                    "HTTP {status}: {}",
                    if detail.is_empty() { "no detail" } else { detail.as_str() }
                ),
            });
        }

        let payload: serde_json::Value =
            response.json().await.map_err(|e| ExtractError::ApiError {
                message: format!("response was not JSON: {e}"),
            })?;

        if let Some(usage) = payload.get("usage") {
            debug!(
                "Vision call: {} input tokens, {} output tokens",
                usage["prompt_tokens"], usage["completion_tokens"]
            );
        }

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| ExtractError::ApiError {
                message: "response carried no message content".to_string(),
            })
    }
}

/// Run one extraction attempt against an image on disk.
///
/// `is_retry` marks the attempt as operating on the enhanced artifact, which
/// is reflected in the prompt. Returns `None` when neither the full nor the
/// simplified path produced a parseable record — the caller must treat that
/// as "image could not be processed", not as an error.
pub async fn extract_invoice(
    model: &dyn VisionModel,
    image_path: &Path,
    config: &ExtractionConfig,
    is_retry: bool,
) -> Option<ExtractionResult> {
    let image = match encode::encode_image_file(image_path) {
        Ok(image) => image,
        Err(e) => {
            warn!("Could not encode '{}': {}", image_path.display(), e);
            return None;
        }
    };

    let prompt = prompts::full_extraction_prompt(is_retry);
    let raw = match model
        .describe_image(&prompt, image.clone(), config.max_tokens)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            warn!("Extraction call failed: {}", e);
            return None;
        }
    };

    let cleaned = repair::clean_response(&raw);
    let mut result = match serde_json::from_str::<ExtractionResult>(&cleaned) {
        Ok(result) => result,
        Err(e) => {
            warn!("Full-schema parse failed ({}); trying simplified extraction", e);
            simplified_extraction(model, image, config).await?
        }
    };

    currency::normalize_currency(&mut result, config.default_currency);
    Some(result)
}

/// Reduced-schema fallback for responses that refuse to parse.
async fn simplified_extraction(
    model: &dyn VisionModel,
    image: ImageData,
    config: &ExtractionConfig,
) -> Option<ExtractionResult> {
    let raw = match model
        .describe_image(
            prompts::SIMPLIFIED_EXTRACTION_PROMPT,
            image,
            config.simplified_max_tokens,
        )
        .await
    {
        Ok(text) => text,
        Err(e) => {
            warn!("Simplified extraction call failed: {}", e);
            return None;
        }
    };

    let cleaned = repair::clean_response(&raw);
    match serde_json::from_str::<SimplifiedExtraction>(&cleaned) {
        Ok(simplified) => Some(expand_simplified(simplified)),
        Err(e) => {
            warn!("Simplified extraction also failed to parse: {}", e);
            None
        }
    }
}

/// The reduced schema: header subset plus a line-item summary.
#[derive(Debug, Default, Deserialize)]
struct SimplifiedExtraction {
    #[serde(default)]
    quality_assessment: QualityAssessment,
    #[serde(default)]
    invoice_header: InvoiceHeader,
    #[serde(default)]
    customer_details: CustomerDetails,
    #[serde(default)]
    line_items_summary: LineItemsSummary,
    #[serde(default)]
    financial_summary: FinancialSummary,
    #[serde(default)]
    terms_and_conditions: TermsAndConditions,
}

#[derive(Debug, Default, Deserialize)]
struct LineItemsSummary {
    /// The model sometimes answers with a number, sometimes with a string.
    #[serde(default)]
    total_line_items: serde_json::Value,
    #[serde(default, deserialize_with = "lenient_string_list")]
    sample_items: Vec<String>,
}

impl LineItemsSummary {
    fn count_display(&self) -> String {
        match &self.total_line_items {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) if !s.is_empty() => s.clone(),
            _ => "many".to_string(),
        }
    }
}

/// Expand a summary back into the full record shape: unset sections stay at
/// their sentinel defaults, each sample becomes a placeholder line item.
fn expand_simplified(simplified: SimplifiedExtraction) -> ExtractionResult {
    let mut result = ExtractionResult {
        quality_assessment: simplified.quality_assessment,
        invoice_header: simplified.invoice_header,
        customer_details: simplified.customer_details,
        financial_summary: simplified.financial_summary,
        terms_and_conditions: simplified.terms_and_conditions,
        ..Default::default()
    };

    result.additional_info.notes = format!(
        "Large document with {} items - simplified extraction used",
        simplified.line_items_summary.count_display()
    );
    result.detection_metadata.extraction_method = "simplified".to_string();

    for (i, description) in simplified
        .line_items_summary
        .sample_items
        .iter()
        .take(5)
        .enumerate()
    {
        let item = LineItem {
            item_number: format!("Sample {}", i + 1),
            description: description.clone(),
            ..Default::default()
        };
        result.line_items.push(item);
    }

    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted vision model: pops one canned response per call.
    pub(crate) struct ScriptedVision {
        responses: Mutex<VecDeque<Result<String, String>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedVision {
        pub fn new(responses: Vec<Result<String, String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
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

    pub(crate) fn temp_image() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.png");
        image::GrayImage::from_pixel(16, 16, image::Luma([200]))
            .save(&path)
            .unwrap();
        (dir, path)
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    #[test]
    fn chat_url_tolerates_trailing_slash() {
        let vision = OpenAiVision::new("https://api.openai.com/v1/", "sk-test", "gpt-4o", 0.1)
            .expect("client builds");
        assert_eq!(vision.chat_url, "https://api.openai.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn parses_clean_full_response() {
        let (_dir, path) = temp_image();
        let body = r#"{"invoice_header": {"vendor_name": "Acme Corp"},
                       "financial_summary": {"total_amount": "$100.00"}}"#;
        let vision = ScriptedVision::new(vec![Ok(body.to_string())]);

        let result = extract_invoice(&vision, &path, &config(), false)
            .await
            .expect("should parse");
        assert_eq!(result.invoice_header.vendor_name, "Acme Corp");
        // Currency normalisation ran before return.
        assert_eq!(result.invoice_header.currency, "US Dollars ($)");
        assert_eq!(vision.call_count(), 1);
    }

    #[tokio::test]
    async fn repairs_truncated_full_response() {
        let (_dir, path) = temp_image();
        let body = r#"```json
{"invoice_header": {"vendor_name": "Acme Corp", "invoice_number": "INV-7",
 "currency": "INR"}, "line_items": [{"description": "Bolts"#;
        let vision = ScriptedVision::new(vec![Ok(body.to_string())]);

        let result = extract_invoice(&vision, &path, &config(), false)
            .await
            .expect("repair should make this parse");
        assert_eq!(result.invoice_header.invoice_number, "INV-7");
        assert_eq!(result.line_items.len(), 1);
        assert_eq!(result.line_items[0].description, "Bolts");
        assert_eq!(vision.call_count(), 1, "repair must not trigger a second call");
    }

    #[tokio::test]
    async fn falls_back_to_simplified_on_parse_failure() {
        let (_dir, path) = temp_image();
        let simplified = r#"{"invoice_header": {"vendor_name": "Bulk Traders"},
            "line_items_summary": {"total_line_items": 42,
                "sample_items": ["Cement bags", "Steel rods"]},
            "financial_summary": {"total_amount": "₹2,40,000"}}"#;
        let vision = ScriptedVision::new(vec![
            Ok("this is not json at all".to_string()),
            Ok(simplified.to_string()),
        ]);

        let result = extract_invoice(&vision, &path, &config(), false)
            .await
            .expect("simplified path should succeed");
        assert_eq!(vision.call_count(), 2);
        assert_eq!(result.invoice_header.vendor_name, "Bulk Traders");
        assert_eq!(result.line_items.len(), 2);
        assert_eq!(result.line_items[0].item_number, "Sample 1");
        assert_eq!(result.line_items[0].quantity, "N/A");
        assert_eq!(result.detection_metadata.extraction_method, "simplified");
        assert!(result.additional_info.notes.contains("42"));
        assert_eq!(result.invoice_header.currency, "Rupees (₹)");
    }

    #[tokio::test]
    async fn both_paths_failing_yields_none() {
        let (_dir, path) = temp_image();
        let vision = ScriptedVision::new(vec![
            Ok("garbage".to_string()),
            Ok("also garbage".to_string()),
        ]);

        let result = extract_invoice(&vision, &path, &config(), false).await;
        assert!(result.is_none());
        assert_eq!(vision.call_count(), 2);
    }

    #[tokio::test]
    async fn api_error_yields_none_without_fallback() {
        let (_dir, path) = temp_image();
        let vision = ScriptedVision::new(vec![Err("rate limited".to_string())]);

        let result = extract_invoice(&vision, &path, &config(), false).await;
        assert!(result.is_none());
        assert_eq!(
            vision.call_count(),
            1,
            "a transport error is not a parse error; no simplified retry"
        );
    }

    #[tokio::test]
    async fn sample_items_are_capped_at_five() {
        let (_dir, path) = temp_image();
        let simplified = r#"{"line_items_summary": {"total_line_items": "200",
            "sample_items": ["a", "b", "c", "d", "e", "f", "g"]}}"#;
        let vision = ScriptedVision::new(vec![
            Ok("not json".to_string()),
            Ok(simplified.to_string()),
        ]);

        let result = extract_invoice(&vision, &path, &config(), false)
            .await
            .expect("simplified path should succeed");
        assert_eq!(result.line_items.len(), 5);
        assert_eq!(result.line_items[4].item_number, "Sample 5");
    }
}
