//! Configuration types for invoice extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across requests and to diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely
//! on well-documented defaults for the rest.

use crate::error::ExtractError;
use crate::pipeline::currency::Currency;
use crate::pipeline::llm::VisionModel;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a single document-extraction request.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use invoice2json::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o")
///     .max_tokens(4000)
///     .results_dir("resultjson")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Vision model identifier, e.g. "gpt-4o". If None, `OPENAI_MODEL` from
    /// the environment is used, falling back to [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible chat-completions API. If None,
    /// `OPENAI_BASE_URL` from the environment is used, falling back to
    /// [`DEFAULT_API_BASE`].
    ///
    /// Point this at a compatible gateway (Azure, OpenRouter, a local
    /// Ollama) to swap providers without code changes.
    pub api_base: Option<String>,

    /// Pre-constructed vision capability. Takes precedence over
    /// `api_base`/environment resolution; the injection point for tests and
    /// custom middleware.
    pub vision: Option<Arc<dyn VisionModel>>,

    /// Sampling temperature for the extraction completion. Default: 0.1.
    ///
    /// Low temperature keeps the model deterministic and faithful to what it
    /// sees on the page — exactly what structured extraction wants.
    pub temperature: f32,

    /// Maximum tokens the model may generate for a full-schema extraction.
    /// Default: 4000.
    ///
    /// Dense invoices (dozens of line items plus terms text) routinely
    /// exceed 2 500 output tokens. Setting this too low truncates the JSON
    /// mid-field, forcing the repair path on every call.
    pub max_tokens: usize,

    /// Token cap for the simplified fallback extraction. Default: 1500.
    ///
    /// The reduced schema summarises line items instead of listing them, so
    /// a small cap is enough and keeps the recovery attempt cheap.
    pub simplified_max_tokens: usize,

    /// Maximum rendered page dimension (width or height) in pixels when
    /// rasterising a PDF. Default: 2000.
    ///
    /// A safety cap independent of the page's physical size, keeping memory
    /// bounded and the rendered image within vision-API sweet spots.
    pub max_render_pixels: u32,

    /// Longest-side cap applied after enhancement. Default: 2048.
    ///
    /// Enhanced scans above this are uniformly downscaled, preserving aspect
    /// ratio, before re-submission.
    pub max_image_pixels: u32,

    /// Currency assumed when no symbol, code, word, or tax indicator is
    /// found anywhere in the extraction. Default: [`Currency::Inr`].
    ///
    /// A policy default, not a detection; make it match your document
    /// population.
    pub default_currency: Currency,

    /// Directory receiving individual and master result files.
    /// Default: `resultjson`.
    pub results_dir: PathBuf,

    /// Whether to write result artifacts at all. Default: true.
    pub persist: bool,
}

/// Model used when neither the config nor `OPENAI_MODEL` names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// API base used when neither the config nor `OPENAI_BASE_URL` names one.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            api_base: None,
            vision: None,
            temperature: 0.1,
            max_tokens: 4000,
            simplified_max_tokens: 1500,
            max_render_pixels: 2000,
            max_image_pixels: 2048,
            default_currency: Currency::Inr,
            results_dir: PathBuf::from("resultjson"),
            persist: true,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("vision", &self.vision.as_ref().map(|_| "<dyn VisionModel>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("simplified_max_tokens", &self.simplified_max_tokens)
            .field("max_render_pixels", &self.max_render_pixels)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("default_currency", &self.default_currency)
            .field("results_dir", &self.results_dir)
            .field("persist", &self.persist)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.config.api_base = Some(url.into());
        self
    }

    pub fn vision(mut self, vision: Arc<dyn VisionModel>) -> Self {
        self.config.vision = Some(vision);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn simplified_max_tokens(mut self, n: usize) -> Self {
        self.config.simplified_max_tokens = n;
        self
    }

    pub fn max_render_pixels(mut self, px: u32) -> Self {
        self.config.max_render_pixels = px.max(100);
        self
    }

    pub fn max_image_pixels(mut self, px: u32) -> Self {
        self.config.max_image_pixels = px.max(100);
        self
    }

    pub fn default_currency(mut self, currency: Currency) -> Self {
        self.config.default_currency = currency;
        self
    }

    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.results_dir = dir.into();
        self
    }

    pub fn persist(mut self, v: bool) -> Self {
        self.config.persist = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_tokens == 0 || c.simplified_max_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "Token caps must be ≥ 1".into(),
            ));
        }
        if c.simplified_max_tokens > c.max_tokens {
            return Err(ExtractError::InvalidConfig(format!(
                "Simplified cap ({}) must not exceed the full cap ({})",
                c.simplified_max_tokens, c.max_tokens
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ExtractionConfig::default();
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, 4000);
        assert_eq!(config.simplified_max_tokens, 1500);
        assert_eq!(config.max_image_pixels, 2048);
        assert_eq!(config.default_currency, Currency::Inr);
        assert_eq!(config.results_dir, PathBuf::from("resultjson"));
        assert!(config.persist);
    }

    #[test]
    fn builder_clamps_temperature() {
        let config = ExtractionConfig::builder()
            .temperature(5.0)
            .build()
            .unwrap();
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn build_rejects_inverted_token_caps() {
        let err = ExtractionConfig::builder()
            .max_tokens(1000)
            .simplified_max_tokens(2000)
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn default_currency_is_configurable() {
        let config = ExtractionConfig::builder()
            .default_currency(Currency::Usd)
            .build()
            .unwrap();
        assert_eq!(config.default_currency, Currency::Usd);
    }
}
