//! Configuration types for catalog extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs between the CLI, a [`crate::session::Session`]
//! and tests, and to log exactly what a run was configured with.

use crate::error::CatalogError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use edgequake_catalog::{ExtractionConfig, OcrQuality};
///
/// let config = ExtractionConfig::builder()
///     .ocr_quality(OcrQuality::Standard)
///     .keep_partial(true)
///     .build()
///     .unwrap();
/// assert!(config.keep_partial);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Which model tier extraction calls use. Default: [`OcrQuality::High`].
    pub ocr_quality: OcrQuality,

    /// Model used for [`OcrQuality::Standard`] extraction and for detection.
    /// Default: "gpt-4.1-mini".
    pub standard_model: String,

    /// Model used for [`OcrQuality::High`] extraction and for chat.
    /// Default: "gpt-4.1".
    pub high_model: String,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`
    /// and is used for both quality tiers.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction is transcription, not creative writing; a low temperature
    /// keeps prices and SKUs verbatim.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 16384.
    ///
    /// A large brochure easily yields several hundred variants; the JSON for
    /// those does not fit in a 4k budget.
    pub max_tokens: usize,

    /// Longest edge of a rasterised brochure page, in pixels. Default: 1600.
    pub max_rendered_pixels: u32,

    /// Maximum characters of web-page text sent for extraction. Default: 60000.
    pub page_text_limit: usize,

    /// Maximum characters of text sent for a detection pre-check. Default: 30000.
    pub detection_text_limit: usize,

    /// Timeout for fetching URL inputs, in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Timeout for a single model call, in seconds. Default: 300.
    ///
    /// Calls are single-attempt; a timeout is recorded as a per-source failure.
    pub api_timeout_secs: u64,

    /// Return the partially merged catalog when some sources fail. Default: false.
    ///
    /// With `false`, any failure makes the run return
    /// [`CatalogError::RunFailed`] (which still carries the partial catalog).
    /// With `true`, the run succeeds as long as one source merged and the
    /// failures are reported alongside the catalog as warnings.
    pub keep_partial: bool,

    /// Custom extraction system prompt. If None, the built-in prompts are used.
    pub system_prompt: Option<String>,

    /// Receives per-source progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_quality: OcrQuality::default(),
            standard_model: "gpt-4.1-mini".to_string(),
            high_model: "gpt-4.1".to_string(),
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 16384,
            max_rendered_pixels: 1600,
            page_text_limit: 60_000,
            detection_text_limit: 30_000,
            download_timeout_secs: 60,
            api_timeout_secs: 300,
            keep_partial: false,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("ocr_quality", &self.ocr_quality)
            .field("standard_model", &self.standard_model)
            .field("high_model", &self.high_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("keep_partial", &self.keep_partial)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
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

    /// Model name for the given quality tier.
    pub fn model_for(&self, quality: OcrQuality) -> &str {
        match quality {
            OcrQuality::Standard => &self.standard_model,
            OcrQuality::High => &self.high_model,
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn ocr_quality(mut self, quality: OcrQuality) -> Self {
        self.config.ocr_quality = quality;
        self
    }

    pub fn standard_model(mut self, model: impl Into<String>) -> Self {
        self.config.standard_model = model.into();
        self
    }

    pub fn high_model(mut self, model: impl Into<String>) -> Self {
        self.config.high_model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
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

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn page_text_limit(mut self, chars: usize) -> Self {
        self.config.page_text_limit = chars;
        self
    }

    pub fn detection_text_limit(mut self, chars: usize) -> Self {
        self.config.detection_text_limit = chars;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn keep_partial(mut self, v: bool) -> Self {
        self.config.keep_partial = v;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, CatalogError> {
        let c = &self.config;
        if c.standard_model.trim().is_empty() || c.high_model.trim().is_empty() {
            return Err(CatalogError::InvalidConfig(
                "Model names must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(CatalogError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(CatalogError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────────

/// Model capability used for extraction.
///
/// `High` is slower and more expensive but reads dense brochure tables far
/// more reliably, so it is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrQuality {
    Standard,
    #[default]
    High,
}

impl OcrQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrQuality::Standard => "standard",
            OcrQuality::High => "high",
        }
    }
}

impl FromStr for OcrQuality {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(OcrQuality::Standard),
            "high" => Ok(OcrQuality::High),
            other => Err(CatalogError::InvalidConfig(format!(
                "OCR quality must be 'standard' or 'high', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for OcrQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.ocr_quality, OcrQuality::High);
        assert_eq!(c.model_for(OcrQuality::High), "gpt-4.1");
        assert_eq!(c.model_for(OcrQuality::Standard), "gpt-4.1-mini");
        assert!(!c.keep_partial);
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = ExtractionConfig::builder()
            .temperature(5.0)
            .max_rendered_pixels(10)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_rendered_pixels, 100);

        let err = ExtractionConfig::builder().high_model("  ").build().unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConfig(_)));

        let err = ExtractionConfig::builder().api_timeout_secs(0).build().unwrap_err();
        assert!(err.to_string().contains("Timeouts"));
    }

    #[test]
    fn ocr_quality_parses_exact_values_only() {
        assert_eq!("standard".parse::<OcrQuality>().unwrap(), OcrQuality::Standard);
        assert_eq!("high".parse::<OcrQuality>().unwrap(), OcrQuality::High);
        assert!("HIGH".parse::<OcrQuality>().is_err());
        assert!("".parse::<OcrQuality>().is_err());
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", ExtractionConfig::default());
        assert!(s.contains("gpt-4.1"));
        assert!(s.contains("provider: None"));
    }
}
