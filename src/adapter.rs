//! The extraction boundary: the [`ExtractionAdapter`] trait and its
//! LLM-backed implementation.
//!
//! The run logic in [`crate::extract`] and [`crate::session`] only ever talks
//! to `dyn ExtractionAdapter`, so tests drive the whole aggregation pipeline
//! with scripted adapters and never touch the network.

use crate::catalog::{Catalog, ChatMessage, DetectionResult, ScrapeInput};
use crate::config::{ExtractionConfig, OcrQuality};
use crate::error::{CatalogError, SourceError};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::llm::{self, CallSettings};
use crate::pipeline::{decode, encode, render};
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{debug, info};

/// Chat reply delivered as text fragments, in order.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<String, SourceError>> + Send>>;

/// Turns inputs into catalog fragments and answers questions about a catalog.
///
/// Every call is single-attempt. Implementations report failures as
/// [`SourceError`]; the caller decides whether the run continues.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// Extract a catalog fragment from one input.
    async fn extract(&self, input: &ScrapeInput, quality: OcrQuality) -> Result<Catalog, SourceError>;

    /// Judge whether one input looks like a product catalog.
    async fn detect(&self, input: &ScrapeInput) -> Result<DetectionResult, SourceError>;

    /// Answer `message` about `catalog`.
    ///
    /// `history` holds the turns before `message`, oldest first.
    async fn chat(
        &self,
        catalog: &Catalog,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<ReplyStream, SourceError>;
}

/// [`ExtractionAdapter`] backed by edgequake-llm providers.
///
/// One provider is resolved per quality tier when the adapter is built, so a
/// missing credential surfaces before any run starts.
pub struct LlmAdapter {
    standard: Arc<dyn LLMProvider>,
    high: Arc<dyn LLMProvider>,
    config: ExtractionConfig,
}

impl LlmAdapter {
    /// Resolve providers for both tiers from `config` and the environment.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, CatalogError> {
        let standard = resolve_provider(config, &config.standard_model)?;
        let high = if config.standard_model == config.high_model {
            Arc::clone(&standard)
        } else {
            resolve_provider(config, &config.high_model)?
        };
        info!(
            "LLM adapter ready: standard model {}, high model {}",
            config.standard_model, config.high_model
        );
        Ok(Self {
            standard,
            high,
            config: config.clone(),
        })
    }

    /// Build an adapter around explicit providers.
    pub fn with_providers(
        standard: Arc<dyn LLMProvider>,
        high: Arc<dyn LLMProvider>,
        config: &ExtractionConfig,
    ) -> Self {
        Self {
            standard,
            high,
            config: config.clone(),
        }
    }

    fn provider_for(&self, quality: OcrQuality) -> &Arc<dyn LLMProvider> {
        match quality {
            OcrQuality::Standard => &self.standard,
            OcrQuality::High => &self.high,
        }
    }

    fn settings(&self) -> CallSettings {
        CallSettings {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            timeout_secs: self.config.api_timeout_secs,
        }
    }

    fn extraction_prompt(&self, default_prompt: &str) -> String {
        prompts::with_schema(self.config.system_prompt.as_deref().unwrap_or(default_prompt))
    }

    async fn resolve(&self, input: &ScrapeInput) -> Result<ResolvedInput, SourceError> {
        input::resolve_input(
            input,
            self.config.download_timeout_secs,
            self.config.page_text_limit,
        )
        .await
    }
}

#[async_trait]
impl ExtractionAdapter for LlmAdapter {
    async fn extract(&self, input: &ScrapeInput, quality: OcrQuality) -> Result<Catalog, SourceError> {
        let source = input.source_name();
        let resolved = self.resolve(input).await?;

        let messages = match &resolved {
            ResolvedInput::WebPage { url, text } => {
                if text.trim().is_empty() {
                    return Err(SourceError::DocumentUnreadable {
                        detail: format!("{url} has no readable text"),
                    });
                }
                let system = self.extraction_prompt(prompts::WEB_PAGE_SYSTEM_PROMPT);
                llm::text_messages(Some(&system), &prompts::web_page_instruction(url, text))
            }
            ResolvedInput::Local(path) | ResolvedInput::Downloaded { path, .. } => {
                let pages = render::render_pages(path, self.config.max_rendered_pixels).await?;
                let images = pages
                    .iter()
                    .map(encode::encode_page)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| SourceError::DocumentUnreadable {
                        detail: format!("page encoding failed: {e}"),
                    })?;
                debug!("{}: sending {} page images", source, images.len());
                let system = self.extraction_prompt(prompts::DOCUMENT_SYSTEM_PROMPT);
                llm::document_messages(&system, &prompts::document_instruction(&source), images)
            }
        };

        let reply = llm::complete(self.provider_for(quality), &messages, self.settings(), &source).await?;
        Ok(decode::decode_catalog(&reply)?)
    }

    async fn detect(&self, input: &ScrapeInput) -> Result<DetectionResult, SourceError> {
        let source = input.source_name();
        let resolved = self.resolve(input).await?;

        let content = match &resolved {
            ResolvedInput::WebPage { text, .. } => text.clone(),
            ResolvedInput::Local(path) | ResolvedInput::Downloaded { path, .. } => {
                render::extract_text(path).await?
            }
        };
        let content = input::truncate_chars(&content, self.config.detection_text_limit);

        let messages = llm::text_messages(None, &prompts::detection_prompt(&source, &content));
        let reply = llm::complete(
            self.provider_for(OcrQuality::Standard),
            &messages,
            self.settings(),
            &source,
        )
        .await?;
        Ok(decode::decode_detection(&reply, &source)?)
    }

    async fn chat(
        &self,
        catalog: &Catalog,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<ReplyStream, SourceError> {
        let catalog_json = serde_json::to_string_pretty(catalog).map_err(|e| SourceError::RequestFailed {
            detail: format!("catalog could not be serialised: {e}"),
        })?;
        let messages = llm::chat_messages(&prompts::chat_system_prompt(&catalog_json), history, message);

        let reply = llm::complete(self.provider_for(OcrQuality::High), &messages, self.settings(), "chat").await?;
        Ok(Box::pin(stream::once(async move { Ok(reply) })))
    }
}

// ── Provider resolution ──────────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, CatalogError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        CatalogError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the provider for one tier, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used for both tiers as-is.
/// 2. **Named provider** (`config.provider_name`) with the tier's model.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    which pins one model for both tiers.
/// 4. **OpenAI** with the tier's model when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &ExtractionConfig, model: &str) -> Result<Arc<dyn LLMProvider>, CatalogError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| CatalogError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or \
                EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
