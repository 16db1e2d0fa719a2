//! Extraction runs: validate inputs, extract each in order, tag, merge.
//!
//! Inputs are processed strictly one at a time, in input order. Merge order is
//! therefore input order, which is what makes the supplier-name and category
//! ordering rules in [`crate::merge`] deterministic.
//!
//! One failing input never aborts the run. Its error is recorded as a
//! [`SourceFailure`] and the next input is processed; the failures are
//! reported together once every input has been attempted.
//!
//! [`run_extraction`] drives a whole run. Callers that need to act between
//! inputs (the [`crate::session::Session`] reducer, for one) step an
//! [`ExtractionRun`] themselves.

use crate::adapter::{ExtractionAdapter, LlmAdapter};
use crate::catalog::{Catalog, Confidence, DetectionResult, ScrapeInput};
use crate::config::ExtractionConfig;
use crate::error::{CatalogError, SourceError, SourceFailure};
use crate::merge::{finalize, is_empty_result, merge};
use crate::pipeline::input::validate_inputs;
use crate::tag::tag_variants;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Summary used when detection for an input failed outright.
pub const DETECTION_FAILED_SUMMARY: &str = "An error occurred during analysis.";

/// Result of a run that produced a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// The merged catalog.
    pub catalog: Catalog,
    /// Inputs that failed. Only non-empty when the run was configured with
    /// `keep_partial`.
    pub failures: Vec<SourceFailure>,
    pub stats: RunStats,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_sources: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

/// What happened to one input.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    /// The fragment was tagged and merged.
    Merged { source: String, variants: usize },
    /// The input failed and was skipped.
    Failed(SourceFailure),
}

/// Report for one processed input.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// 0-based position of the input.
    pub index: usize,
    pub total: usize,
    pub outcome: SourceOutcome,
}

/// A run in progress, advanced one input at a time with [`ExtractionRun::step`].
///
/// The aggregate belongs to the run until [`ExtractionRun::finish`] hands it
/// over.
pub struct ExtractionRun<'a> {
    inputs: &'a [ScrapeInput],
    config: &'a ExtractionConfig,
    next: usize,
    aggregate: Catalog,
    failures: Vec<SourceFailure>,
    succeeded: usize,
    started: Instant,
}

impl<'a> ExtractionRun<'a> {
    /// Validate every input and start a run.
    ///
    /// # Errors
    /// [`CatalogError::NoInputs`], [`CatalogError::InvalidInput`],
    /// [`CatalogError::FileNotFound`] or [`CatalogError::NotAPdf`] for the
    /// first bad input. No adapter call is made in that case.
    pub fn start(inputs: &'a [ScrapeInput], config: &'a ExtractionConfig) -> Result<Self, CatalogError> {
        validate_inputs(inputs)?;
        info!(
            "Starting extraction: {} input(s), {} quality",
            inputs.len(),
            config.ocr_quality
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_run_start(inputs.len());
        }
        Ok(Self {
            inputs,
            config,
            next: 0,
            aggregate: Catalog::new(),
            failures: Vec::new(),
            succeeded: 0,
            started: Instant::now(),
        })
    }

    pub fn total(&self) -> usize {
        self.inputs.len()
    }

    /// Number of inputs processed so far.
    pub fn completed(&self) -> usize {
        self.next
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.inputs.len()
    }

    /// Progress label for the next input, e.g. `"Processing URL 2 of 3..."`.
    pub fn next_stage(&self) -> Option<String> {
        self.inputs.get(self.next).map(|input| {
            format!(
                "Processing {} {} of {}...",
                input.kind_label(),
                self.next + 1,
                self.inputs.len()
            )
        })
    }

    /// Extract, tag and merge the next input. Returns `None` once every
    /// input has been processed.
    pub async fn step(&mut self, adapter: &dyn ExtractionAdapter) -> Option<StepReport> {
        let index = self.next;
        let input = self.inputs.get(index)?;
        self.next += 1;

        let total = self.inputs.len();
        let source = input.source_name();
        info!("[{}/{}] Extracting {} {}", index + 1, total, input.kind_label(), source);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_source_start(index, total, &source);
        }

        let outcome = match extract_fragment(adapter, input, &source, self.config).await {
            Ok(mut fragment) => {
                tag_variants(&mut fragment, &source);
                let variants = fragment.variants().count();
                merge(&mut self.aggregate, fragment);
                self.succeeded += 1;
                info!("[{}/{}] {}: {} variants merged", index + 1, total, source, variants);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_source_complete(index, total, &source, variants);
                }
                SourceOutcome::Merged { source, variants }
            }
            Err(error) => {
                warn!("[{}/{}] {} failed: {}", index + 1, total, source, error);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_source_error(index, total, &source, &error.to_string());
                }
                let failure = SourceFailure { source, error };
                self.failures.push(failure.clone());
                SourceOutcome::Failed(failure)
            }
        };

        Some(StepReport {
            index,
            total,
            outcome,
        })
    }

    /// Close the run and decide its outcome.
    ///
    /// Inputs not yet stepped are not processed. Callers step until
    /// [`ExtractionRun::is_done`] first.
    pub fn finish(self) -> Result<RunOutput, CatalogError> {
        let total = self.inputs.len();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(total, self.succeeded);
        }

        let mut catalog = self.aggregate;
        finalize(&mut catalog);

        let stats = RunStats {
            total_sources: total,
            succeeded: self.succeeded,
            failed: self.failures.len(),
            total_duration_ms: self.started.elapsed().as_millis() as u64,
        };
        info!(
            "Extraction finished: {}/{} sources, {} in {}ms",
            stats.succeeded,
            total,
            catalog.summary(),
            stats.total_duration_ms
        );

        if self.failures.is_empty() {
            return Ok(RunOutput {
                catalog,
                failures: Vec::new(),
                stats,
            });
        }

        if !self.config.keep_partial {
            return Err(CatalogError::RunFailed {
                failures: self.failures,
                partial: Box::new(catalog),
            });
        }

        if self.succeeded == 0 {
            return Err(CatalogError::AllSourcesFailed {
                failures: self.failures,
            });
        }

        warn!(
            "Keeping partial catalog: {} source(s) failed",
            self.failures.len()
        );
        Ok(RunOutput {
            catalog,
            failures: self.failures,
            stats,
        })
    }
}

/// Extract one input; an empty answer counts as a failure.
async fn extract_fragment(
    adapter: &dyn ExtractionAdapter,
    input: &ScrapeInput,
    source: &str,
    config: &ExtractionConfig,
) -> Result<Catalog, SourceError> {
    let fragment = adapter.extract(input, config.ocr_quality).await?;
    if is_empty_result(&fragment, source) {
        return Err(SourceError::NoProductData);
    }
    Ok(fragment)
}

/// Run a full extraction over `inputs` with `adapter`.
///
/// # Returns
/// `Ok(RunOutput)` when every input merged, or, with `keep_partial`, when at
/// least one did (failures are listed in `RunOutput::failures`).
///
/// # Errors
/// - input validation errors, before any adapter call
/// - [`CatalogError::RunFailed`] when any input failed and `keep_partial` is
///   off; it carries the partial catalog
/// - [`CatalogError::AllSourcesFailed`] when every input failed and
///   `keep_partial` is on
pub async fn run_extraction(
    adapter: &dyn ExtractionAdapter,
    inputs: &[ScrapeInput],
    config: &ExtractionConfig,
) -> Result<RunOutput, CatalogError> {
    let mut run = ExtractionRun::start(inputs, config)?;
    while run.step(adapter).await.is_some() {}
    run.finish()
}

/// Extract a catalog with an [`LlmAdapter`] built from `config`.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use edgequake_catalog::{extract_catalog, ExtractionConfig, ScrapeInput};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let inputs = vec![
///     ScrapeInput::parse("https://example.com/products"),
///     ScrapeInput::parse("brochure.pdf"),
/// ];
/// let output = extract_catalog(&inputs, &ExtractionConfig::default()).await?;
/// println!("{}: {}", output.catalog.supplier_name, output.catalog.summary());
/// # Ok(())
/// # }
/// ```
pub async fn extract_catalog(
    inputs: &[ScrapeInput],
    config: &ExtractionConfig,
) -> Result<RunOutput, CatalogError> {
    validate_inputs(inputs)?;
    let adapter = LlmAdapter::from_config(config)?;
    run_extraction(&adapter, inputs, config).await
}

/// Synchronous wrapper around [`extract_catalog`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_catalog_sync(
    inputs: &[ScrapeInput],
    config: &ExtractionConfig,
) -> Result<RunOutput, CatalogError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CatalogError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_catalog(inputs, config))
}

/// Run the "is this a catalog?" pre-check over every input, in order.
///
/// A failed check never fails the batch: that input gets a
/// [`Confidence::Low`] verdict with [`DETECTION_FAILED_SUMMARY`].
pub async fn detect_products(
    adapter: &dyn ExtractionAdapter,
    inputs: &[ScrapeInput],
) -> Result<Vec<DetectionResult>, CatalogError> {
    validate_inputs(inputs)?;
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let source = input.source_name();
        let result = match adapter.detect(input).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Detection for {} failed: {}", source, e);
                DetectionResult {
                    source,
                    confidence: Confidence::Low,
                    summary: DETECTION_FAILED_SUMMARY.to_string(),
                }
            }
        };
        info!("Detection {}: {}", result.source, result.confidence);
        results.push(result);
    }
    Ok(results)
}
