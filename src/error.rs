//! Error types for the edgequake-catalog library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`CatalogError`] is **fatal**: the operation cannot proceed or the run as a
//!   whole failed (invalid input, provider not configured, one or more sources
//!   failed). Returned as `Err(CatalogError)` from the top-level functions.
//!
//! * [`SourceError`] is **non-fatal**: one input failed (request error, model
//!   returned nothing usable) but the run carries on with the next input.
//!   Collected as [`SourceFailure`] entries and reported together at the end.
//!
//! * [`ParseError`]: the model's reply could not be decoded into the declared
//!   shape. Always wrapped in [`SourceError::Unparsable`].

use crate::catalog::Catalog;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-catalog library.
#[derive(Debug, Error)]
pub enum CatalogError {
    // ── Input validation ──────────────────────────────────────────────────
    /// No URL or file was supplied.
    #[error("No inputs given.\nProvide at least one URL or PDF file.")]
    NoInputs,

    /// The input is not a usable HTTP/HTTPS URL.
    #[error("Invalid URL format: '{input}' ({reason})")]
    InvalidInput { input: String, reason: String },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists but is not a PDF.
    #[error("File is not a PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Configuration ─────────────────────────────────────────────────────
    /// The LLM provider could not be initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install pdfium system-wide, or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Run outcome ───────────────────────────────────────────────────────
    /// At least one source failed.
    ///
    /// `partial` holds whatever the successful sources produced so callers can
    /// decide whether to keep it.
    #[error(
        "Extraction completed with {} error(s):\n\n{}",
        .failures.len(),
        format_failures(.failures)
    )]
    RunFailed {
        failures: Vec<SourceFailure>,
        partial: Box<Catalog>,
    },

    /// Every source failed; there is nothing to keep.
    #[error("All {} sources failed:\n\n{}", .failures.len(), format_failures(.failures))]
    AllSourcesFailed { failures: Vec<SourceFailure> },

    /// Chat requires an extracted catalog and a non-empty message.
    #[error("Chat unavailable: {0}")]
    ChatUnavailable(String),

    // ── Output ────────────────────────────────────────────────────────────
    /// Export was requested before any catalog was extracted.
    #[error("Nothing to export: no catalog has been extracted yet.")]
    NothingToExport,

    /// Catalog could not be serialised for export.
    #[error("Failed to serialise catalog as {format}: {detail}")]
    Serialization { format: String, detail: String },

    /// Could not create or write an export file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not persist the preference file.
    #[error("Failed to save preferences to '{path}': {source}")]
    PreferenceWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Configuration errors are terminal: retrying the same run cannot help.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CatalogError::ProviderNotConfigured { .. }
                | CatalogError::InvalidConfig(_)
                | CatalogError::PdfiumBindingFailed(_)
        )
    }

    /// Failures recorded by a run, if this error came out of one.
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            CatalogError::RunFailed { failures, .. }
            | CatalogError::AllSourcesFailed { failures } => failures,
            _ => &[],
        }
    }
}

fn format_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("- {}: {}", f.source, f.error))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A non-fatal error for a single input.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum SourceError {
    /// The request to the model failed.
    #[error("The request to the AI model failed. {detail}")]
    RequestFailed { detail: String },

    /// The request did not complete in time.
    #[error("The request to the AI model timed out after {secs}s.")]
    Timeout { secs: u64 },

    /// The reply could not be decoded.
    #[error("The model's response was in an unexpected format and could not be read. {0}")]
    Unparsable(ParseError),

    /// The model answered but found nothing at this source.
    #[error("The model did not find any product data at this source.")]
    NoProductData,

    /// The document could not be fetched, opened or rasterised.
    #[error("The document could not be read: {detail}")]
    DocumentUnreadable { detail: String },
}

impl From<ParseError> for SourceError {
    fn from(e: ParseError) -> Self {
        SourceError::Unparsable(e)
    }
}

/// One failed input of an extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    /// URL or file name of the input.
    pub source: String,
    pub error: SourceError,
}

/// The model's reply did not match the declared response shape.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ParseError {
    /// No JSON object anywhere in the reply.
    #[error("No JSON object found in the model's response.")]
    NoJsonObject,

    /// A JSON object was found but it does not fit the schema.
    #[error("Response does not match the expected schema: {detail}")]
    Schema { detail: String },
}
