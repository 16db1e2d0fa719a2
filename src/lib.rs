//! # edgequake-catalog
//!
//! Extract normalized supplier product catalogs from web pages and PDF
//! brochures using LLMs.
//!
//! Every input (a product page URL or a brochure PDF) is read by a model and
//! turned into the same shape: supplier → categories → product lines →
//! variants. The fragments are merged into one aggregate, which can then be
//! filtered, searched, sorted, exported as CSV / JSON / TXT, or questioned
//! through a chat.
//!
//! ## Pipeline Overview
//!
//! ```text
//! inputs (URLs, PDFs)
//!  │
//!  ├─ 1. Validate  URL shape / file exists and starts with %PDF
//!  ├─ 2. Resolve   fetch the page (HTML → text) or the remote PDF
//!  ├─ 3. Render    rasterise brochure pages via pdfium (spawn_blocking)
//!  ├─ 4. Extract   one model call per input, JSON decoded against the schema
//!  ├─ 5. Tag       stamp every variant with its source
//!  └─ 6. Merge     first supplier wins, categories merge case-insensitively
//! ```
//!
//! Inputs are processed one at a time, in order. A failing input never aborts
//! the run; its error is collected and reported with the others at the end.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_catalog::{extract_catalog, export, ExportFormat, ExtractionConfig, ScrapeInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let inputs = [ScrapeInput::parse("https://example.com/products")];
//!     let output = extract_catalog(&inputs, &config).await?;
//!     println!("{}", export::format(&output.catalog, ExportFormat::Csv)?);
//!     Ok(())
//! }
//! ```
//!
//! For an interactive front end, drive a [`Session`]: it owns the
//! [`AppState`], reports progress between inputs, streams chat replies and
//! remembers the OCR quality preference.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `catalog-extract` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-catalog = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod adapter;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod merge;
pub mod pipeline;
pub mod prefs;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod state;
pub mod tag;
pub mod view;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use adapter::{ExtractionAdapter, LlmAdapter, ReplyStream};
pub use catalog::{
    Catalog, CatalogSummary, Category, ChatMessage, ChatRole, Confidence, DetectionResult,
    ProductLine, ScrapeInput, Variant,
};
pub use chat::{ChatCancelHandle, ChatSubscription};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, OcrQuality};
pub use error::{CatalogError, ParseError, SourceError, SourceFailure};
pub use export::{ExportFile, ExportFormat};
pub use extract::{
    detect_products, extract_catalog, extract_catalog_sync, run_extraction, ExtractionRun,
    RunOutput, RunStats,
};
pub use prefs::PreferenceStore;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{ChatPump, ExportScope, Session};
pub use state::{Action, AppState, LoadingState};
pub use view::{DerivedView, SortOption, ViewQuery};
