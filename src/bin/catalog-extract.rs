//! CLI binary for edgequake-catalog.
//!
//! A thin shim over the library crate: maps CLI flags to an
//! `ExtractionConfig`, drives a `Session` and prints or saves the export.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_catalog::export::{self, UTF8_BOM};
use edgequake_catalog::pipeline::render;
use edgequake_catalog::{
    Action, ChatPump, ExportFormat, ExportScope, ExtractionConfig, ExtractionProgressCallback,
    LlmAdapter, OcrQuality, PreferenceStore, ProgressCallback, ScrapeInput, Session, SortOption,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders a progress bar over the inputs and one log line per source.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Checking inputs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} sources  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting catalog from {total} source(s)…"))
        ));
    }

    fn on_source_start(&self, _index: usize, _total: usize, source: &str) {
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(source.to_string());
    }

    fn on_source_complete(&self, index: usize, total: usize, source: &str, variants: usize) {
        self.bar.println(format!(
            "  {} [{:>2}/{:<2}] {}  {}  {}",
            green("✓"),
            index + 1,
            total,
            source,
            dim(&format!("{variants} variants")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_source_error(&self, index: usize, total: usize, source: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} [{:>2}/{:<2}] {}  {}  {}",
            red("✗"),
            index + 1,
            total,
            source,
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total: usize, succeeded: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!("{} {} sources extracted", green("✔"), bold(&succeeded.to_string()));
        } else {
            eprintln!(
                "{} {}/{} sources extracted  ({} failed)",
                if succeeded == 0 { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a catalog from a product page (JSON on stdout)
  catalog-extract https://example.com/products

  # Several sources merged into one CSV file in ./out
  catalog-extract https://example.com/pumps brochure.pdf --format csv -o out

  # Only the pumps, cheapest first
  catalog-extract brochure.pdf --category Pumps --sort price-asc --export-view

  # Check whether the sources look like catalogs before extracting
  catalog-extract --detect-only https://example.com/about brochure.pdf

  # Ask a question about the extracted catalog
  catalog-extract brochure.pdf --ask "Which pump has the highest flow rate?"

QUALITY:
  standard   faster, cheaper model; fine for clean web pages
  high       stronger model; reads dense brochure tables reliably (default)
  The last --quality choice is remembered between runs.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY                 OpenAI API key
  ANTHROPIC_API_KEY              Anthropic API key
  GEMINI_API_KEY                 Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER         Override provider (openai, anthropic, gemini, ollama)
  PDFIUM_LIB_PATH                Path to an existing libpdfium
  EDGEQUAKE_CATALOG_CONFIG_DIR   Directory of the preference file
"#;

/// Extract supplier product catalogs from web pages and PDF brochures.
#[derive(Parser, Debug)]
#[command(
    name = "catalog-extract",
    version,
    about = "Extract supplier product catalogs from web pages and PDF brochures using LLMs",
    long_about = "Read product pages (URLs) and brochures (PDF files) with an LLM, merge what it \
finds into one normalized catalog (supplier, categories, product lines, variants) and export it \
as JSON, CSV or plain text.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Product page URLs or local PDF brochure paths, processed in order.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write the export into this directory instead of stdout.
    #[arg(short, long, env = "CATALOG_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Export format.
    #[arg(long, env = "CATALOG_FORMAT", value_enum, default_value = "json")]
    format: FormatArg,

    /// Only keep these categories (repeatable, exact name).
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Keep variants whose name, SKU or description contains this text.
    #[arg(long)]
    search: Option<String>,

    /// Order of variants within each product line.
    #[arg(long, value_enum, default_value = "default")]
    sort: SortArg,

    /// Export the filtered view instead of the whole catalog.
    #[arg(long)]
    export_view: bool,

    /// Extraction quality. Remembered for later runs.
    #[arg(long, env = "CATALOG_QUALITY", value_enum)]
    quality: Option<QualityArg>,

    /// Only check whether each input looks like a product catalog.
    #[arg(long)]
    detect_only: bool,

    /// Keep the merged catalog when some sources fail.
    #[arg(long, env = "CATALOG_KEEP_PARTIAL")]
    keep_partial: bool,

    /// Ask a question about the extracted catalog and stream the answer.
    #[arg(long, value_name = "QUESTION")]
    ask: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Model for standard quality and detection.
    #[arg(long, env = "CATALOG_STANDARD_MODEL")]
    standard_model: Option<String>,

    /// Model for high quality and chat.
    #[arg(long, env = "CATALOG_HIGH_MODEL")]
    high_model: Option<String>,

    /// Path to a text file containing a custom extraction system prompt.
    #[arg(long, env = "CATALOG_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "CATALOG_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// HTTP fetch timeout in seconds.
    #[arg(long, env = "CATALOG_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "CATALOG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CATALOG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CATALOG_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Csv,
    Json,
    Txt,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
            FormatArg::Txt => ExportFormat::Txt,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum QualityArg {
    Standard,
    High,
}

impl From<QualityArg> for OcrQuality {
    fn from(v: QualityArg) -> Self {
        match v {
            QualityArg::Standard => OcrQuality::Standard,
            QualityArg::High => OcrQuality::High,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Default,
    NameAsc,
    NameDesc,
    PriceAsc,
    PriceDesc,
}

impl From<SortArg> for SortOption {
    fn from(v: SortArg) -> Self {
        match v {
            SortArg::Default => SortOption::Default,
            SortArg::NameAsc => SortOption::NameAsc,
            SortArg::NameDesc => SortOption::NameDesc,
            SortArg::PriceAsc => SortOption::PriceAsc,
            SortArg::PriceDesc => SortOption::PriceDesc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless verbose output was asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.detect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let inputs: Vec<ScrapeInput> = cli.inputs.iter().map(|i| ScrapeInput::parse(i)).collect();

    // ── Ensure PDFium is available before any work starts ─────────────────
    if inputs.iter().any(|i| matches!(i, ScrapeInput::File(_))) {
        render::ensure_pdfium()
            .await
            .context("PDF brochures need the pdfium library")?;
    }

    // ── Build config and session ─────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let adapter = LlmAdapter::from_config(&config).context("Failed to set up the LLM provider")?;

    let adapter = Arc::new(adapter);
    let mut session = Session::new(adapter.clone(), config.clone());
    if let Some(prefs) = PreferenceStore::default_location() {
        session = session.with_preferences(prefs);
    }
    if let Some(quality) = cli.quality {
        if let Err(e) = session.set_ocr_quality(quality.into()) {
            warn!("{}; --quality applies to this run only", e);
            let mut config = config;
            config.ocr_quality = quality.into();
            session = Session::new(adapter, config);
        }
    }

    // ── Detect-only mode ─────────────────────────────────────────────────
    if cli.detect_only {
        let results = session.detect(&inputs).await.context("Detection failed")?;
        if matches!(cli.format, FormatArg::Json) {
            println!(
                "{}",
                serde_json::to_string_pretty(&results).context("Failed to serialise results")?
            );
        } else {
            for r in &results {
                println!("{}\t{}\t{}", r.confidence, r.source, r.summary);
            }
        }
        return Ok(());
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let output = session.scrape(&inputs).await.context("Extraction failed")?;
    if !cli.quiet {
        for failure in &output.failures {
            eprintln!("{} {}: {}", cyan("⚠"), failure.source, failure.error);
        }
        eprintln!(
            "{}  {}  {}",
            bold(&output.catalog.supplier_name),
            output.catalog.summary(),
            dim(&format!("{}ms", output.stats.total_duration_ms)),
        );
    }

    // ── View ─────────────────────────────────────────────────────────────
    for category in &cli.categories {
        session.dispatch(Action::ToggleCategory(category.clone()));
    }
    if let Some(ref search) = cli.search {
        session.dispatch(Action::SetSearch(search.clone()));
    }
    session.dispatch(Action::SetSort(cli.sort.into()));

    // ── Export ───────────────────────────────────────────────────────────
    let scope = if cli.export_view {
        ExportScope::View
    } else {
        ExportScope::Catalog
    };
    let file = session
        .export(cli.format.into(), scope)
        .context("Export failed")?;

    if let Some(ref dir) = cli.output {
        let path = export::write_export(&file, dir).await?;
        if !cli.quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    } else {
        let body = file.bytes.strip_prefix(UTF8_BOM).unwrap_or(file.bytes.as_slice());
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(body).context("Failed to write to stdout")?;
        if !body.ends_with(b"\n") {
            handle.write_all(b"\n").ok();
        }
    }

    // ── Chat ─────────────────────────────────────────────────────────────
    if let Some(ref question) = cli.ask {
        ask(&mut session, question).await?;
    }

    Ok(())
}

/// Stream the answer to `question` onto stderr. Ctrl-C stops the reply.
async fn ask(session: &mut Session, question: &str) -> Result<()> {
    let handle = session
        .start_chat(question)
        .await
        .context("Could not start the chat")?;
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    eprintln!("\n{} {}", cyan("?"), bold(question));
    let mut stderr = io::stderr();
    loop {
        match session.pump_chat().await {
            ChatPump::Chunk(chunk) => {
                stderr.write_all(chunk.as_bytes()).ok();
                stderr.flush().ok();
            }
            ChatPump::Failed(_) => {
                if let Some(last) = session.state().chat.last() {
                    eprint!("{}", red(&last.text));
                }
                break;
            }
            ChatPump::Done => break,
        }
    }
    eprintln!();
    interrupt.abort();
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .keep_partial(cli.keep_partial)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = cli.standard_model {
        builder = builder.standard_model(model.clone());
    }
    if let Some(ref model) = cli.high_model {
        builder = builder.high_model(model.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
