//! Input validation and resolution.
//!
//! Validation runs over every input before the first model call, so a typo in
//! the last path fails fast instead of after several minutes of extraction.
//!
//! Resolution turns a validated [`ScrapeInput`] into something the model can
//! read. A URL is fetched once: if the server hands back a PDF it is saved to
//! a `TempDir` (pdfium needs a file-system path) and treated like a local
//! brochure; otherwise the HTML is reduced to text. The `TempDir` lives inside
//! [`ResolvedInput`], so cleanup happens when the input is dropped.

use crate::catalog::ScrapeInput;
use crate::error::{CatalogError, SourceError};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// A validated input made readable.
pub enum ResolvedInput {
    /// A PDF on the local file system.
    Local(PathBuf),
    /// A URL that served a PDF, downloaded to a temp directory.
    /// The `TempDir` is kept alive until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
    /// A URL that served a web page, reduced to plain text.
    WebPage { url: String, text: String },
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Validate every input, stopping at the first problem.
pub fn validate_inputs(inputs: &[ScrapeInput]) -> Result<(), CatalogError> {
    if inputs.is_empty() {
        return Err(CatalogError::NoInputs);
    }
    inputs.iter().try_for_each(validate_input)
}

/// Validate a single input: URLs must parse with an http(s) scheme and a
/// host; files must exist and start with the `%PDF` magic bytes.
pub fn validate_input(input: &ScrapeInput) -> Result<(), CatalogError> {
    match input {
        ScrapeInput::Url(url) => validate_url(url),
        ScrapeInput::File(path) => validate_pdf_file(path),
    }
}

fn validate_url(raw: &str) -> Result<(), CatalogError> {
    let invalid = |reason: &str| CatalogError::InvalidInput {
        input: raw.to_string(),
        reason: reason.to_string(),
    };
    let parsed = reqwest::Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("only http and https URLs are supported"));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(())
}

fn validate_pdf_file(path: &Path) -> Result<(), CatalogError> {
    if !path.is_file() {
        return Err(CatalogError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = std::fs::File::open(path).map_err(|e| CatalogError::InvalidInput {
        input: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut magic = [0u8; 4];
    let read = file.read(&mut magic).map_err(|e| CatalogError::InvalidInput {
        input: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if read < 4 || &magic != b"%PDF" {
        return Err(CatalogError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    debug!("Validated local PDF: {}", path.display());
    Ok(())
}

/// Make a validated input readable: fetch URLs, pass files through.
///
/// `page_text_limit` caps the characters kept from a web page.
pub async fn resolve_input(
    input: &ScrapeInput,
    download_timeout_secs: u64,
    page_text_limit: usize,
) -> Result<ResolvedInput, SourceError> {
    match input {
        ScrapeInput::File(path) => Ok(ResolvedInput::Local(path.clone())),
        ScrapeInput::Url(url) => fetch_url(url, download_timeout_secs, page_text_limit).await,
    }
}

/// Fetch `url` and classify the body as PDF or web page.
async fn fetch_url(
    url: &str,
    timeout_secs: u64,
    page_text_limit: usize,
) -> Result<ResolvedInput, SourceError> {
    info!("Fetching: {}", url);
    let unreadable = |detail: String| SourceError::DocumentUnreadable { detail };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| unreadable(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            unreadable(format!("fetching {url} timed out after {timeout_secs}s"))
        } else {
            unreadable(format!("failed to fetch {url}: {e}"))
        }
    })?;

    if !response.status().is_success() {
        return Err(unreadable(format!(
            "failed to fetch {url}: HTTP {}",
            response.status()
        )));
    }

    let declared_pdf = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/pdf"));
    let filename = extract_filename(response.url());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| unreadable(format!("failed to read body of {url}: {e}")))?;

    if bytes.starts_with(b"%PDF") {
        let temp_dir = TempDir::new().map_err(|e| unreadable(e.to_string()))?;
        let path = temp_dir.path().join(filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| unreadable(format!("failed to write temp file: {e}")))?;
        info!("Downloaded PDF ({} bytes) to: {}", bytes.len(), path.display());
        return Ok(ResolvedInput::Downloaded {
            path,
            _temp_dir: temp_dir,
        });
    }
    if declared_pdf {
        return Err(unreadable(format!(
            "{url} is served as a PDF but the body is not a PDF document"
        )));
    }

    let html = String::from_utf8_lossy(&bytes);
    let text = truncate_chars(&html_to_text(&html), page_text_limit);
    debug!("Fetched page text: {} chars", text.chars().count());
    Ok(ResolvedInput::WebPage {
        url: url.to_string(),
        text,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn extract_filename(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty() && last.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

// ── HTML reduction ───────────────────────────────────────────────────────────

static RE_INVISIBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<svg\b.*?</svg\s*>")
        .unwrap()
});

static RE_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#).unwrap()
});

static RE_BLOCK_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(?:br|/p|/div|/li|/tr|/h[1-6]|/section|/article|/table)\b[^>]*>").unwrap()
});

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static RE_INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\x0C\u{a0}]+").unwrap());

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(?: ?\n)+").unwrap());

/// Reduce an HTML document to readable text.
///
/// Scripts, styles and comments are dropped. Links are rendered as
/// `text (href)` so brochure and datasheet URLs survive for the model.
pub fn html_to_text(html: &str) -> String {
    let visible = RE_INVISIBLE.replace_all(html, " ");
    let linked = RE_ANCHOR.replace_all(&visible, |caps: &Captures| {
        let href = caps[1].trim();
        let label = RE_TAG.replace_all(&caps[2], " ");
        let label = label.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            label.to_string()
        } else if label.is_empty() {
            format!(" {href} ")
        } else {
            format!(" {label} ({href}) ")
        }
    });
    let broken = RE_BLOCK_BREAK.replace_all(&linked, "\n");
    let stripped = RE_TAG.replace_all(&broken, " ");
    let decoded = decode_entities(&stripped);
    let spaced = RE_INLINE_SPACE.replace_all(&decoded, " ");
    let lines = spaced
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    RE_BLANK_LINES.replace_all(&lines, "\n").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&copy;", "©")
        .replace("&reg;", "®")
        .replace("&trade;", "™")
        .replace("&amp;", "&")
}

/// Keep at most `limit` characters of `text`.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
