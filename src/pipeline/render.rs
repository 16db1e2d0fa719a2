//! PDF access via pdfium: rasterise pages for extraction, read the text layer
//! for detection.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so the
//! Tokio worker threads don't stall during CPU-heavy rendering.
//!
//! ## Library lookup
//!
//! 1. `PDFIUM_LIB_PATH`, when set, names the library file.
//! 2. `{cache_dir}/edgequake-catalog/` holding the platform library.
//! 3. The system library search path.

use crate::error::{CatalogError, SourceError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to a pdfium library, trying each lookup location in turn.
pub fn bind_pdfium() -> Result<Pdfium, CatalogError> {
    if let Ok(explicit) = std::env::var("PDFIUM_LIB_PATH") {
        return Pdfium::bind_to_library(&explicit)
            .map(Pdfium::new)
            .map_err(|e| CatalogError::PdfiumBindingFailed(format!("{explicit}: {e}")));
    }

    if let Some(cached) = cached_library_path().filter(|p| p.exists()) {
        if let Ok(bindings) = Pdfium::bind_to_library(&cached) {
            debug!("Bound pdfium from {}", cached.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| CatalogError::PdfiumBindingFailed(e.to_string()))
}

/// Per-user location where a downloaded pdfium library is looked for.
pub fn cached_library_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| {
        dir.join("edgequake-catalog")
            .join(Pdfium::pdfium_platform_library_name())
    })
}

/// Check once, up front, that pdfium can be loaded.
///
/// Runs inside `spawn_blocking` like every other pdfium call.
pub async fn ensure_pdfium() -> Result<(), CatalogError> {
    tokio::task::spawn_blocking(|| bind_pdfium().map(|_| ()))
        .await
        .map_err(|e| CatalogError::Internal(format!("pdfium probe panicked: {e}")))?
}

/// Rasterise every page of a PDF, capping the longest edge at `max_pixels`.
pub async fn render_pages(pdf_path: &Path, max_pixels: u32) -> Result<Vec<DynamicImage>, SourceError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || render_pages_blocking(&path, max_pixels))
        .await
        .map_err(|e| SourceError::DocumentUnreadable {
            detail: format!("render task panicked: {e}"),
        })?
}

fn render_pages_blocking(pdf_path: &Path, max_pixels: u32) -> Result<Vec<DynamicImage>, SourceError> {
    let pdfium = bind_for_source()?;
    let document = load_document(&pdfium, pdf_path)?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| SourceError::DocumentUnreadable {
                detail: format!("page {} could not be rendered: {e}", idx + 1),
            })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    if images.is_empty() {
        return Err(SourceError::DocumentUnreadable {
            detail: "the PDF has no pages".into(),
        });
    }
    Ok(images)
}

/// Read the text layer of every page, pages separated by a space.
pub async fn extract_text(pdf_path: &Path) -> Result<String, SourceError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_text_blocking(&path))
        .await
        .map_err(|e| SourceError::DocumentUnreadable {
            detail: format!("text task panicked: {e}"),
        })?
}

fn extract_text_blocking(pdf_path: &Path) -> Result<String, SourceError> {
    let pdfium = bind_for_source()?;
    let document = load_document(&pdfium, pdf_path)?;

    let mut text = String::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let page_text = page.text().map_err(|e| SourceError::DocumentUnreadable {
            detail: format!("text of page {} could not be read: {e}", idx + 1),
        })?;
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&page_text.all());
    }
    debug!("Extracted {} chars of PDF text", text.len());
    Ok(text)
}

fn bind_for_source() -> Result<Pdfium, SourceError> {
    bind_pdfium().map_err(|e| SourceError::DocumentUnreadable {
        detail: e.to_string(),
    })
}

fn load_document<'a>(pdfium: &'a Pdfium, pdf_path: &Path) -> Result<PdfDocument<'a>, SourceError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| SourceError::DocumentUnreadable {
            detail: format!("{}: {e}", pdf_path.display()),
        })
}
