//! Image encoding: `DynamicImage` → base64 JPEG wrapped in `ImageData`.
//!
//! A brochure can run to dozens of pages and every page travels in a single
//! request, so pages are sent as JPEG rather than PNG. `detail: "high"` keeps
//! fine print such as SKUs and price tables legible to GPT-4-class models.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as a base64 JPEG ready for the multimodal API.
///
/// The JPEG encoder rejects alpha channels, so the page is flattened to RGB
/// first.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/jpeg").with_detail("high"))
}
