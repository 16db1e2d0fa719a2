//! Strict decoding of model replies.
//!
//! Models wrap JSON in markdown fences or chat around it despite being told
//! not to. [`extract_json_object`] finds the object; the decoders then hold it
//! to the declared shape. A reply that does not fit becomes a
//! [`ParseError`] for that source instead of half-filled catalog data.

use crate::catalog::{is_not_available, Catalog, Confidence, DetectionResult};
use crate::error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Summary used when a detection reply has no usable summary.
pub const UNDETERMINED_SUMMARY: &str = "Could not determine the content type.";

/// A fenced code block (optionally tagged `json`), or the outermost `{ … }` span.
static RE_JSON_PAYLOAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```|(\{.*\})").unwrap());

/// Locate the JSON object in a model reply.
///
/// Whichever comes first wins: a fenced block's contents, or the span from the
/// first `{` to the last `}`.
pub fn extract_json_object(reply: &str) -> Result<&str, ParseError> {
    let caps = RE_JSON_PAYLOAD
        .captures(reply.trim())
        .ok_or(ParseError::NoJsonObject)?;
    let payload = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::NoJsonObject)?;
    Ok(payload)
}

/// Decode a catalog fragment from a model reply.
///
/// Required keys follow the declared schema; descriptions default to `""`.
/// `brochureUrl` values of `"N/A"` or blank become `None`, and any `source`
/// the model invented is discarded.
pub fn decode_catalog(reply: &str) -> Result<Catalog, ParseError> {
    let json = extract_json_object(reply)?;
    let mut catalog: Catalog = serde_json::from_str(json).map_err(|e| ParseError::Schema {
        detail: e.to_string(),
    })?;

    for variant in catalog.variants_mut() {
        variant.source.clear();
        if variant
            .brochure_url
            .as_deref()
            .is_some_and(|u| u.trim().is_empty() || is_not_available(u))
        {
            variant.brochure_url = None;
        }
    }

    debug!(
        "Decoded fragment: supplier={:?}, {}",
        catalog.supplier_name,
        catalog.summary()
    );
    Ok(catalog)
}

/// Decode a detection verdict for `source`.
///
/// Missing or unrecognised fields fall back to [`Confidence::Low`] and
/// [`UNDETERMINED_SUMMARY`]; only a reply without a JSON object is an error.
pub fn decode_detection(reply: &str, source: &str) -> Result<DetectionResult, ParseError> {
    let json = extract_json_object(reply)?;
    let value: Value = serde_json::from_str(json).map_err(|e| ParseError::Schema {
        detail: e.to_string(),
    })?;
    let object = value.as_object().ok_or_else(|| ParseError::Schema {
        detail: "expected a JSON object".into(),
    })?;

    let confidence = object
        .get("confidence")
        .and_then(Value::as_str)
        .and_then(|c| c.parse::<Confidence>().ok())
        .unwrap_or_default();
    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNDETERMINED_SUMMARY)
        .to_string();

    Ok(DetectionResult {
        source: source.to_string(),
        confidence,
        summary,
    })
}
