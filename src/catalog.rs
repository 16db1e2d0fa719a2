//! Catalog data model: supplier → categories → product lines → variants.
//!
//! The same types serve three purposes:
//!
//! * the in-memory aggregate built by [`crate::merge`],
//! * the JSON wire shape the LLM is asked to produce (its schema is derived
//!   from these types with `schemars`, see [`crate::prompts::catalog_schema`]),
//! * the JSON export format, which must round-trip losslessly.
//!
//! Keys are camelCase on the wire (`supplierName`, `brochureUrl`) and fields
//! serialise in declaration order, so exports are stable and diffable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Placeholder meaning "value intentionally absent", distinct from `""`.
pub const NOT_AVAILABLE: &str = "N/A";

/// Returns `true` for the `"N/A"` sentinel (any case, surrounding whitespace ignored).
pub fn is_not_available(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(NOT_AVAILABLE)
}

/// A purchasable variant of a product line (size, colour, model number…).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// The specific name of the variant, e.g. "16-inch, M2 Pro, Silver" or "Medium, Blue".
    pub name: String,
    /// A brief description specific to this variant, if any.
    #[serde(default)]
    pub description: String,
    /// The price including currency symbols, or "N/A" when not available.
    pub price: String,
    /// The stock keeping unit or product code, or "N/A" when not available.
    pub sku: String,
    /// Direct URL to a brochure, datasheet or specification sheet, or "N/A".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brochure_url: Option<String>,
    /// Input (URL or file name) this variant was extracted from.
    ///
    /// Assigned by [`crate::tag::tag_variants`]; never taken from the model.
    #[serde(default)]
    #[schemars(skip)]
    pub source: String,
}

impl Variant {
    /// Brochure link, treating `None`, empty and `"N/A"` alike.
    pub fn brochure(&self) -> Option<&str> {
        self.brochure_url
            .as_deref()
            .filter(|u| !u.trim().is_empty() && !is_not_available(u))
    }
}

/// A product line with its ordered variants.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    /// The name of the product line, e.g. "MacBook Pro" or "Classic Crewneck".
    pub name: String,
    /// A brief description of the product line.
    #[serde(default)]
    pub description: String,
    /// The specific variants of this product (sizes, colours, model numbers).
    pub variants: Vec<Variant>,
}

/// A product category. Its name is the case-insensitive merge key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// The name of the category, e.g. "Laptops" or "T-Shirts".
    pub name: String,
    /// The product lines within this category.
    pub products: Vec<ProductLine>,
}

/// Root aggregate: one supplier and its categories in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// The name of the supplier or company.
    pub supplier_name: String,
    /// The product categories found at the source.
    pub categories: Vec<Category>,
}

impl Catalog {
    /// An empty catalog, the starting point of every extraction run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over every variant in catalog order.
    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.categories
            .iter()
            .flat_map(|c| c.products.iter())
            .flat_map(|p| p.variants.iter())
    }

    /// Mutable counterpart of [`Catalog::variants`].
    pub fn variants_mut(&mut self) -> impl Iterator<Item = &mut Variant> {
        self.categories
            .iter_mut()
            .flat_map(|c| c.products.iter_mut())
            .flat_map(|p| p.variants.iter_mut())
    }

    /// Count categories, product lines and variants.
    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            categories: self.categories.len(),
            product_lines: self.categories.iter().map(|c| c.products.len()).sum(),
            variants: self.variants().count(),
        }
    }
}

/// Counts shown next to a catalog view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub categories: usize,
    pub product_lines: usize,
    pub variants: usize,
}

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} categories, {} product lines, {} variants",
            self.categories, self.product_lines, self.variants
        )
    }
}

// ── Inputs ───────────────────────────────────────────────────────────────────

/// One thing to extract from: a web page or a local PDF brochure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ScrapeInput {
    Url(String),
    File(PathBuf),
}

impl ScrapeInput {
    /// Classify a command-line argument: HTTP(S) URLs become [`ScrapeInput::Url`],
    /// everything else is treated as a file path.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if crate::pipeline::input::is_url(raw) {
            ScrapeInput::Url(raw.to_string())
        } else {
            ScrapeInput::File(PathBuf::from(raw))
        }
    }

    /// The source identifier stamped on variants: the URL, or the file name.
    pub fn source_name(&self) -> String {
        match self {
            ScrapeInput::Url(url) => url.clone(),
            ScrapeInput::File(path) => file_display_name(path),
        }
    }

    /// Short label used in progress messages.
    pub fn kind_label(&self) -> &'static str {
        match self {
            ScrapeInput::Url(_) => "URL",
            ScrapeInput::File(_) => "file",
        }
    }
}

fn file_display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ── Detection ────────────────────────────────────────────────────────────────

/// How sure the pre-check is that a source is a product catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence level '{other}'")),
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        })
    }
}

/// Outcome of the lightweight "is this a catalog?" pre-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub source: String,
    pub confidence: Confidence,
    pub summary: String,
}

// ── Chat ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One turn of the conversation about the extracted catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}
