//! View derivation: category filter, accent-insensitive search and variant
//! sorting over an aggregate catalog.
//!
//! [`derive`] is pure. It never touches the aggregate; it clones the parts that
//! survive the filters into a fresh [`Catalog`] and recomputes the summary
//! counts from that. Steps always run in the same order:
//!
//! 1. category filter (only when categories are selected),
//! 2. search (only when the trimmed query is non-empty),
//! 3. sort (only when a non-default sort is chosen).

use crate::catalog::{is_not_available, Catalog, CatalogSummary, Category, ProductLine, Variant};
use crate::error::CatalogError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

/// Leading numeric portion of a price once non-numeric characters are stripped.
static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(?:\d+\.?\d*|\.\d+)").unwrap());

/// Normalise text for search and name comparison.
///
/// Canonical decomposition, combining diacritics (U+0300–U+036F) removed, then
/// lower-cased: `"ÄKTA Pure"` becomes `"akta pure"`. Idempotent.
pub fn normalize_text(text: &str) -> String {
    text.nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect::<String>()
        .to_lowercase()
}

/// Variant ordering inside each product line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOption {
    /// Extraction order.
    #[default]
    Default,
    NameAsc,
    NameDesc,
    PriceAsc,
    PriceDesc,
}

impl SortOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Default => "default",
            SortOption::NameAsc => "name-asc",
            SortOption::NameDesc => "name-desc",
            SortOption::PriceAsc => "price-asc",
            SortOption::PriceDesc => "price-desc",
        }
    }
}

impl FromStr for SortOption {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "default" => Ok(SortOption::Default),
            "name-asc" => Ok(SortOption::NameAsc),
            "name-desc" => Ok(SortOption::NameDesc),
            "price-asc" => Ok(SortOption::PriceAsc),
            "price-desc" => Ok(SortOption::PriceDesc),
            other => Err(CatalogError::InvalidConfig(format!(
                "Unknown sort option '{other}'. \
                 Expected default, name-asc, name-desc, price-asc or price-desc"
            ))),
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user's current filter, search and sort choices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewQuery {
    /// Exact category names to keep. Empty means "all categories".
    pub selected_categories: BTreeSet<String>,
    pub search: String,
    pub sort: SortOption,
}

impl ViewQuery {
    /// `true` when any filter, search or sort is in effect.
    pub fn is_active(&self) -> bool {
        !self.selected_categories.is_empty()
            || !self.search.trim().is_empty()
            || self.sort != SortOption::Default
    }
}

/// A filtered and sorted copy of the aggregate plus its counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedView {
    pub catalog: Catalog,
    pub summary: CatalogSummary,
}

/// Derive the displayed view of `catalog` for `query`.
pub fn derive(catalog: &Catalog, query: &ViewQuery) -> DerivedView {
    let mut categories: Vec<Category> = if query.selected_categories.is_empty() {
        catalog.categories.clone()
    } else {
        catalog
            .categories
            .iter()
            .filter(|c| query.selected_categories.contains(&c.name))
            .cloned()
            .collect()
    };

    if !query.search.trim().is_empty() {
        let needle = normalize_text(&query.search);
        categories = categories
            .into_iter()
            .filter_map(|category| search_category(category, &needle))
            .collect();
    }

    if query.sort != SortOption::Default {
        for line in categories.iter_mut().flat_map(|c| c.products.iter_mut()) {
            sort_variants(&mut line.variants, query.sort);
        }
    }

    let catalog = Catalog {
        supplier_name: catalog.supplier_name.clone(),
        categories,
    };
    let summary = catalog.summary();
    DerivedView { catalog, summary }
}

/// Category names of the aggregate, in catalog order.
pub fn category_names(catalog: &Catalog) -> Vec<String> {
    catalog.categories.iter().map(|c| c.name.clone()).collect()
}

fn matches(text: &str, needle: &str) -> bool {
    normalize_text(text).contains(needle)
}

fn search_category(mut category: Category, needle: &str) -> Option<Category> {
    category.products = category
        .products
        .into_iter()
        .filter_map(|line| search_product_line(line, needle))
        .collect();
    (!category.products.is_empty()).then_some(category)
}

fn search_product_line(mut line: ProductLine, needle: &str) -> Option<ProductLine> {
    if matches(&line.name, needle) || matches(&line.description, needle) {
        return Some(line);
    }
    line.variants
        .retain(|v| matches(&v.name, needle) || matches(&v.description, needle));
    (!line.variants.is_empty()).then_some(line)
}

fn sort_variants(variants: &mut [Variant], sort: SortOption) {
    match sort {
        SortOption::Default => {}
        SortOption::NameAsc => variants.sort_by(|a, b| compare_names(&a.name, &b.name)),
        SortOption::NameDesc => variants.sort_by(|a, b| compare_names(&b.name, &a.name)),
        SortOption::PriceAsc => variants.sort_by(|a, b| {
            price_key(&a.price, f64::INFINITY).total_cmp(&price_key(&b.price, f64::INFINITY))
        }),
        SortOption::PriceDesc => variants.sort_by(|a, b| {
            price_key(&b.price, f64::NEG_INFINITY)
                .total_cmp(&price_key(&a.price, f64::NEG_INFINITY))
        }),
    }
}

/// Base-sensitivity comparison: accents and case are ignored.
fn compare_names(a: &str, b: &str) -> Ordering {
    normalize_text(a).cmp(&normalize_text(b))
}

fn price_key(price: &str, missing: f64) -> f64 {
    parse_price(price).unwrap_or(missing)
}

/// Numeric value of a free-form price string.
///
/// Every character outside `[0-9.-]` is dropped and the leading number of
/// what remains is parsed, so `"$1,299.00"` yields `1299.0` and `"€50-€80"`
/// yields `50.0`. Empty, `"N/A"` and unparsable prices yield `None`.
pub fn parse_price(price: &str) -> Option<f64> {
    let trimmed = price.trim();
    if trimmed.is_empty() || is_not_available(trimmed) {
        return None;
    }
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let number = LEADING_NUMBER.find(&cleaned)?;
    number.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
}
