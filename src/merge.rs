//! Catalog merging: fold per-source fragments into one aggregate.
//!
//! Merge order is input order, and both rules below depend on it:
//!
//! * **Supplier name**: the first fragment with a real supplier name wins;
//!   later fragments never override it.
//! * **Categories**: matched by case-folded name. A match absorbs the
//!   incoming product lines (appended, never de-duplicated, so overlapping
//!   sources stay visible); anything else is appended as a new category,
//!   preserving first-seen order.

use crate::catalog::{is_not_available, Catalog};
use tracing::debug;

/// Supplier name used when no source reported one.
pub const SUPPLIER_NOT_FOUND: &str = "Supplier Name Not Found";

/// Merge `fragment` into `aggregate`.
pub fn merge(aggregate: &mut Catalog, fragment: Catalog) {
    if aggregate.supplier_name.is_empty() && is_real_supplier_name(&fragment.supplier_name) {
        debug!("Supplier name resolved: {}", fragment.supplier_name);
        aggregate.supplier_name = fragment.supplier_name;
    }

    for category in fragment.categories {
        let key = fold_case(&category.name);
        match aggregate
            .categories
            .iter_mut()
            .find(|existing| fold_case(&existing.name) == key)
        {
            Some(existing) => existing.products.extend(category.products),
            None => aggregate.categories.push(category),
        }
    }
}

/// `true` when an extractor reported "nothing usable here": no categories and
/// a supplier name that is just the source identifier or the `"N/A"` sentinel.
///
/// Such fragments count as failures rather than silent empty successes.
pub fn is_empty_result(fragment: &Catalog, source: &str) -> bool {
    fragment.categories.is_empty()
        && (fragment.supplier_name == source || is_not_available(&fragment.supplier_name))
}

/// Apply end-of-run defaults to a finished aggregate.
pub fn finalize(aggregate: &mut Catalog) {
    if aggregate.supplier_name.is_empty() {
        aggregate.supplier_name = SUPPLIER_NOT_FOUND.to_string();
    }
}

fn is_real_supplier_name(name: &str) -> bool {
    !name.trim().is_empty() && !is_not_available(name)
}

/// Unicode case folding approximation used for category keys.
///
/// Upper-casing first maps `ß` to `SS`, so `"Maße"` and `"MASSE"` collide the
/// way full case folding would.
pub(crate) fn fold_case(s: &str) -> String {
    s.to_uppercase().to_lowercase()
}
