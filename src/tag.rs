//! Variant source tagging.
//!
//! Provenance is recorded per variant, not per category: after merging, one
//! category routinely mixes product lines from several URLs and brochures, and
//! the source column is the only way to tell them apart. Tagging must happen
//! before [`crate::merge::merge`] moves the fragment's product lines into
//! categories that already hold variants from other sources.

use crate::catalog::Catalog;

/// Stamp every variant in `fragment` with `source` (a URL or file name).
///
/// Overwrites any previous value. A fragment without categories is left
/// untouched.
pub fn tag_variants(fragment: &mut Catalog, source: &str) {
    for variant in fragment.variants_mut() {
        variant.source = source.to_string();
    }
}
