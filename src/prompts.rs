//! System prompts and the declared response schema.
//!
//! Every prompt lives here so a wording change touches one place, and tests
//! can inspect prompts without a model. Callers can override the extraction
//! prompt via [`crate::config::ExtractionConfig::system_prompt`]; the schema
//! block is appended either way.

use crate::catalog::Catalog;
use once_cell::sync::Lazy;

/// System prompt for extracting a catalog from fetched web-page text.
pub const WEB_PAGE_SYSTEM_PROMPT: &str = r#"You extract supplier product catalogs into structured JSON.

You receive the visible text of a supplier web page. Links appear as `label (url)`.

Rules:

1. COVERAGE
   - Extract every category, every product line and every variant present in the text
   - Do not stop after the first few products; completeness matters more than brevity

2. BROCHURES
   - For each variant, look for a link to a brochure, datasheet or specification sheet
   - Resolve relative links against the page URL
   - Use "N/A" when there is none

3. FIDELITY
   - Copy names, prices and codes exactly, including symbols (©, ®, ™) and accented letters (Ä, é, ü)
   - Keep currency symbols on prices

4. MISSING VALUES
   - Use the string "N/A" for any price or SKU you cannot find

5. NOTHING FOUND
   - If the page holds no product data, return {"supplierName": "<the page URL>", "categories": []}
   - Never explain a failure in prose

6. OUTPUT
   - Output ONLY one JSON object matching the schema below
   - No markdown fences, no commentary before or after"#;

/// System prompt for extracting a catalog from rasterised brochure pages.
pub const DOCUMENT_SYSTEM_PROMPT: &str = r#"You extract supplier product catalogs into structured JSON.

You receive every page of a product brochure as an image.

Rules:

1. COVERAGE
   - Read every page, including tables, footnotes and back covers
   - Extract every category, every product line and every variant

2. BROCHURES
   - When a variant lists a URL for a brochure, datasheet or specification sheet, put it in "brochureUrl"
   - Use "N/A" when there is none

3. FIDELITY
   - Copy names, prices and codes exactly, including symbols (©, ®, ™) and accented letters (Ä, é, ü)
   - Keep currency symbols on prices

4. MISSING VALUES
   - Use the string "N/A" for any price or SKU you cannot find

5. OUTPUT
   - Output ONLY one JSON object matching the schema below
   - No commentary, apologies or introductions"#;

static CATALOG_SCHEMA: Lazy<String> = Lazy::new(|| {
    let schema = schemars::schema_for!(Catalog);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
});

/// JSON schema of the catalog shape, derived from [`Catalog`].
pub fn catalog_schema() -> &'static str {
    &CATALOG_SCHEMA
}

/// Append the response schema to an extraction system prompt.
pub fn with_schema(system_prompt: &str) -> String {
    format!(
        "{system_prompt}\n\nJSON schema of the required response:\n```json\n{}\n```",
        catalog_schema()
    )
}

/// User turn that accompanies the page images of a brochure.
pub fn document_instruction(file_name: &str) -> String {
    format!("Extract the product catalog from the attached document \"{file_name}\".")
}

/// User turn carrying the text of a fetched page.
pub fn web_page_instruction(url: &str, text: &str) -> String {
    format!(
        "Extract all product data from the supplier page at {url}.\n\n\
         Page text:\n---\n{text}\n---"
    )
}

/// Prompt for the "is this a product catalog?" pre-check.
///
/// `content` is already truncated by the caller.
pub fn detection_prompt(source: &str, content: &str) -> String {
    format!(
        r#"Decide whether the content below, taken from "{source}", is a product catalog or a page listing products for sale.

Give a confidence level (High, Medium or Low) and a one-sentence summary of your reasoning.
Reproduce special characters (©, Ä) exactly in the summary.

Content:
---
{content}
---

Reply with ONLY a JSON object with "confidence" and "summary" keys, for example:
{{"confidence": "High", "summary": "The page lists several products with prices and SKUs."}}"#
    )
}

/// System prompt for chatting about an extracted catalog.
pub fn chat_system_prompt(catalog_json: &str) -> String {
    format!(
        r#"You answer questions about a product catalog extracted from supplier websites and brochures.

Base every answer only on the data below and never invent products, prices or codes.
If the data does not contain the answer, say so plainly.
Reproduce special characters (©, ®, ™, Ä) exactly.
Each variant has a "source" field naming the URL or file it came from; use it for questions about where data came from.
Be concise. Markdown tables and lists are fine.

Catalog data:
```json
{catalog_json}
```"#
    )
}
