//! Export formatting: CSV, JSON and plain-text renderings of a catalog, plus
//! the downloadable file payload built from them.
//!
//! Formatting works on whatever [`Catalog`] it is handed. Callers pass the
//! aggregate for a full export or a [`crate::view::DerivedView`] catalog to
//! export only what is on screen.

use crate::catalog::{Catalog, NOT_AVAILABLE};
use crate::error::CatalogError;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Column headers of the CSV export, in column order.
pub const CSV_HEADERS: [&str; 10] = [
    "Supplier",
    "Category",
    "Product Line",
    "Product Line Description",
    "Variant Name",
    "Variant Description",
    "Variant Price",
    "Variant SKU",
    "Brochure URL",
    "Source",
];

/// UTF-8 byte-order mark prepended to CSV downloads so spreadsheet tools
/// detect the encoding.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Path separators, characters Windows rejects, controls and `..`.
static RE_UNSAFE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f\x7f]|\.\."#).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    #[default]
    Json,
    Txt,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Txt => "txt",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv;charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Txt => "text/plain;charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "txt" => Ok(ExportFormat::Txt),
            other => Err(CatalogError::InvalidConfig(format!(
                "Unknown export format '{other}'. Expected csv, json or txt"
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A ready-to-save export: suggested file name, MIME type and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Render `catalog` in the given format.
pub fn format(catalog: &Catalog, format: ExportFormat) -> Result<String, CatalogError> {
    match format {
        ExportFormat::Csv => to_csv(catalog),
        ExportFormat::Json => to_json(catalog),
        ExportFormat::Txt => Ok(to_txt(catalog)),
    }
}

/// Build the download payload for `catalog`.
pub fn export_file(catalog: &Catalog, fmt: ExportFormat) -> Result<ExportFile, CatalogError> {
    let body = format(catalog, fmt)?;
    let mut bytes = Vec::with_capacity(body.len() + UTF8_BOM.len());
    if fmt == ExportFormat::Csv {
        bytes.extend_from_slice(UTF8_BOM);
    }
    bytes.extend_from_slice(body.as_bytes());

    Ok(ExportFile {
        filename: export_filename(&catalog.supplier_name, fmt),
        mime_type: fmt.mime_type(),
        bytes,
    })
}

/// `"{supplier}_catalog.{ext}"` with whitespace runs replaced by `_`.
///
/// The supplier name comes from model output, so path separators, `..` and
/// control characters also become `_`, and a name with nothing usable left
/// falls back to `catalog`. The result is always a single path component.
pub fn export_filename(supplier_name: &str, fmt: ExportFormat) -> String {
    let name = RE_WHITESPACE.replace_all(supplier_name.trim(), "_");
    let name = RE_UNSAFE_FILENAME.replace_all(&name, "_");
    let name = name.trim_start_matches('.');
    let stem = if name.chars().all(|c| c == '_' || c == '.') {
        "catalog"
    } else {
        name
    };
    format!("{stem}_catalog.{}", fmt.extension())
}

/// Write `file` into `dir` and return the final path.
///
/// Uses atomic write (temp file + rename) to prevent partial files. A
/// filename that would land outside `dir` is refused.
pub async fn write_export(file: &ExportFile, dir: impl AsRef<Path>) -> Result<PathBuf, CatalogError> {
    let dir = dir.as_ref();
    let path = dir.join(&file.filename);
    let write_err = |e| CatalogError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    };

    let single_component = matches!(
        Path::new(&file.filename).components().collect::<Vec<_>>().as_slice(),
        [Component::Normal(_)]
    );
    if !single_component || path.parent() != Some(dir) {
        return Err(write_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "export filename must not leave the output directory",
        )));
    }

    tokio::fs::create_dir_all(dir).await.map_err(write_err)?;

    let tmp_path = dir.join(format!(".{}.tmp", file.filename));
    tokio::fs::write(&tmp_path, &file.bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &path).await.map_err(write_err)?;

    info!("Wrote {} ({} bytes)", path.display(), file.bytes.len());
    Ok(path)
}

// ── Formatters ───────────────────────────────────────────────────────────────

fn to_csv(catalog: &Catalog) -> Result<String, CatalogError> {
    let csv_err = |detail: String| CatalogError::Serialization {
        format: "CSV".into(),
        detail,
    };

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let mut rows = 0usize;
    for category in &catalog.categories {
        for line in &category.products {
            for v in &line.variants {
                let source = if v.source.is_empty() {
                    NOT_AVAILABLE
                } else {
                    v.source.as_str()
                };
                writer
                    .write_record([
                        catalog.supplier_name.as_str(),
                        category.name.as_str(),
                        line.name.as_str(),
                        line.description.as_str(),
                        v.name.as_str(),
                        v.description.as_str(),
                        v.price.as_str(),
                        v.sku.as_str(),
                        v.brochure().unwrap_or(NOT_AVAILABLE),
                        source,
                    ])
                    .map_err(|e| csv_err(e.to_string()))?;
                rows += 1;
            }
        }
    }

    let body = writer
        .into_inner()
        .map_err(|e| csv_err(e.to_string()))?;
    let body = String::from_utf8(body).map_err(|e| csv_err(e.to_string()))?;
    debug!("CSV export: {} rows", rows);

    let mut out = CSV_HEADERS.join(",");
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body.trim_end_matches('\n'));
    }
    Ok(out)
}

fn to_json(catalog: &Catalog) -> Result<String, CatalogError> {
    serde_json::to_string_pretty(catalog).map_err(|e| CatalogError::Serialization {
        format: "JSON".into(),
        detail: e.to_string(),
    })
}

const BANNER: &str = "========================================";

fn to_txt(catalog: &Catalog) -> String {
    let mut txt = format!("Supplier: {}\n\n", catalog.supplier_name);
    for category in &catalog.categories {
        txt.push_str(&format!("{BANNER}\nCATEGORY: {}\n{BANNER}\n\n", category.name));
        for line in &category.products {
            txt.push_str(&format!(
                "Product Line: {}\nDescription: {}\n\n",
                line.name, line.description
            ));
            for v in &line.variants {
                let source = if v.source.is_empty() {
                    NOT_AVAILABLE
                } else {
                    v.source.as_str()
                };
                txt.push_str(&format!(
                    "  - Variant: {}\n    Description: {}\n    Price: {}\n    SKU: {}\n    Brochure: {}\n    Source: {}\n\n",
                    v.name,
                    v.description,
                    v.price,
                    v.sku,
                    v.brochure().unwrap_or(NOT_AVAILABLE),
                    source
                ));
            }
        }
    }
    txt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, ProductLine, Variant};

    fn sample() -> Catalog {
        Catalog {
            supplier_name: "Acme  Corp".into(),
            categories: vec![Category {
                name: "Pumps".into(),
                products: vec![ProductLine {
                    name: "P Series".into(),
                    description: "Heavy \"duty\", centrifugal".into(),
                    variants: vec![
                        Variant {
                            name: "P100".into(),
                            description: "Small".into(),
                            price: "$1,200".into(),
                            sku: "P-100".into(),
                            brochure_url: Some("https://acme.test/p100.pdf".into()),
                            source: "https://acme.test".into(),
                        },
                        Variant {
                            name: "P200".into(),
                            description: String::new(),
                            price: "N/A".into(),
                            sku: "N/A".into(),
                            brochure_url: None,
                            source: "pumps.pdf".into(),
                        },
                    ],
                }],
            }],
        }
    }

    #[test]
    fn csv_quotes_every_field_and_escapes_quotes() {
        let csv = format(&sample(), ExportFormat::Csv).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADERS.join(","));
        assert_eq!(
            lines[1],
            r#""Acme  Corp","Pumps","P Series","Heavy ""duty"", centrifugal","P100","Small","$1,200","P-100","https://acme.test/p100.pdf","https://acme.test""#
        );
        assert!(lines[2].ends_with(r#""N/A","N/A","N/A","pumps.pdf""#), "got {}", lines[2]);
    }

    #[test]
    fn csv_has_header_even_without_variants() {
        let csv = format(&Catalog::new(), ExportFormat::Csv).unwrap();
        assert_eq!(csv, CSV_HEADERS.join(","));
    }

    #[test]
    fn csv_download_starts_with_bom() {
        let file = export_file(&sample(), ExportFormat::Csv).unwrap();
        assert!(file.bytes.starts_with(UTF8_BOM));
        assert_eq!(file.filename, "Acme_Corp_catalog.csv");
        assert_eq!(file.mime_type, "text/csv;charset=utf-8");

        let json = export_file(&sample(), ExportFormat::Json).unwrap();
        assert!(json.bytes.starts_with(b"{"));
    }

    #[test]
    fn json_round_trips() {
        let catalog = sample();
        let json = format(&catalog, ExportFormat::Json).unwrap();
        assert!(json.starts_with("{\n  \"supplierName\": \"Acme  Corp\""));
        let back: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, catalog);
    }

    #[test]
    fn txt_layout() {
        let txt = format(&sample(), ExportFormat::Txt).unwrap();
        assert!(txt.starts_with("Supplier: Acme  Corp\n\n"));
        assert!(txt.contains(&format!("{BANNER}\nCATEGORY: Pumps\n{BANNER}\n\n")));
        assert!(txt.contains("Product Line: P Series\nDescription: Heavy \"duty\", centrifugal\n\n"));
        assert!(txt.contains(
            "  - Variant: P200\n    Description: \n    Price: N/A\n    SKU: N/A\n    Brochure: N/A\n    Source: pumps.pdf\n\n"
        ));
    }

    #[test]
    fn format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Txt);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    #[tokio::test]
    async fn write_export_is_atomic_and_named() {
        let dir = tempfile::tempdir().unwrap();
        let file = export_file(&sample(), ExportFormat::Txt).unwrap();
        let path = write_export(&file, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("Acme_Corp_catalog.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), file.bytes);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn export_filename_keeps_supplier_inside_one_component() {
        assert_eq!(export_filename("Acme  Corp", ExportFormat::Csv), "Acme_Corp_catalog.csv");
        assert_eq!(export_filename("Smith/Sons", ExportFormat::Csv), "Smith_Sons_catalog.csv");
        assert_eq!(export_filename("/../x", ExportFormat::Json), "___x_catalog.json");
        assert_eq!(export_filename("a\\b:c\n", ExportFormat::Txt), "a_b_c_catalog.txt");
        assert_eq!(export_filename("..", ExportFormat::Csv), "catalog_catalog.csv");
        assert_eq!(export_filename("  ", ExportFormat::Csv), "catalog_catalog.csv");
    }

    #[tokio::test]
    async fn write_export_stays_in_dir_for_hostile_supplier() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        for supplier in ["Smith/Sons", "/../escaped"] {
            let mut catalog = sample();
            catalog.supplier_name = supplier.into();
            let file = export_file(&catalog, ExportFormat::Csv).unwrap();
            let path = write_export(&file, &out).await.unwrap();
            assert_eq!(path.parent(), Some(out.as_path()));
            assert!(path.is_file());
        }
        assert!(!dir.path().join("escaped_catalog.csv").exists());
    }

    #[tokio::test]
    async fn write_export_refuses_paths_outside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = ExportFile {
            filename: "../outside.csv".into(),
            mime_type: ExportFormat::Csv.mime_type(),
            bytes: b"x".to_vec(),
        };
        let err = write_export(&file, dir.path()).await.unwrap_err();
        assert!(matches!(err, CatalogError::OutputWriteFailed { .. }));
        assert!(!dir.path().parent().unwrap().join("outside.csv").exists());
    }
}
