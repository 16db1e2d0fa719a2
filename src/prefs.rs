//! Persisted user preferences.
//!
//! Only the OCR quality choice is remembered between runs. It is stored as
//! `{"ocrQuality": "standard" | "high"}` in `preferences.json` under the
//! platform config directory (`~/.config/edgequake-catalog/` on Linux), or
//! under `$EDGEQUAKE_CATALOG_CONFIG_DIR` when that is set.
//!
//! Reading never fails: a missing, unreadable or malformed file means the
//! default, [`OcrQuality::High`].

use crate::config::OcrQuality;
use crate::error::CatalogError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the preference directory.
pub const CONFIG_DIR_ENV: &str = "EDGEQUAKE_CATALOG_CONFIG_DIR";

const FILE_NAME: &str = "preferences.json";
const OCR_QUALITY_KEY: &str = "ocrQuality";

/// A preference file at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    /// Store preferences in `dir/preferences.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(FILE_NAME),
        }
    }

    /// The per-user location, or `None` if the platform has no config directory.
    pub fn default_location() -> Option<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Some(Self::in_dir(dir));
        }
        dirs::config_dir().map(|dir| Self::in_dir(dir.join("edgequake-catalog")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored OCR quality, or [`OcrQuality::High`].
    pub fn load_ocr_quality(&self) -> OcrQuality {
        let quality = self
            .read()
            .get(OCR_QUALITY_KEY)
            .and_then(Value::as_str)
            .and_then(|q| q.parse::<OcrQuality>().ok())
            .unwrap_or_default();
        debug!("OCR quality preference: {}", quality);
        quality
    }

    /// Persist `quality`, keeping any other keys in the file.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub fn store_ocr_quality(&self, quality: OcrQuality) -> Result<(), CatalogError> {
        let mut prefs = self.read();
        prefs.insert(OCR_QUALITY_KEY.into(), Value::String(quality.as_str().into()));

        let write_err = |e| CatalogError::PreferenceWriteFailed {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let body = serde_json::to_string_pretty(&Value::Object(prefs)).map_err(|e| {
            CatalogError::Serialization {
                format: "JSON".into(),
                detail: e.to_string(),
            }
        })?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, body).map_err(write_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(write_err)?;
        debug!("Saved OCR quality preference to {}", self.path.display());
        Ok(())
    }

    fn read(&self) -> Map<String, Value> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => return Map::new(),
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("Ignoring malformed preference file {}", self.path.display());
                Map::new()
            }
        }
    }
}
