//! Small persisted JSON documents (current workbook path, field labels)
//!
//! Each key maps to `<dir>/<key>.json`. A missing or unparsable document is
//! treated as first run, never as a fatal error.

use crate::error::{Error, Result};
use crate::record::FieldLabels;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

/// Document holding `{"path": "..."}` for the workbook currently appended to
pub const WORKBOOK_PATH_KEY: &str = "excel_path_config";

/// Document holding `{key: label, ...}`
pub const LABELS_KEY: &str = "labels_config";

/// Key-value JSON store backed by one file per key
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Store rooted at `dir`; the directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the documents
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing a key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load a document; `None` when absent or unreadable.
    pub fn load(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read config document"
                );
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Ignoring unparsable config document"
                );
                None
            }
        }
    }

    /// Overwrite a document. Written to a sibling temp file, then renamed into place.
    pub fn save(&self, key: &str, value: &Value) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Config(format!(
                "Failed to create config directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        let body = serde_json::to_vec_pretty(value)?;

        fs::write(&tmp, body)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| Error::Config(format!("Failed to write {}: {e}", path.display())))?;

        tracing::debug!(key, path = %path.display(), "Saved config document");
        Ok(())
    }

    /// Persisted workbook path, if any
    pub fn load_workbook_path(&self) -> Option<PathBuf> {
        self.load(WORKBOOK_PATH_KEY)?
            .get("path")?
            .as_str()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Persist the workbook path
    pub fn save_workbook_path(&self, path: &Path) -> Result<()> {
        self.save(
            WORKBOOK_PATH_KEY,
            &json!({ "path": path.to_string_lossy() }),
        )
    }

    /// Persisted labels, if present and well-formed
    pub fn load_labels(&self) -> Option<FieldLabels> {
        let value = self.load(LABELS_KEY)?;
        match FieldLabels::from_json(&value) {
            Ok(labels) => Some(labels),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed labels document");
                None
            }
        }
    }

    /// Persist labels
    pub fn save_labels(&self, labels: &FieldLabels) -> Result<()> {
        self.save(LABELS_KEY, &labels.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_document_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(store.load("nothing").is_none());
        assert!(store.load_workbook_path().is_none());
    }

    #[test]
    fn test_unparsable_document_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path());
        fs::write(store.path_for(LABELS_KEY), "{not json").unwrap();
        assert!(store.load(LABELS_KEY).is_none());
        assert!(store.load_labels().is_none());
    }

    #[test]
    fn test_save_overwrites_and_reloads() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("state"));

        store.save("answer", &json!({"value": 1})).unwrap();
        store.save("answer", &json!({"value": 2})).unwrap();
        assert_eq!(store.load("answer"), Some(json!({"value": 2})));
        assert!(!dir.path().join("state/.answer.json.tmp").exists());
    }

    #[test]
    fn test_workbook_path_and_labels_documents() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path());

        let path = PathBuf::from("excel_files/20261019/qr_codes_20261019.xlsx");
        store.save_workbook_path(&path).unwrap();
        assert_eq!(store.load_workbook_path(), Some(path));

        let labels = FieldLabels::new([("A", "Name"), ("B", "Team")]).unwrap();
        store.save_labels(&labels).unwrap();
        assert_eq!(store.load_labels(), Some(labels));

        let raw = fs::read_to_string(store.path_for(LABELS_KEY)).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc, json!({"A": "Name", "B": "Team"}));
    }
}
