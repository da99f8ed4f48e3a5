//! Form fields, submitted records and payload naming

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Delimiter used to join non-empty values into a payload
pub const DEFAULT_DELIMITER: char = ',';

/// Name used for an artifact whose payload sanitizes to nothing
const FALLBACK_STEM: &str = "qr_code";

/// Longest artifact stem kept verbatim, in bytes
pub const MAX_STEM_BYTES: usize = 100;

/// Hex digits of the payload digest appended to a truncated stem
const DIGEST_SUFFIX_LEN: usize = 8;

/// One field definition: a stable key and its mutable human-readable label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Stable identifier (e.g. `"A"`)
    pub key: String,
    /// Label shown to the user and written to the workbook header
    pub label: String,
}

/// Ordered key → label mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLabels {
    fields: Vec<FieldSpec>,
}

impl FieldLabels {
    /// Build from ordered `(key, label)` pairs; keys must be unique and non-empty.
    pub fn new<K, L>(pairs: impl IntoIterator<Item = (K, L)>) -> Result<Self>
    where
        K: Into<String>,
        L: Into<String>,
    {
        let mut fields: Vec<FieldSpec> = Vec::new();
        for (key, label) in pairs {
            let key = key.into().trim().to_string();
            if key.is_empty() {
                return Err(Error::Config("field key must not be empty".to_string()));
            }
            if fields.iter().any(|f| f.key == key) {
                return Err(Error::Config(format!("duplicate field key '{key}'")));
            }
            fields.push(FieldSpec {
                key,
                label: label.into(),
            });
        }

        if fields.is_empty() {
            return Err(Error::Config("at least one field is required".to_string()));
        }

        Ok(Self { fields })
    }

    /// `Field A` .. `Field E` style defaults for the given keys.
    pub fn with_default_labels(keys: &[String]) -> Result<Self> {
        Self::new(keys.iter().map(|k| (k.clone(), format!("Field {k}"))))
    }

    /// Parse the persisted `{key: label, ...}` document, preserving key order.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::Config("labels document must be a JSON object".to_string()))?;

        let mut pairs = Vec::with_capacity(object.len());
        for (key, label) in object {
            let label = label.as_str().ok_or_else(|| {
                Error::Config(format!("label for field '{key}' must be a string"))
            })?;
            pairs.push((key.clone(), label.to_string()));
        }
        Self::new(pairs)
    }

    /// Render as the persisted `{key: label, ...}` document.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for field in &self.fields {
            map.insert(field.key.clone(), Value::String(field.label.clone()));
        }
        Value::Object(map)
    }

    /// Field definitions in order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    /// Labels in order
    pub fn labels(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.label.clone()).collect()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false for a constructed value; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Label for a key
    pub fn label(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.label.as_str())
    }

    /// Change the label of an existing key.
    pub fn set_label(&mut self, key: &str, label: impl Into<String>) -> Result<()> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.key == key)
            .ok_or_else(|| Error::Config(format!("unknown field key '{key}'")))?;
        field.label = label.into();
        Ok(())
    }

    /// True when both mappings have the same keys in the same order.
    pub fn same_keys(&self, other: &FieldLabels) -> bool {
        self.keys().eq(other.keys())
    }
}

/// Labels plus the current text value of each field, as held by a form
#[derive(Debug, Clone)]
pub struct FieldSet {
    labels: FieldLabels,
    values: Vec<String>,
}

impl FieldSet {
    /// Empty form for the given labels
    pub fn new(labels: FieldLabels) -> Self {
        let values = vec![String::new(); labels.len()];
        Self { labels, values }
    }

    /// Field labels
    pub fn labels(&self) -> &FieldLabels {
        &self.labels
    }

    /// Replace labels, keeping current values. Keys must match.
    pub fn relabel(&mut self, labels: FieldLabels) -> Result<()> {
        if !self.labels.same_keys(&labels) {
            return Err(Error::Config(
                "new labels must use the same field keys".to_string(),
            ));
        }
        self.labels = labels;
        Ok(())
    }

    /// Set the value for a key
    pub fn set_value(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let index = self
            .labels
            .keys()
            .position(|k| k == key)
            .ok_or_else(|| Error::Config(format!("unknown field key '{key}'")))?;
        self.values[index] = value.into();
        Ok(())
    }

    /// Current values in field order
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Reset every value to empty, as done after a successful submission
    pub fn clear_values(&mut self) {
        self.values.iter_mut().for_each(String::clear);
    }
}

/// Immutable snapshot of submitted values and the payload derived from them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    values: Vec<String>,
    payload: String,
}

impl Record {
    /// Trim every value and join the non-empty ones with `delimiter`.
    ///
    /// Fails with [`Error::Validation`] when every value is empty after trimming.
    pub fn from_values<S: AsRef<str>>(values: &[S], delimiter: char) -> Result<Self> {
        let values: Vec<String> = values.iter().map(|v| v.as_ref().trim().to_string()).collect();

        let non_empty: Vec<&str> = values
            .iter()
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .collect();

        if non_empty.is_empty() {
            return Err(Error::Validation(
                "enter at least one value to generate a QR code".to_string(),
            ));
        }

        let payload = non_empty.join(&delimiter.to_string());
        Ok(Self { values, payload })
    }

    /// Trimmed values in field order, empty ones included
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Delimiter-joined payload
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// File stem for an artifact: spaces, the delimiter and filesystem-hostile
/// characters become underscores.
///
/// Stems longer than [`MAX_STEM_BYTES`] are cut on a char boundary and get
/// `_<digest>` appended, so long payloads sharing a prefix stay distinct.
pub fn sanitize_file_stem(payload: &str, delimiter: char) -> String {
    let stem: String = payload
        .chars()
        .map(|c| {
            if c == delimiter
                || c.is_whitespace()
                || c.is_control()
                || matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    if stem.chars().all(|c| c == '_' || c == '.') {
        return FALLBACK_STEM.to_string();
    }
    if stem.len() <= MAX_STEM_BYTES {
        return stem;
    }

    let mut cut = MAX_STEM_BYTES;
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    let digest = hex::encode(Sha256::digest(payload.as_bytes()));
    format!("{}_{}", &stem[..cut], &digest[..DIGEST_SUFFIX_LEN])
}
