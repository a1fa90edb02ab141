//! Page-id to text mapping loaded from the OCR catalog document.
//!
//! The document is a JSON object keyed by decimal page ids. A value is either
//! the page text or an object carrying it in a `"texto"` field. Anything else
//! is kept as an empty page and recorded as malformed.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

const TEXT_FIELD: &str = "texto";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read catalog file at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog as JSON")]
    Parse(#[from] serde_json::Error),
    #[error("catalog root must be a JSON object keyed by page number")]
    NotAnObject,
}

/// Why an entry did not yield page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Key is not a decimal page number; the entry is skipped entirely
    InvalidPageId,
    /// Two keys resolve to the same page number (e.g. "7" and "07"); the canonical spelling wins
    DuplicatePageId,
    /// Value is neither a string nor an object with a string `texto`; page kept empty
    UnsupportedValue,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MalformedReason::InvalidPageId => "invalid page number",
            MalformedReason::DuplicatePageId => "duplicate page number",
            MalformedReason::UnsupportedValue => "no text",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEntry {
    pub key: String,
    pub reason: MalformedReason,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pages: BTreeMap<u32, String>,
    malformed: Vec<MalformedEntry>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&raw)?;

        tracing::info!(
            path = %path.display(),
            pages = catalog.len(),
            malformed = catalog.malformed.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let value: Value = serde_json::from_str(raw)?;
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            _ => Err(CatalogError::NotAnObject),
        }
    }

    fn from_map(map: Map<String, Value>) -> Self {
        let mut catalog = Self::default();

        // Canonical keys first so "7" beats "07" regardless of map order
        let (canonical, other): (Vec<_>, Vec<_>) = map
            .into_iter()
            .partition(|(key, _)| parse_page_id(key).is_some_and(|id| id.to_string() == *key));

        for (key, value) in canonical.into_iter().chain(other) {
            let Some(page_id) = parse_page_id(&key) else {
                tracing::warn!(key = %key, "skipping catalog entry with invalid page number");
                catalog.push_malformed(key, MalformedReason::InvalidPageId);
                continue;
            };

            if catalog.pages.contains_key(&page_id) {
                tracing::warn!(key = %key, page = page_id, "skipping duplicate catalog page");
                catalog.push_malformed(key, MalformedReason::DuplicatePageId);
                continue;
            }

            let text = match page_text(value) {
                Some(text) => text,
                None => {
                    tracing::warn!(page = page_id, "catalog entry has no text, treating as empty");
                    catalog.push_malformed(key, MalformedReason::UnsupportedValue);
                    String::new()
                }
            };
            catalog.pages.insert(page_id, text);
        }

        catalog
    }

    fn push_malformed(&mut self, key: String, reason: MalformedReason) {
        self.malformed.push(MalformedEntry { key, reason });
    }

    /// Pages in ascending page-number order.
    pub fn pages(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.pages.iter().map(|(id, text)| (*id, text.as_str()))
    }

    pub fn text(&self, page_id: u32) -> Option<&str> {
        self.pages.get(&page_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn malformed(&self) -> &[MalformedEntry] {
        &self.malformed
    }
}

fn parse_page_id(key: &str) -> Option<u32> {
    let trimmed = key.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

fn page_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Object(mut fields) => match fields.remove(TEXT_FIELD) {
            Some(Value::String(text)) => Some(text),
            _ => None,
        },
        _ => None,
    }
}
