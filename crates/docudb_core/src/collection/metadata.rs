//! Persisted collection metadata.
//!
//! `_metadata.json` is a full-file rewrite holding the document count,
//! the registered index field specs, creation/update instants, and the
//! stable document order. Writes go through write-then-rename so a
//! crashed rewrite never leaves a torn file.

use crate::document;
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name of the metadata snapshot within a collection directory.
pub const METADATA_FILE: &str = "_metadata.json";

/// Collection bookkeeping persisted alongside the documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    /// Number of documents in the collection.
    pub count: u64,
    /// Field specs of the collection's indexes.
    pub indices: Vec<String>,
    /// Creation instant, RFC 3339.
    pub created: String,
    /// Last mutation instant, RFC 3339.
    pub updated: String,
    /// Stable enumeration order of every document id.
    pub document_order: Vec<String>,
}

impl CollectionMetadata {
    /// Creates metadata for a brand-new collection.
    #[must_use]
    pub fn new() -> Self {
        let now = document::now_micros();
        Self {
            count: 0,
            indices: Vec::new(),
            created: now.clone(),
            updated: now,
            document_order: Vec::new(),
        }
    }

    /// Bumps the update instant.
    pub fn touch(&mut self) {
        self.updated = document::now_micros();
    }

    /// Loads metadata from disk; `None` when the file does not exist.
    pub fn load(collection: &str, path: &Path) -> DbResult<Option<Self>> {
        let blob = match fs::read(path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DbError::metadata(collection, e.to_string())),
        };
        let metadata = serde_json::from_slice(&blob)
            .map_err(|e| DbError::metadata(collection, format!("invalid metadata: {e}")))?;
        Ok(Some(metadata))
    }

    /// Writes metadata via write-then-rename.
    pub fn save(&self, collection: &str, path: &Path) -> DbResult<()> {
        let blob = serde_json::to_vec(self)
            .map_err(|e| DbError::metadata(collection, e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &blob).map_err(|e| DbError::metadata(collection, e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| DbError::metadata(collection, e.to_string()))?;
        Ok(())
    }
}

impl Default for CollectionMetadata {
    fn default() -> Self {
        Self::new()
    }
}
