//! Index registry with disk persistence.
//!
//! # Invariants
//!
//! - The uniqueness check runs before any bucket mutation, so a violation
//!   leaves every index unchanged for that document.
//! - Snapshots on disk are full-file rewrites via write-then-rename.
//! - Lookup and update use the same key normalization.

use crate::document::{self, Document};
use crate::error::IndexError;
use crate::index::{key, Index, IndexOptions};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory under each collection holding index snapshots.
const INDICES_DIR: &str = "_indices";

/// Extension of index snapshot files.
const INDEX_EXT: &str = "idx";

/// Manages every index of every collection under a database root.
#[derive(Debug)]
pub struct IndexManager {
    /// Database root directory.
    root: PathBuf,
    /// Indexes keyed by `(collection, field_spec)`.
    indices: RwLock<HashMap<(String, String), Index>>,
}

impl IndexManager {
    /// Creates a manager rooted at the database directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            indices: RwLock::new(HashMap::new()),
        }
    }

    fn indices_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection).join(INDICES_DIR)
    }

    fn index_path(&self, collection: &str, field_spec: &str) -> PathBuf {
        self.indices_dir(collection)
            .join(format!("{field_spec}.{INDEX_EXT}"))
    }

    /// Creates an index over the given fields. Idempotent: an existing
    /// index with the same field spec is left untouched.
    ///
    /// The caller back-fills by running `update_index` over existing
    /// documents after creation.
    pub fn create_index(
        &self,
        collection: &str,
        fields: &[String],
        options: &IndexOptions,
    ) -> Result<bool, IndexError> {
        if fields.is_empty() || fields.iter().any(String::is_empty) {
            return Err(IndexError::InvalidFieldType {
                message: "index fields must be non-empty".to_string(),
            });
        }

        let index = Index::new(fields.to_vec(), options);
        let field_spec = index.field_spec();
        let map_key = (collection.to_string(), field_spec.clone());

        {
            let mut indices = self.indices.write();
            if indices.contains_key(&map_key) {
                return Ok(true);
            }
            indices.insert(map_key, index.clone());
        }

        fs::create_dir_all(self.indices_dir(collection)).map_err(|e| IndexError::Init {
            collection: collection.to_string(),
            message: e.to_string(),
        })?;
        self.save_index(collection, &index)?;

        debug!(collection, field_spec = %field_spec, "created index");
        Ok(true)
    }

    /// Drops an index and deletes its snapshot.
    pub fn drop_index(&self, collection: &str, field_spec: &str) -> Result<bool, IndexError> {
        let existed = self
            .indices
            .write()
            .remove(&(collection.to_string(), field_spec.to_string()))
            .is_some();

        let path = self.index_path(collection, field_spec);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(IndexError::Drop {
                    collection: collection.to_string(),
                    field_spec: field_spec.to_string(),
                    message: e.to_string(),
                })
            }
        }

        debug!(collection, field_spec, existed, "dropped index");
        Ok(existed)
    }

    /// Re-points every index of the collection at a document's current
    /// values, then persists the collection's snapshots.
    ///
    /// Runs two phases: all projections are computed and unique-checked
    /// first, then buckets mutate, so a `UniqueViolation` leaves every
    /// index untouched.
    pub fn update_index(
        &self,
        collection: &str,
        doc_id: &str,
        doc: &Document,
    ) -> Result<(), IndexError> {
        let mut indices = self.indices.write();

        let mut plan: Vec<(String, Option<String>)> = Vec::new();
        for ((coll, field_spec), index) in indices.iter() {
            if coll != collection {
                continue;
            }
            let (value_key, absent) = index.project(doc);
            if absent && index.sparse {
                plan.push((field_spec.clone(), None));
                continue;
            }
            if index.unique && !absent {
                let taken = index
                    .bucket(&value_key)
                    .is_some_and(|ids| ids.iter().any(|id| id != doc_id));
                if taken {
                    return Err(IndexError::UniqueViolation {
                        collection: collection.to_string(),
                        field_spec: field_spec.clone(),
                        key: value_key,
                    });
                }
            }
            plan.push((field_spec.clone(), Some(value_key)));
        }

        if plan.is_empty() {
            return Ok(());
        }

        let now = document::now_millis();
        for (field_spec, value_key) in plan {
            let index = indices
                .get_mut(&(collection.to_string(), field_spec))
                .expect("planned index is present");
            index.remove_doc(doc_id);
            if let Some(value_key) = value_key {
                index
                    .entries
                    .entry(value_key)
                    .or_default()
                    .push(doc_id.to_string());
            }
            index.updated = now.clone();
        }

        self.persist_collection(collection, &indices)
    }

    /// Purges a document id from every index of the collection and
    /// persists the snapshots.
    pub fn remove_from_indices(&self, collection: &str, doc_id: &str) -> Result<(), IndexError> {
        let mut indices = self.indices.write();
        let mut touched = false;
        let now = document::now_millis();

        for ((coll, _), index) in indices.iter_mut() {
            if coll != collection {
                continue;
            }
            index.remove_doc(doc_id);
            index.updated = now.clone();
            touched = true;
        }

        if touched {
            self.persist_collection(collection, &indices)?;
        }
        Ok(())
    }

    /// Looks up candidate ids for an equality on a single field.
    ///
    /// Returns `None` when no index exists for the field; an existing
    /// index with no bucket for the key yields an empty list.
    #[must_use]
    pub fn find_by_index(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Option<Vec<String>> {
        let indices = self.indices.read();
        let index = indices.get(&(collection.to_string(), field.to_string()))?;
        let value_key = key::normalize(Some(value));
        Some(index.bucket(&value_key).cloned().unwrap_or_default())
    }

    /// True when an index exists for the exact field spec.
    #[must_use]
    pub fn has_index(&self, collection: &str, field: &str) -> bool {
        self.indices
            .read()
            .contains_key(&(collection.to_string(), field.to_string()))
    }

    /// Rehydrates every `.idx` snapshot of a collection.
    ///
    /// Returns the number of indexes loaded. A missing `_indices/`
    /// directory means no indexes. An unreadable snapshot fails the load
    /// so callers do not silently run without a unique constraint.
    pub fn load_indices(&self, collection: &str) -> Result<usize, IndexError> {
        let dir = self.indices_dir(collection);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(IndexError::Load {
                    collection: collection.to_string(),
                    message: e.to_string(),
                })
            }
        };

        let mut loaded = 0;
        let mut indices = self.indices.write();
        for entry in entries {
            let entry = entry.map_err(|e| IndexError::Load {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != INDEX_EXT) {
                continue;
            }
            let index = read_snapshot(collection, &path)?;
            indices.insert((collection.to_string(), index.field_spec()), index);
            loaded += 1;
        }

        debug!(collection, loaded, "loaded index snapshots");
        Ok(loaded)
    }

    /// Returns the indexes belonging to a collection.
    #[must_use]
    pub fn list_indexes(&self, collection: &str) -> Vec<Index> {
        self.indices
            .read()
            .iter()
            .filter(|((coll, _), _)| coll == collection)
            .map(|(_, index)| index.clone())
            .collect()
    }

    /// Forgets a collection's in-memory indexes (used when the collection
    /// is dropped; the directory removal deletes the snapshots).
    pub fn forget_collection(&self, collection: &str) {
        self.indices
            .write()
            .retain(|(coll, _), _| coll != collection);
    }

    /// Writes every snapshot of a collection.
    fn persist_collection(
        &self,
        collection: &str,
        indices: &HashMap<(String, String), Index>,
    ) -> Result<(), IndexError> {
        for ((coll, _), index) in indices {
            if coll == collection {
                self.save_index(collection, index)?;
            }
        }
        Ok(())
    }

    /// Writes one snapshot via write-then-rename.
    fn save_index(&self, collection: &str, index: &Index) -> Result<(), IndexError> {
        let field_spec = index.field_spec();
        let save_err = |message: String| IndexError::Save {
            collection: collection.to_string(),
            field_spec: field_spec.clone(),
            message,
        };

        let dir = self.indices_dir(collection);
        fs::create_dir_all(&dir).map_err(|e| save_err(e.to_string()))?;

        let blob = serde_json::to_vec(index).map_err(|e| save_err(e.to_string()))?;
        let path = self.index_path(collection, &field_spec);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &blob).map_err(|e| save_err(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| save_err(e.to_string()))?;
        Ok(())
    }
}

/// Reads and parses one snapshot file.
fn read_snapshot(collection: &str, path: &Path) -> Result<Index, IndexError> {
    let load_err = |message: String| IndexError::Load {
        collection: collection.to_string(),
        message,
    };
    let blob = fs::read(path).map_err(|e| load_err(e.to_string()))?;
    serde_json::from_slice(&blob).map_err(|e| {
        warn!(collection, path = %path.display(), "unreadable index snapshot");
        load_err(format!("invalid snapshot {}: {e}", path.display()))
    })
}
