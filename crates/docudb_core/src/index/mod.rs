//! Equality indexes with disk persistence.
//!
//! An index maps a normalized value key to the document ids carrying that
//! value. Simple indexes project one dot path; compound indexes join the
//! per-field keys with `'|'`. Uniqueness and sparseness are properties of
//! the index, enforced on every update.
//!
//! On disk each collection keeps an `_indices/` directory holding one
//! `<fieldSpec>.idx` JSON snapshot per index; snapshots are rewritten in
//! full on change and rehydrated at collection open.

pub mod key;
mod manager;

pub use manager::IndexManager;

use crate::document::{self, Document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Separator between fields in a compound field spec.
pub const FIELD_SPEC_SEPARATOR: &str = "+";

/// Separator between components of a compound value key.
pub const COMPOUND_KEY_SEPARATOR: &str = "|";

/// Options for creating an index.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Enforce at most one document per value key.
    pub unique: bool,
    /// Skip documents missing the indexed field.
    pub sparse: bool,
    /// Explicit index name; derived from the field spec when absent.
    pub name: Option<String>,
}

impl IndexOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the index unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Makes the index sparse.
    #[must_use]
    pub const fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    /// Sets an explicit index name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// An equality index over one or more dot paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Indexed dot paths.
    pub fields: Vec<String>,
    /// Whether this index spans multiple fields.
    pub is_compound: bool,
    /// Whether at most one document may hold each value key.
    pub unique: bool,
    /// Whether documents missing the field are omitted.
    pub sparse: bool,
    /// Index name.
    pub name: String,
    /// Creation instant, RFC 3339.
    pub created: String,
    /// Last update instant, RFC 3339.
    pub updated: String,
    /// Value key to document-id bucket.
    pub entries: HashMap<String, Vec<String>>,
}

impl Index {
    /// Creates an empty index over `fields`.
    #[must_use]
    pub fn new(fields: Vec<String>, options: &IndexOptions) -> Self {
        let is_compound = fields.len() > 1;
        let spec = fields.join(FIELD_SPEC_SEPARATOR);
        let now = document::now_millis();
        Self {
            fields,
            is_compound,
            unique: options.unique,
            sparse: options.sparse,
            name: options
                .name
                .clone()
                .unwrap_or_else(|| format!("{spec}_idx")),
            created: now.clone(),
            updated: now,
            entries: HashMap::new(),
        }
    }

    /// Returns the `'+'`-joined field spec identifying this index.
    #[must_use]
    pub fn field_spec(&self) -> String {
        self.fields.join(FIELD_SPEC_SEPARATOR)
    }

    /// Projects the indexed value key from a document.
    ///
    /// Returns the normalized key and whether the projection was absent.
    /// A compound projection counts as absent only when every component
    /// field is absent.
    #[must_use]
    pub fn project(&self, doc: &Document) -> (String, bool) {
        let values: Vec<Option<&serde_json::Value>> = self
            .fields
            .iter()
            .map(|field| document::get_path(doc, field))
            .collect();
        let absent = values.iter().all(Option::is_none);
        let parts: Vec<String> = values.into_iter().map(key::normalize).collect();
        (parts.join(COMPOUND_KEY_SEPARATOR), absent)
    }

    /// Removes every occurrence of a document id, dropping empty buckets.
    pub fn remove_doc(&mut self, doc_id: &str) {
        self.entries.retain(|_, ids| {
            ids.retain(|id| id != doc_id);
            !ids.is_empty()
        });
    }

    /// Returns the bucket for a value key, if any.
    #[must_use]
    pub fn bucket(&self, key: &str) -> Option<&Vec<String>> {
        self.entries.get(key)
    }
}
