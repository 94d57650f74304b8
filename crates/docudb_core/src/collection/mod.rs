//! Collection controller: CRUD orchestration, ordering, locking.
//!
//! A collection owns its document cache, persisted metadata, and a
//! per-document lock table; storage and indexes are shared handles from
//! the database. Mutation ordering within one operation:
//!
//! - insert: schema → id → index update → chunk write → metadata
//! - update (under the document lock): chunk write → stale chunk delete
//!   → metadata → index update
//!
//! Metadata read-modify-write sequences run under a single mutex per
//! collection, so concurrent inserts cannot drop each other's count or
//! ordering updates.

mod locks;
mod metadata;

pub use metadata::{CollectionMetadata, METADATA_FILE};

use crate::document::{self, Document};
use crate::error::{DbError, DbResult};
use crate::id::{self, IdType};
use crate::index::{Index, IndexManager, IndexOptions, FIELD_SPEC_SEPARATOR};
use crate::name;
use crate::query::Query;
use crate::schema::Schema;
use docudb_storage::ChunkStore;
use locks::LockTable;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Update operators with defined semantics.
const SUPPORTED_OPERATORS: &[&str] = &["$set", "$unset", "$inc"];

/// Update operators recognized by the grammar but rejected here.
const UNSUPPORTED_OPERATORS: &[&str] = &["$push", "$pull", "$addToSet"];

/// Options for opening a collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    /// Identifier format for generated ids; a schema-level `id_type`
    /// takes precedence.
    pub id_type: Option<IdType>,
    /// Schema applied to inserts and updates.
    pub schema: Option<Schema>,
}

impl CollectionOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identifier format.
    #[must_use]
    pub const fn id_type(mut self, id_type: IdType) -> Self {
        self.id_type = Some(id_type);
        self
    }

    /// Sets the schema.
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// A cached document with the chunk paths backing it.
#[derive(Debug, Clone)]
struct CachedDocument {
    chunk_paths: Vec<PathBuf>,
    data: Document,
}

/// A named container of documents with schema, indexes, and ordering.
pub struct Collection {
    name: String,
    storage: Arc<ChunkStore>,
    indexes: Arc<IndexManager>,
    options: CollectionOptions,
    default_id_type: IdType,
    cache: RwLock<HashMap<String, CachedDocument>>,
    metadata: Mutex<CollectionMetadata>,
    locks: LockTable,
}

impl Collection {
    /// Opens (and lazily initializes) a collection: ensures its
    /// directory, loads or creates `_metadata.json`, and rehydrates any
    /// persisted index snapshots.
    pub(crate) fn open(
        name: &str,
        storage: Arc<ChunkStore>,
        indexes: Arc<IndexManager>,
        options: CollectionOptions,
        default_id_type: IdType,
    ) -> DbResult<Self> {
        name::validate_name(name)?;
        if name.starts_with('_') {
            return Err(DbError::invalid_name(
                "collection names must not start with an underscore",
            ));
        }

        storage.ensure_collection_dir(name)?;

        let meta_path = storage.collection_dir(name).join(METADATA_FILE);
        let metadata = match CollectionMetadata::load(name, &meta_path)? {
            Some(metadata) => metadata,
            None => {
                let metadata = CollectionMetadata::new();
                metadata.save(name, &meta_path)?;
                metadata
            }
        };

        indexes.load_indices(name)?;

        debug!(collection = name, count = metadata.count, "opened collection");
        Ok(Self {
            name: name.to_string(),
            storage,
            indexes,
            options,
            default_id_type,
            cache: RwLock::new(HashMap::new()),
            metadata: Mutex::new(metadata),
            locks: LockTable::new(),
        })
    }

    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a snapshot of the persisted metadata.
    #[must_use]
    pub fn metadata(&self) -> CollectionMetadata {
        self.metadata.lock().clone()
    }

    fn metadata_path(&self) -> PathBuf {
        self.storage.collection_dir(&self.name).join(METADATA_FILE)
    }

    fn effective_id_type(&self) -> IdType {
        self.options
            .schema
            .as_ref()
            .and_then(|s| s.options().id_type)
            .or(self.options.id_type)
            .unwrap_or(self.default_id_type)
    }

    /// Applies the collection-wide id rule: a schema that owns `_id`
    /// validation replaces the built-in format check.
    fn check_id(&self, id: &str) -> DbResult<()> {
        let schema_owns = self
            .options
            .schema
            .as_ref()
            .is_some_and(Schema::owns_id_validation);
        if !schema_owns && !id::is_valid(id) {
            return Err(DbError::invalid_id(id));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Insert
    // ------------------------------------------------------------------

    /// Validates, identifies, indexes, and persists one document.
    ///
    /// The index update runs before the chunk write so a uniqueness
    /// violation never produces orphaned chunks. Returns the stored
    /// document, including a generated `_id`.
    pub fn insert_one(&self, doc: Value) -> DbResult<Document> {
        let doc = document::into_object(doc)?;
        let mut validated = match &self.options.schema {
            Some(schema) => schema.validate(&doc)?,
            None => doc,
        };

        let id = match validated.get("_id") {
            None => {
                let id = id::generate(self.effective_id_type());
                validated.insert("_id".to_string(), Value::String(id.clone()));
                id
            }
            Some(Value::String(s)) => {
                let s = s.clone();
                self.check_id(&s)?;
                s
            }
            Some(other) => return Err(DbError::invalid_id(other.to_string())),
        };

        self.indexes.update_index(&self.name, &id, &validated)?;
        let chunk_paths =
            self.storage
                .save_data(&self.name, &id, &Value::Object(validated.clone()))?;

        self.cache.write().insert(
            id.clone(),
            CachedDocument {
                chunk_paths,
                data: validated.clone(),
            },
        );

        {
            let mut meta = self.metadata.lock();
            meta.count += 1;
            meta.document_order.push(id.clone());
            meta.touch();
            meta.save(&self.name, &self.metadata_path())?;
        }

        debug!(collection = %self.name, %id, "inserted document");
        Ok(validated)
    }

    /// Sequential inserts; on the first failure, already-inserted
    /// documents remain and the error carries the failing position and
    /// the original error.
    pub fn insert_many(&self, docs: Vec<Value>) -> DbResult<Vec<Document>> {
        let mut inserted = Vec::with_capacity(docs.len());
        for (position, doc) in docs.into_iter().enumerate() {
            match self.insert_one(doc) {
                Ok(stored) => inserted.push(stored),
                Err(source) => {
                    return Err(DbError::Insert {
                        collection: self.name.clone(),
                        position,
                        source: Box::new(source),
                    })
                }
            }
        }
        Ok(inserted)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Loads a document by id, consulting the cache first.
    ///
    /// A missing document directory yields `None`.
    pub fn find_by_id(&self, id: &str) -> DbResult<Option<Document>> {
        self.check_id(id)?;

        if let Some(cached) = self.cache.read().get(id) {
            return Ok(Some(cached.data.clone()));
        }

        let Some(chunk_paths) = self.storage.list_chunks(&self.name, id)? else {
            return Ok(None);
        };
        let value = self.storage.read_data(&chunk_paths)?;
        let data = document::into_object(value)?;

        self.cache.write().insert(
            id.to_string(),
            CachedDocument {
                chunk_paths,
                data: data.clone(),
            },
        );
        Ok(Some(data))
    }

    /// Finds documents matching the criteria.
    pub fn find(&self, criteria: &Value) -> DbResult<Vec<Document>> {
        let query = Query::new(criteria.clone())?;
        self.find_with(&query)
    }

    /// Returns the first matching document, or `None`.
    pub fn find_one(&self, criteria: &Value) -> DbResult<Option<Document>> {
        Ok(self.find(criteria)?.into_iter().next())
    }

    /// Executes a prepared query, trying an index-assisted path before
    /// falling back to a full scan.
    ///
    /// The index path triggers on any top-level scalar (non-operator)
    /// criterion with a matching index; candidates are re-checked
    /// against the full criteria before post-processing.
    pub fn find_with(&self, query: &Query) -> DbResult<Vec<Document>> {
        if let Some(criteria) = query.criteria().as_object() {
            for (field, value) in criteria {
                if field.starts_with('$') || is_operator_object(value) {
                    continue;
                }
                if !self.indexes.has_index(&self.name, field) {
                    continue;
                }
                let Some(ids) = self.indexes.find_by_index(&self.name, field, value) else {
                    continue;
                };
                if ids.is_empty() {
                    continue;
                }
                let mut matched = Vec::with_capacity(ids.len());
                for id in &ids {
                    if let Some(doc) = self.find_by_id(id)? {
                        if query.matches(&doc) {
                            matched.push(doc);
                        }
                    }
                }
                debug!(
                    collection = %self.name,
                    field = %field,
                    candidates = ids.len(),
                    matched = matched.len(),
                    "index-assisted query"
                );
                return Ok(query.post_process(matched));
            }
        }

        let all = self.load_all_documents()?;
        Ok(query.execute(all))
    }

    /// Counts matching documents; empty criteria read the metadata count
    /// without scanning.
    pub fn count(&self, criteria: Option<&Value>) -> DbResult<u64> {
        match criteria {
            None => Ok(self.metadata.lock().count),
            Some(value) if value.as_object().is_some_and(serde_json::Map::is_empty) => {
                Ok(self.metadata.lock().count)
            }
            Some(value) => Ok(self.find(value)?.len() as u64),
        }
    }

    /// Loads every document in stable `document_order`.
    fn load_all_documents(&self) -> DbResult<Vec<Document>> {
        let order = self.metadata.lock().document_order.clone();
        let mut docs = Vec::with_capacity(order.len());
        for id in &order {
            match self.find_by_id(id)? {
                Some(doc) => docs.push(doc),
                None => warn!(collection = %self.name, %id, "ordered id has no document"),
            }
        }
        Ok(docs)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Applies an update to a document by id.
    ///
    /// `$set`, `$unset`, and `$inc` mutate dot paths; an update without
    /// operators replaces by shallow merge. `_id` is always preserved
    /// and the result is re-validated against the schema. The write
    /// sequence runs under the per-document lock. Returns `None` when
    /// the id does not exist.
    pub fn update_by_id(&self, id: &str, update: Value) -> DbResult<Option<Document>> {
        self.check_id(id)?;
        let update = document::into_object(update)?;
        validate_update_operators(&update)?;

        let Some(current) = self.find_by_id(id)? else {
            return Ok(None);
        };

        let mut next = current.clone();
        let has_operators = update.keys().any(|k| k.starts_with('$'));
        if has_operators {
            apply_operators(&mut next, &update)?;
        } else {
            // Replacement shorthand: shallow merge, `_id` preserved.
            for (key, value) in update {
                if key != "_id" {
                    next.insert(key, value);
                }
            }
        }
        if let Some(id_value) = current.get("_id") {
            next.insert("_id".to_string(), id_value.clone());
        }

        let next = match &self.options.schema {
            Some(schema) => schema.validate(&next)?,
            None => next,
        };

        let _guard = self.locks.acquire(&self.name, id)?;

        let new_paths = self
            .storage
            .save_data(&self.name, id, &Value::Object(next.clone()))?;

        let old_paths = self
            .cache
            .read()
            .get(id)
            .map(|c| c.chunk_paths.clone())
            .unwrap_or_default();
        let stale: Vec<PathBuf> = old_paths
            .into_iter()
            .filter(|p| !new_paths.contains(p))
            .collect();
        if !stale.is_empty() {
            self.storage.delete_chunks(&stale)?;
        }

        self.cache.write().insert(
            id.to_string(),
            CachedDocument {
                chunk_paths: new_paths,
                data: next.clone(),
            },
        );

        {
            let mut meta = self.metadata.lock();
            meta.touch();
            meta.save(&self.name, &self.metadata_path())?;
        }

        self.indexes.update_index(&self.name, id, &next)?;

        debug!(collection = %self.name, %id, "updated document");
        Ok(Some(next))
    }

    /// Updates every matching document; returns the number updated.
    pub fn update_many(&self, criteria: &Value, update: &Value) -> DbResult<usize> {
        let matches = self.find(criteria)?;
        let mut updated = 0;
        for doc in matches {
            let id = doc_id(&doc)?;
            if self.update_by_id(&id, update.clone())?.is_some() {
                updated += 1;
            }
        }
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Deletes a document by id; `false` when it does not exist.
    pub fn delete_by_id(&self, id: &str) -> DbResult<bool> {
        self.check_id(id)?;
        if self.find_by_id(id)?.is_none() {
            return Ok(false);
        }

        let chunk_paths = self
            .cache
            .read()
            .get(id)
            .map(|c| c.chunk_paths.clone())
            .unwrap_or_default();
        self.storage.delete_chunks(&chunk_paths)?;
        self.storage.remove_document_dir(&self.name, id)?;

        self.indexes.remove_from_indices(&self.name, id)?;
        self.cache.write().remove(id);

        {
            let mut meta = self.metadata.lock();
            meta.count = meta.count.saturating_sub(1);
            meta.document_order.retain(|d| d != id);
            meta.touch();
            meta.save(&self.name, &self.metadata_path())?;
        }

        debug!(collection = %self.name, %id, "deleted document");
        Ok(true)
    }

    /// Deletes the first matching document.
    pub fn delete_one(&self, criteria: &Value) -> DbResult<bool> {
        match self.find_one(criteria)? {
            Some(doc) => self.delete_by_id(&doc_id(&doc)?),
            None => Ok(false),
        }
    }

    /// Deletes every matching document; returns the number deleted.
    pub fn delete_many(&self, criteria: &Value) -> DbResult<usize> {
        let matches = self.find(criteria)?;
        let mut deleted = 0;
        for doc in matches {
            if self.delete_by_id(&doc_id(&doc)?)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Indexes
    // ------------------------------------------------------------------

    /// Creates an index, back-fills it over every existing document, and
    /// registers it in the collection metadata. Idempotent.
    pub fn create_index(&self, fields: &[&str], options: IndexOptions) -> DbResult<bool> {
        let fields: Vec<String> = fields.iter().map(ToString::to_string).collect();
        self.indexes.create_index(&self.name, &fields, &options)?;
        let field_spec = fields.join(FIELD_SPEC_SEPARATOR);

        for doc in self.load_all_documents()? {
            let id = doc_id(&doc)?;
            self.indexes.update_index(&self.name, &id, &doc)?;
        }

        {
            let mut meta = self.metadata.lock();
            if !meta.indices.contains(&field_spec) {
                meta.indices.push(field_spec);
                meta.touch();
                meta.save(&self.name, &self.metadata_path())?;
            }
        }
        Ok(true)
    }

    /// Drops an index and removes it from the collection metadata.
    pub fn drop_index(&self, field_spec: &str) -> DbResult<bool> {
        let existed = self.indexes.drop_index(&self.name, field_spec)?;

        let mut meta = self.metadata.lock();
        if meta.indices.iter().any(|s| s == field_spec) {
            meta.indices.retain(|s| s != field_spec);
            meta.touch();
            meta.save(&self.name, &self.metadata_path())?;
        }
        Ok(existed)
    }

    /// Lists this collection's indexes.
    #[must_use]
    pub fn list_indexes(&self) -> Vec<Index> {
        self.indexes.list_indexes(&self.name)
    }

    // ------------------------------------------------------------------
    // Document ordering
    // ------------------------------------------------------------------

    /// Returns the position of a document in the stable order, or `None`
    /// when the id is not ordered.
    pub fn position_of(&self, id: &str) -> DbResult<Option<usize>> {
        self.check_id(id)?;
        Ok(self
            .metadata
            .lock()
            .document_order
            .iter()
            .position(|d| d == id))
    }

    /// Returns the document at a position, or `None` past the end.
    pub fn find_by_position(&self, position: usize) -> DbResult<Option<Document>> {
        let id = self.metadata.lock().document_order.get(position).cloned();
        match id {
            Some(id) => self.find_by_id(&id),
            None => Ok(None),
        }
    }

    /// Moves a document to a new position.
    ///
    /// A target at or past the end clamps to the last position; moving
    /// to the current position is a no-op. The in-memory cache is
    /// invalidated and rehydrated afterwards.
    pub fn update_position(&self, id: &str, new_position: usize) -> DbResult<()> {
        self.check_id(id)?;

        let order = {
            let mut meta = self.metadata.lock();
            let current = meta
                .document_order
                .iter()
                .position(|d| d == id)
                .ok_or_else(|| {
                    DbError::invalid_position(format!("document {id} is not ordered"))
                })?;
            let last = meta.document_order.len() - 1;
            let target = new_position.min(last);
            if target == current {
                return Ok(());
            }

            let moved = meta.document_order.remove(current);
            meta.document_order.insert(target, moved);
            meta.touch();
            meta.save(&self.name, &self.metadata_path())?;
            meta.document_order.clone()
        };

        self.cache.write().clear();
        for id in &order {
            self.find_by_id(id)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Drop
    // ------------------------------------------------------------------

    /// Deletes every document, then removes the collection directory.
    pub fn drop(&self) -> DbResult<()> {
        let order = self.metadata.lock().document_order.clone();
        for id in &order {
            self.delete_by_id(id)?;
        }
        self.storage.remove_collection_dir(&self.name)?;
        self.indexes.forget_collection(&self.name);
        self.cache.write().clear();
        debug!(collection = %self.name, "dropped collection");
        Ok(())
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("count", &self.metadata.lock().count)
            .finish_non_exhaustive()
    }
}

/// Extracts the string `_id` of a stored document.
fn doc_id(doc: &Document) -> DbResult<String> {
    doc.get("_id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| DbError::invalid_document("stored document lacks a string _id"))
}

/// True when a criteria value is an operator object rather than a
/// scalar equality.
fn is_operator_object(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.keys().any(|k| k.starts_with('$')))
}

/// Rejects unknown `$`-operators and the recognized-but-unsupported
/// array operators.
fn validate_update_operators(update: &Document) -> DbResult<()> {
    for key in update.keys().filter(|k| k.starts_with('$')) {
        if SUPPORTED_OPERATORS.contains(&key.as_str()) {
            continue;
        }
        if UNSUPPORTED_OPERATORS.contains(&key.as_str()) {
            return Err(DbError::invalid_update(format!(
                "{key} is not supported; use $set on the full array"
            )));
        }
        return Err(DbError::invalid_update(format!(
            "unknown update operator {key}"
        )));
    }
    Ok(())
}

/// Applies `$set`/`$unset`/`$inc` to a document.
fn apply_operators(next: &mut Document, update: &Document) -> DbResult<()> {
    if let Some(set) = update.get("$set") {
        let entries = set.as_object().ok_or_else(|| {
            DbError::invalid_update("$set requires an object of path-value pairs")
        })?;
        for (path, value) in entries {
            document::set_path(next, path, value.clone());
        }
    }
    if let Some(unset) = update.get("$unset") {
        let entries = unset.as_object().ok_or_else(|| {
            DbError::invalid_update("$unset requires an object of paths")
        })?;
        for path in entries.keys() {
            document::unset_path(next, path);
        }
    }
    if let Some(inc) = update.get("$inc") {
        let entries = inc.as_object().ok_or_else(|| {
            DbError::invalid_update("$inc requires an object of path-number pairs")
        })?;
        for (path, delta) in entries {
            let delta = delta.as_f64().ok_or_else(|| {
                DbError::invalid_update(format!("$inc delta for {path} must be a number"))
            })?;
            document::inc_path(next, path, delta)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn open(options: CollectionOptions) -> (tempfile::TempDir, Collection) {
        let temp = tempdir().unwrap();
        let storage = Arc::new(ChunkStore::new(temp.path().join("db"), 1024, false).unwrap());
        let indexes = Arc::new(IndexManager::new(storage.root()));
        let collection =
            Collection::open("items", storage, indexes, options, IdType::Mongo).unwrap();
        (temp, collection)
    }

    #[test]
    fn insert_generates_valid_id() {
        let (_t, coll) = open(CollectionOptions::new());
        let doc = coll.insert_one(json!({"name": "Laptop"})).unwrap();
        let id = doc.get("_id").and_then(Value::as_str).unwrap();
        assert!(id::is_valid_mongo_id(id));
    }

    #[test]
    fn insert_rejects_bad_explicit_id() {
        let (_t, coll) = open(CollectionOptions::new());
        let err = coll
            .insert_one(json!({"_id": "not-a-valid-id", "name": "x"}))
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidId { .. }));
    }

    #[test]
    fn insert_rejects_non_objects() {
        let (_t, coll) = open(CollectionOptions::new());
        assert!(matches!(
            coll.insert_one(json!([1, 2, 3])),
            Err(DbError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn round_trip_through_cache_and_disk() {
        let (_t, coll) = open(CollectionOptions::new());
        let doc = coll
            .insert_one(json!({"name": "Laptop", "specs": {"ram": 16}}))
            .unwrap();
        let id = doc.get("_id").and_then(Value::as_str).unwrap();

        // Cache hit.
        let cached = coll.find_by_id(id).unwrap().unwrap();
        assert_eq!(cached.get("specs"), Some(&json!({"ram": 16})));

        // Cold read.
        coll.cache.write().clear();
        let cold = coll.find_by_id(id).unwrap().unwrap();
        assert_eq!(cold, cached);
    }

    #[test]
    fn find_by_id_missing_is_none() {
        let (_t, coll) = open(CollectionOptions::new());
        let id = id::generate(IdType::Mongo);
        assert!(coll.find_by_id(&id).unwrap().is_none());
    }

    #[test]
    fn update_set_and_inc() {
        let (_t, coll) = open(CollectionOptions::new());
        let doc = coll.insert_one(json!({"price": 100, "stock": 5})).unwrap();
        let id = doc.get("_id").and_then(Value::as_str).unwrap().to_string();

        let before = coll.metadata().updated;
        let updated = coll
            .update_by_id(&id, json!({"$set": {"price": 180}, "$inc": {"stock": -2}}))
            .unwrap()
            .unwrap();

        assert_eq!(updated.get("price"), Some(&json!(180)));
        assert_eq!(updated.get("stock"), Some(&json!(3)));
        assert_eq!(updated.get("_id"), Some(&json!(id)));
        assert!(coll.metadata().updated > before);
    }

    #[test]
    fn update_replacement_preserves_id() {
        let (_t, coll) = open(CollectionOptions::new());
        let doc = coll.insert_one(json!({"name": "old", "extra": 1})).unwrap();
        let id = doc.get("_id").and_then(Value::as_str).unwrap().to_string();

        let updated = coll
            .update_by_id(&id, json!({"name": "new", "_id": "ffffffffffffffffffffffff"}))
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("_id"), Some(&json!(id)));
        assert_eq!(updated.get("name"), Some(&json!("new")));
        // Shallow merge keeps untouched fields.
        assert_eq!(updated.get("extra"), Some(&json!(1)));
    }

    #[test]
    fn update_rejects_unknown_and_unsupported_operators() {
        let (_t, coll) = open(CollectionOptions::new());
        let doc = coll.insert_one(json!({"tags": []})).unwrap();
        let id = doc.get("_id").and_then(Value::as_str).unwrap().to_string();

        assert!(matches!(
            coll.update_by_id(&id, json!({"$push": {"tags": "x"}})),
            Err(DbError::InvalidUpdate { .. })
        ));
        assert!(matches!(
            coll.update_by_id(&id, json!({"$rename": {"tags": "labels"}})),
            Err(DbError::InvalidUpdate { .. })
        ));
    }

    #[test]
    fn update_missing_document_is_none() {
        let (_t, coll) = open(CollectionOptions::new());
        let id = id::generate(IdType::Mongo);
        assert!(coll.update_by_id(&id, json!({"$set": {"a": 1}})).unwrap().is_none());
    }

    #[test]
    fn inc_on_non_number_is_invalid_type() {
        let (_t, coll) = open(CollectionOptions::new());
        let doc = coll.insert_one(json!({"name": "x"})).unwrap();
        let id = doc.get("_id").and_then(Value::as_str).unwrap().to_string();

        assert!(matches!(
            coll.update_by_id(&id, json!({"$inc": {"name": 1}})),
            Err(DbError::InvalidType { .. })
        ));
    }

    #[test]
    fn delete_removes_everything() {
        let (_t, coll) = open(CollectionOptions::new());
        let doc = coll.insert_one(json!({"name": "x"})).unwrap();
        let id = doc.get("_id").and_then(Value::as_str).unwrap().to_string();

        assert!(coll.delete_by_id(&id).unwrap());
        assert!(coll.find_by_id(&id).unwrap().is_none());
        assert_eq!(coll.position_of(&id).unwrap(), None);
        assert_eq!(coll.count(None).unwrap(), 0);
        assert!(!coll.storage.document_dir("items", &id).exists());

        // Second delete reports false.
        assert!(!coll.delete_by_id(&id).unwrap());
    }

    #[test]
    fn count_fast_path_and_criteria() {
        let (_t, coll) = open(CollectionOptions::new());
        coll.insert_many(vec![
            json!({"price": 10}),
            json!({"price": 20}),
            json!({"price": 30}),
        ])
        .unwrap();

        assert_eq!(coll.count(None).unwrap(), 3);
        assert_eq!(coll.count(Some(&json!({}))).unwrap(), 3);
        assert_eq!(coll.count(Some(&json!({"price": {"$gt": 15}}))).unwrap(), 2);
    }

    #[test]
    fn insert_many_keeps_prefix_on_failure() {
        let (_t, coll) = open(CollectionOptions::new());
        coll.create_index(&["sku"], IndexOptions::new().unique())
            .unwrap();

        let err = coll
            .insert_many(vec![
                json!({"sku": "A"}),
                json!({"sku": "B"}),
                json!({"sku": "A"}),
            ])
            .unwrap_err();

        match err {
            DbError::Insert { position, source, .. } => {
                assert_eq!(position, 2);
                assert!(matches!(
                    *source,
                    DbError::Index(crate::error::IndexError::UniqueViolation { .. })
                ));
            }
            other => panic!("expected Insert error, got {other:?}"),
        }
        assert_eq!(coll.count(None).unwrap(), 2);
    }

    #[test]
    fn ordering_apis() {
        let (_t, coll) = open(CollectionOptions::new());
        let ids: Vec<String> = (0..5)
            .map(|i| {
                let doc = coll.insert_one(json!({"n": i})).unwrap();
                doc.get("_id").and_then(Value::as_str).unwrap().to_string()
            })
            .collect();

        assert_eq!(coll.position_of(&ids[0]).unwrap(), Some(0));

        coll.update_position(&ids[0], 1).unwrap();
        assert_eq!(coll.position_of(&ids[0]).unwrap(), Some(1));
        let found = coll.find_by_position(0).unwrap().unwrap();
        assert_eq!(found.get("_id"), Some(&json!(ids[1])));

        // Past-the-end clamps to last.
        coll.update_position(&ids[1], 100).unwrap();
        assert_eq!(coll.position_of(&ids[1]).unwrap(), Some(4));

        // Ordering drives enumeration.
        let all = coll.find(&json!({})).unwrap();
        let listed: Vec<&str> = all
            .iter()
            .map(|d| d.get("_id").and_then(Value::as_str).unwrap())
            .collect();
        assert_eq!(listed[0], ids[0]);
        assert_eq!(listed[4], ids[1]);

        assert!(coll.find_by_position(99).unwrap().is_none());
    }

    #[test]
    fn drop_clears_directory() {
        let (_t, coll) = open(CollectionOptions::new());
        coll.insert_one(json!({"a": 1})).unwrap();
        coll.drop().unwrap();
        assert!(!coll.storage.collection_dir("items").exists());
    }

    #[test]
    fn underscore_collection_names_are_rejected() {
        let temp = tempdir().unwrap();
        let storage = Arc::new(ChunkStore::new(temp.path().join("db"), 1024, false).unwrap());
        let indexes = Arc::new(IndexManager::new(storage.root()));
        let result = Collection::open(
            "_private",
            storage,
            indexes,
            CollectionOptions::new(),
            IdType::Mongo,
        );
        assert!(matches!(result, Err(DbError::InvalidName { .. })));
    }
}
