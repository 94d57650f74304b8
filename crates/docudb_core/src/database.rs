//! Database façade: lifecycle, directory validation, collection registry.

use crate::collection::{Collection, CollectionOptions};
use crate::config::DatabaseConfig;
use crate::error::{DbError, DbResult};
use crate::index::IndexManager;
use crate::name;
use docudb_storage::ChunkStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing::{debug, info};

/// The main database handle.
///
/// A `Database` owns the shared storage and index manager and a registry
/// of open collections. Collections are created lazily on first
/// reference and re-opened from disk on [`Database::initialize`].
///
/// # Example
///
/// ```rust,ignore
/// use docudb_core::{Database, DatabaseConfig};
/// use serde_json::json;
///
/// let db = Database::new(DatabaseConfig::default().data_dir("/tmp/app"))?;
/// db.initialize()?;
///
/// let products = db.collection("products")?;
/// products.insert_one(json!({"name": "Laptop", "price": 1000}))?;
/// ```
pub struct Database {
    config: DatabaseConfig,
    storage: Arc<ChunkStore>,
    indexes: Arc<IndexManager>,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
    initialized: RwLock<bool>,
}

impl Database {
    /// Creates a database handle, validating the configured name.
    ///
    /// The root directory is created eagerly; persisted collections are
    /// only re-opened by [`Database::initialize`].
    pub fn new(config: DatabaseConfig) -> DbResult<Self> {
        name::validate_name(&config.name)?;

        let root = config.root();
        let storage = ChunkStore::new(&root, config.chunk_size, config.compression)
            .map_err(|e| DbError::Init {
                message: e.to_string(),
            })?;
        let indexes = IndexManager::new(&root);

        Ok(Self {
            config,
            storage: Arc::new(storage),
            indexes: Arc::new(indexes),
            collections: RwLock::new(HashMap::new()),
            initialized: RwLock::new(false),
        })
    }

    /// Creates the data directory and re-opens every persisted
    /// collection (subdirectories not starting with `_`), loading each
    /// collection's metadata and index snapshots.
    pub fn initialize(&self) -> DbResult<()> {
        let root = self.config.root();
        fs::create_dir_all(&root).map_err(|e| DbError::Init {
            message: format!("cannot create {}: {e}", root.display()),
        })?;

        let entries = fs::read_dir(&root).map_err(|e| DbError::Init {
            message: e.to_string(),
        })?;
        let mut reopened = 0;
        for entry in entries {
            let entry = entry.map_err(|e| DbError::Init {
                message: e.to_string(),
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let Ok(dir_name) = entry.file_name().into_string() else {
                continue;
            };
            if dir_name.starts_with('_') {
                continue;
            }
            let collection = Collection::open(
                &dir_name,
                Arc::clone(&self.storage),
                Arc::clone(&self.indexes),
                CollectionOptions::new(),
                self.config.id_type,
            )?;
            self.collections
                .write()
                .insert(dir_name, Arc::new(collection));
            reopened += 1;
        }

        *self.initialized.write() = true;
        info!(root = %root.display(), reopened, "database initialized");
        Ok(())
    }

    /// True once [`Database::initialize`] has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        *self.initialized.read()
    }

    fn ensure_initialized(&self) -> DbResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(DbError::NotInitialized)
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Returns a collection handle, creating the collection on first
    /// reference.
    ///
    /// Idempotent: repeated calls with the same name return the same
    /// handle. Use [`Database::collection_with_options`] to attach a
    /// schema or id format.
    pub fn collection(&self, collection_name: &str) -> DbResult<Arc<Collection>> {
        self.ensure_initialized()?;
        if collection_name.is_empty() {
            return Err(DbError::invalid_name("collection name must not be empty"));
        }

        if let Some(existing) = self.collections.read().get(collection_name) {
            return Ok(Arc::clone(existing));
        }

        let collection = Arc::new(Collection::open(
            collection_name,
            Arc::clone(&self.storage),
            Arc::clone(&self.indexes),
            CollectionOptions::new(),
            self.config.id_type,
        )?);
        self.collections
            .write()
            .insert(collection_name.to_string(), Arc::clone(&collection));
        debug!(collection = collection_name, "opened collection");
        Ok(collection)
    }

    /// Returns a collection handle opened with explicit options,
    /// replacing any existing registry entry for the name.
    pub fn collection_with_options(
        &self,
        collection_name: &str,
        options: CollectionOptions,
    ) -> DbResult<Arc<Collection>> {
        self.ensure_initialized()?;
        if collection_name.is_empty() {
            return Err(DbError::invalid_name("collection name must not be empty"));
        }

        let collection = Arc::new(Collection::open(
            collection_name,
            Arc::clone(&self.storage),
            Arc::clone(&self.indexes),
            options,
            self.config.id_type,
        )?);
        self.collections
            .write()
            .insert(collection_name.to_string(), Arc::clone(&collection));
        Ok(collection)
    }

    /// Lists the names of open collections.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// Drops a collection: deletes its documents, removes its directory,
    /// and forgets the registry entry. Returns `false` for a collection
    /// that is not open and has no directory.
    pub fn drop_collection(&self, collection_name: &str) -> DbResult<bool> {
        self.ensure_initialized()?;

        let existing = self.collections.write().remove(collection_name);
        let collection = match existing {
            Some(collection) => collection,
            None => {
                if !self.storage.collection_dir(collection_name).exists() {
                    return Ok(false);
                }
                Arc::new(Collection::open(
                    collection_name,
                    Arc::clone(&self.storage),
                    Arc::clone(&self.indexes),
                    CollectionOptions::new(),
                    self.config.id_type,
                )?)
            }
        };

        Collection::drop(&collection).map_err(|e| DbError::Drop {
            collection: collection_name.to_string(),
            message: e.to_string(),
        })?;
        info!(collection = collection_name, "dropped collection");
        Ok(true)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.config.name)
            .field("initialized", &self.is_initialized())
            .field("collections", &self.collection_names())
            .finish_non_exhaustive()
    }
}
