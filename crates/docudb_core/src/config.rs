//! Database configuration.

use crate::id::IdType;
use std::path::PathBuf;

/// Default maximum bytes per chunk, before compression.
pub const DEFAULT_CHUNK_SIZE: usize = 1_048_576;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database root directory name; must pass name sanitization.
    pub name: String,

    /// Parent directory for the database root.
    pub data_dir: PathBuf,

    /// Maximum bytes per chunk, before compression.
    pub chunk_size: usize,

    /// Whether chunks are gzip-compressed.
    pub compression: bool,

    /// Identifier format for generated `_id` values.
    pub id_type: IdType,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "docudb".to_string(),
            data_dir: PathBuf::from("."),
            chunk_size: DEFAULT_CHUNK_SIZE,
            compression: true,
            id_type: IdType::Mongo,
        }
    }
}

impl DatabaseConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database root directory name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the parent directory for the database root.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets the maximum chunk size in bytes.
    #[must_use]
    pub const fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Sets whether chunks are gzip-compressed.
    #[must_use]
    pub const fn compression(mut self, value: bool) -> Self {
        self.compression = value;
        self
    }

    /// Sets the identifier format for generated ids.
    #[must_use]
    pub const fn id_type(mut self, id_type: IdType) -> Self {
        self.id_type = id_type;
        self
    }

    /// Returns the resolved database root directory.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.data_dir.join(&self.name)
    }
}
