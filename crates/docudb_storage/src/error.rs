//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from the gzip wrapper.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// Compressing a byte buffer failed.
    #[error("compression failed: {0}")]
    Compress(#[source] io::Error),

    /// Decompressing a byte buffer failed.
    #[error("decompression failed: {0}")]
    Decompress(#[source] io::Error),
}

/// Errors that can occur during chunk storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage root could not be initialized.
    #[error("storage init failed at {path}: {source}")]
    Init {
        /// Root path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A chunk write failed; the document on disk is undefined.
    #[error("save failed for {collection}/{doc_id}: {message}")]
    Save {
        /// Collection being written.
        collection: String,
        /// Document being written.
        doc_id: String,
        /// Description of the failure.
        message: String,
    },

    /// A chunk read failed.
    #[error("read failed at {path}: {message}")]
    Read {
        /// Chunk path that failed.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A chunk or directory deletion failed.
    #[error("delete failed at {path}: {source}")]
    Delete {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Compression or decompression failed.
    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Creates a save error.
    pub fn save(
        collection: impl Into<String>,
        doc_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Save {
            collection: collection.into(),
            doc_id: doc_id.into(),
            message: message.into(),
        }
    }

    /// Creates a read error.
    pub fn read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Read {
            path: path.into(),
            message: message.into(),
        }
    }
}
