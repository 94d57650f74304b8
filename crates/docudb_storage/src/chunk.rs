//! Chunked document persistence.
//!
//! Each document lives under `<root>/<collection>/<doc_id>/` as a dense,
//! zero-based sequence of chunk files:
//!
//! ```text
//! <root>/
//! ├─ <collection>/
//! │  ├─ <doc_id>/
//! │  │  ├─ chunk_0.gz      # or chunk_0.json without compression
//! │  │  ├─ chunk_1.gz
//! │  │  └─ ...
//! ```
//!
//! A chunk holds at most `chunk_size` bytes of the document's JSON
//! serialization; compression is applied per chunk after slicing. Chunk
//! files are written via write-then-rename so a reader never observes a
//! half-written chunk.

use crate::compress::{compress, decompress};
use crate::error::{StorageError, StorageResult};
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// File name prefix for chunk files.
const CHUNK_PREFIX: &str = "chunk_";

/// Persists JSON payloads as ordered chunk files under a root directory.
///
/// The store is cheap to clone-free share behind an `Arc`; it holds no
/// open handles between operations.
#[derive(Debug)]
pub struct ChunkStore {
    /// Root data directory.
    root: PathBuf,
    /// Maximum bytes per chunk, before compression.
    chunk_size: usize,
    /// Whether chunks are gzip-compressed.
    compression: bool,
}

impl ChunkStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Init` if the root directory cannot be created.
    pub fn new(root: impl Into<PathBuf>, chunk_size: usize, compression: bool) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Init {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            chunk_size: chunk_size.max(1),
            compression,
        })
    }

    /// Returns the root data directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the chunk file extension for this store.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        if self.compression {
            "gz"
        } else {
            "json"
        }
    }

    /// Returns the directory of a collection.
    #[must_use]
    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    /// Returns the directory of a document.
    #[must_use]
    pub fn document_dir(&self, collection: &str, doc_id: &str) -> PathBuf {
        self.root.join(collection).join(doc_id)
    }

    /// Ensures the collection directory exists.
    pub fn ensure_collection_dir(&self, collection: &str) -> StorageResult<()> {
        fs::create_dir_all(self.collection_dir(collection))?;
        Ok(())
    }

    /// Serializes `value` and writes it as an ordered chunk sequence.
    ///
    /// The serialization preserves key insertion order. Returns the ordered
    /// chunk paths. On partial failure the document on disk is undefined
    /// and the caller must recover via its own metadata; no rollback is
    /// attempted here.
    pub fn save_data(
        &self,
        collection: &str,
        doc_id: &str,
        value: &Value,
    ) -> StorageResult<Vec<PathBuf>> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| StorageError::save(collection, doc_id, e.to_string()))?;

        let dir = self.document_dir(collection, doc_id);
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::save(collection, doc_id, e.to_string()))?;

        let mut paths = Vec::new();
        // An empty serialization still gets a chunk_0 so the document
        // directory is never ambiguous with a missing document.
        let slices: Vec<&[u8]> = if bytes.is_empty() {
            vec![&[]]
        } else {
            bytes.chunks(self.chunk_size).collect()
        };

        for (n, slice) in slices.iter().enumerate() {
            let path = dir.join(format!("{CHUNK_PREFIX}{n}.{}", self.extension()));
            let payload = if self.compression {
                compress(slice).map_err(StorageError::Compression)?
            } else {
                slice.to_vec()
            };
            self.write_atomic(&path, &payload)
                .map_err(|e| StorageError::save(collection, doc_id, e.to_string()))?;
            paths.push(path);
        }

        debug!(collection, doc_id, chunks = paths.len(), "saved document");
        Ok(paths)
    }

    /// Reads chunk files in the given order and parses the joined payload.
    pub fn read_data(&self, chunk_paths: &[PathBuf]) -> StorageResult<Value> {
        let mut bytes = Vec::new();
        for path in chunk_paths {
            let raw = fs::read(path).map_err(|e| StorageError::read(path, e.to_string()))?;
            let is_compressed = path.extension().is_some_and(|ext| ext == "gz");
            if is_compressed {
                bytes.extend(decompress(&raw).map_err(StorageError::Compression)?);
            } else {
                bytes.extend(raw);
            }
        }

        trace!(chunks = chunk_paths.len(), bytes = bytes.len(), "read document");
        serde_json::from_slice(&bytes).map_err(|e| {
            let path = chunk_paths.first().cloned().unwrap_or_default();
            StorageError::read(path, format!("invalid JSON payload: {e}"))
        })
    }

    /// Removes chunk files; missing files are not an error.
    pub fn delete_chunks(&self, chunk_paths: &[PathBuf]) -> StorageResult<()> {
        for path in chunk_paths {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StorageError::Delete {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    /// Lists a document's chunk files in numeric order.
    ///
    /// Ordering parses the numeric suffix of each file name, so indices
    /// past 1000 sort correctly. Returns `None` when the document
    /// directory does not exist.
    pub fn list_chunks(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> StorageResult<Option<Vec<PathBuf>>> {
        let dir = self.document_dir(collection, doc_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut chunks: Vec<(usize, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if let Some(n) = chunk_index(&path) {
                chunks.push((n, path));
            }
        }
        chunks.sort_by_key(|(n, _)| *n);

        Ok(Some(chunks.into_iter().map(|(_, p)| p).collect()))
    }

    /// Removes a document directory and anything left inside it.
    ///
    /// Idempotent: a missing directory is not an error.
    pub fn remove_document_dir(&self, collection: &str, doc_id: &str) -> StorageResult<()> {
        let dir = self.document_dir(collection, doc_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Delete { path: dir, source }),
        }
    }

    /// Removes a collection directory and everything inside it.
    pub fn remove_collection_dir(&self, collection: &str) -> StorageResult<()> {
        let dir = self.collection_dir(collection);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Delete { path: dir, source }),
        }
    }

    /// Writes a file via write-then-rename so readers never observe a
    /// half-written chunk.
    fn write_atomic(&self, path: &Path, payload: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(payload)?;
        drop(file);
        fs::rename(&tmp, path)
    }
}

/// Parses the chunk index from a `chunk_<n>.<ext>` file name.
///
/// Only `.gz` and `.json` files count; a leftover `.tmp` from a crashed
/// write is ignored.
fn chunk_index(path: &Path) -> Option<usize> {
    let ext = path.extension()?.to_str()?;
    if ext != "gz" && ext != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(CHUNK_PREFIX)?.parse().ok()
}
