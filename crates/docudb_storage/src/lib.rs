//! # docudb storage
//!
//! Chunked, optionally-compressed persistence for JSON documents.
//!
//! This crate provides:
//! - A gzip wrapper over byte buffers (`compress`/`decompress`)
//! - `ChunkStore`: persists each document as an ordered sequence of
//!   size-bounded chunk files under `<root>/<collection>/<doc_id>/`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chunk;
mod compress;
mod error;

pub use chunk::ChunkStore;
pub use compress::{compress, decompress};
pub use error::{CompressionError, StorageError, StorageResult};
