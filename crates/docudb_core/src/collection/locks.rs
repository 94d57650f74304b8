//! Per-document advisory locking.
//!
//! Each collection keeps a registry of document ids with an in-flight
//! mutation. Acquisition retries with jittered backoff and gives up with
//! a lock error; the guard releases on every exit path.

use crate::error::{DbError, DbResult};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

/// Maximum acquisition attempts before giving up.
const MAX_ATTEMPTS: u32 = 10;

/// Base backoff between attempts, in milliseconds.
const BACKOFF_MS: u64 = 50;

/// Registry of locked document ids for one collection.
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<String>>,
}

impl LockTable {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for a document, retrying up to ten times with
    /// jittered 50 ms backoff.
    pub fn acquire(&self, collection: &str, id: &str) -> DbResult<DocumentLock<'_>> {
        for attempt in 0..MAX_ATTEMPTS {
            if self.held.lock().insert(id.to_string()) {
                return Ok(DocumentLock {
                    table: self,
                    id: id.to_string(),
                });
            }
            if attempt + 1 < MAX_ATTEMPTS {
                let jitter = rand::thread_rng().gen_range(0..BACKOFF_MS);
                thread::sleep(Duration::from_millis(BACKOFF_MS + jitter));
            }
        }
        Err(DbError::Lock {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    /// True when the document is currently locked.
    #[cfg(test)]
    #[must_use]
    pub fn is_locked(&self, id: &str) -> bool {
        self.held.lock().contains(id)
    }
}

/// Guard for a held document lock; releases on drop.
#[derive(Debug)]
pub struct DocumentLock<'a> {
    table: &'a LockTable,
    id: String,
}

impl Drop for DocumentLock<'_> {
    fn drop(&mut self) {
        self.table.held.lock().remove(&self.id);
    }
}
