//! Journal persistence
//!
//! The nameserver saves its whole entry set under a single fixed key on
//! every change; the set is small, so no coalescing is needed. `SledStore`
//! is the production adapter, `MemStore` backs tests and ephemeral runs.
//! Values are postcard bytes, so the journal format is the wire format
//! (and the `stopped` flag is implicitly shed on save).

use meshname_core::Entries;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),
}

/// Minimal key/value contract the nameserver persists through.
pub trait Store: Send + Sync {
    /// Load the entries stored under `key`, or `None` if absent.
    fn load(&self, key: &str) -> Result<Option<Entries>, StoreError>;

    /// Atomically replace the value under `key`.
    fn save(&self, key: &str, entries: &Entries) -> Result<(), StoreError>;
}

/// Persistent journal backed by sled.
pub struct SledStore {
    db: sled::Db,
    journal: sled::Tree,
}

impl SledStore {
    /// Open the journal at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let journal = db.open_tree("journal")?;
        Ok(Self { db, journal })
    }
}

impl Store for SledStore {
    fn load(&self, key: &str) -> Result<Option<Entries>, StoreError> {
        match self.journal.get(key)? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, entries: &Entries) -> Result<(), StoreError> {
        let value = postcard::to_allocvec(entries)?;
        self.journal.insert(key, value)?;
        self.db.flush()?;
        Ok(())
    }
}

/// In-memory store used in tests and for journal-less runs. Stores deep
/// copies so a reloaded set shares nothing with the saved one.
#[derive(Default)]
pub struct MemStore {
    data: Mutex<HashMap<String, Entries>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn load(&self, key: &str) -> Result<Option<Entries>, StoreError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn save(&self, key: &str, entries: &Entries) -> Result<(), StoreError> {
        self.data.lock().insert(key.to_string(), entries.clone());
        Ok(())
    }
}
