//! RocksDB-backed snapshot store for Tupledict.

use std::path::Path;

use rocksdb::{DB, Options};
use thiserror::Error;
use tupledict_core::SnapshotStore;

#[derive(Debug, Error)]
#[error("RocksDB error: {0}")]
pub struct RocksError(#[from] rocksdb::Error);

/// A persistent snapshot store backed by RocksDB.
///
/// Each snapshot is a single value keyed by its UTF-8 name.
pub struct RocksSnapshotStore {
    db: DB,
}

impl RocksSnapshotStore {
    /// Opens a RocksDB store at the given path.
    ///
    /// Creates the database if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RocksError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }
}

impl SnapshotStore for RocksSnapshotStore {
    type Error = RocksError;

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.db.get(name.as_bytes())?)
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), Self::Error> {
        self.db.put(name.as_bytes(), bytes)?;
        Ok(())
    }

    fn has(&self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.db.get_pinned(name.as_bytes())?.is_some())
    }

    fn remove(&self, name: &str) -> Result<bool, Self::Error> {
        if !self.has(name)? {
            return Ok(false);
        }
        self.db.delete(name.as_bytes())?;
        Ok(true)
    }
}
