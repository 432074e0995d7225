use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::dictionary::TupleDictionary;
use crate::error::DictionaryError;

/// A store of named snapshot buffers.
///
/// Stores operate on raw bytes; encoding and decoding snapshots is handled
/// by [`TupleDictionary::save`] and [`TupleDictionary::load`]. A buffer
/// outlives any particular dictionary and is reachable only through the
/// store instance that holds it.
///
/// All methods take `&self` to support stores with internal locking (e.g., RocksDB).
pub trait SnapshotStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Retrieves the bytes stored under `name`, or None if not present.
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Stores bytes under `name`, replacing any previous buffer.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Checks whether a buffer exists under `name`.
    fn has(&self, name: &str) -> Result<bool, Self::Error>;

    /// Removes the buffer under `name`, returning whether one existed.
    fn remove(&self, name: &str) -> Result<bool, Self::Error>;
}

/// Errors from saving or loading a dictionary through a [`SnapshotStore`].
#[derive(Debug, thiserror::Error)]
pub enum PersistError<E: std::error::Error + 'static> {
    #[error("snapshot store error: {0}")]
    Store(#[source] E),
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
    #[error("no snapshot stored under {0:?}")]
    Missing(String),
}

/// An in-memory store backed by a HashMap.
///
/// Useful for testing and as a reference implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buffers: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buffers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemoryStore {
    type Error = Infallible;

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
        Ok(buffers.get(name).cloned())
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        buffers.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn has(&self, name: &str) -> Result<bool, Self::Error> {
        let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
        Ok(buffers.contains_key(name))
    }

    fn remove(&self, name: &str) -> Result<bool, Self::Error> {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        Ok(buffers.remove(name).is_some())
    }
}

impl<V: Serialize> TupleDictionary<V> {
    /// Exports a snapshot and writes it to `store` under `name`.
    pub fn save<S: SnapshotStore>(&self, store: &S, name: &str) -> Result<(), PersistError<S::Error>> {
        let snapshot = self.export()?;
        store
            .put(name, snapshot.as_bytes())
            .map_err(PersistError::Store)
    }
}

impl<V: DeserializeOwned> TupleDictionary<V> {
    /// Reads the snapshot stored under `name` and imports it.
    pub fn load<S: SnapshotStore>(store: &S, name: &str) -> Result<Self, PersistError<S::Error>> {
        let bytes = store
            .get(name)
            .map_err(PersistError::Store)?
            .ok_or_else(|| PersistError::Missing(name.to_string()))?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|err| DictionaryError::InvalidSnapshot(err.to_string()))?;
        Ok(Self::import(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple;

    #[test]
    fn memory_store_put_get() {
        let store = MemoryStore::new();
        store.put("snapshot", b"hello world").unwrap();

        let retrieved = store.get("snapshot").unwrap();

        assert_eq!(retrieved, Some(b"hello world".to_vec()));
    }

    #[test]
    fn memory_store_get_missing() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nonexistent").unwrap(), None);
    }

    #[test]
    fn memory_store_has_and_remove() {
        let store = MemoryStore::new();
        assert!(!store.has("snapshot").unwrap());

        store.put("snapshot", b"value").unwrap();
        assert!(store.has("snapshot").unwrap());

        assert!(store.remove("snapshot").unwrap());
        assert!(!store.remove("snapshot").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn memory_store_overwrite() {
        let store = MemoryStore::new();
        store.put("snapshot", b"first").unwrap();
        store.put("snapshot", b"second").unwrap();

        assert_eq!(store.get("snapshot").unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn save_and_load() {
        let store = MemoryStore::new();
        let mut dict = TupleDictionary::default();
        dict.insert(tuple!["a", 1], "one".to_string()).unwrap();
        dict.save(&store, "dict").unwrap();

        let restored = TupleDictionary::<String>::load(&store, "dict").unwrap();
        assert_eq!(restored.get(tuple!["a", 1], &String::new()), "one");
    }

    #[test]
    fn load_missing_snapshot() {
        let store = MemoryStore::new();
        let err = TupleDictionary::<String>::load(&store, "absent").unwrap_err();
        assert!(matches!(err, PersistError::Missing(name) if name == "absent"));
    }

    #[test]
    fn load_non_utf8_snapshot() {
        let store = MemoryStore::new();
        store.put("binary", &[0xff, 0xfe]).unwrap();
        let err = TupleDictionary::<String>::load(&store, "binary").unwrap_err();
        assert!(matches!(
            err,
            PersistError::Dictionary(DictionaryError::InvalidSnapshot(_))
        ));
    }
}
