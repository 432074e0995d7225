//! JSON snapshots of a dictionary.
//!
//! ```json
//! {
//!   "hash_algorithm": "sha256",
//!   "data": {
//!     "values": { "<fingerprint>": <value>, ... },
//!     "keys":   { "<fingerprint>": <key>, ... }
//!   }
//! }
//! ```
//!
//! Importing trusts the stored fingerprints: they are not recomputed from the
//! restored keys. A snapshot edited by hand, or written under a different
//! algorithm than it names, will load but miss lookups for the affected keys.

use indexmap::IndexMap;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};

use crate::dictionary::{Entry, TupleDictionary};
use crate::error::DictionaryError;
use crate::fingerprint::Fingerprint;
use crate::tuple::Tuple;

#[derive(Serialize)]
struct SnapshotRef<'a, V> {
    hash_algorithm: &'a str,
    data: DataRef<'a, V>,
}

#[derive(Serialize)]
struct DataRef<'a, V> {
    values: ValuesRef<'a, V>,
    keys: KeysRef<'a, V>,
}

struct ValuesRef<'a, V>(&'a IndexMap<Fingerprint, Entry<V>>);

impl<V: Serialize> Serialize for ValuesRef<'_, V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(
            self.0
                .iter()
                .map(|(fingerprint, entry)| (fingerprint, &entry.value)),
        )
    }
}

struct KeysRef<'a, V>(&'a IndexMap<Fingerprint, Entry<V>>);

impl<V> Serialize for KeysRef<'_, V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(
            self.0
                .iter()
                .map(|(fingerprint, entry)| (fingerprint, &entry.key)),
        )
    }
}

// Both top-level fields are optional here so that a missing one is reported
// as an invalid snapshot rather than a parse error.
#[derive(Deserialize)]
struct SnapshotIn<V> {
    hash_algorithm: Option<String>,
    data: Option<DataIn<V>>,
}

#[derive(Deserialize)]
struct DataIn<V> {
    #[serde(default = "IndexMap::new")]
    values: IndexMap<Fingerprint, V>,
    #[serde(default = "IndexMap::new")]
    keys: IndexMap<Fingerprint, Tuple>,
}

impl<V: Serialize> TupleDictionary<V> {
    /// Serializes the algorithm name and every entry as JSON.
    ///
    /// Fails with [`DictionaryError::Encode`] if a value or a retained key
    /// has no JSON form, such as a key holding a non-finite float.
    pub fn export(&self) -> Result<String, DictionaryError> {
        let snapshot = SnapshotRef {
            hash_algorithm: self.algorithm().name(),
            data: DataRef {
                values: ValuesRef(&self.entries),
                keys: KeysRef(&self.entries),
            },
        };
        let json = serde_json::to_string(&snapshot).map_err(DictionaryError::Encode)?;
        debug!("exported {} entries ({} bytes)", self.len(), json.len());
        Ok(json)
    }
}

impl<V: DeserializeOwned> TupleDictionary<V> {
    /// Rebuilds a dictionary from [`export`](Self::export) output.
    ///
    /// Fails with [`DictionaryError::InvalidSnapshot`] if the text is not a
    /// snapshot, if `hash_algorithm` or `data` is missing, or if a value has
    /// no retained key (or the reverse). Fingerprints are taken as stored.
    pub fn import(text: &str) -> Result<Self, DictionaryError> {
        let snapshot: SnapshotIn<V> = serde_json::from_str(text)
            .map_err(|err| DictionaryError::InvalidSnapshot(err.to_string()))?;

        let Some(algorithm) = snapshot.hash_algorithm else {
            return Err(DictionaryError::InvalidSnapshot(
                "missing field `hash_algorithm`".to_string(),
            ));
        };
        let Some(DataIn { values, mut keys }) = snapshot.data else {
            return Err(DictionaryError::InvalidSnapshot(
                "missing field `data`".to_string(),
            ));
        };

        let mut dictionary = TupleDictionary::new(&algorithm)?;
        for (fingerprint, value) in values {
            let Some(key) = keys.swap_remove(&fingerprint) else {
                return Err(DictionaryError::InvalidSnapshot(format!(
                    "no key retained for fingerprint {fingerprint}"
                )));
            };
            dictionary.entries.insert(fingerprint, Entry { key, value });
        }
        if let Some(fingerprint) = keys.keys().next() {
            return Err(DictionaryError::InvalidSnapshot(format!(
                "no value stored for fingerprint {fingerprint}"
            )));
        }

        debug!(
            "imported {} entries using {}",
            dictionary.len(),
            dictionary.algorithm()
        );
        Ok(dictionary)
    }
}
