use indexmap::IndexMap;
use log::debug;

use crate::algorithm::HashAlgorithm;
use crate::config::DictionaryConfig;
use crate::error::DictionaryError;
use crate::fingerprint::{Fingerprint, Fingerprinter, KeyFingerprint};
use crate::tuple::{IntoKey, Tuple};

/// A stored value together with the key it was inserted under.
#[derive(Debug, Clone)]
pub(crate) struct Entry<V> {
    pub(crate) key: Tuple,
    pub(crate) value: V,
}

/// A dictionary keyed by composite tuples.
///
/// Keys are compared by structural fingerprint: two keys built independently
/// are the same key when they have the same shape, the same scalars, and the
/// same object identities at every position.
///
/// Responsibilities:
/// - Normalization: a bare element is a one-element key
/// - Retention: the original key is kept next to its value for enumeration
/// - Aliasing: lookups hand out references into the stored slot
///
/// Each fingerprint owns exactly one entry, so a value and its retained key
/// are always inserted and removed together.
#[derive(Debug, Clone)]
pub struct TupleDictionary<V> {
    pub(crate) fingerprinter: Fingerprinter,
    pub(crate) entries: IndexMap<Fingerprint, Entry<V>>,
}

impl<V> TupleDictionary<V> {
    /// Creates an empty dictionary fingerprinting with the named algorithm.
    ///
    /// The name is matched case-insensitively against [`HashAlgorithm::ALL`].
    pub fn new(algorithm_name: &str) -> Result<Self, DictionaryError> {
        let algorithm = algorithm_name.parse::<HashAlgorithm>()?;
        Ok(Self::with_algorithm(algorithm))
    }

    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        debug!("creating tuple dictionary with {algorithm}");
        TupleDictionary {
            fingerprinter: Fingerprinter::new(algorithm),
            entries: IndexMap::new(),
        }
    }

    pub fn from_config(config: &DictionaryConfig) -> Result<Self, DictionaryError> {
        Ok(Self::with_algorithm(config.algorithm()?))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.fingerprinter.algorithm()
    }

    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Fingerprints `key` the way [`insert`](Self::insert) would.
    pub fn fingerprint<'k>(&self, key: impl IntoKey<'k>) -> Result<KeyFingerprint, DictionaryError> {
        let key = key.into_key().ok_or(DictionaryError::InvalidKey)?;
        Ok(self.fingerprinter.fingerprint_key(&key))
    }

    /// Stores `value` under `key`, replacing both the value and the retained
    /// key if the fingerprint is already present.
    ///
    /// Returns the key's fingerprint and element table. Fails with
    /// [`DictionaryError::InvalidKey`] for an absent key, or for a key
    /// containing a single-field `{"@identity": ..}` or `{"@reference": ..}`
    /// named tuple, which snapshots reserve for object references.
    pub fn insert<'k>(
        &mut self,
        key: impl IntoKey<'k>,
        value: V,
    ) -> Result<KeyFingerprint, DictionaryError> {
        let key = key.into_key().ok_or(DictionaryError::InvalidKey)?;
        if key.has_reserved_shape() {
            return Err(DictionaryError::InvalidKey);
        }
        let result = self.fingerprinter.fingerprint_key(&key);
        let entry = Entry {
            key: key.into_owned(),
            value,
        };
        if self.entries.insert(result.fingerprint.clone(), entry).is_some() {
            debug!("replaced entry {}", result.fingerprint);
        } else {
            debug!("inserted entry {}", result.fingerprint);
        }
        Ok(result)
    }

    /// True if a value is stored under `key`. Absent keys are never present.
    pub fn contains<'k>(&self, key: impl IntoKey<'k>) -> bool {
        self.locate(key)
            .is_some_and(|fingerprint| self.entries.contains_key(&fingerprint))
    }

    /// The value stored under `key`, if any.
    pub fn value<'k>(&self, key: impl IntoKey<'k>) -> Option<&V> {
        let fingerprint = self.locate(key)?;
        self.entries.get(&fingerprint).map(|entry| &entry.value)
    }

    /// The value stored under `key`, or `default`.
    ///
    /// The returned reference points into the stored slot; see
    /// [`get_mut`](Self::get_mut) for in-place mutation.
    pub fn get<'a, 'k>(&'a self, key: impl IntoKey<'k>, default: &'a V) -> &'a V {
        self.value(key).unwrap_or(default)
    }

    /// A mutable reference to the value stored under `key`.
    ///
    /// Changes made through it are seen by every later lookup.
    pub fn get_mut<'k>(&mut self, key: impl IntoKey<'k>) -> Option<&mut V> {
        let fingerprint = self.locate(key)?;
        self.entries.get_mut(&fingerprint).map(|entry| &mut entry.value)
    }

    /// Like [`get`](Self::get), for callers already holding a fingerprint.
    pub fn get_by_fingerprint<'a>(&'a self, fingerprint: impl AsRef<str>, default: &'a V) -> &'a V {
        self.entries
            .get(fingerprint.as_ref())
            .map_or(default, |entry| &entry.value)
    }

    pub fn get_by_fingerprint_mut(&mut self, fingerprint: impl AsRef<str>) -> Option<&mut V> {
        self.entries
            .get_mut(fingerprint.as_ref())
            .map(|entry| &mut entry.value)
    }

    /// Removes the value and the retained key stored under `key`.
    ///
    /// Returns false, leaving the dictionary untouched, if nothing is stored.
    pub fn delete<'k>(&mut self, key: impl IntoKey<'k>) -> bool {
        let Some(fingerprint) = self.locate(key) else {
            return false;
        };
        // shift_remove keeps the remaining entries in insertion order.
        match self.entries.shift_remove(&fingerprint) {
            Some(_) => {
                debug!("deleted entry {fingerprint}");
                true
            }
            None => false,
        }
    }

    /// Retained keys in insertion order of their fingerprints.
    pub fn keys(&self) -> impl Iterator<Item = &Tuple> {
        self.entries.values().map(|entry| &entry.key)
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|entry| &entry.value)
    }

    /// All entries as `(fingerprint, retained key, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &Tuple, &V)> {
        self.entries
            .iter()
            .map(|(fingerprint, entry)| (fingerprint, &entry.key, &entry.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn locate<'k>(&self, key: impl IntoKey<'k>) -> Option<Fingerprint> {
        key.into_key().map(|key| self.fingerprinter.combined(&key))
    }
}

impl<V> Default for TupleDictionary<V> {
    fn default() -> Self {
        Self::with_algorithm(HashAlgorithm::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::tuple;

    #[test]
    fn new_rejects_unknown_algorithm() {
        let err = TupleDictionary::<i32>::new("rot13").unwrap_err();
        assert!(matches!(err, DictionaryError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn new_accepts_any_case() {
        let dict = TupleDictionary::<i32>::new("MD5").unwrap();
        assert_eq!(dict.algorithm(), HashAlgorithm::Md5);
    }

    #[test]
    fn from_config() {
        let config = DictionaryConfig::from_toml_str("hash_algorithm = \"blake3\"").unwrap();
        let dict = TupleDictionary::<i32>::from_config(&config).unwrap();
        assert_eq!(dict.algorithm(), HashAlgorithm::Blake3);
    }

    #[test]
    fn insert_and_get() {
        let mut dict = TupleDictionary::default();
        dict.insert(tuple!["a", 1], 10).unwrap();

        assert_eq!(*dict.get(tuple!["a", 1], &0), 10);
        assert_eq!(*dict.get(tuple!["a", 2], &0), 0);
        assert!(dict.contains(tuple!["a", 1]));
        assert!(!dict.contains(tuple![1, "a"]));
    }

    #[test]
    fn insert_absent_key_fails() {
        let mut dict = TupleDictionary::default();
        let err = dict.insert(None::<Tuple>, 1).unwrap_err();
        assert!(matches!(err, DictionaryError::InvalidKey));
        let err = dict.insert(Element::Null, 1).unwrap_err();
        assert!(matches!(err, DictionaryError::InvalidKey));
        assert!(dict.is_empty());
    }

    #[test]
    fn insert_reserved_shape_fails() {
        let mut dict = TupleDictionary::default();
        let reserved = Tuple::new().with_named("@identity", "abc");
        let err = dict.insert(tuple![reserved.clone()], 1).unwrap_err();
        assert!(matches!(err, DictionaryError::InvalidKey));
        let err = dict.insert(reserved, 1).unwrap_err();
        assert!(matches!(err, DictionaryError::InvalidKey));
        assert!(dict.is_empty());

        dict.insert(tuple![Tuple::new().with_named("@identity", 1)], 1).unwrap();
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn bare_element_is_single_element_key() {
        let mut dict = TupleDictionary::default();
        dict.insert("solo", 1).unwrap();
        assert!(dict.contains(tuple!["solo"]));
        assert_eq!(dict.keys().next(), Some(&tuple!["solo"]));
    }

    #[test]
    fn overwrite_keeps_one_entry() {
        let mut dict = TupleDictionary::default();
        let first = dict.insert(tuple!["k"], 1).unwrap();
        let second = dict.insert(tuple!["k"], 2).unwrap();

        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(dict.len(), 1);
        assert_eq!(*dict.get(tuple!["k"], &0), 2);
    }

    #[test]
    fn overwrite_keeps_original_slot() {
        let mut dict = TupleDictionary::default();
        dict.insert(tuple!["a"], 1).unwrap();
        dict.insert(tuple!["b"], 2).unwrap();
        dict.insert(tuple!["a"], 3).unwrap();

        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec![tuple!["a"], tuple!["b"]]);
    }

    #[test]
    fn get_mut_aliases_stored_value() {
        let mut dict = TupleDictionary::default();
        dict.insert(tuple!["list"], vec![1]).unwrap();

        dict.get_mut(tuple!["list"]).unwrap().push(2);

        assert_eq!(dict.get(tuple!["list"], &vec![]), &vec![1, 2]);
    }

    #[test]
    fn get_by_fingerprint() {
        let mut dict = TupleDictionary::default();
        let inserted = dict.insert(tuple!["x", "y"], "value").unwrap();

        assert_eq!(*dict.get_by_fingerprint(&inserted.fingerprint, &"none"), "value");
        assert_eq!(*dict.get_by_fingerprint("not-a-fingerprint", &"none"), "none");

        *dict.get_by_fingerprint_mut(&inserted.fingerprint).unwrap() = "changed";
        assert_eq!(*dict.get(tuple!["x", "y"], &"none"), "changed");
    }

    #[test]
    fn delete_absent_is_noop() {
        let mut dict = TupleDictionary::default();
        dict.insert(tuple!["a"], 1).unwrap();

        assert!(!dict.delete(tuple!["b"]));
        assert!(!dict.delete(None::<Tuple>));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn delete_present_removes_key_and_value() {
        let mut dict = TupleDictionary::default();
        dict.insert(tuple!["a"], 1).unwrap();
        dict.insert(tuple!["b"], 2).unwrap();
        dict.insert(tuple!["c"], 3).unwrap();

        assert!(dict.delete(tuple!["b"]));
        assert!(!dict.contains(tuple!["b"]));
        assert_eq!(*dict.get(tuple!["b"], &-1), -1);

        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec![tuple!["a"], tuple!["c"]]);
        assert_eq!(dict.values().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn fingerprint_matches_insert() {
        let mut dict = TupleDictionary::default();
        let predicted = dict.fingerprint(tuple![1, tuple![2]]).unwrap();
        let inserted = dict.insert(tuple![1, tuple![2]], ()).unwrap();
        assert_eq!(predicted.fingerprint, inserted.fingerprint);
        assert_eq!(dict.fingerprints().next(), Some(&inserted.fingerprint));
    }

    #[test]
    fn keys_accepted_by_reference() {
        let mut dict = TupleDictionary::default();
        let key = tuple!["by", "ref"];
        dict.insert(&key, 1).unwrap();

        let stored: Vec<Tuple> = dict.keys().cloned().collect();
        for key in &stored {
            assert_eq!(*dict.get(key, &0), 1);
        }
    }
}
