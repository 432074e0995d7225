use std::borrow::{Borrow, Cow};
use std::fmt;

use indexmap::IndexMap;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::algorithm::HashAlgorithm;
use crate::element::Element;
use crate::tuple::{Position, Tuple};

/// A hex digest identifying a key or a key element.
///
/// Serialized as a plain string so it can be used as a JSON object key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps a digest string obtained elsewhere (e.g. from a snapshot).
    pub fn new(hex: impl Into<String>) -> Self {
        Fingerprint(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Fingerprint {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fingerprint of a whole key, plus the table of element fingerprints it
/// was folded from.
///
/// The table is keyed by element fingerprint in first-seen order; elements
/// whose fingerprints coincide share one slot holding the last of them.
#[derive(Debug, Clone)]
pub struct KeyFingerprint {
    pub fingerprint: Fingerprint,
    pub elements: IndexMap<Fingerprint, Element>,
}

/// Computes structural fingerprints of keys with a fixed algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fingerprinter {
    algorithm: HashAlgorithm,
}

impl Fingerprinter {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Fingerprinter { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Fingerprints one element at `position`.
    ///
    /// Scalars and object references hash their text followed by the
    /// position. A nested tuple contributes its own combined fingerprint and
    /// the position is not folded in.
    pub fn fingerprint_element(&self, element: &Element, position: &Position) -> Fingerprint {
        match element {
            Element::Tuple(nested) => self.combined(nested),
            other => self.positioned(&element_text(other), position),
        }
    }

    /// Fingerprints a whole key and returns the element table alongside.
    pub fn fingerprint_key(&self, key: &Tuple) -> KeyFingerprint {
        let table = self.element_table(key);
        let fingerprint = self.fold(table.keys());
        trace!(
            "fingerprinted key of {} elements ({} distinct) as {}",
            key.len(),
            table.len(),
            fingerprint
        );
        KeyFingerprint {
            fingerprint,
            elements: table
                .into_iter()
                .map(|(fingerprint, element)| (fingerprint, element.clone()))
                .collect(),
        }
    }

    /// The combined fingerprint of `key`, without building an owned table.
    pub fn combined(&self, key: &Tuple) -> Fingerprint {
        self.fold(self.element_table(key).keys())
    }

    fn element_table<'k>(&self, key: &'k Tuple) -> IndexMap<Fingerprint, &'k Element> {
        let mut table = IndexMap::with_capacity(key.len());
        for (position, element) in key {
            // A repeated fingerprint replaces the element but keeps its slot.
            table.insert(self.fingerprint_element(element, position), element);
        }
        table
    }

    fn positioned(&self, text: &str, position: &Position) -> Fingerprint {
        let material = format!("{text}{position}");
        self.algorithm.digest(material.as_bytes())
    }

    fn fold<'a>(&self, fingerprints: impl ExactSizeIterator<Item = &'a Fingerprint>) -> Fingerprint {
        self.algorithm.digest(canonical_list(fingerprints).as_bytes())
    }
}

/// Canonical text of a scalar or an object's identity token.
///
/// Null and `false` are empty, `true` is `1`.
fn element_text(element: &Element) -> Cow<'_, str> {
    match element {
        Element::Null | Element::Bool(false) => Cow::Borrowed(""),
        Element::Bool(true) => Cow::Borrowed("1"),
        Element::Int(value) => Cow::Owned(value.to_string()),
        Element::Float(value) => Cow::Owned(value.to_string()),
        Element::Str(value) => Cow::Borrowed(value),
        Element::Object(object) => Cow::Borrowed(object.identity().token()),
        // Nested tuples are fingerprinted structurally by the caller.
        Element::Tuple(_) => Cow::Borrowed(""),
    }
}

/// Length-prefixed encoding of an ordered list of fingerprints:
/// `a:<n>:{i:<k>;s:<len>:"<fingerprint>";...}`.
fn canonical_list<'a>(fingerprints: impl ExactSizeIterator<Item = &'a Fingerprint>) -> String {
    let mut out = format!("a:{}:{{", fingerprints.len());
    for (index, fingerprint) in fingerprints.enumerate() {
        out.push_str(&format!(
            "i:{index};s:{}:\"{fingerprint}\";",
            fingerprint.as_str().len()
        ));
    }
    out.push('}');
    out
}
