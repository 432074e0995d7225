//! Tupledict is a dictionary keyed by composite tuples.
//!
//! Core concepts:
//! - **Tuple**: An ordered, possibly nested key of scalars and object references
//! - **Element**: One position of a tuple (scalar, object reference, or nested tuple)
//! - **Fingerprint**: A digest of a key's structure, contents, and object identities
//! - **TupleDictionary**: Maps fingerprints to values, retaining the original keys
//! - **Snapshot**: JSON text from which a dictionary can be rebuilt
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tupledict_core::{Element, TupleDictionary, tuple};
//!
//! let mut dict = TupleDictionary::new("sha256").unwrap();
//! let owner = Arc::new("owner");
//!
//! dict.insert(tuple![Element::object(&owner), "x", 1], "value").unwrap();
//!
//! // An independently built key with the same structure finds the value.
//! assert_eq!(*dict.get(tuple![Element::object(&owner), "x", 1], &"none"), "value");
//! assert_eq!(*dict.get(tuple!["x", Element::object(&owner), 1], &"none"), "none");
//! ```
//!
//! # Fingerprints
//!
//! Scalars and object identities are hashed together with their position, so
//! reordering a key changes its fingerprint. Nested tuples contribute their
//! own combined fingerprint without their position; two equal nested tuples
//! in one key therefore collapse to a single element fingerprint.

mod algorithm;
mod config;
mod dictionary;
mod element;
mod error;
mod fingerprint;
mod snapshot;
mod store;
mod tuple;

pub use algorithm::HashAlgorithm;
pub use config::DictionaryConfig;
pub use dictionary::TupleDictionary;
pub use element::{Element, HasIdentity, Identity, ObjectRef};
pub use error::DictionaryError;
pub use fingerprint::{Fingerprint, Fingerprinter, KeyFingerprint};
pub use store::{MemoryStore, PersistError, SnapshotStore};
pub use tuple::{IntoKey, Position, Tuple};

#[cfg(feature = "derive")]
pub use tupledict_derive::HasIdentity;
