use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::tuple::{Position, Tuple};

/// Snapshot field marking an object reference with a custom identity.
pub(crate) const IDENTITY_FIELD: &str = "@identity";
/// Snapshot field marking an object reference compared by address.
pub(crate) const REFERENCE_FIELD: &str = "@reference";

/// Objects that carry a stable identity of their own.
///
/// Two objects with equal identity strings are the same key element, even if
/// they are distinct instances. Objects that don't implement this trait can
/// still be used in keys through [`ObjectRef::new`], which compares them by
/// reference.
pub trait HasIdentity {
    fn identity(&self) -> String;
}

/// How an object reference is compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// A caller-supplied identity string (see [`HasIdentity`]).
    Custom(String),
    /// The referent's address, valid only while the referent is alive.
    Reference(String),
}

impl Identity {
    /// The text folded into the element fingerprint.
    pub fn token(&self) -> &str {
        match self {
            Identity::Custom(token) | Identity::Reference(token) => token,
        }
    }
}

/// A non-owning reference to an object used as a key element.
///
/// The dictionary never keeps the referent alive: it holds a `Weak` handle,
/// which also pins the allocation so the address token cannot be reused by
/// another object while the key is retained.
#[derive(Clone)]
pub struct ObjectRef {
    identity: Identity,
    target: Option<Weak<dyn Any + Send + Sync>>,
}

impl ObjectRef {
    /// References `object` by address.
    pub fn new<T: Any + Send + Sync>(object: &Arc<T>) -> Self {
        let address = Arc::as_ptr(object) as *const () as usize;
        let target: Weak<T> = Arc::downgrade(object);
        ObjectRef {
            identity: Identity::Reference(format!("{address:016x}")),
            target: Some(target as Weak<dyn Any + Send + Sync>),
        }
    }

    /// References `object` by its custom identity.
    pub fn identified<T: HasIdentity + Any + Send + Sync>(object: &Arc<T>) -> Self {
        let target: Weak<T> = Arc::downgrade(object);
        ObjectRef {
            identity: Identity::Custom(object.identity()),
            target: Some(target as Weak<dyn Any + Send + Sync>),
        }
    }

    /// A reference with no live target, e.g. one restored from a snapshot.
    pub fn detached(identity: Identity) -> Self {
        ObjectRef {
            identity,
            target: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the referent if it is still alive.
    pub fn target(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.target.as_ref().and_then(Weak::upgrade)
    }

    /// Returns the referent as a `T` if it is still alive and has that type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.target().and_then(|any| any.downcast::<T>().ok())
    }

    /// True if this reference was never attached to an object.
    pub fn is_detached(&self) -> bool {
        self.target.is_none()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("identity", &self.identity)
            .field("detached", &self.is_detached())
            .finish()
    }
}

impl Serialize for ObjectRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        match &self.identity {
            Identity::Custom(token) => map.serialize_entry(IDENTITY_FIELD, token)?,
            Identity::Reference(token) => map.serialize_entry(REFERENCE_FIELD, token)?,
        }
        map.end()
    }
}

/// One element of a composite key.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(ObjectRef),
    Tuple(Tuple),
}

impl Element {
    /// An element comparing `object` by reference.
    pub fn object<T: Any + Send + Sync>(object: &Arc<T>) -> Self {
        Element::Object(ObjectRef::new(object))
    }

    /// An element comparing `object` by its custom identity.
    pub fn identified<T: HasIdentity + Any + Send + Sync>(object: &Arc<T>) -> Self {
        Element::Object(ObjectRef::identified(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Element::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Element::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Element::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Element::Tuple(tuple) => Some(tuple),
            _ => None,
        }
    }
}

impl From<()> for Element {
    fn from(_: ()) -> Self {
        Element::Null
    }
}

impl From<bool> for Element {
    fn from(value: bool) -> Self {
        Element::Bool(value)
    }
}

impl From<i32> for Element {
    fn from(value: i32) -> Self {
        Element::Int(i64::from(value))
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::Int(value)
    }
}

impl From<u32> for Element {
    fn from(value: u32) -> Self {
        Element::Int(i64::from(value))
    }
}

impl From<f64> for Element {
    fn from(value: f64) -> Self {
        Element::Float(value)
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::Str(value.to_string())
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::Str(value)
    }
}

impl From<ObjectRef> for Element {
    fn from(value: ObjectRef) -> Self {
        Element::Object(value)
    }
}

impl From<Tuple> for Element {
    fn from(value: Tuple) -> Self {
        Element::Tuple(value)
    }
}

impl<T: Into<Element>> From<Option<T>> for Element {
    fn from(value: Option<T>) -> Self {
        value.map_or(Element::Null, Into::into)
    }
}

impl Serialize for Element {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Element::Null => serializer.serialize_unit(),
            Element::Bool(value) => serializer.serialize_bool(*value),
            Element::Int(value) => serializer.serialize_i64(*value),
            // JSON has no encoding for these; serde_json would write null.
            Element::Float(value) if !value.is_finite() => Err(serde::ser::Error::custom(
                format!("non-finite float {value} cannot be encoded"),
            )),
            Element::Float(value) => serializer.serialize_f64(*value),
            Element::Str(value) => serializer.serialize_str(value),
            Element::Object(object) => object.serialize(serializer),
            Element::Tuple(tuple) => tuple.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ElementVisitor)
    }
}

struct ElementVisitor;

impl<'de> Visitor<'de> for ElementVisitor {
    type Value = Element;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a scalar, an object reference, or a nested key")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Element::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Element::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Element::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Element::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Element::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(i64::try_from(v).map_or(Element::Float(v as f64), Element::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Element::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Element::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(Element::Str(v))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut tuple = Tuple::new();
        while let Some(element) = seq.next_element::<Element>()? {
            tuple.push(element);
        }
        Ok(Element::Tuple(tuple))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields: Vec<(String, Element)> = Vec::new();
        while let Some((name, element)) = map.next_entry::<String, Element>()? {
            fields.push((name, element));
        }

        if let [(name, Element::Str(token))] = fields.as_slice() {
            if let Some(identity) = reserved_identity(name, token) {
                return Ok(Element::Object(ObjectRef::detached(identity)));
            }
        }

        let mut tuple = Tuple::new();
        for (name, element) in fields {
            tuple.insert(parse_position(name), element);
        }
        Ok(Element::Tuple(tuple))
    }
}

/// The identity encoded by a single-field object, if the field is reserved.
pub(crate) fn reserved_identity(name: &str, token: &str) -> Option<Identity> {
    match name {
        IDENTITY_FIELD => Some(Identity::Custom(token.to_string())),
        REFERENCE_FIELD => Some(Identity::Reference(token.to_string())),
        _ => None,
    }
}

/// Only names that an integer position would render as become indexes, so
/// `"01"` or `"+1"` stay names.
fn parse_position(name: String) -> Position {
    match name.parse::<usize>() {
        Ok(index) if index.to_string() == name => Position::Index(index),
        _ => Position::Name(name),
    }
}
