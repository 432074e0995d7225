use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::element::{Element, ObjectRef, reserved_identity};

/// Where an element sits inside a tuple.
///
/// Most positions are integer indexes; named positions model labelled
/// sub-keys such as `{"tick": obj}`. The position's text is folded into the
/// element's fingerprint, so `{"tick": obj}` and `{"tock": obj}` differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Position {
    Index(usize),
    Name(String),
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Index(index) => write!(f, "{index}"),
            Position::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Position {
    fn from(index: usize) -> Self {
        Position::Index(index)
    }
}

impl From<&str> for Position {
    fn from(name: &str) -> Self {
        Position::Name(name.to_string())
    }
}

impl From<String> for Position {
    fn from(name: String) -> Self {
        Position::Name(name)
    }
}

/// A composite key: an ordered map from positions to elements.
///
/// Elements keep the order they were first inserted in. [`Tuple::push`]
/// appends at the next free integer index (one past the largest index seen
/// so far); inserting at an existing position replaces the element in place.
#[derive(Debug, Clone, Default)]
pub struct Tuple {
    elements: IndexMap<Position, Element>,
    next_index: usize,
}

impl Tuple {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an element at the next integer index.
    pub fn push(&mut self, element: impl Into<Element>) -> &mut Self {
        let index = self.next_index;
        self.insert(Position::Index(index), element);
        self
    }

    /// Builder form of [`Tuple::push`].
    pub fn with(mut self, element: impl Into<Element>) -> Self {
        self.push(element);
        self
    }

    /// Builder form of [`Tuple::insert`] for named positions.
    pub fn with_named(mut self, name: impl Into<String>, element: impl Into<Element>) -> Self {
        self.insert(Position::Name(name.into()), element);
        self
    }

    /// Places an element at `position`, returning the element it replaced.
    pub fn insert(
        &mut self,
        position: impl Into<Position>,
        element: impl Into<Element>,
    ) -> Option<Element> {
        let position = position.into();
        if let Position::Index(index) = position {
            self.next_index = self.next_index.max(index.saturating_add(1));
        }
        self.elements.insert(position, element.into())
    }

    pub fn get(&self, position: &Position) -> Option<&Element> {
        self.elements.get(position)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Position, Element> {
        self.elements.iter()
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.elements.keys()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// True if this tuple, or any tuple nested in it, is a single named
    /// string element that snapshots would read back as an object reference.
    pub(crate) fn has_reserved_shape(&self) -> bool {
        let reserved = match self.elements.first() {
            Some((Position::Name(name), Element::Str(token))) if self.len() == 1 => {
                reserved_identity(name, token).is_some()
            }
            _ => false,
        };
        reserved
            || self
                .elements()
                .filter_map(Element::as_tuple)
                .any(Tuple::has_reserved_shape)
    }

    /// True if the positions are exactly `0..len` in order.
    pub fn is_list(&self) -> bool {
        self.elements
            .keys()
            .enumerate()
            .all(|(i, position)| *position == Position::Index(i))
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        // IndexMap equality ignores order; tuples don't.
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<E: Into<Element>> FromIterator<E> for Tuple {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut tuple = Tuple::new();
        for element in iter {
            tuple.push(element);
        }
        tuple
    }
}

impl<'a> IntoIterator for &'a Tuple {
    type Item = (&'a Position, &'a Element);
    type IntoIter = indexmap::map::Iter<'a, Position, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl Serialize for Tuple {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.is_list() {
            serializer.collect_seq(self.elements.values())
        } else {
            serializer.collect_map(
                self.elements
                    .iter()
                    .map(|(position, element)| (position.to_string(), element)),
            )
        }
    }
}

impl<'de> Deserialize<'de> for Tuple {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Element::deserialize(deserializer)?
            .into_key()
            .map(Cow::into_owned)
            .ok_or_else(|| serde::de::Error::custom("null is not a valid key"))
    }
}

/// Conversion into key material.
///
/// A tuple is used as is; any other element becomes a one-element tuple.
/// `None` and a bare null are absent keys and yield `None`.
pub trait IntoKey<'a> {
    fn into_key(self) -> Option<Cow<'a, Tuple>>;
}

impl<'a> IntoKey<'a> for Tuple {
    fn into_key(self) -> Option<Cow<'a, Tuple>> {
        Some(Cow::Owned(self))
    }
}

impl<'a> IntoKey<'a> for &'a Tuple {
    fn into_key(self) -> Option<Cow<'a, Tuple>> {
        Some(Cow::Borrowed(self))
    }
}

impl<'a> IntoKey<'a> for Element {
    fn into_key(self) -> Option<Cow<'a, Tuple>> {
        match self {
            Element::Null => None,
            Element::Tuple(tuple) => Some(Cow::Owned(tuple)),
            element => Some(Cow::Owned(Tuple::from_iter([element]))),
        }
    }
}

impl<'a> IntoKey<'a> for &'a Element {
    fn into_key(self) -> Option<Cow<'a, Tuple>> {
        match self {
            Element::Null => None,
            Element::Tuple(tuple) => Some(Cow::Borrowed(tuple)),
            element => Some(Cow::Owned(Tuple::from_iter([element.clone()]))),
        }
    }
}

impl<'a, K: IntoKey<'a>> IntoKey<'a> for Option<K> {
    fn into_key(self) -> Option<Cow<'a, Tuple>> {
        self.and_then(IntoKey::into_key)
    }
}

impl<'a> IntoKey<'a> for &str {
    fn into_key(self) -> Option<Cow<'a, Tuple>> {
        Element::from(self).into_key()
    }
}

macro_rules! scalar_into_key {
    ($($ty:ty),*) => {
        $(
            impl<'a> IntoKey<'a> for $ty {
                fn into_key(self) -> Option<Cow<'a, Tuple>> {
                    Element::from(self).into_key()
                }
            }
        )*
    };
}

scalar_into_key!(String, bool, i32, i64, u32, f64, ObjectRef);

/// Builds a [`Tuple`].
///
/// `tuple![a, b, c]` pushes elements at positions `0, 1, 2`;
/// `tuple!["tick" => a, "tock" => b]` places them at named positions.
#[macro_export]
macro_rules! tuple {
    () => {
        $crate::Tuple::new()
    };
    ($($name:literal => $element:expr),+ $(,)?) => {{
        let mut tuple = $crate::Tuple::new();
        $( tuple.insert($crate::Position::from($name), $element); )+
        tuple
    }};
    ($($element:expr),+ $(,)?) => {{
        let mut tuple = $crate::Tuple::new();
        $( tuple.push($element); )+
        tuple
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_sequential_indexes() {
        let tuple = tuple!["a", 1, true];
        let positions: Vec<_> = tuple.positions().cloned().collect();
        assert_eq!(
            positions,
            vec![Position::Index(0), Position::Index(1), Position::Index(2)]
        );
        assert!(tuple.is_list());
    }

    #[test]
    fn push_continues_after_largest_index() {
        let mut tuple = Tuple::new();
        tuple.insert(5usize, "five");
        tuple.insert("name", "named");
        tuple.push("next");
        assert_eq!(tuple.get(&Position::Index(6)), Some(&Element::Str("next".into())));
        assert!(!tuple.is_list());
    }

    #[test]
    fn largest_index_does_not_overflow() {
        let mut tuple = Tuple::new();
        tuple.insert(usize::MAX, "last");
        assert_eq!(tuple.len(), 1);

        let json = format!(r#"{{"{}":"x"}}"#, usize::MAX);
        let restored: Tuple = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.positions().next(), Some(&Position::Index(usize::MAX)));
    }

    #[test]
    fn reserved_shapes_detected_at_any_depth() {
        assert!(Tuple::new().with_named("@identity", "abc").has_reserved_shape());
        assert!(tuple![1, Tuple::new().with_named("@reference", "00ff")].has_reserved_shape());
        assert!(!Tuple::new().with_named("@identity", 5).has_reserved_shape());
        assert!(
            !Tuple::new()
                .with_named("@identity", "abc")
                .with_named("other", "x")
                .has_reserved_shape()
        );
        assert!(!tuple!["@identity"].has_reserved_shape());
    }

    #[test]
    fn insert_existing_position_keeps_slot() {
        let mut tuple = tuple!["a", "b"];
        let replaced = tuple.insert(0usize, "z");
        assert_eq!(replaced, Some(Element::Str("a".into())));
        let elements: Vec<_> = tuple.elements().cloned().collect();
        assert_eq!(elements, vec![Element::Str("z".into()), Element::Str("b".into())]);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let ab = Tuple::new().with_named("a", 1).with_named("b", 2);
        let ba = Tuple::new().with_named("b", 2).with_named("a", 1);
        assert_ne!(ab, ba);
        assert_eq!(ab, Tuple::new().with_named("a", 1).with_named("b", 2));
    }

    #[test]
    fn named_macro_form() {
        let tuple = tuple!["tick" => 1];
        assert_eq!(tuple.get(&Position::from("tick")), Some(&Element::Int(1)));
    }

    #[test]
    fn list_serializes_as_array() {
        let tuple = tuple!["x", (), tuple![1, 2]];
        assert_eq!(serde_json::to_string(&tuple).unwrap(), r#"["x",null,[1,2]]"#);
    }

    #[test]
    fn named_serializes_as_object() {
        let tuple = tuple!["tick" => "x"];
        assert_eq!(serde_json::to_string(&tuple).unwrap(), r#"{"tick":"x"}"#);
    }

    #[test]
    fn object_fields_restore_positions() {
        let tuple: Tuple = serde_json::from_str(r#"{"2":"a","tick":"b"}"#).unwrap();
        let positions: Vec<_> = tuple.positions().cloned().collect();
        assert_eq!(positions, vec![Position::Index(2), Position::from("tick")]);
    }

    #[test]
    fn bare_scalar_deserializes_as_single_element() {
        let tuple: Tuple = serde_json::from_str("\"solo\"").unwrap();
        assert_eq!(tuple, tuple!["solo"]);
    }

    #[test]
    fn null_key_rejected() {
        assert!(serde_json::from_str::<Tuple>("null").is_err());
    }

    #[test]
    fn bare_element_normalizes_to_single_tuple() {
        let key = "x".into_key().unwrap();
        assert_eq!(key.as_ref(), &tuple!["x"]);

        let nested = Element::Tuple(tuple![1, 2]);
        assert_eq!(nested.into_key().unwrap().as_ref(), &tuple![1, 2]);
    }

    #[test]
    fn absent_keys() {
        assert!(Element::Null.into_key().is_none());
        assert!(None::<Tuple>.into_key().is_none());
    }
}
