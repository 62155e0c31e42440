//! Dynamic message instances.
//!
//! A [`Message`] maps field numbers to [`Value`]s and keeps every field it did
//! not recognize while decoding in an append-only [`UnknownFields`] log, so a
//! decode/encode cycle through an older schema loses nothing.
use {
    crate::{
        error::{unexpected_value, Error, Result},
        schema::{Descriptor, FieldDescriptor, FieldType, MessageDescriptor},
        varint::encode_varint,
        wire::{Tag, WireType},
    },
    paste::paste,
    std::collections::{btree_map::Entry, BTreeMap},
};

/// A field value.
///
/// Decoding always produces the canonical variant for the field type (see
/// [`FieldType::default_value`]); encoding also accepts any integer variant
/// whose value fits the field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Enum(i32),
    Bytes(Vec<u8>),
    String(String),
    Message(Box<Message>),
    /// Elements of a repeated field.
    List(Vec<Value>),
    /// Entries of a map field.
    Map(BTreeMap<MapKey, Value>),
}

macro_rules! copy_accessors {
    ($($variant:ident => $name:ident: $ty:ty),* $(,)?) => {
        paste! {
            $(
                #[inline]
                pub fn [<as_ $name>](&self) -> Option<$ty> {
                    match *self {
                        Self::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            )*
        }
    };
}

impl Value {
    /// Name of the variant, used in diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Enum(_) => "enum",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::Message(_) => "message",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    copy_accessors! {
        Bool => bool: bool,
        I32 => i32: i32,
        I64 => i64: i64,
        U32 => u32: u32,
        U64 => u64: u64,
        F32 => f32: f32,
        F64 => f64: f64,
        Enum => enum: i32,
    }

    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, Value>> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    String => String,
    &str => String,
    Message => Message,
    Vec<Value> => List,
    BTreeMap<MapKey, Value> => Map,
}

/// Key of a map entry. Map keys may only be integral, bool or string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Self {
        match key {
            MapKey::Bool(v) => Self::Bool(v),
            MapKey::I32(v) => Self::I32(v),
            MapKey::I64(v) => Self::I64(v),
            MapKey::U32(v) => Self::U32(v),
            MapKey::U64(v) => Self::U64(v),
            MapKey::String(v) => Self::String(v),
        }
    }
}

impl TryFrom<Value> for MapKey {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Ok(match value {
            Value::Bool(v) => Self::Bool(v),
            Value::I32(v) => Self::I32(v),
            Value::I64(v) => Self::I64(v),
            Value::U32(v) => Self::U32(v),
            Value::U64(v) => Self::U64(v),
            Value::String(v) => Self::String(v),
            other => return Err(unexpected_value("map key", other.type_name())),
        })
    }
}

impl From<&str> for MapKey {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for MapKey {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// A field the decoder did not recognize, kept as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnknownField {
    number: u32,
    wire_type: WireType,
    tag: Vec<u8>,
    value: Vec<u8>,
}

impl UnknownField {
    /// An unknown field with a minimally encoded tag. `value` is the raw
    /// value encoding, including the length prefix of length-delimited
    /// values.
    pub fn new(tag: Tag, value: impl Into<Vec<u8>>) -> Self {
        Self::from_raw(tag, encode_varint(tag.to_u64()), value.into())
    }

    /// Keep the tag bytes exactly as they appeared in the input.
    #[inline]
    pub(crate) fn from_raw(tag: Tag, tag_bytes: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            number: tag.number,
            wire_type: tag.wire_type,
            tag: tag_bytes,
            value,
        }
    }

    #[inline(always)]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[inline(always)]
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    /// Raw tag bytes.
    #[inline(always)]
    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    /// Raw value bytes.
    #[inline(always)]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    #[inline]
    pub fn encoded_len(&self) -> usize {
        self.tag.len() + self.value.len()
    }
}

/// Unknown fields in the order they were encountered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UnknownFields(Vec<UnknownField>);

impl UnknownFields {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, UnknownField> {
        self.0.iter()
    }

    /// All occurrences of field `number`.
    pub fn get(&self, number: u32) -> impl Iterator<Item = &UnknownField> {
        self.0.iter().filter(move |field| field.number == number)
    }

    #[inline]
    pub fn push(&mut self, field: UnknownField) {
        self.0.push(field);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Total bytes these fields occupy when re-emitted.
    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(UnknownField::encoded_len).sum()
    }
}

impl Extend<UnknownField> for UnknownFields {
    fn extend<I: IntoIterator<Item = UnknownField>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a UnknownFields {
    type Item = &'a UnknownField;
    type IntoIter = core::slice::Iter<'a, UnknownField>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for UnknownFields {
    type Item = UnknownField;
    type IntoIter = std::vec::IntoIter<UnknownField>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A message instance: field values keyed by number, plus unknown fields.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    fields: BTreeMap<u32, Value>,
    #[cfg_attr(feature = "serde", serde(default))]
    unknown: UnknownFields,
}

macro_rules! message_getters {
    ($($name:ident -> $ty:ty),* $(,)?) => {
        paste! {
            $(
                #[inline]
                pub fn [<get_ $name>](&self, number: u32) -> Option<$ty> {
                    self.get(number).and_then(|value| value.[<as_ $name>]())
                }
            )*
        }
    };
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, number: u32) -> Option<&Value> {
        self.fields.get(&number)
    }

    #[inline]
    pub fn get_mut(&mut self, number: u32) -> Option<&mut Value> {
        self.fields.get_mut(&number)
    }

    /// Set field `number`, returning the previous value.
    #[inline]
    pub fn set(&mut self, number: u32, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(number, value.into())
    }

    /// Builder form of [`Message::set`].
    #[inline]
    pub fn with(mut self, number: u32, value: impl Into<Value>) -> Self {
        self.set(number, value);
        self
    }

    #[inline]
    pub fn remove(&mut self, number: u32) -> Option<Value> {
        self.fields.remove(&number)
    }

    #[inline]
    pub fn contains(&self, number: u32) -> bool {
        self.fields.contains_key(&number)
    }

    /// Number of set fields, not counting unknown fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.unknown.is_empty()
    }

    /// Set fields in ascending field-number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.fields.iter().map(|(&number, value)| (number, value))
    }

    message_getters! {
        bool -> bool,
        i32 -> i32,
        i64 -> i64,
        u32 -> u32,
        u64 -> u64,
        f32 -> f32,
        f64 -> f64,
        enum -> i32,
        bytes -> &[u8],
        message -> &Message,
        list -> &[Value],
        map -> &BTreeMap<MapKey, Value>,
    }

    #[inline]
    pub fn get_string(&self, number: u32) -> Option<&str> {
        self.get(number).and_then(Value::as_str)
    }

    #[inline]
    pub fn unknown_fields(&self) -> &UnknownFields {
        &self.unknown
    }

    #[inline]
    pub fn unknown_fields_mut(&mut self) -> &mut UnknownFields {
        &mut self.unknown
    }

    pub fn clear_unknown_fields(&mut self) {
        self.unknown.clear();
    }

    /// Merge `other` into `self` the way a second occurrence of the same
    /// message on the wire would: lists append, maps insert (later keys win),
    /// nested messages merge recursively and any other field is replaced.
    /// Each merged oneof member clears its siblings, at every level. Fields
    /// `descriptor` does not declare are replaced, and unknown fields of
    /// `other` are appended.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMessageType`] if a nested message type cannot be
    /// resolved in `descriptor`'s registry.
    pub fn merge(&mut self, descriptor: Descriptor<'_>, other: Message) -> Result<()> {
        for (number, incoming) in other.fields {
            match descriptor.field(number) {
                Some(field) => self.merge_field(descriptor, field, incoming)?,
                None => {
                    self.fields.insert(number, incoming);
                }
            }
        }
        self.unknown.extend(other.unknown);
        Ok(())
    }

    /// Merge one occurrence of `field`, a field of `descriptor`, into this
    /// message.
    pub fn merge_field(
        &mut self,
        descriptor: Descriptor<'_>,
        field: &FieldDescriptor,
        incoming: Value,
    ) -> Result<()> {
        self.clear_oneof_siblings(&descriptor, field.number());
        match self.fields.entry(field.number()) {
            Entry::Vacant(entry) => {
                entry.insert(incoming);
                Ok(())
            }
            Entry::Occupied(mut entry) => merge_value(entry.get_mut(), incoming, field, descriptor),
        }
    }

    /// Set a member of a oneof, clearing its siblings. Fields outside any
    /// oneof are simply set.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownField`] if `descriptor` does not declare `number`.
    pub fn set_oneof(
        &mut self,
        descriptor: &MessageDescriptor,
        number: u32,
        value: impl Into<Value>,
    ) -> Result<()> {
        if descriptor.field(number).is_none() {
            return Err(Error::UnknownField(number));
        }
        self.clear_oneof_siblings(descriptor, number);
        self.set(number, value);
        Ok(())
    }

    /// Field number of the set member of oneof `name`, if any.
    pub fn which_oneof(&self, descriptor: &MessageDescriptor, name: &str) -> Option<u32> {
        descriptor
            .oneof(name)?
            .fields()
            .iter()
            .copied()
            .find(|&number| self.contains(number))
    }

    pub(crate) fn clear_oneof_siblings(&mut self, descriptor: &MessageDescriptor, number: u32) {
        if let Some(oneof) = descriptor.oneof_of(number) {
            for &sibling in oneof.fields() {
                if sibling != number {
                    self.fields.remove(&sibling);
                }
            }
        }
    }
}

/// Merge a second occurrence of `field` into `existing`. `descriptor` is the
/// message declaring `field` and resolves its nested message type.
///
/// Non-repeated scalars are replaced, repeated fields append, map entries
/// insert and non-repeated messages merge field by field.
pub fn merge_value(
    existing: &mut Value,
    incoming: Value,
    field: &FieldDescriptor,
    descriptor: Descriptor<'_>,
) -> Result<()> {
    match (field.field_type(), existing, incoming) {
        (FieldType::Message(name), Value::Message(existing), Value::Message(incoming))
            if !field.is_repeated() =>
        {
            return existing.merge(descriptor.resolve(name)?, *incoming);
        }
        (FieldType::Map(_), Value::Map(existing), Value::Map(incoming)) => existing.extend(incoming),
        (_, Value::List(existing), Value::List(incoming)) if field.is_repeated() => {
            existing.extend(incoming)
        }
        (_, existing, incoming) => *existing = incoming,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::schema::{define_message, OneofDescriptor, Registry},
    };

    fn registry() -> Registry {
        Registry::new([define_message(
            "Sub",
            [
                FieldDescriptor::new(1, "a", FieldType::Int32),
                FieldDescriptor::repeated(2, "list", FieldType::Int32),
                FieldDescriptor::new(3, "sub", FieldType::message("Sub")),
                FieldDescriptor::new(4, "s", FieldType::String),
                FieldDescriptor::map(5, "m", FieldType::String, FieldType::Int32),
                FieldDescriptor::new(6, "raw", FieldType::Bytes),
                FieldDescriptor::new(9, "alt", FieldType::Bool),
            ],
        )
        .unwrap()
        .with_oneof(OneofDescriptor::new("choice", [4, 9]))
        .unwrap()])
        .unwrap()
    }

    #[test]
    fn scalar_merge_replaces() {
        let registry = registry();
        let sub = registry.descriptor("Sub").unwrap();
        let field = sub.field(1).unwrap();
        let mut message = Message::new();
        message.merge_field(sub, field, Value::I32(1)).unwrap();
        message.merge_field(sub, field, Value::I32(2)).unwrap();
        assert_eq!(message.get_i32(1), Some(2));
    }

    #[test]
    fn repeated_merge_appends() {
        let registry = registry();
        let sub = registry.descriptor("Sub").unwrap();
        let field = sub.field(2).unwrap();
        let mut message = Message::new();
        message
            .merge_field(sub, field, Value::List(vec![Value::I32(1)]))
            .unwrap();
        message
            .merge_field(sub, field, Value::List(vec![Value::I32(2), Value::I32(3)]))
            .unwrap();
        assert_eq!(
            message.get_list(2),
            Some(&[Value::I32(1), Value::I32(2), Value::I32(3)][..])
        );
    }

    #[test]
    fn singular_bytes_merge_replaces() {
        let registry = registry();
        let sub = registry.descriptor("Sub").unwrap();
        let mut existing = Value::Bytes(vec![1]);
        merge_value(&mut existing, Value::Bytes(vec![2]), sub.field(6).unwrap(), sub).unwrap();
        assert_eq!(existing, Value::Bytes(vec![2]));
    }

    #[test]
    fn message_merge_recurses() {
        let registry = registry();
        let sub = registry.descriptor("Sub").unwrap();
        let field = sub.field(3).unwrap();
        let first = Message::new()
            .with(1, 150)
            .with(2, Value::List(vec![Value::I32(1)]));
        let second = Message::new()
            .with(2, Value::List(vec![Value::I32(2)]))
            .with(4, "x");
        let mut outer = Message::new();
        outer.merge_field(sub, field, first.into()).unwrap();
        outer.merge_field(sub, field, second.into()).unwrap();

        let nested = outer.get_message(3).unwrap();
        assert_eq!(nested.get_i32(1), Some(150));
        assert_eq!(nested.get_list(2).unwrap().len(), 2);
        assert_eq!(nested.get_string(4), Some("x"));
    }

    #[test]
    fn nested_merge_respects_oneofs() {
        let registry = registry();
        let sub = registry.descriptor("Sub").unwrap();
        let field = sub.field(3).unwrap();
        let mut outer = Message::new().with(3, Message::new().with(4, "x").with(1, 7));
        outer
            .merge_field(sub, field, Message::new().with(9, true).into())
            .unwrap();

        let nested = outer.get_message(3).unwrap();
        assert!(!nested.contains(4));
        assert_eq!(nested.get_bool(9), Some(true));
        assert_eq!(nested.get_i32(1), Some(7));
        assert_eq!(nested.which_oneof(&sub, "choice"), Some(9));
    }

    #[test]
    fn map_merge_inserts_last_key_wins() {
        let registry = registry();
        let sub = registry.descriptor("Sub").unwrap();
        let field = sub.field(5).unwrap();
        let entry = |k: &str, v: i32| Value::Map(BTreeMap::from([(MapKey::from(k), Value::I32(v))]));
        let mut message = Message::new();
        for (k, v) in [("a", 1), ("b", 2), ("a", 3)] {
            message.merge_field(sub, field, entry(k, v)).unwrap();
        }
        let map = message.get_map(5).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&MapKey::from("a")], Value::I32(3));
    }

    #[test]
    fn whole_message_merge_appends_unknowns() {
        let registry = registry();
        let sub = registry.descriptor("Sub").unwrap();
        let mut a = Message::new().with(1, 1).with(4, "s");
        a.unknown_fields_mut()
            .push(UnknownField::new(Tag::new(19, WireType::Varint), [0x01]));
        let mut b = Message::new().with(1, 2).with(9, true).with(100, 5u64);
        b.unknown_fields_mut()
            .push(UnknownField::new(Tag::new(10, WireType::Varint), [0x02]));
        a.merge(sub, b).unwrap();
        assert_eq!(a.get_i32(1), Some(2));
        assert_eq!(a.get_bool(9), Some(true));
        assert!(!a.contains(4));
        // Undeclared numbers are carried over as they are.
        assert_eq!(a.get_u64(100), Some(5));
        let numbers: Vec<u32> = a.unknown_fields().iter().map(UnknownField::number).collect();
        assert_eq!(numbers, [19, 10]);
        assert_eq!(a.unknown_fields().encoded_len(), 5);
    }

    #[test]
    fn oneof_members_clear_each_other() {
        let descriptor = define_message(
            "Test",
            [
                FieldDescriptor::new(4, "name", FieldType::String),
                FieldDescriptor::new(9, "sub_message", FieldType::message("Sub")),
                FieldDescriptor::new(10, "other", FieldType::Bool),
            ],
        )
        .unwrap()
        .with_oneof(OneofDescriptor::new("test_oneof", [4, 9]))
        .unwrap();

        let mut message = Message::new();
        message
            .set_oneof(&descriptor, 9, Message::new().with(1, "123"))
            .unwrap();
        message.set_oneof(&descriptor, 10, true).unwrap();
        assert_eq!(message.which_oneof(&descriptor, "test_oneof"), Some(9));

        message.set_oneof(&descriptor, 4, "Some string").unwrap();
        assert_eq!(message.which_oneof(&descriptor, "test_oneof"), Some(4));
        assert!(!message.contains(9));
        assert!(message.contains(10));

        assert!(matches!(
            message.set_oneof(&descriptor, 5, 1),
            Err(Error::UnknownField(5))
        ));
        assert_eq!(message.which_oneof(&descriptor, "nope"), None);
    }

    #[test]
    fn map_key_conversion() {
        assert_eq!(MapKey::try_from(Value::U64(3)).unwrap(), MapKey::U64(3));
        assert!(matches!(
            MapKey::try_from(Value::F32(1.0)),
            Err(Error::UnexpectedValue {
                expected: "map key",
                found: "f32"
            })
        ));
        assert_eq!(Value::from(MapKey::from("k")), Value::String("k".into()));
    }

    #[test]
    fn unknown_field_new_encodes_minimal_tag() {
        let field = UnknownField::new(Tag::new(16, WireType::Fixed32), vec![0, 0, 0, 0]);
        assert_eq!(field.tag(), &[0x85, 0x01]);
        assert_eq!(field.encoded_len(), 6);
    }
}
