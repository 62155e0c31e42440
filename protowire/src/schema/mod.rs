//! Message descriptors.
//!
//! A [`MessageDescriptor`] is pure data: an ordered list of
//! [`FieldDescriptor`]s plus lookup tables. Message-typed fields name the
//! message type they hold, and names are resolved through a [`Registry`].
//! This keeps descriptors acyclic even for mutually recursive types.
//!
//! # Example
//!
//! ```
//! use protowire::{
//!     schema::{define_message, FieldDescriptor, FieldType, Registry},
//!     Message, Value,
//! };
//!
//! let registry = Registry::new([
//!     define_message("Node", [
//!         FieldDescriptor::new(1, "label", FieldType::String),
//!         FieldDescriptor::repeated(2, "children", FieldType::message("Node")),
//!     ])?,
//! ])?;
//! let node = registry.descriptor("Node")?;
//!
//! let leaf = Message::new().with(1, "leaf");
//! let root = Message::new()
//!     .with(1, "root")
//!     .with(2, Value::List(vec![leaf.into()]));
//!
//! let bytes = protowire::encode(&root, node)?;
//! assert_eq!(protowire::decode(&bytes, node)?, root);
//! # Ok::<(), protowire::Error>(())
//! ```
use {
    crate::{
        error::{DescriptorError, Error, Result},
        message::Value,
        wire::{Tag, WireType, MAX_FIELD_NUMBER, MIN_FIELD_NUMBER, RESERVED_FIELD_NUMBERS},
    },
    core::ops::Deref,
    std::collections::HashMap,
    tracing::debug,
};

pub(crate) mod scalar;

/// Semantic type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FieldType {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Bool,
    Enum,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    Bytes,
    String,
    /// Embedded message, referenced by registered name.
    Message(String),
    /// Map field, carried on the wire as repeated key/value entries.
    Map(Box<MapEntry>),
}

/// Key and value types of a map field. On the wire each entry is a message
/// with the key at field 1 and the value at field 2.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapEntry {
    pub key: FieldType,
    pub value: FieldType,
}

impl FieldType {
    pub fn message(name: impl Into<String>) -> Self {
        Self::Message(name.into())
    }

    pub fn map(key: FieldType, value: FieldType) -> Self {
        Self::Map(Box::new(MapEntry { key, value }))
    }

    /// The wire type this semantic type is carried with.
    pub const fn wire_type(&self) -> WireType {
        match self {
            Self::Int32
            | Self::Int64
            | Self::Uint32
            | Self::Uint64
            | Self::Sint32
            | Self::Sint64
            | Self::Bool
            | Self::Enum => WireType::Varint,
            Self::Fixed64 | Self::Sfixed64 | Self::Double => WireType::Fixed64,
            Self::Fixed32 | Self::Sfixed32 | Self::Float => WireType::Fixed32,
            Self::Bytes | Self::String | Self::Message(_) | Self::Map(_) => {
                WireType::LengthDelimited
            }
        }
    }

    /// Numeric scalars, which may use packed repeated encoding.
    pub const fn is_packable(&self) -> bool {
        !matches!(self.wire_type(), WireType::LengthDelimited)
    }

    /// Types allowed as map keys: integral types, bool and string.
    pub const fn is_valid_map_key(&self) -> bool {
        matches!(
            self,
            Self::Int32
                | Self::Int64
                | Self::Uint32
                | Self::Uint64
                | Self::Sint32
                | Self::Sint64
                | Self::Fixed32
                | Self::Fixed64
                | Self::Sfixed32
                | Self::Sfixed64
                | Self::Bool
                | Self::String
        )
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Bool => "bool",
            Self::Enum => "enum",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bytes => "bytes",
            Self::String => "string",
            Self::Message(_) => "message",
            Self::Map(_) => "map",
        }
    }

    /// The value an absent field of this type reads as.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Int32 | Self::Sint32 | Self::Sfixed32 => Value::I32(0),
            Self::Int64 | Self::Sint64 | Self::Sfixed64 => Value::I64(0),
            Self::Uint32 | Self::Fixed32 => Value::U32(0),
            Self::Uint64 | Self::Fixed64 => Value::U64(0),
            Self::Bool => Value::Bool(false),
            Self::Enum => Value::Enum(0),
            Self::Float => Value::F32(0.0),
            Self::Double => Value::F64(0.0),
            Self::Bytes => Value::Bytes(Vec::new()),
            Self::String => Value::String(String::new()),
            Self::Message(_) => Value::Message(Box::default()),
            Self::Map(_) => Value::Map(Default::default()),
        }
    }
}

/// One field of a message type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDescriptor {
    number: u32,
    name: String,
    field_type: FieldType,
    wire_type: WireType,
    repeated: bool,
    packed: bool,
}

impl FieldDescriptor {
    /// A singular field.
    pub fn new(number: u32, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            number,
            name: name.into(),
            wire_type: field_type.wire_type(),
            field_type,
            repeated: false,
            packed: false,
        }
    }

    /// A repeated field. Numeric scalars are packed by default.
    pub fn repeated(number: u32, name: impl Into<String>, field_type: FieldType) -> Self {
        let packed = field_type.is_packable();
        Self {
            repeated: true,
            packed,
            ..Self::new(number, name, field_type)
        }
    }

    /// A map field.
    pub fn map(number: u32, name: impl Into<String>, key: FieldType, value: FieldType) -> Self {
        Self {
            repeated: true,
            ..Self::new(number, name, FieldType::map(key, value))
        }
    }

    /// Emit one tag/value pair per element instead of a packed payload.
    pub fn unpacked(self) -> Self {
        self.with_packed(false)
    }

    pub fn with_packed(mut self, packed: bool) -> Self {
        self.packed = packed;
        self
    }

    /// Declare the wire type explicitly. It must agree with the semantic
    /// type; [`define_message`] rejects a mismatch.
    pub fn with_wire_type(mut self, wire_type: WireType) -> Self {
        self.wire_type = wire_type;
        self
    }

    #[inline(always)]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    #[inline(always)]
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    #[inline(always)]
    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    #[inline(always)]
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    #[inline(always)]
    pub fn is_map(&self) -> bool {
        matches!(self.field_type, FieldType::Map(_))
    }

    pub fn map_entry(&self) -> Option<&MapEntry> {
        match &self.field_type {
            FieldType::Map(entry) => Some(entry),
            _ => None,
        }
    }

    /// Tag of one element as written by the encoder.
    #[inline]
    pub(crate) fn element_tag(&self) -> Tag {
        Tag::new(self.number, self.wire_type)
    }

    fn validate(&self, message: &str) -> core::result::Result<(), DescriptorError> {
        let number = self.number;
        if !(MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER).contains(&number) {
            return Err(DescriptorError::InvalidFieldNumber {
                message: message.to_owned(),
                number,
            });
        }
        if RESERVED_FIELD_NUMBERS.contains(&number) {
            return Err(DescriptorError::ReservedFieldNumber {
                message: message.to_owned(),
                number,
            });
        }
        let expected = self.field_type.wire_type();
        if self.wire_type != expected {
            return Err(DescriptorError::WireTypeMismatch {
                message: message.to_owned(),
                number,
                expected,
                declared: self.wire_type,
            });
        }
        if self.packed && !(self.repeated && self.field_type.is_packable()) {
            return Err(DescriptorError::InvalidPacked {
                message: message.to_owned(),
                number,
            });
        }
        if let FieldType::Map(entry) = &self.field_type {
            if !entry.key.is_valid_map_key() {
                return Err(DescriptorError::InvalidMapKey {
                    message: message.to_owned(),
                    number,
                });
            }
            if matches!(entry.value, FieldType::Map(_)) {
                return Err(DescriptorError::InvalidMapValue {
                    message: message.to_owned(),
                    number,
                });
            }
        }
        Ok(())
    }
}

/// A set of fields of which at most one may be set.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OneofDescriptor {
    name: String,
    fields: Vec<u32>,
}

impl OneofDescriptor {
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = u32>) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().collect(),
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn fields(&self) -> &[u32] {
        &self.fields
    }

    #[inline]
    pub fn contains(&self, number: u32) -> bool {
        self.fields.contains(&number)
    }
}

/// Schema of one message type.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(into = "MessageSchema", try_from = "MessageSchema")
)]
pub struct MessageDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
    oneofs: Vec<OneofDescriptor>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
    oneof_by_number: HashMap<u32, usize>,
}

/// Define a message type from its fields in declared order.
///
/// The encoder emits fields in this order.
///
/// # Errors
///
/// Rejects duplicate field numbers or names, field numbers outside
/// `1..=2^29-1` or inside the reserved range `19000..=19999`, declared wire
/// types that disagree with the semantic type, `packed` on fields that cannot
/// be packed, and invalid map key or value types.
pub fn define_message(
    name: impl Into<String>,
    fields: impl IntoIterator<Item = FieldDescriptor>,
) -> core::result::Result<MessageDescriptor, DescriptorError> {
    let name = name.into();
    let fields: Vec<FieldDescriptor> = fields.into_iter().collect();
    let mut by_number = HashMap::with_capacity(fields.len());
    let mut by_name = HashMap::with_capacity(fields.len());
    for (index, field) in fields.iter().enumerate() {
        field.validate(&name)?;
        if by_number.insert(field.number, index).is_some() {
            return Err(DescriptorError::DuplicateFieldNumber {
                message: name,
                number: field.number,
            });
        }
        if by_name.insert(field.name.clone(), index).is_some() {
            return Err(DescriptorError::DuplicateFieldName {
                message: name,
                name: field.name.clone(),
            });
        }
    }
    Ok(MessageDescriptor {
        name,
        fields,
        oneofs: Vec::new(),
        by_number,
        by_name,
        oneof_by_number: HashMap::new(),
    })
}

impl MessageDescriptor {
    /// Group already declared singular fields into a oneof.
    pub fn with_oneof(
        mut self,
        oneof: OneofDescriptor,
    ) -> core::result::Result<Self, DescriptorError> {
        let index = self.oneofs.len();
        for &number in oneof.fields() {
            let Some(field) = self.field(number) else {
                return Err(DescriptorError::UnknownOneofMember {
                    message: self.name,
                    oneof: oneof.name.clone(),
                    number,
                });
            };
            if field.is_repeated() || field.is_map() {
                return Err(DescriptorError::RepeatedOneofMember {
                    message: self.name,
                    oneof: oneof.name.clone(),
                    number,
                });
            }
            if self.oneof_by_number.insert(number, index).is_some() {
                return Err(DescriptorError::OverlappingOneof {
                    message: self.name,
                    number,
                });
            }
        }
        self.oneofs.push(oneof);
        Ok(self)
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declared order.
    #[inline(always)]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    #[inline]
    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&index| &self.fields[index])
    }

    #[inline]
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    #[inline(always)]
    pub fn oneofs(&self) -> &[OneofDescriptor] {
        &self.oneofs
    }

    pub fn oneof(&self, name: &str) -> Option<&OneofDescriptor> {
        self.oneofs.iter().find(|oneof| oneof.name == name)
    }

    /// The oneof containing field `number`, if any.
    #[inline]
    pub fn oneof_of(&self, number: u32) -> Option<&OneofDescriptor> {
        self.oneof_by_number
            .get(&number)
            .map(|&index| &self.oneofs[index])
    }

    /// Names of message types referenced by fields of this message.
    fn referenced_messages(&self) -> impl Iterator<Item = (u32, &str)> {
        self.fields.iter().filter_map(|field| {
            let target = match field.field_type() {
                FieldType::Message(name) => name,
                FieldType::Map(entry) => match &entry.value {
                    FieldType::Message(name) => name,
                    _ => return None,
                },
                _ => return None,
            };
            Some((field.number, target.as_str()))
        })
    }
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields && self.oneofs == other.oneofs
    }
}

impl Eq for MessageDescriptor {}

/// Serialized shape of a [`MessageDescriptor`]; deserializing re-runs
/// [`define_message`] validation.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct MessageSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
    #[serde(default)]
    oneofs: Vec<OneofDescriptor>,
}

#[cfg(feature = "serde")]
impl From<MessageDescriptor> for MessageSchema {
    fn from(descriptor: MessageDescriptor) -> Self {
        Self {
            name: descriptor.name,
            fields: descriptor.fields,
            oneofs: descriptor.oneofs,
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<MessageSchema> for MessageDescriptor {
    type Error = DescriptorError;

    fn try_from(schema: MessageSchema) -> core::result::Result<Self, Self::Error> {
        schema
            .oneofs
            .into_iter()
            .try_fold(define_message(schema.name, schema.fields)?, |descriptor, oneof| {
                descriptor.with_oneof(oneof)
            })
    }
}

/// Immutable, name-indexed set of message types.
///
/// Built once, then shared freely; it is `Send + Sync` and never mutated.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    messages: Vec<MessageDescriptor>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry from `messages`, checking that every referenced
    /// message type is present.
    pub fn new(
        messages: impl IntoIterator<Item = MessageDescriptor>,
    ) -> core::result::Result<Self, DescriptorError> {
        let mut builder = Self::builder();
        for message in messages {
            builder.register(message)?;
        }
        builder.build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<Descriptor<'_>> {
        self.by_name.get(name).map(|&index| Descriptor {
            registry: self,
            message: &self.messages[index],
        })
    }

    /// Like [`Registry::get`], failing with
    /// [`Error::UnknownMessageType`] for unregistered names.
    pub fn descriptor(&self, name: &str) -> Result<Descriptor<'_>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownMessageType(name.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = Descriptor<'_>> {
        self.messages.iter().map(|message| Descriptor {
            registry: self,
            message,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Collects message types for a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    messages: Vec<MessageDescriptor>,
    by_name: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn register(
        &mut self,
        message: MessageDescriptor,
    ) -> core::result::Result<&mut Self, DescriptorError> {
        if self.by_name.contains_key(message.name()) {
            return Err(DescriptorError::DuplicateMessage(message.name));
        }
        self.by_name
            .insert(message.name.clone(), self.messages.len());
        self.messages.push(message);
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn build(self) -> core::result::Result<Registry, DescriptorError> {
        for message in &self.messages {
            for (number, target) in message.referenced_messages() {
                if !self.by_name.contains_key(target) {
                    return Err(DescriptorError::UnresolvedMessage {
                        message: message.name.clone(),
                        number,
                        target: target.to_owned(),
                    });
                }
            }
        }
        debug!(messages = self.messages.len(), "built descriptor registry");
        Ok(Registry {
            messages: self.messages,
            by_name: self.by_name,
        })
    }
}

/// A message type together with the registry that resolves the message types
/// it references. Cheap to copy; this is what [`encode`](crate::encode) and
/// [`decode`](crate::decode) take.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor<'r> {
    registry: &'r Registry,
    message: &'r MessageDescriptor,
}

impl<'r> Descriptor<'r> {
    #[inline(always)]
    pub fn registry(self) -> &'r Registry {
        self.registry
    }

    #[inline(always)]
    pub fn message(self) -> &'r MessageDescriptor {
        self.message
    }

    /// Resolve a message type referenced by this one.
    #[inline]
    pub fn resolve(self, name: &str) -> Result<Descriptor<'r>> {
        self.registry.descriptor(name)
    }
}

impl Deref for Descriptor<'_> {
    type Target = MessageDescriptor;

    #[inline(always)]
    fn deref(&self) -> &MessageDescriptor {
        self.message
    }
}
