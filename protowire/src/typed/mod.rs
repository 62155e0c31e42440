//! Typed messages.
//!
//! [`message!`](crate::message!) declares a plain Rust struct together with
//! its descriptor, and converts between the struct and a dynamic
//! [`Message`]. [`enumeration!`](crate::enumeration!) does the same for
//! `i32`-backed enums, and [`oneof!`](crate::oneof!) declares an enum whose
//! variants are the members of a oneof.
//!
//! ```
//! use protowire::{enumeration, message, typed::ProtoMessage};
//!
//! enumeration! {
//!     pub enum Kind {
//!         Unknown = 0,
//!         Leaf = 1,
//!         Branch = 2,
//!     }
//! }
//!
//! message! {
//!     pub struct Node {
//!         #[field(1, string)]
//!         pub label: String,
//!         #[field(2, enumeration)]
//!         pub kind: Kind,
//!         #[field(3, repeated message(Node))]
//!         pub children: Vec<Node>,
//!     }
//! }
//!
//! let tree = Node {
//!     label: "root".into(),
//!     kind: Kind::Branch,
//!     children: vec![Node {
//!         label: "leaf".into(),
//!         kind: Kind::Leaf,
//!         children: vec![],
//!     }],
//! };
//! let bytes = tree.encode_to_vec()?;
//! assert_eq!(Node::decode(&bytes)?, tree);
//! # Ok::<(), protowire::Error>(())
//! ```
use {
    crate::{
        error::{unexpected_value, DescriptorError, Error, Result},
        message::{Message, Value},
        schema::{FieldDescriptor, MessageDescriptor, Registry, RegistryBuilder},
    },
    bytes::Bytes,
};

mod macros;

/// Conversion between a Rust field type and an optional [`Value`].
///
/// `None` means the field is absent from the message.
pub trait FieldValue: Sized {
    fn to_value(&self) -> Option<Value>;

    fn from_value(value: Option<Value>) -> Result<Self>;
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl FieldValue for $ty {
                #[inline]
                fn to_value(&self) -> Option<Value> {
                    Some(Value::$variant(self.clone()))
                }

                #[inline]
                fn from_value(value: Option<Value>) -> Result<Self> {
                    match value {
                        None => Ok(Self::default()),
                        Some(Value::$variant(v)) => Ok(v),
                        Some(other) => Err(unexpected_value($name, other.type_name())),
                    }
                }
            }
        )*
    };
}

impl_scalar! {
    bool => Bool, "bool";
    i32 => I32, "i32";
    i64 => I64, "i64";
    u32 => U32, "u32";
    u64 => U64, "u64";
    f32 => F32, "f32";
    f64 => F64, "f64";
    String => String, "string";
}

impl FieldValue for Bytes {
    #[inline]
    fn to_value(&self) -> Option<Value> {
        Some(Value::Bytes(self.to_vec()))
    }

    #[inline]
    fn from_value(value: Option<Value>) -> Result<Self> {
        match value {
            None => Ok(Bytes::new()),
            Some(Value::Bytes(v)) => Ok(Bytes::from(v)),
            Some(other) => Err(unexpected_value("bytes", other.type_name())),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    #[inline]
    fn to_value(&self) -> Option<Value> {
        self.as_ref().and_then(T::to_value)
    }

    #[inline]
    fn from_value(value: Option<Value>) -> Result<Self> {
        value.map(|value| T::from_value(Some(value))).transpose()
    }
}

/// Repeated fields. An empty vector is an absent field.
impl<T: FieldValue> FieldValue for Vec<T> {
    fn to_value(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        Some(Value::List(self.iter().filter_map(T::to_value).collect()))
    }

    fn from_value(value: Option<Value>) -> Result<Self> {
        match value {
            None => Ok(Vec::new()),
            Some(Value::List(items)) => items
                .into_iter()
                .map(|item| T::from_value(Some(item)))
                .collect(),
            Some(other) => Err(unexpected_value("list", other.type_name())),
        }
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    #[inline]
    fn to_value(&self) -> Option<Value> {
        (**self).to_value()
    }

    #[inline]
    fn from_value(value: Option<Value>) -> Result<Self> {
        T::from_value(value).map(Box::new)
    }
}

/// A Rust type with a fixed message descriptor.
///
/// Implemented by [`message!`](crate::message!); the provided methods encode
/// and decode through the dynamic codec with a registry built once per type.
pub trait ProtoMessage: Sized {
    /// Registered message type name.
    const NAME: &'static str;

    fn descriptor() -> core::result::Result<MessageDescriptor, DescriptorError>;

    /// Register the message types referenced by this type's fields.
    fn register_dependencies(
        builder: &mut RegistryBuilder,
    ) -> core::result::Result<(), DescriptorError>;

    /// A registry holding this type and everything it references.
    fn registry() -> core::result::Result<&'static Registry, DescriptorError>;

    fn to_message(&self) -> Message;

    fn from_message(message: Message) -> Result<Self>;

    /// Register this type and, transitively, every type it references.
    /// Types already in `builder` are skipped, so recursive types terminate.
    fn register(builder: &mut RegistryBuilder) -> core::result::Result<(), DescriptorError> {
        if builder.contains(Self::NAME) {
            return Ok(());
        }
        builder.register(Self::descriptor()?)?;
        Self::register_dependencies(builder)
    }

    fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let registry = Self::registry()?;
        crate::encode(&self.to_message(), registry.descriptor(Self::NAME)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let registry = Self::registry()?;
        Self::from_message(crate::decode(bytes, registry.descriptor(Self::NAME)?)?)
    }

    /// Merge an encoded message into `self`, as if `bytes` had been appended
    /// to the encoding of `self` before decoding.
    fn merge_from(&mut self, bytes: &[u8]) -> Result<()> {
        let descriptor = Self::registry()?.descriptor(Self::NAME)?;
        let mut message = self.to_message();
        message.merge(descriptor, crate::decode(bytes, descriptor)?)?;
        *self = Self::from_message(message)?;
        Ok(())
    }
}

/// `i32`-backed enums declared with [`enumeration!`](crate::enumeration!).
pub trait ProtoEnum: Copy + Sized {
    const NAME: &'static str;

    fn to_i32(self) -> i32;

    fn from_i32(value: i32) -> Option<Self>;

    /// Like [`ProtoEnum::from_i32`], failing with
    /// [`Error::UnknownEnumValue`] for undeclared values.
    fn try_from_i32(value: i32) -> Result<Self> {
        Self::from_i32(value).ok_or(Error::UnknownEnumValue {
            name: Self::NAME,
            value,
        })
    }
}

/// An enum declared with [`oneof!`](crate::oneof!): one variant per member
/// field.
pub trait ProtoOneof: Sized {
    /// Descriptors of the member fields in declared order.
    fn fields() -> Vec<FieldDescriptor>;

    fn register_dependencies(
        builder: &mut RegistryBuilder,
    ) -> core::result::Result<(), DescriptorError>;

    /// Field number of the member this value sets.
    fn number(&self) -> u32;

    fn to_value(&self) -> Option<Value>;

    /// Build the variant for member `number`.
    fn from_member(number: u32, value: Value) -> Result<Self>;
}

/// A `#[oneof(name)]` field of a [`message!`](crate::message!) struct.
pub trait OneofField: Sized {
    fn fields() -> Vec<FieldDescriptor>;

    fn register_dependencies(
        builder: &mut RegistryBuilder,
    ) -> core::result::Result<(), DescriptorError>;

    /// The set member as a field number and value.
    fn to_member(&self) -> Option<(u32, Value)>;

    /// Take whichever member `message` sets.
    ///
    /// # Errors
    ///
    /// [`Error::OneofConflict`] if more than one member is set.
    fn from_message(message: &mut Message, oneof: &str) -> Result<Self>;
}

impl<T: ProtoOneof> OneofField for Option<T> {
    #[inline]
    fn fields() -> Vec<FieldDescriptor> {
        T::fields()
    }

    #[inline]
    fn register_dependencies(
        builder: &mut RegistryBuilder,
    ) -> core::result::Result<(), DescriptorError> {
        T::register_dependencies(builder)
    }

    fn to_member(&self) -> Option<(u32, Value)> {
        let member = self.as_ref()?;
        Some((member.number(), member.to_value()?))
    }

    fn from_message(message: &mut Message, oneof: &str) -> Result<Self> {
        let mut set = None;
        for field in T::fields() {
            let number = field.number();
            let Some(value) = message.remove(number) else {
                continue;
            };
            if let Some((first, _)) = set {
                return Err(Error::OneofConflict {
                    oneof: oneof.to_owned(),
                    first,
                    second: number,
                });
            }
            set = Some((number, value));
        }
        set.map(|(number, value)| {
            T::from_member(number, value).map_err(|e| e.in_field(number))
        })
        .transpose()
    }
}

#[doc(hidden)]
pub fn __message_from_value<T: ProtoMessage + Default>(value: Option<Value>) -> Result<T> {
    match value {
        None => Ok(T::default()),
        Some(Value::Message(message)) => T::from_message(*message),
        Some(other) => Err(unexpected_value("message", other.type_name())),
    }
}

#[doc(hidden)]
pub fn __enum_from_value<T: ProtoEnum + Default>(value: Option<Value>) -> Result<T> {
    match value {
        None => Ok(T::default()),
        Some(Value::Enum(v)) => T::try_from_i32(v),
        Some(other) => Err(unexpected_value("enum", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{enumeration, message, oneof},
    };

    enumeration! {
        pub enum Corpus {
            Universal = 0,
            Web = 1,
            Images = 2,
        }
    }

    message! {
        pub struct Test1 {
            #[field(1, int32)]
            pub a: i32,
        }
    }

    message! {
        pub struct Test3 {
            #[field(3, message(Test1))]
            pub c: Option<Test1>,
        }
    }

    message! {
        /// Exercises every scalar kind.
        pub struct Everything {
            #[field(1, int32)]
            pub int32: i32,
            #[field(2, int64)]
            pub int64: i64,
            #[field(3, uint32)]
            pub uint32: u32,
            #[field(4, uint64)]
            pub uint64: u64,
            #[field(5, sint32)]
            pub sint32: i32,
            #[field(6, sint64)]
            pub sint64: i64,
            #[field(7, bool)]
            pub flag: bool,
            #[field(8, enumeration)]
            pub corpus: Corpus,
            #[field(9, fixed32)]
            pub fixed32: u32,
            #[field(10, fixed64)]
            pub fixed64: u64,
            #[field(11, sfixed32)]
            pub sfixed32: i32,
            #[field(12, sfixed64)]
            pub sfixed64: i64,
            #[field(13, float)]
            pub float: f32,
            #[field(14, double)]
            pub double: f64,
            #[field(15, bytes)]
            pub bytes: Bytes,
            #[field(16, string)]
            pub string: String,
            #[field(17, repeated sint32)]
            pub packed: Vec<i32>,
            #[field(18, repeated unpacked uint32)]
            pub unpacked: Vec<u32>,
            #[field(19, repeated message(Test1))]
            pub messages: Vec<Test1>,
            #[field(20, repeated enumeration)]
            pub corpora: Vec<Corpus>,
            #[field(21, string)]
            pub maybe: Option<String>,
        }
    }

    message! {
        pub struct Tree {
            #[field(1, string)]
            pub label: String,
            #[field(2, message(Tree))]
            pub left: Option<Box<Tree>>,
            #[field(3, message(Tree))]
            pub right: Option<Box<Tree>>,
        }
    }

    message! {
        pub struct SubMessage {
            #[field(1, string)]
            pub id: String,
            #[field(3, int32)]
            pub b: i32,
        }
    }

    oneof! {
        pub enum TestOneof {
            #[field(4, string)]
            Name(String),
            #[field(9, message(SubMessage))]
            SubMessage(SubMessage),
        }
    }

    message! {
        pub struct SampleMessage {
            #[oneof(test_oneof)]
            pub test_oneof: Option<TestOneof>,
            #[field(10, bool)]
            pub flag: Option<bool>,
        }
    }

    #[test]
    fn embedded_message_vector() {
        let value = Test3 {
            c: Some(Test1 { a: 150 }),
        };
        let bytes = value.encode_to_vec().unwrap();
        assert_eq!(bytes, [0x1a, 0x03, 0x08, 0x96, 0x01]);
        assert_eq!(Test3::decode(&bytes).unwrap(), value);
        assert_eq!(Test3::decode(&[]).unwrap(), Test3 { c: None });
    }

    #[test]
    fn field_number_constants() {
        assert_eq!(Test3::C_FIELD_NUMBER, 3);
        assert_eq!(Everything::UNPACKED_FIELD_NUMBER, 18);
    }

    #[test]
    fn descriptor_reflects_declaration() {
        let descriptor = Everything::descriptor().unwrap();
        assert_eq!(descriptor.name(), "Everything");
        assert_eq!(descriptor.fields().len(), 21);
        assert!(descriptor.field(17).unwrap().is_packed());
        assert!(!descriptor.field(18).unwrap().is_packed());
        assert!(descriptor.field(19).unwrap().is_repeated());
        let registry = Everything::registry().unwrap();
        assert!(registry.get("Test1").is_some());
    }

    #[test]
    fn every_kind_roundtrips() {
        let value = Everything {
            int32: -1,
            int64: i64::MIN,
            uint32: u32::MAX,
            uint64: 1 << 40,
            sint32: -300,
            sint64: -1 << 50,
            flag: true,
            corpus: Corpus::Images,
            fixed32: 7,
            fixed64: 8,
            sfixed32: -9,
            sfixed64: -10,
            float: 1.5,
            double: -2.25,
            bytes: Bytes::from_static(&[0, 1, 2]),
            string: "hello".into(),
            packed: vec![-1, 0, 1],
            unpacked: vec![4, 5],
            messages: vec![Test1 { a: 1 }, Test1 { a: 2 }],
            corpora: vec![Corpus::Web, Corpus::Universal],
            maybe: None,
        };
        let bytes = value.encode_to_vec().unwrap();
        assert_eq!(Everything::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn recursive_types_register_once() {
        let tree = Tree {
            label: "root".into(),
            left: Some(Box::new(Tree {
                label: "l".into(),
                ..Tree::default()
            })),
            right: None,
        };
        let bytes = tree.encode_to_vec().unwrap();
        assert_eq!(Tree::decode(&bytes).unwrap(), tree);
        assert_eq!(Tree::registry().unwrap().len(), 1);
    }

    #[test]
    fn merge_from_appends_and_replaces() {
        let mut value = Everything {
            int32: 1,
            packed: vec![1],
            ..Everything::default()
        };
        let other = Everything {
            int32: 2,
            packed: vec![2],
            ..Everything::default()
        };
        value.merge_from(&other.encode_to_vec().unwrap()).unwrap();
        assert_eq!(value.int32, 2);
        assert_eq!(value.packed, [1, 2]);
    }

    #[test]
    fn oneof_switches_member() {
        let mut value = SampleMessage {
            test_oneof: Some(TestOneof::SubMessage(SubMessage {
                id: "123".into(),
                b: 5,
            })),
            flag: None,
        };
        let bytes = value.encode_to_vec().unwrap();
        assert_eq!(bytes, b"\x4a\x07\x0a\x03123\x18\x05");
        assert_eq!(SampleMessage::decode(&bytes).unwrap(), value);
        assert_eq!(value.test_oneof.as_ref().map(ProtoOneof::number), Some(9));

        value.test_oneof = Some(TestOneof::Name("Some string".into()));
        let bytes = value.encode_to_vec().unwrap();
        assert_eq!(bytes, b"\x22\x0bSome string");
        assert_eq!(SampleMessage::decode(&bytes).unwrap(), value);
        assert_eq!(SampleMessage::decode(&[]).unwrap().test_oneof, None);
    }

    #[test]
    fn oneof_descriptor_and_last_member_wins() {
        let descriptor = SampleMessage::descriptor().unwrap();
        let oneof = descriptor.oneof("test_oneof").unwrap();
        assert_eq!(oneof.fields(), &[4, 9]);
        assert_eq!(descriptor.field(9).unwrap().name(), "sub_message");
        assert!(descriptor.oneof_of(10).is_none());
        assert!(SampleMessage::registry().unwrap().get("SubMessage").is_some());
        assert_eq!(TestOneof::SUB_MESSAGE_FIELD_NUMBER, 9);
        assert_eq!(SampleMessage::FLAG_FIELD_NUMBER, 10);

        let bytes = b"\x4a\x07\x0a\x03123\x18\x05\x22\x0bSome string";
        let value = SampleMessage::decode(bytes).unwrap();
        assert_eq!(value.test_oneof, Some(TestOneof::Name("Some string".into())));
    }

    #[test]
    fn merge_from_switches_oneof_member() {
        let mut value = SampleMessage {
            test_oneof: Some(TestOneof::Name("x".into())),
            flag: Some(true),
        };
        let other = SampleMessage {
            test_oneof: Some(TestOneof::SubMessage(SubMessage::default())),
            flag: None,
        };
        value.merge_from(&other.encode_to_vec().unwrap()).unwrap();
        assert_eq!(
            value.test_oneof,
            Some(TestOneof::SubMessage(SubMessage::default()))
        );
        assert_eq!(value.flag, Some(true));
    }

    #[test]
    fn oneof_conflict_in_dynamic_message_is_an_error() {
        let message = Message::new().with(4, "a").with(9, SubMessage::default().to_message());
        assert!(matches!(
            SampleMessage::from_message(message),
            Err(Error::OneofConflict { first: 4, second: 9, .. })
        ));
    }

    #[test]
    fn unknown_enum_value_is_an_error() {
        // corpus = 7
        let err = Everything::decode(&[0x40, 0x07]).unwrap_err();
        assert_eq!(err.field_path(), &[8]);
        assert!(matches!(
            err.root(),
            Error::UnknownEnumValue {
                name: "Corpus",
                value: 7
            }
        ));
        assert_eq!(Corpus::from_i32(2), Some(Corpus::Images));
        assert_eq!(Corpus::default(), Corpus::Universal);
    }

    #[test]
    fn optional_fields_are_absent_when_none() {
        let message = Everything::default().to_message();
        assert!(!message.contains(21));
        assert!(!message.contains(17));
        assert!(message.contains(1));
    }
}
