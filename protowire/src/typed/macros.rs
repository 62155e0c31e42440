/// Maps a field kind to its [`FieldType`](crate::schema::FieldType).
#[macro_export]
#[doc(hidden)]
macro_rules! __field_type {
    (int32) => { $crate::schema::FieldType::Int32 };
    (int64) => { $crate::schema::FieldType::Int64 };
    (uint32) => { $crate::schema::FieldType::Uint32 };
    (uint64) => { $crate::schema::FieldType::Uint64 };
    (sint32) => { $crate::schema::FieldType::Sint32 };
    (sint64) => { $crate::schema::FieldType::Sint64 };
    (bool) => { $crate::schema::FieldType::Bool };
    (enumeration) => { $crate::schema::FieldType::Enum };
    (fixed32) => { $crate::schema::FieldType::Fixed32 };
    (fixed64) => { $crate::schema::FieldType::Fixed64 };
    (sfixed32) => { $crate::schema::FieldType::Sfixed32 };
    (sfixed64) => { $crate::schema::FieldType::Sfixed64 };
    (float) => { $crate::schema::FieldType::Float };
    (double) => { $crate::schema::FieldType::Double };
    (bytes) => { $crate::schema::FieldType::Bytes };
    (string) => { $crate::schema::FieldType::String };
    (message($ty:ty)) => {
        $crate::schema::FieldType::message(<$ty as $crate::typed::ProtoMessage>::NAME)
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! __field_descriptor {
    ($number:expr, $name:expr; repeated unpacked $($kind:tt)+) => {
        $crate::schema::FieldDescriptor::repeated($number, $name, $crate::__field_type!($($kind)+))
            .unpacked()
    };
    ($number:expr, $name:expr; repeated $($kind:tt)+) => {
        $crate::schema::FieldDescriptor::repeated($number, $name, $crate::__field_type!($($kind)+))
    };
    ($number:expr, $name:expr; $($kind:tt)+) => {
        $crate::schema::FieldDescriptor::new($number, $name, $crate::__field_type!($($kind)+))
    };
}

/// Registers the message type a field refers to, if any.
#[macro_export]
#[doc(hidden)]
macro_rules! __register_nested {
    ($builder:expr; repeated unpacked $($kind:tt)+) => {
        $crate::__register_nested!($builder; $($kind)+)
    };
    ($builder:expr; repeated $($kind:tt)+) => {
        $crate::__register_nested!($builder; $($kind)+)
    };
    ($builder:expr; message($ty:ty)) => {
        <$ty as $crate::typed::ProtoMessage>::register($builder)?
    };
    ($builder:expr; $($kind:tt)+) => {};
}

/// Expands one `message!` field attribute in the position named by the
/// leading `@` rule.
#[macro_export]
#[doc(hidden)]
macro_rules! __message_field {
    (@const $field:ident; field($number:literal, $($kind:tt)+)) => {
        $crate::__private::paste! {
            pub const [<$field:upper _FIELD_NUMBER>]: u32 = $number;
        }
    };
    (@const $field:ident; oneof($oneof:ident)) => {};

    (@describe $fields:ident, $field:ident, $ty:ty; field($number:literal, $($kind:tt)+)) => {
        $fields.push($crate::__field_descriptor!($number, stringify!($field); $($kind)+));
    };
    (@describe $fields:ident, $field:ident, $ty:ty; oneof($oneof:ident)) => {
        $fields.extend(<$ty as $crate::typed::OneofField>::fields());
    };

    (@oneof $descriptor:ident, $ty:ty; field($number:literal, $($kind:tt)+)) => {};
    (@oneof $descriptor:ident, $ty:ty; oneof($oneof:ident)) => {
        let $descriptor = $descriptor.with_oneof($crate::schema::OneofDescriptor::new(
            stringify!($oneof),
            <$ty as $crate::typed::OneofField>::fields()
                .iter()
                .map($crate::schema::FieldDescriptor::number),
        ))?;
    };

    (@register $builder:ident, $ty:ty; field($number:literal, $($kind:tt)+)) => {
        $crate::__register_nested!($builder; $($kind)+);
    };
    (@register $builder:ident, $ty:ty; oneof($oneof:ident)) => {
        <$ty as $crate::typed::OneofField>::register_dependencies($builder)?;
    };

    (@to_message $message:ident, $value:expr, $ty:ty; field($number:literal, $($kind:tt)+)) => {
        if let Some(value) = $crate::typed::FieldValue::to_value($value) {
            $message.set($number, value);
        }
    };
    (@to_message $message:ident, $value:expr, $ty:ty; oneof($oneof:ident)) => {
        if let Some((number, value)) = <$ty as $crate::typed::OneofField>::to_member($value) {
            $message.set(number, value);
        }
    };

    (@from_message $message:ident, $ty:ty; field($number:literal, $($kind:tt)+)) => {
        <$ty as $crate::typed::FieldValue>::from_value($message.remove($number))
            .map_err(|e| e.in_field($number))?
    };
    (@from_message $message:ident, $ty:ty; oneof($oneof:ident)) => {
        <$ty as $crate::typed::OneofField>::from_message(&mut $message, stringify!($oneof))?
    };
}

/// Declare a struct that encodes as a protobuf message.
///
/// Each field carries a `#[field(number, kind)]` attribute. `kind` is one of
/// the scalar type names (`int32`, `sint64`, `fixed32`, `string`, ...),
/// `enumeration` for types declared with [`enumeration!`], or
/// `message(Type)` for other `message!` types. Prefix the kind with
/// `repeated` for `Vec` fields; repeated numeric fields are packed unless the
/// kind is prefixed with `repeated unpacked`.
///
/// A field marked `#[oneof(name)]` instead holds an `Option` of an enum
/// declared with [`oneof!`]; its variants become the members of oneof `name`.
///
/// The struct derives `Debug`, `Clone`, `Default` and `PartialEq`, and gets a
/// `<FIELD>_FIELD_NUMBER` constant per `#[field]` field.
///
/// # Examples
///
/// ```
/// use protowire::{message, typed::ProtoMessage};
///
/// message! {
///     pub struct Test1 {
///         #[field(1, int32)]
///         pub a: i32,
///         #[field(2, string)]
///         pub b: String,
///     }
/// }
///
/// let value = Test1 { a: 150, b: "x".into() };
/// let bytes = value.encode_to_vec()?;
/// assert_eq!(bytes, [0x08, 0x96, 0x01, 0x12, 0x01, 0x78]);
/// assert_eq!(Test1::decode(&bytes)?, value);
/// assert_eq!(Test1::B_FIELD_NUMBER, 2);
/// # Ok::<(), protowire::Error>(())
/// ```
///
/// Optional fields use `Option`, and recursive fields need a `Box`:
///
/// ```
/// # use protowire::{message, typed::ProtoMessage};
/// message! {
///     pub struct List {
///         #[field(1, sint64)]
///         pub value: Option<i64>,
///         #[field(2, message(List))]
///         pub next: Option<Box<List>>,
///     }
/// }
///
/// let list = List {
///     value: Some(-1),
///     next: Some(Box::new(List { value: Some(2), next: None })),
/// };
/// assert_eq!(List::decode(&list.encode_to_vec()?)?, list);
/// # Ok::<(), protowire::Error>(())
/// ```
#[macro_export]
macro_rules! message {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                #[$attr:ident($($spec:tt)+)]
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        #[allow(dead_code)]
        impl $name {
            $($crate::__message_field!(@const $field; $attr($($spec)+));)*
        }

        impl $crate::typed::ProtoMessage for $name {
            const NAME: &'static str = stringify!($name);

            fn descriptor() -> ::core::result::Result<
                $crate::schema::MessageDescriptor,
                $crate::error::DescriptorError,
            > {
                #[allow(unused_mut)]
                let mut fields: ::std::vec::Vec<$crate::schema::FieldDescriptor> =
                    ::std::vec::Vec::new();
                $($crate::__message_field!(@describe fields, $field, $ty; $attr($($spec)+));)*
                let descriptor = $crate::schema::define_message(stringify!($name), fields)?;
                $($crate::__message_field!(@oneof descriptor, $ty; $attr($($spec)+));)*
                Ok(descriptor)
            }

            #[allow(unused_variables)]
            fn register_dependencies(
                builder: &mut $crate::schema::RegistryBuilder,
            ) -> ::core::result::Result<(), $crate::error::DescriptorError> {
                $($crate::__message_field!(@register builder, $ty; $attr($($spec)+));)*
                Ok(())
            }

            fn registry() -> ::core::result::Result<
                &'static $crate::schema::Registry,
                $crate::error::DescriptorError,
            > {
                static REGISTRY: ::std::sync::OnceLock<
                    ::core::result::Result<$crate::schema::Registry, $crate::error::DescriptorError>,
                > = ::std::sync::OnceLock::new();
                REGISTRY
                    .get_or_init(|| {
                        let mut builder = $crate::schema::Registry::builder();
                        <Self as $crate::typed::ProtoMessage>::register(&mut builder)?;
                        builder.build()
                    })
                    .as_ref()
                    .map_err(Clone::clone)
            }

            fn to_message(&self) -> $crate::message::Message {
                #[allow(unused_mut)]
                let mut message = $crate::message::Message::new();
                $($crate::__message_field!(@to_message message, &self.$field, $ty; $attr($($spec)+));)*
                message
            }

            #[allow(unused_mut, unused_variables)]
            fn from_message(mut message: $crate::message::Message) -> $crate::error::Result<Self> {
                Ok(Self {
                    $(
                        $field: $crate::__message_field!(@from_message message, $ty; $attr($($spec)+)),
                    )*
                })
            }
        }

        impl $crate::typed::FieldValue for $name {
            fn to_value(&self) -> Option<$crate::message::Value> {
                Some($crate::message::Value::Message(Box::new(
                    <Self as $crate::typed::ProtoMessage>::to_message(self),
                )))
            }

            fn from_value(value: Option<$crate::message::Value>) -> $crate::error::Result<Self> {
                $crate::typed::__message_from_value(value)
            }
        }
    };
}

/// Declare an enum whose variants are the members of a oneof, for use as an
/// `Option<_>` field marked `#[oneof(name)]` in [`message!`].
///
/// Each variant wraps one value and carries the same `#[field(number, kind)]`
/// attribute a `message!` field would; `repeated` kinds are rejected when the
/// descriptor is built. The member field name is the variant name in
/// snake case.
///
/// ```
/// use protowire::{message, oneof, typed::ProtoMessage};
///
/// oneof! {
///     pub enum Shape {
///         #[field(1, double)]
///         Radius(f64),
///         #[field(2, string)]
///         Label(String),
///     }
/// }
///
/// message! {
///     pub struct Figure {
///         #[oneof(shape)]
///         pub shape: Option<Shape>,
///     }
/// }
///
/// let figure = Figure { shape: Some(Shape::Label("a".into())) };
/// assert_eq!(figure.encode_to_vec()?, [0x12, 0x01, b'a']);
/// assert_eq!(Figure::decode(&[0x09, 0, 0, 0, 0, 0, 0, 0xf0, 0x3f, 0x12, 0x01, b'a'])?, figure);
/// assert_eq!(Shape::RADIUS_FIELD_NUMBER, 1);
/// # Ok::<(), protowire::Error>(())
/// ```
#[macro_export]
macro_rules! oneof {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                #[field($number:literal, $($kind:tt)+)]
                $(#[$vmeta:meta])*
                $variant:ident($vty:ty)
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant($vty),
            )+
        }

        $crate::__private::paste! {
            #[allow(dead_code)]
            impl $name {
                $(
                    pub const [<$variant:snake:upper _FIELD_NUMBER>]: u32 = $number;
                )+
            }

            impl $crate::typed::ProtoOneof for $name {
                fn fields() -> ::std::vec::Vec<$crate::schema::FieldDescriptor> {
                    ::std::vec![
                        $($crate::__field_descriptor!($number, stringify!([<$variant:snake>]); $($kind)+)),+
                    ]
                }

                fn register_dependencies(
                    builder: &mut $crate::schema::RegistryBuilder,
                ) -> ::core::result::Result<(), $crate::error::DescriptorError> {
                    $($crate::__register_nested!(builder; $($kind)+);)+
                    Ok(())
                }

                fn number(&self) -> u32 {
                    match self {
                        $(Self::$variant(_) => $number,)+
                    }
                }

                fn to_value(&self) -> Option<$crate::message::Value> {
                    match self {
                        $(Self::$variant(value) => $crate::typed::FieldValue::to_value(value),)+
                    }
                }

                fn from_member(
                    number: u32,
                    value: $crate::message::Value,
                ) -> $crate::error::Result<Self> {
                    match number {
                        $(
                            $number => <$vty as $crate::typed::FieldValue>::from_value(Some(value))
                                .map(Self::$variant),
                        )+
                        _ => Err($crate::error::Error::UnknownField(number)),
                    }
                }
            }
        }
    };
}

/// Declare an `i32`-backed enum usable as an `enumeration` field.
///
/// The first variant is the default. Decoding a value that names no variant
/// fails with [`Error::UnknownEnumValue`](crate::Error::UnknownEnumValue).
///
/// ```
/// use protowire::{enumeration, typed::ProtoEnum};
///
/// enumeration! {
///     pub enum Corpus {
///         Universal = 0,
///         Web = 1,
///     }
/// }
///
/// assert_eq!(Corpus::from_i32(1), Some(Corpus::Web));
/// assert_eq!(Corpus::Web.to_i32(), 1);
/// assert_eq!(Corpus::default(), Corpus::Universal);
/// assert!(Corpus::try_from_i32(5).is_err());
/// ```
#[macro_export]
macro_rules! enumeration {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(#[$first_meta:meta])*
            $first:ident = $first_value:literal
            $(, $(#[$vmeta:meta])* $variant:ident = $value:literal)* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        $vis enum $name {
            $(#[$first_meta])*
            $first = $first_value,
            $($(#[$vmeta])* $variant = $value,)*
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$first
            }
        }

        impl $crate::typed::ProtoEnum for $name {
            const NAME: &'static str = stringify!($name);

            #[inline]
            fn to_i32(self) -> i32 {
                self as i32
            }

            fn from_i32(value: i32) -> Option<Self> {
                match value {
                    $first_value => Some(Self::$first),
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }

        impl $crate::typed::FieldValue for $name {
            #[inline]
            fn to_value(&self) -> Option<$crate::message::Value> {
                Some($crate::message::Value::Enum(<Self as $crate::typed::ProtoEnum>::to_i32(*self)))
            }

            fn from_value(value: Option<$crate::message::Value>) -> $crate::error::Result<Self> {
                $crate::typed::__enum_from_value(value)
            }
        }
    };
}
