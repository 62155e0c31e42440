//! protowire is a descriptor-driven codec for the Protocol Buffers wire format.
//!
//! Messages are described at runtime by [`MessageDescriptor`]s collected in a
//! [`Registry`]; no schema compiler is involved. Encoding and decoding produce
//! the same bytes as any conforming protobuf implementation, and fields a
//! descriptor does not know about survive a decode/encode cycle unchanged.
//!
//! # Quickstart
//!
//! Describe a message, build a [`Message`] and encode it:
//!
//! ```
//! use protowire::{define_message, FieldDescriptor, FieldType, Message, Registry};
//!
//! let registry = Registry::new([define_message(
//!     "Test1",
//!     [
//!         FieldDescriptor::new(1, "a", FieldType::Int32),
//!         FieldDescriptor::new(2, "b", FieldType::String),
//!     ],
//! )?])?;
//! let test1 = registry.descriptor("Test1")?;
//!
//! let message = Message::new().with(1, 150).with(2, "x");
//! let bytes = protowire::encode(&message, test1)?;
//! assert_eq!(bytes, [0x08, 0x96, 0x01, 0x12, 0x01, 0x78]);
//! assert_eq!(protowire::decode(&bytes, test1)?, message);
//! # Ok::<(), protowire::Error>(())
//! ```
//!
//! For fixed schemas, the [`message!`] macro declares a struct with its
//! descriptor and typed encode/decode methods; see [`typed`].
//!
//! # Unknown fields
//!
//! Fields whose number the descriptor does not declare are kept as raw bytes
//! and re-emitted after the known fields:
//!
//! ```
//! # use protowire::{define_message, FieldDescriptor, FieldType, Registry};
//! let registry = Registry::new([
//!     define_message("V1", [FieldDescriptor::new(1, "a", FieldType::Int32)])?,
//!     define_message(
//!         "V2",
//!         [
//!             FieldDescriptor::new(1, "a", FieldType::Int32),
//!             FieldDescriptor::new(2, "b", FieldType::String),
//!         ],
//!     )?,
//! ])?;
//!
//! let from_v2 = [0x08, 0x01, 0x12, 0x02, b'h', b'i'];
//! let old = protowire::decode(&from_v2, registry.descriptor("V1")?)?;
//! assert_eq!(old.unknown_fields().len(), 1);
//! assert_eq!(protowire::encode(&old, registry.descriptor("V1")?)?, from_v2);
//! # Ok::<(), protowire::Error>(())
//! ```
//!
//! # Configuration
//!
//! The functions at the crate root use [`Config::default`]. The [`config`]
//! module has the same entry points taking an explicit [`Config`], for
//! tighter recursion and length limits or strict UTF-8 checking.
//!
//! # Logging
//!
//! The codec emits [`tracing`] events at `trace` and `debug` level (unknown
//! fields retained, alternate repeated encodings accepted, non-UTF-8 strings
//! kept as bytes, limits hit). It never installs a subscriber.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod config;
pub use config::Config;
mod decode;
mod encode;
pub mod error;
pub use error::{DescriptorError, Error, Result};
pub mod io;
pub mod message;
pub use message::{MapKey, Message, UnknownField, UnknownFields, Value};
pub mod schema;
pub use schema::{
    define_message, Descriptor, FieldDescriptor, FieldType, MessageDescriptor, OneofDescriptor,
    Registry,
};
pub mod typed;
pub use typed::{FieldValue, OneofField, ProtoEnum, ProtoMessage, ProtoOneof};
pub mod varint;
pub mod wire;

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    pub use paste::paste;
}

const DEFAULT_CONFIG: Config = Config::new();

/// Encode `message` as an instance of `descriptor`.
///
/// # Errors
///
/// Fails before producing any output if a value does not fit its field, the
/// message sets an undeclared field or more than one member of a oneof, or
/// nesting exceeds the recursion limit.
pub fn encode(message: &Message, descriptor: Descriptor<'_>) -> Result<Vec<u8>> {
    config::encode(message, descriptor, &DEFAULT_CONFIG)
}

/// Exact number of bytes [`encode`] would produce.
pub fn encoded_len(message: &Message, descriptor: Descriptor<'_>) -> Result<usize> {
    config::encoded_len(message, descriptor, &DEFAULT_CONFIG)
}

/// Encode into the front of `buf`, returning the number of bytes written.
pub fn encode_into(buf: &mut [u8], message: &Message, descriptor: Descriptor<'_>) -> Result<usize> {
    config::encode_into(buf, message, descriptor, &DEFAULT_CONFIG)
}

/// Encode to an [`std::io::Write`] sink.
pub fn encode_to_writer<W: std::io::Write>(
    writer: W,
    message: &Message,
    descriptor: Descriptor<'_>,
) -> Result<()> {
    config::encode_to_writer(writer, message, descriptor, &DEFAULT_CONFIG)
}

/// Encode with a varint length prefix.
pub fn encode_length_delimited(message: &Message, descriptor: Descriptor<'_>) -> Result<Vec<u8>> {
    config::encode_length_delimited(message, descriptor, &DEFAULT_CONFIG)
}

/// Decode a message occupying all of `bytes`.
///
/// # Errors
///
/// Fails on malformed or truncated input, on a known field arriving with the
/// wrong wire type, and when nesting exceeds the recursion limit. Unknown
/// fields are not errors.
pub fn decode(bytes: &[u8], descriptor: Descriptor<'_>) -> Result<Message> {
    config::decode(bytes, descriptor, &DEFAULT_CONFIG)
}

/// Decode one length-prefixed message that must span all of `bytes`.
pub fn decode_length_delimited(bytes: &[u8], descriptor: Descriptor<'_>) -> Result<Message> {
    config::decode_length_delimited(bytes, descriptor, &DEFAULT_CONFIG)
}

/// Decode one length-prefixed message from the front of `bytes`, returning it
/// with the number of bytes consumed.
pub fn decode_length_delimited_prefix(
    bytes: &[u8],
    descriptor: Descriptor<'_>,
) -> Result<(Message, usize)> {
    config::decode_length_delimited_prefix(bytes, descriptor, &DEFAULT_CONFIG)
}

/// Read `reader` to the end and decode its contents.
pub fn decode_from_reader<R: std::io::Read>(reader: R, descriptor: Descriptor<'_>) -> Result<Message> {
    config::decode_from_reader(reader, descriptor, &DEFAULT_CONFIG)
}

#[cfg(test)]
mod proptest_config {
    use proptest::prelude::ProptestConfig;

    /// Fewer cases under Miri.
    pub(crate) fn proptest_cfg() -> ProptestConfig {
        ProptestConfig {
            cases: if cfg!(miri) { 8 } else { 256 },
            failure_persistence: None,
            ..ProptestConfig::default()
        }
    }
}
