//! Runtime configuration and the configurable encode/decode entry points.
//!
//! The top-level functions in the crate root use [`Config::default`]. Use the
//! functions here to tighten limits when decoding untrusted input.
//!
//! ```
//! # use protowire::{config::{self, Config}, schema::{define_message, FieldDescriptor, FieldType, Registry}, Error, Message};
//! let registry = Registry::new([define_message(
//!     "Node",
//!     [FieldDescriptor::new(1, "child", FieldType::message("Node"))],
//! )?])?;
//! let node = registry.descriptor("Node")?;
//!
//! let mut deep = Message::new();
//! for _ in 0..10 {
//!     deep = Message::new().with(1, deep);
//! }
//! let bytes = protowire::encode(&deep, node)?;
//!
//! let config = Config::default().with_recursion_limit(5);
//! assert!(matches!(
//!     config::decode(&bytes, node, &config).unwrap_err().root(),
//!     Error::RecursionLimitExceeded { limit: 5 }
//! ));
//! # Ok::<(), Error>(())
//! ```
use {
    crate::{
        decode::decode_message,
        encode::{encoded_len as validated_len, write_message},
        error::{length_limit, trailing_garbage, write_size_limit, Result},
        io::{IoWriter, SliceReader},
        message::Message,
        schema::Descriptor,
        varint::{varint_len, write_varint},
    },
    std::io::{Read, Write},
};

/// Default bound on message nesting.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;
/// Default bound on any single declared length, 2 GiB - 1.
pub const DEFAULT_MAX_LENGTH: usize = i32::MAX as usize;

/// Codec limits and policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    recursion_limit: usize,
    strict: bool,
    max_length: usize,
    validate_utf8: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            strict: true,
            max_length: DEFAULT_MAX_LENGTH,
            validate_utf8: false,
        }
    }

    /// Maximum nesting depth of embedded messages.
    pub const fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Whether length-delimited decoding rejects bytes after the message.
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Largest accepted length prefix, and the most bytes
    /// [`decode_from_reader`] will read.
    pub const fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Reject string fields that are not valid UTF-8 instead of keeping them
    /// as bytes.
    pub const fn with_validate_utf8(mut self, validate: bool) -> Self {
        self.validate_utf8 = validate;
        self
    }

    #[inline(always)]
    pub const fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    #[inline(always)]
    pub const fn strict(&self) -> bool {
        self.strict
    }

    #[inline(always)]
    pub const fn max_length(&self) -> usize {
        self.max_length
    }

    #[inline(always)]
    pub const fn validate_utf8(&self) -> bool {
        self.validate_utf8
    }
}

/// Exact encoded size of `message`.
///
/// Also validates the message; every error [`encode`] can return is returned
/// here first.
pub fn encoded_len(message: &Message, descriptor: Descriptor<'_>, config: &Config) -> Result<usize> {
    validated_len(message, descriptor, config)
}

pub fn encode(message: &Message, descriptor: Descriptor<'_>, config: &Config) -> Result<Vec<u8>> {
    let len = validated_len(message, descriptor, config)?;
    let mut buf = Vec::with_capacity(len);
    write_message(&mut buf, message, descriptor, config, 0)?;
    Ok(buf)
}

/// Encode into the front of `buf`, returning the number of bytes written.
///
/// Fails with [`Error::WriteSizeLimit`](crate::Error::WriteSizeLimit) without
/// writing anything if `buf` is too small.
pub fn encode_into(
    buf: &mut [u8],
    message: &Message,
    descriptor: Descriptor<'_>,
    config: &Config,
) -> Result<usize> {
    let len = validated_len(message, descriptor, config)?;
    if buf.len() < len {
        return Err(write_size_limit(len));
    }
    let mut writer = &mut buf[..len];
    write_message(&mut writer, message, descriptor, config, 0)?;
    Ok(len)
}

/// Encode to an [`std::io::Write`] sink. Nothing is written if the message
/// does not validate.
pub fn encode_to_writer<W: Write>(
    writer: W,
    message: &Message,
    descriptor: Descriptor<'_>,
    config: &Config,
) -> Result<()> {
    validated_len(message, descriptor, config)?;
    write_message(&mut IoWriter::new(writer), message, descriptor, config, 0)
}

/// Encode with a varint length prefix, for framing several messages in one
/// stream.
pub fn encode_length_delimited(
    message: &Message,
    descriptor: Descriptor<'_>,
    config: &Config,
) -> Result<Vec<u8>> {
    let len = validated_len(message, descriptor, config)?;
    let mut buf = Vec::with_capacity(varint_len(len as u64) + len);
    write_varint(&mut buf, len as u64)?;
    write_message(&mut buf, message, descriptor, config, 0)?;
    Ok(buf)
}

/// Decode a message occupying all of `bytes`.
pub fn decode(bytes: &[u8], descriptor: Descriptor<'_>, config: &Config) -> Result<Message> {
    decode_message(&mut SliceReader::new(bytes), descriptor, config, 0)
}

/// Decode one length-prefixed message.
///
/// With [`Config::with_strict`] enabled (the default), bytes after the message
/// fail with [`Error::TrailingGarbage`](crate::Error::TrailingGarbage);
/// otherwise they are ignored.
pub fn decode_length_delimited(
    bytes: &[u8],
    descriptor: Descriptor<'_>,
    config: &Config,
) -> Result<Message> {
    let mut reader = SliceReader::new(bytes);
    let message = read_length_delimited(&mut reader, descriptor, config)?;
    if config.strict() && !reader.is_empty() {
        return Err(trailing_garbage(reader.position(), reader.remaining()));
    }
    Ok(message)
}

/// Decode one length-prefixed message from the front of `bytes`, returning
/// it together with the number of bytes consumed.
pub fn decode_length_delimited_prefix(
    bytes: &[u8],
    descriptor: Descriptor<'_>,
    config: &Config,
) -> Result<(Message, usize)> {
    let mut reader = SliceReader::new(bytes);
    let message = read_length_delimited(&mut reader, descriptor, config)?;
    Ok((message, reader.position()))
}

fn read_length_delimited(
    reader: &mut SliceReader<'_>,
    descriptor: Descriptor<'_>,
    config: &Config,
) -> Result<Message> {
    let mut payload = reader.read_length_delimited(config.max_length())?;
    decode_message(&mut payload, descriptor, config, 0)
}

/// Read `reader` to the end and decode its contents as one message.
///
/// At most [`Config::max_length`] bytes are buffered; longer input fails with
/// [`Error::LengthLimit`](crate::Error::LengthLimit).
pub fn decode_from_reader<R: Read>(
    reader: R,
    descriptor: Descriptor<'_>,
    config: &Config,
) -> Result<Message> {
    let limit = config.max_length();
    let mut buf = Vec::new();
    reader
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut buf)?;
    if buf.len() > limit {
        return Err(length_limit(buf.len() as u64, limit, 0));
    }
    decode(&buf, descriptor, config)
}
