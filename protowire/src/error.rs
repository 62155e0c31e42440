//! Error types and helpers.
use {
    crate::wire::WireType,
    core::{fmt, str::Utf8Error},
    thiserror::Error,
};

/// Chain of field numbers leading from the outermost message to the field
/// where a nested failure happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<u32>);

impl FieldPath {
    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut numbers = self.0.iter();
        if let Some(first) = numbers.next() {
            write!(f, "{first}")?;
        }
        for number in numbers {
            write!(f, ".{number}")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed varint at offset {offset}")]
    MalformedVarint { offset: usize },
    #[error("Input truncated in value starting at offset {offset}")]
    TruncatedInput { offset: usize },
    #[error("{remaining} trailing bytes after message ending at offset {offset}")]
    TrailingGarbage { offset: usize, remaining: usize },
    #[error(
        "Field {number} expects wire type {expected}, found {actual} at offset {offset}"
    )]
    WireTypeMismatch {
        number: u32,
        expected: WireType,
        actual: WireType,
        offset: usize,
    },
    #[error("Unsupported wire type {wire_type} at offset {offset}")]
    UnsupportedWireType { wire_type: WireType, offset: usize },
    #[error("Invalid wire type {value} at offset {offset}")]
    InvalidWireType { value: u8, offset: usize },
    #[error("Invalid field number {number} at offset {offset}")]
    InvalidFieldNumber { number: u64, offset: usize },
    #[error("Field {number} of type {expected} cannot encode a {found} value")]
    UnencodableValue {
        number: u32,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Value {value} does not fit field {number} of type {field_type}")]
    IntegerOverflow {
        number: u32,
        field_type: &'static str,
        value: i128,
    },
    #[error("Field {0} is not declared by the message descriptor")]
    UnknownField(u32),
    #[error("Oneof `{oneof}` has both field {first} and field {second} set")]
    OneofConflict {
        oneof: String,
        first: u32,
        second: u32,
    },
    #[error("Message nesting exceeds recursion limit of {limit}")]
    RecursionLimitExceeded { limit: usize },
    #[error("Declared length {len} at offset {offset} exceeds limit of {limit} bytes")]
    LengthLimit {
        len: u64,
        limit: usize,
        offset: usize,
    },
    #[error("Field {number} holds invalid UTF-8 at offset {offset}")]
    InvalidUtf8 {
        number: u32,
        offset: usize,
        #[source]
        source: Utf8Error,
    },
    #[error("Attempting to write {0} bytes")]
    WriteSizeLimit(usize),
    #[error("Message type `{0}` is not registered")]
    UnknownMessageType(String),
    #[error("Value {value} is not a member of enum `{name}`")]
    UnknownEnumValue { name: &'static str, value: i32 },
    #[error("Expected a {expected} value, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("In field {path}: {source}")]
    InField {
        path: FieldPath,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Attribute this error to field `number` of the enclosing message.
    ///
    /// Repeated calls while unwinding nested messages build the full path,
    /// outermost field first.
    #[cold]
    pub fn in_field(self, number: u32) -> Self {
        match self {
            Error::InField { mut path, source } => {
                path.0.insert(0, number);
                Error::InField { path, source }
            }
            other => Error::InField {
                path: FieldPath(vec![number]),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with any field path context stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::InField { source, .. } => source.root(),
            other => other,
        }
    }

    /// Field numbers leading to the failure. Empty for top-level failures.
    pub fn field_path(&self) -> &[u32] {
        match self {
            Error::InField { path, .. } => path.as_slice(),
            _ => &[],
        }
    }

    /// Byte offset of the failure in the decoded input, when known.
    pub fn offset(&self) -> Option<usize> {
        match *self.root() {
            Error::MalformedVarint { offset }
            | Error::TruncatedInput { offset }
            | Error::TrailingGarbage { offset, .. }
            | Error::WireTypeMismatch { offset, .. }
            | Error::UnsupportedWireType { offset, .. }
            | Error::InvalidWireType { offset, .. }
            | Error::InvalidFieldNumber { offset, .. }
            | Error::LengthLimit { offset, .. }
            | Error::InvalidUtf8 { offset, .. } => Some(offset),
            _ => None,
        }
    }

    /// Shift positional offsets by `base`.
    ///
    /// Used when a primitive decoded relative to a sub-slice reports back to
    /// a cursor that knows the absolute position.
    pub(crate) fn at_base(self, base: usize) -> Self {
        match self {
            Error::MalformedVarint { offset } => Error::MalformedVarint {
                offset: offset + base,
            },
            Error::TruncatedInput { offset } => Error::TruncatedInput {
                offset: offset + base,
            },
            other => other,
        }
    }
}

#[cold]
pub const fn malformed_varint(offset: usize) -> Error {
    Error::MalformedVarint { offset }
}

#[cold]
pub const fn truncated_input(offset: usize) -> Error {
    Error::TruncatedInput { offset }
}

#[cold]
pub const fn trailing_garbage(offset: usize, remaining: usize) -> Error {
    Error::TrailingGarbage { offset, remaining }
}

#[cold]
pub const fn wire_type_mismatch(
    number: u32,
    expected: WireType,
    actual: WireType,
    offset: usize,
) -> Error {
    Error::WireTypeMismatch {
        number,
        expected,
        actual,
        offset,
    }
}

#[cold]
pub const fn unsupported_wire_type(wire_type: WireType, offset: usize) -> Error {
    Error::UnsupportedWireType { wire_type, offset }
}

#[cold]
pub const fn invalid_wire_type(value: u8, offset: usize) -> Error {
    Error::InvalidWireType { value, offset }
}

#[cold]
pub const fn invalid_field_number(number: u64, offset: usize) -> Error {
    Error::InvalidFieldNumber { number, offset }
}

#[cold]
pub const fn unencodable_value(number: u32, expected: &'static str, found: &'static str) -> Error {
    Error::UnencodableValue {
        number,
        expected,
        found,
    }
}

#[cold]
pub const fn integer_overflow(number: u32, field_type: &'static str, value: i128) -> Error {
    Error::IntegerOverflow {
        number,
        field_type,
        value,
    }
}

#[cold]
pub const fn recursion_limit_exceeded(limit: usize) -> Error {
    Error::RecursionLimitExceeded { limit }
}

#[cold]
pub const fn length_limit(len: u64, limit: usize, offset: usize) -> Error {
    Error::LengthLimit { len, limit, offset }
}

#[cold]
pub const fn write_size_limit(len: usize) -> Error {
    Error::WriteSizeLimit(len)
}

#[cold]
pub const fn unexpected_value(expected: &'static str, found: &'static str) -> Error {
    Error::UnexpectedValue { expected, found }
}

/// Failures raised while defining message types or assembling a registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Message `{message}` declares field number {number} more than once")]
    DuplicateFieldNumber { message: String, number: u32 },
    #[error("Message `{message}` declares field name `{name}` more than once")]
    DuplicateFieldName { message: String, name: String },
    #[error("Message `{message}` uses field number {number} outside 1..=536870911")]
    InvalidFieldNumber { message: String, number: u32 },
    #[error("Message `{message}` uses reserved field number {number}")]
    ReservedFieldNumber { message: String, number: u32 },
    #[error(
        "Field {number} of `{message}` declares wire type {declared}, but its type implies \
         {expected}"
    )]
    WireTypeMismatch {
        message: String,
        number: u32,
        expected: WireType,
        declared: WireType,
    },
    #[error("Field {number} of `{message}` cannot be packed")]
    InvalidPacked { message: String, number: u32 },
    #[error("Field {number} of `{message}` has an invalid map key type")]
    InvalidMapKey { message: String, number: u32 },
    #[error("Field {number} of `{message}` has a map as its map value type")]
    InvalidMapValue { message: String, number: u32 },
    #[error("Oneof `{oneof}` of `{message}` names undeclared field {number}")]
    UnknownOneofMember {
        message: String,
        oneof: String,
        number: u32,
    },
    #[error("Oneof `{oneof}` of `{message}` cannot contain repeated or map field {number}")]
    RepeatedOneofMember {
        message: String,
        oneof: String,
        number: u32,
    },
    #[error("Field {number} of `{message}` belongs to more than one oneof")]
    OverlappingOneof { message: String, number: u32 },
    #[error("Message type `{0}` is registered more than once")]
    DuplicateMessage(String),
    #[error("Field {number} of `{message}` references unregistered message type `{target}`")]
    UnresolvedMessage {
        message: String,
        number: u32,
        target: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_field_builds_outermost_first_path() {
        let err = truncated_input(7).in_field(2).in_field(5).in_field(1);
        assert_eq!(err.field_path(), &[1, 5, 2]);
        assert!(matches!(err.root(), Error::TruncatedInput { offset: 7 }));
        assert_eq!(err.offset(), Some(7));
        assert_eq!(err.to_string(), "In field 1.5.2: Input truncated in value starting at offset 7");
    }

    #[test]
    fn top_level_errors_have_empty_path() {
        let err = Error::UnknownField(9);
        assert!(err.field_path().is_empty());
        assert_eq!(err.offset(), None);
    }

    #[test]
    fn at_base_shifts_only_positional_varint_errors() {
        assert!(matches!(
            malformed_varint(0).at_base(12),
            Error::MalformedVarint { offset: 12 }
        ));
        assert!(matches!(
            write_size_limit(3).at_base(12),
            Error::WriteSizeLimit(3)
        ));
    }
}
