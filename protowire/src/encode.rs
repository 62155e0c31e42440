//! Encoder.
//!
//! Encoding runs in two passes. The size pass ([`encoded_len`]) walks the
//! message, validates every value against its descriptor and computes the
//! exact output length. The write pass ([`write_message`]) then emits bytes,
//! so no invalid message ever produces partial output.
//!
//! Recognized fields are written in descriptor declaration order, followed
//! by unknown fields in the order they were captured.
use {
    crate::{
        config::Config,
        error::{recursion_limit_exceeded, unencodable_value, Error, Result},
        io::Writer,
        message::{MapKey, Message, Value},
        schema::{Descriptor, FieldDescriptor, FieldType, MapEntry},
        varint::{varint_len, write_varint},
        wire::{Tag, WireType},
    },
    tracing::debug,
};

const MAP_KEY: u32 = 1;
const MAP_VALUE: u32 = 2;

#[inline(always)]
const fn length_delimited_len(len: usize) -> usize {
    varint_len(len as u64) + len
}

/// Size of `message` encoded with `descriptor`, validating every value.
pub(crate) fn encoded_len(
    message: &Message,
    descriptor: Descriptor<'_>,
    config: &Config,
) -> Result<usize> {
    message_len(message, descriptor, config, 0)
}

fn check_depth(depth: usize, config: &Config) -> Result<()> {
    if depth > config.recursion_limit() {
        debug!(limit = config.recursion_limit(), "recursion limit hit while encoding");
        return Err(recursion_limit_exceeded(config.recursion_limit()));
    }
    Ok(())
}

/// Reject values for undeclared fields and oneofs with more than one member set.
fn check_fields(message: &Message, descriptor: Descriptor<'_>) -> Result<()> {
    if let Some((number, _)) = message
        .iter()
        .find(|&(number, _)| descriptor.field(number).is_none())
    {
        return Err(Error::UnknownField(number));
    }
    for oneof in descriptor.oneofs() {
        let mut set = oneof.fields().iter().filter(|&&number| message.contains(number));
        if let (Some(&first), Some(&second)) = (set.next(), set.next()) {
            return Err(Error::OneofConflict {
                oneof: oneof.name().to_owned(),
                first,
                second,
            });
        }
    }
    Ok(())
}

fn message_len(
    message: &Message,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<usize> {
    check_depth(depth, config)?;
    check_fields(message, descriptor)?;
    let mut len = message.unknown_fields().encoded_len();
    for field in descriptor.fields() {
        if let Some(value) = message.get(field.number()) {
            len += field_len(field, value, descriptor, config, depth)?;
        }
    }
    Ok(len)
}

#[cold]
fn shape_mismatch(field: &FieldDescriptor, value: &Value) -> Error {
    let expected = if field.is_map() {
        "map"
    } else if field.is_repeated() {
        "list"
    } else {
        field.field_type().name()
    };
    unencodable_value(field.number(), expected, value.type_name())
}

fn field_len(
    field: &FieldDescriptor,
    value: &Value,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<usize> {
    let number = field.number();
    match (field.field_type(), value) {
        (FieldType::Map(entry), Value::Map(entries)) => {
            let tag_len = Tag::new(number, WireType::LengthDelimited).encoded_len();
            entries.iter().try_fold(0, |len, (key, value)| {
                let entry_len = entry_len(entry, key, value, descriptor, config, depth)
                    .map_err(|e| e.in_field(number))?;
                Ok(len + tag_len + length_delimited_len(entry_len))
            })
        }
        (FieldType::Map(_), _) => Err(shape_mismatch(field, value)),
        (field_type, Value::List(items)) if field.is_repeated() => {
            if items.is_empty() {
                return Ok(0);
            }
            if field.is_packed() {
                let payload = packed_len(field, items)?;
                return Ok(Tag::new(number, WireType::LengthDelimited).encoded_len()
                    + length_delimited_len(payload));
            }
            let tag_len = field.element_tag().encoded_len();
            items.iter().try_fold(0, |len, item| {
                Ok(len + tag_len + element_len(field_type, number, item, descriptor, config, depth)?)
            })
        }
        (field_type, value) if !field.is_repeated() && !matches!(value, Value::List(_) | Value::Map(_)) => {
            Ok(field.element_tag().encoded_len()
                + element_len(field_type, number, value, descriptor, config, depth)?)
        }
        _ => Err(shape_mismatch(field, value)),
    }
}

fn packed_len(field: &FieldDescriptor, items: &[Value]) -> Result<usize> {
    items.iter().try_fold(0, |len, item| {
        Ok(len + field.field_type().to_wire_value(field.number(), item)?.encoded_len())
    })
}

/// Length of one value without its tag.
fn element_len(
    field_type: &FieldType,
    number: u32,
    value: &Value,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<usize> {
    match (field_type, value) {
        (FieldType::Bytes | FieldType::String, Value::Bytes(bytes)) => {
            Ok(length_delimited_len(bytes.len()))
        }
        (FieldType::String, Value::String(s)) => Ok(length_delimited_len(s.len())),
        (FieldType::Message(name), Value::Message(message)) => {
            let nested = descriptor.resolve(name)?;
            let len = message_len(message, nested, config, depth + 1)
                .map_err(|e| e.in_field(number))?;
            Ok(length_delimited_len(len))
        }
        (FieldType::Bytes | FieldType::String | FieldType::Message(_) | FieldType::Map(_), _) => {
            Err(unencodable_value(number, field_type.name(), value.type_name()))
        }
        (scalar, value) => Ok(scalar.to_wire_value(number, value)?.encoded_len()),
    }
}

fn map_key_len(key_type: &FieldType, key: &MapKey) -> Result<usize> {
    match key {
        MapKey::String(s) if *key_type == FieldType::String => Ok(length_delimited_len(s.len())),
        MapKey::String(_) => Err(unencodable_value(MAP_KEY, key_type.name(), "string")),
        other => Ok(key_type
            .to_wire_value(MAP_KEY, &Value::from(other.clone()))?
            .encoded_len()),
    }
}

/// Length of one map entry message. Key and value are always written, even
/// when they hold default values.
fn entry_len(
    entry: &MapEntry,
    key: &MapKey,
    value: &Value,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<usize> {
    let key_len = Tag::new(MAP_KEY, entry.key.wire_type()).encoded_len() + map_key_len(&entry.key, key)?;
    let value_len = Tag::new(MAP_VALUE, entry.value.wire_type()).encoded_len()
        + element_len(&entry.value, MAP_VALUE, value, descriptor, config, depth + 1)?;
    Ok(key_len + value_len)
}

/// Write `message`. The caller must have validated it with [`encoded_len`].
pub(crate) fn write_message<W: Writer + ?Sized>(
    writer: &mut W,
    message: &Message,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<()> {
    for field in descriptor.fields() {
        if let Some(value) = message.get(field.number()) {
            write_field(writer, field, value, descriptor, config, depth)?;
        }
    }
    for unknown in message.unknown_fields() {
        writer.write(unknown.tag())?;
        writer.write(unknown.value())?;
    }
    Ok(())
}

fn write_field<W: Writer + ?Sized>(
    writer: &mut W,
    field: &FieldDescriptor,
    value: &Value,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<()> {
    let number = field.number();
    match (field.field_type(), value) {
        (FieldType::Map(entry), Value::Map(entries)) => {
            for (key, value) in entries {
                Tag::new(number, WireType::LengthDelimited).write(writer)?;
                write_varint(
                    writer,
                    entry_len(entry, key, value, descriptor, config, depth)? as u64,
                )?;
                Tag::new(MAP_KEY, entry.key.wire_type()).write(writer)?;
                write_map_key(writer, &entry.key, key)?;
                Tag::new(MAP_VALUE, entry.value.wire_type()).write(writer)?;
                write_element(writer, &entry.value, MAP_VALUE, value, descriptor, config, depth + 1)?;
            }
        }
        (field_type, Value::List(items)) if field.is_repeated() => {
            if items.is_empty() {
                return Ok(());
            }
            if field.is_packed() {
                Tag::new(number, WireType::LengthDelimited).write(writer)?;
                write_varint(writer, packed_len(field, items)? as u64)?;
                for item in items {
                    field_type.to_wire_value(number, item)?.write(writer)?;
                }
                return Ok(());
            }
            for item in items {
                field.element_tag().write(writer)?;
                write_element(writer, field_type, number, item, descriptor, config, depth)?;
            }
        }
        (field_type, value) => {
            field.element_tag().write(writer)?;
            write_element(writer, field_type, number, value, descriptor, config, depth)?;
        }
    }
    Ok(())
}

#[inline]
fn write_length_delimited<W: Writer + ?Sized>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    write_varint(writer, bytes.len() as u64)?;
    writer.write(bytes)
}

fn write_element<W: Writer + ?Sized>(
    writer: &mut W,
    field_type: &FieldType,
    number: u32,
    value: &Value,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<()> {
    match (field_type, value) {
        (_, Value::Bytes(bytes)) => write_length_delimited(writer, bytes),
        (_, Value::String(s)) => write_length_delimited(writer, s.as_bytes()),
        (FieldType::Message(name), Value::Message(message)) => {
            let nested = descriptor.resolve(name)?;
            let len = message_len(message, nested, config, depth + 1)?;
            write_varint(writer, len as u64)?;
            write_message(writer, message, nested, config, depth + 1)
                .map_err(|e| e.in_field(number))
        }
        (scalar, value) => scalar.to_wire_value(number, value)?.write(writer),
    }
}

fn write_map_key<W: Writer + ?Sized>(writer: &mut W, key_type: &FieldType, key: &MapKey) -> Result<()> {
    match key {
        MapKey::String(s) => write_length_delimited(writer, s.as_bytes()),
        other => key_type
            .to_wire_value(MAP_KEY, &Value::from(other.clone()))?
            .write(writer),
    }
}
