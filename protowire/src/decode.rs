//! Decoder.
//!
//! A single left-to-right pass over the input. Each record is a tag followed
//! by a value whose layout is given by the tag's wire type. Recognized fields
//! are decoded and merged into the message under construction; anything else
//! is captured verbatim as an unknown field.
use {
    crate::{
        config::Config,
        error::{recursion_limit_exceeded, wire_type_mismatch, Error, Result},
        io::SliceReader,
        message::{MapKey, Message, UnknownField, Value},
        schema::{Descriptor, FieldDescriptor, FieldType, MapEntry},
        wire::{skip_value, Tag, WireType},
    },
    std::collections::BTreeMap,
    tracing::{debug, trace},
};

const MAP_KEY: u32 = 1;
const MAP_VALUE: u32 = 2;

/// Decode fields from `reader` until it is exhausted.
pub(crate) fn decode_message(
    reader: &mut SliceReader<'_>,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<Message> {
    if depth > config.recursion_limit() {
        debug!(limit = config.recursion_limit(), "recursion limit hit while decoding");
        return Err(recursion_limit_exceeded(config.recursion_limit()));
    }
    let mut message = Message::new();
    while !reader.is_empty() {
        let tag_start = reader.mark();
        let tag_offset = reader.position();
        let tag = Tag::read(reader)?;
        let Some(field) = descriptor.field(tag.number) else {
            let tag_bytes = reader.slice(tag_start, reader.mark()).to_vec();
            let value = skip_value(reader, tag.wire_type, config.max_length())?;
            trace!(
                message = descriptor.name(),
                number = tag.number,
                wire_type = %tag.wire_type,
                "retained unknown field"
            );
            message
                .unknown_fields_mut()
                .push(UnknownField::from_raw(tag, tag_bytes, value.to_vec()));
            continue;
        };
        if let Some(value) = read_field(reader, field, tag, tag_offset, descriptor, config, depth)? {
            message.merge_field(descriptor, field, value)?;
        }
    }
    Ok(message)
}

/// Read one occurrence of `field`. Returns `None` for an empty packed run.
fn read_field(
    reader: &mut SliceReader<'_>,
    field: &FieldDescriptor,
    tag: Tag,
    tag_offset: usize,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<Option<Value>> {
    let field_type = field.field_type();
    if tag.wire_type == field.wire_type() {
        let value = read_element(reader, field_type, field.number(), descriptor, config, depth)?;
        if field.is_packed() {
            trace!(number = field.number(), "accepted unpacked element for packed field");
        }
        return Ok(Some(if field.is_repeated() && !field.is_map() {
            Value::List(vec![value])
        } else {
            value
        }));
    }
    if field.is_repeated() && field_type.is_packable() && tag.wire_type == WireType::LengthDelimited {
        if !field.is_packed() {
            trace!(number = field.number(), "accepted packed run for unpacked field");
        }
        let mut payload = reader.read_length_delimited(config.max_length())?;
        let mut items = Vec::new();
        while !payload.is_empty() {
            items.push(field_type.read_scalar(&mut payload)?);
        }
        return Ok((!items.is_empty()).then_some(Value::List(items)));
    }
    Err(wire_type_mismatch(
        field.number(),
        field.wire_type(),
        tag.wire_type,
        tag_offset,
    ))
}

/// Read one value of `field_type` whose tag has already been consumed.
fn read_element(
    reader: &mut SliceReader<'_>,
    field_type: &FieldType,
    number: u32,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<Value> {
    Ok(match field_type {
        FieldType::Bytes => Value::Bytes(
            reader
                .read_length_delimited(config.max_length())?
                .as_slice()
                .to_vec(),
        ),
        FieldType::String => read_string(reader, number, config.validate_utf8(), config)?,
        FieldType::Message(name) => {
            let nested = descriptor.resolve(name)?;
            let mut payload = reader.read_length_delimited(config.max_length())?;
            let message = decode_message(&mut payload, nested, config, depth + 1)
                .map_err(|e| e.in_field(number))?;
            Value::Message(Box::new(message))
        }
        FieldType::Map(entry) => read_map_entry(reader, entry, descriptor, config, depth)
            .map_err(|e| e.in_field(number))?,
        scalar => scalar.read_scalar(reader)?,
    })
}

/// Strings that are not valid UTF-8 are kept as [`Value::Bytes`] unless
/// `validate` is set.
fn read_string(
    reader: &mut SliceReader<'_>,
    number: u32,
    validate: bool,
    config: &Config,
) -> Result<Value> {
    let payload = reader.read_length_delimited(config.max_length())?;
    let bytes = payload.as_slice();
    Ok(match core::str::from_utf8(bytes) {
        Ok(s) => Value::String(s.to_owned()),
        Err(source) if validate => {
            return Err(Error::InvalidUtf8 {
                number,
                offset: payload.position() + source.valid_up_to(),
                source,
            })
        }
        Err(_) => {
            debug!(number, len = bytes.len(), "retained non-UTF-8 string as bytes");
            Value::Bytes(bytes.to_vec())
        }
    })
}

/// Decode one map entry into a single-entry map. A missing key or value
/// takes its type's default.
fn read_map_entry(
    reader: &mut SliceReader<'_>,
    entry: &MapEntry,
    descriptor: Descriptor<'_>,
    config: &Config,
    depth: usize,
) -> Result<Value> {
    let mut payload = reader.read_length_delimited(config.max_length())?;
    let (mut key, mut value) = (None, None);
    while !payload.is_empty() {
        let tag_offset = payload.position();
        let tag = Tag::read(&mut payload)?;
        match tag.number {
            MAP_KEY if tag.wire_type == entry.key.wire_type() => {
                key = Some(match entry.key {
                    // Map keys must be valid UTF-8 regardless of configuration.
                    FieldType::String => read_string(&mut payload, MAP_KEY, true, config)?,
                    ref scalar => scalar.read_scalar(&mut payload)?,
                });
            }
            MAP_VALUE if tag.wire_type == entry.value.wire_type() => {
                value = Some(read_element(
                    &mut payload,
                    &entry.value,
                    MAP_VALUE,
                    descriptor,
                    config,
                    depth + 1,
                )?);
            }
            MAP_KEY => {
                return Err(wire_type_mismatch(
                    MAP_KEY,
                    entry.key.wire_type(),
                    tag.wire_type,
                    tag_offset,
                ))
            }
            MAP_VALUE => {
                return Err(wire_type_mismatch(
                    MAP_VALUE,
                    entry.value.wire_type(),
                    tag.wire_type,
                    tag_offset,
                ))
            }
            number => {
                trace!(number, "skipped unknown field in map entry");
                skip_value(&mut payload, tag.wire_type, config.max_length())?;
            }
        }
    }
    let key = MapKey::try_from(key.unwrap_or_else(|| entry.key.default_value()))?;
    let value = value.unwrap_or_else(|| entry.value.default_value());
    Ok(Value::Map(BTreeMap::from([(key, value)])))
}
