//! Per-type conversion between [`Value`]s and the wire representation of
//! non-length-delimited scalars.
use {
    super::FieldType,
    crate::{
        error::{integer_overflow, unencodable_value, unsupported_wire_type, Result},
        io::{SliceReader, Writer},
        message::Value,
        varint::{varint_len, write_varint, zigzag_decode, zigzag_encode},
        wire::{read_fixed32, read_fixed64, write_fixed32, write_fixed64, WireType},
    },
};

/// A scalar lowered to its wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WireValue {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
}

impl WireValue {
    #[inline(always)]
    pub(crate) const fn encoded_len(self) -> usize {
        match self {
            Self::Varint(value) => varint_len(value),
            Self::Fixed32(_) => 4,
            Self::Fixed64(_) => 8,
        }
    }

    #[inline]
    pub(crate) fn write<W: Writer + ?Sized>(self, writer: &mut W) -> Result<()> {
        match self {
            Self::Varint(value) => write_varint(writer, value),
            Self::Fixed32(value) => write_fixed32(writer, value),
            Self::Fixed64(value) => write_fixed64(writer, value),
        }
    }
}

/// Widen any integer variant so range checks are uniform.
#[inline]
fn as_integer(value: &Value) -> Option<i128> {
    match *value {
        Value::I32(v) | Value::Enum(v) => Some(v.into()),
        Value::I64(v) => Some(v.into()),
        Value::U32(v) => Some(v.into()),
        Value::U64(v) => Some(v.into()),
        _ => None,
    }
}

macro_rules! checked {
    ($number:expr, $field_type:expr, $value:expr => $target:ty) => {
        <$target>::try_from($value)
            .map_err(|_| integer_overflow($number, $field_type.name(), $value))?
    };
}

impl FieldType {
    /// Lower `value` for a field of this (non-length-delimited) type.
    ///
    /// Integer variants are accepted for any integral field type as long as
    /// the value fits its width.
    pub(crate) fn to_wire_value(&self, number: u32, value: &Value) -> Result<WireValue> {
        let mismatch = || unencodable_value(number, self.name(), value.type_name());
        Ok(match self {
            Self::Bool => match *value {
                Value::Bool(b) => WireValue::Varint(u64::from(b)),
                _ => return Err(mismatch()),
            },
            Self::Float => match *value {
                Value::F32(f) => WireValue::Fixed32(f.to_bits()),
                // Only doubles that survive narrowing exactly.
                Value::F64(f) if f.is_nan() || f64::from(f as f32) == f => {
                    WireValue::Fixed32((f as f32).to_bits())
                }
                _ => return Err(mismatch()),
            },
            Self::Double => match *value {
                Value::F64(f) => WireValue::Fixed64(f.to_bits()),
                Value::F32(f) => WireValue::Fixed64(f64::from(f).to_bits()),
                _ => return Err(mismatch()),
            },
            Self::Bytes | Self::String | Self::Message(_) | Self::Map(_) => {
                return Err(mismatch())
            }
            integral => {
                let v = as_integer(value).ok_or_else(mismatch)?;
                match integral {
                    // Negative int32 and enum values are sign-extended to 64 bits.
                    Self::Int32 | Self::Enum => {
                        WireValue::Varint(i64::from(checked!(number, self, v => i32)) as u64)
                    }
                    Self::Int64 => WireValue::Varint(checked!(number, self, v => i64) as u64),
                    Self::Uint32 => WireValue::Varint(checked!(number, self, v => u32).into()),
                    Self::Uint64 => WireValue::Varint(checked!(number, self, v => u64)),
                    Self::Sint32 => {
                        WireValue::Varint(zigzag_encode(checked!(number, self, v => i32).into()))
                    }
                    Self::Sint64 => WireValue::Varint(zigzag_encode(checked!(number, self, v => i64))),
                    Self::Fixed32 => WireValue::Fixed32(checked!(number, self, v => u32)),
                    Self::Sfixed32 => WireValue::Fixed32(checked!(number, self, v => i32) as u32),
                    Self::Fixed64 => WireValue::Fixed64(checked!(number, self, v => u64)),
                    Self::Sfixed64 => WireValue::Fixed64(checked!(number, self, v => i64) as u64),
                    _ => return Err(mismatch()),
                }
            }
        })
    }

    /// Read one scalar of this type and produce its canonical [`Value`].
    ///
    /// 32-bit varint types keep the low 32 bits of the decoded varint.
    pub(crate) fn read_scalar(&self, reader: &mut SliceReader<'_>) -> Result<Value> {
        Ok(match self.wire_type() {
            WireType::Varint => {
                let raw = reader.read_varint()?;
                match self {
                    Self::Int32 => Value::I32(raw as i32),
                    Self::Int64 => Value::I64(raw as i64),
                    Self::Uint32 => Value::U32(raw as u32),
                    Self::Uint64 => Value::U64(raw),
                    Self::Sint32 => Value::I32(zigzag_decode(u64::from(raw as u32)) as i32),
                    Self::Sint64 => Value::I64(zigzag_decode(raw)),
                    Self::Bool => Value::Bool(raw != 0),
                    _ => Value::Enum(raw as i32),
                }
            }
            WireType::Fixed32 => {
                let raw = read_fixed32(reader)?;
                match self {
                    Self::Fixed32 => Value::U32(raw),
                    Self::Sfixed32 => Value::I32(raw as i32),
                    _ => Value::F32(f32::from_bits(raw)),
                }
            }
            WireType::Fixed64 => {
                let raw = read_fixed64(reader)?;
                match self {
                    Self::Fixed64 => Value::U64(raw),
                    Self::Sfixed64 => Value::I64(raw as i64),
                    _ => Value::F64(f64::from_bits(raw)),
                }
            }
            wire_type => return Err(unsupported_wire_type(wire_type, reader.position())),
        })
    }
}
