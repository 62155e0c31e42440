//! Wire types, tags and the fixed-width primitives built on them.
use {
    crate::{
        error::{invalid_field_number, invalid_wire_type, unsupported_wire_type, Result},
        io::{SliceReader, Writer},
        varint::{varint_len, write_varint},
    },
    core::{fmt, ops::RangeInclusive},
};

/// Smallest legal field number.
pub const MIN_FIELD_NUMBER: u32 = 1;
/// Largest legal field number, `2^29 - 1`.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
/// Field numbers reserved for the protocol implementation.
pub const RESERVED_FIELD_NUMBERS: RangeInclusive<u32> = 19000..=19999;

/// How the bytes following a tag are laid out.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    #[inline(always)]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            3 => Some(Self::StartGroup),
            4 => Some(Self::EndGroup),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn is_group(self) -> bool {
        matches!(self, Self::StartGroup | Self::EndGroup)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Varint => "VARINT",
            Self::Fixed64 => "FIXED64",
            Self::LengthDelimited => "LENGTH_DELIMITED",
            Self::StartGroup => "START_GROUP",
            Self::EndGroup => "END_GROUP",
            Self::Fixed32 => "FIXED32",
        })
    }
}

/// Leading varint of every field record: `(number << 3) | wire_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub number: u32,
    pub wire_type: WireType,
}

impl Tag {
    #[inline(always)]
    pub const fn new(number: u32, wire_type: WireType) -> Self {
        Self { number, wire_type }
    }

    #[inline(always)]
    pub const fn to_u64(self) -> u64 {
        ((self.number as u64) << 3) | self.wire_type as u64
    }

    #[inline(always)]
    pub const fn encoded_len(self) -> usize {
        varint_len(self.to_u64())
    }

    #[inline]
    pub fn write<W: Writer + ?Sized>(self, writer: &mut W) -> Result<()> {
        write_varint(writer, self.to_u64())
    }

    /// Read a tag, rejecting wire types 6 and 7 and field numbers outside
    /// `1..=2^29-1`.
    pub fn read(reader: &mut SliceReader<'_>) -> Result<Self> {
        let offset = reader.position();
        let raw = reader.read_varint()?;
        let Some(wire_type) = WireType::from_u8((raw & 0x7) as u8) else {
            return Err(invalid_wire_type((raw & 0x7) as u8, offset));
        };
        let number = raw >> 3;
        if number < u64::from(MIN_FIELD_NUMBER) || number > u64::from(MAX_FIELD_NUMBER) {
            return Err(invalid_field_number(number, offset));
        }
        Ok(Self::new(number as u32, wire_type))
    }
}

#[inline]
pub fn write_fixed32<W: Writer + ?Sized>(writer: &mut W, value: u32) -> Result<()> {
    writer.write(&value.to_le_bytes())
}

#[inline]
pub fn write_fixed64<W: Writer + ?Sized>(writer: &mut W, value: u64) -> Result<()> {
    writer.write(&value.to_le_bytes())
}

#[inline]
pub fn read_fixed32(reader: &mut SliceReader<'_>) -> Result<u32> {
    reader.read_array().map(u32::from_le_bytes)
}

#[inline]
pub fn read_fixed64(reader: &mut SliceReader<'_>) -> Result<u64> {
    reader.read_array().map(u64::from_le_bytes)
}

/// Consume one value of `wire_type` without interpreting it and return its
/// raw bytes, including the length prefix of length-delimited values.
///
/// Groups are not supported and fail with
/// [`Error::UnsupportedWireType`](crate::Error::UnsupportedWireType).
pub fn skip_value<'de>(
    reader: &mut SliceReader<'de>,
    wire_type: WireType,
    max_length: usize,
) -> Result<&'de [u8]> {
    let start = reader.mark();
    match wire_type {
        WireType::Varint => {
            reader.read_varint()?;
        }
        WireType::Fixed64 => {
            reader.borrow_exact(8)?;
        }
        WireType::Fixed32 => {
            reader.borrow_exact(4)?;
        }
        WireType::LengthDelimited => {
            reader.read_length_delimited(max_length)?;
        }
        WireType::StartGroup | WireType::EndGroup => {
            return Err(unsupported_wire_type(wire_type, reader.position()));
        }
    }
    Ok(reader.slice(start, reader.mark()))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::Error, proptest_config::proptest_cfg},
        proptest::prelude::*,
    };

    #[test]
    fn tag_bytes() {
        assert_eq!(Tag::new(1, WireType::Varint).to_u64(), 0x08);
        assert_eq!(Tag::new(2, WireType::LengthDelimited).to_u64(), 0x12);
        assert_eq!(Tag::new(3, WireType::LengthDelimited).to_u64(), 0x1a);
        assert_eq!(Tag::new(16, WireType::Varint).encoded_len(), 2);
    }

    #[test]
    fn reject_wire_types_six_and_seven() {
        for raw in [0x0e, 0x0f] {
            let input = [raw];
            let err = Tag::read(&mut SliceReader::new(&input)).unwrap_err();
            assert!(matches!(err, Error::InvalidWireType { offset: 0, .. }));
        }
    }

    #[test]
    fn reject_field_number_zero() {
        let input = [0x00];
        assert!(matches!(
            Tag::read(&mut SliceReader::new(&input)),
            Err(Error::InvalidFieldNumber { number: 0, .. })
        ));
    }

    #[test]
    fn reject_field_number_above_max() {
        let mut input = Vec::new();
        write_varint(&mut input, (u64::from(MAX_FIELD_NUMBER) + 1) << 3).unwrap();
        assert!(matches!(
            Tag::read(&mut SliceReader::new(&input)),
            Err(Error::InvalidFieldNumber { .. })
        ));
    }

    #[test]
    fn skip_returns_raw_value_bytes() {
        let input = [0x96, 0x01, 0x03, b'a', b'b', b'c', 0x01, 0x02, 0x03, 0x04];
        let mut reader = SliceReader::new(&input);
        assert_eq!(
            skip_value(&mut reader, WireType::Varint, usize::MAX).unwrap(),
            &[0x96, 0x01]
        );
        assert_eq!(
            skip_value(&mut reader, WireType::LengthDelimited, usize::MAX).unwrap(),
            &[0x03, b'a', b'b', b'c']
        );
        assert_eq!(
            skip_value(&mut reader, WireType::Fixed32, usize::MAX).unwrap(),
            &[0x01, 0x02, 0x03, 0x04]
        );
        assert!(reader.is_empty());
    }

    #[test]
    fn skip_group_is_unsupported() {
        let mut reader = SliceReader::new(&[]);
        assert!(matches!(
            skip_value(&mut reader, WireType::StartGroup, usize::MAX),
            Err(Error::UnsupportedWireType {
                wire_type: WireType::StartGroup,
                ..
            })
        ));
    }

    #[test]
    fn fixed_width_is_little_endian() {
        let mut out = Vec::new();
        write_fixed32(&mut out, 0x0403_0201).unwrap();
        write_fixed64(&mut out, 0x0807_0605_0403_0201).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn tag_roundtrip(number in MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER, wire in 0u8..=5) {
            let tag = Tag::new(number, WireType::from_u8(wire).unwrap());
            let mut out = Vec::new();
            tag.write(&mut out).unwrap();
            prop_assert_eq!(out.len(), tag.encoded_len());
            let mut reader = SliceReader::new(&out);
            prop_assert_eq!(Tag::read(&mut reader).unwrap(), tag);
            prop_assert!(reader.is_empty());
        }

        #[test]
        fn fixed_roundtrip(a in any::<u32>(), b in any::<u64>()) {
            let mut out = Vec::new();
            write_fixed32(&mut out, a).unwrap();
            write_fixed64(&mut out, b).unwrap();
            let mut reader = SliceReader::new(&out);
            prop_assert_eq!(read_fixed32(&mut reader).unwrap(), a);
            prop_assert_eq!(read_fixed64(&mut reader).unwrap(), b);
        }
    }
}
