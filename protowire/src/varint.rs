//! Base-128 varints and the zigzag transform.
//!
//! A varint stores an unsigned integer in groups of 7 bits, least significant
//! group first. Every byte except the last has its high bit (`0x80`) set. The
//! encoder always produces the minimal encoding; a `u64` takes at most
//! [`MAX_VARINT_LEN`] bytes.
use crate::{
    error::{malformed_varint, truncated_input, Result},
    io::Writer,
};

/// Longest legal encoding of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7f;

/// Number of bytes [`encode_varint`] emits for `value`.
#[inline(always)]
pub const fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Encode `value` as a minimal-length varint.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(varint_len(value));
    push_varint(&mut buf, value);
    buf
}

#[inline]
fn push_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= u64::from(CONTINUATION) {
        buf.push((value as u8 & PAYLOAD) | CONTINUATION);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Write `value` as a varint into `writer`.
#[inline]
pub fn write_varint<W: Writer + ?Sized>(writer: &mut W, mut value: u64) -> Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let mut len = 0;
    while value >= u64::from(CONTINUATION) {
        buf[len] = (value as u8 & PAYLOAD) | CONTINUATION;
        value >>= 7;
        len += 1;
    }
    buf[len] = value as u8;
    writer.write(&buf[..=len])
}

/// Decode a varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed. Offsets in errors are
/// relative to the start of `bytes`.
///
/// # Errors
///
/// - [`Error::TruncatedInput`](crate::Error::TruncatedInput) if `bytes` ends
///   before a byte without the continuation bit.
/// - [`Error::MalformedVarint`](crate::Error::MalformedVarint) if the tenth
///   byte still has the continuation bit set, or carries bits beyond the 64-bit
///   range.
#[inline]
pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(malformed_varint(0));
        }
        value |= u64::from(byte & PAYLOAD) << (7 * i);
        if byte & CONTINUATION == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(truncated_input(0))
}

/// Map a signed integer onto an unsigned one so that small magnitudes stay
/// short: `0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...`
#[inline(always)]
pub const fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline(always)]
pub const fn zigzag_decode(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}
