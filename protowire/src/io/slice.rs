use {
    super::Writer,
    crate::{
        error::{length_limit, truncated_input, write_size_limit, Result},
        varint::decode_varint,
    },
    core::mem,
};

/// Writer implementation for a fixed buffer. Each write advances the slice
/// past the written bytes, like [`std::io::Write`] does for `&mut [u8]`.
///
/// Writes that do not fit fail with
/// [`Error::WriteSizeLimit`](crate::Error::WriteSizeLimit) and leave the
/// buffer untouched.
impl Writer for &mut [u8] {
    #[inline]
    fn write(&mut self, src: &[u8]) -> Result<()> {
        if self.len() < src.len() {
            return Err(write_size_limit(src.len()));
        }
        let (dst, rest) = mem::take(self).split_at_mut(src.len());
        dst.copy_from_slice(src);
        *self = rest;
        Ok(())
    }
}

/// Decode cursor over an in-memory buffer.
///
/// Tracks the absolute byte offset of the cursor so that errors raised while
/// decoding nested payloads point into the original input.
#[derive(Debug, Clone)]
pub struct SliceReader<'de> {
    buf: &'de [u8],
    pos: usize,
    base: usize,
}

impl<'de> SliceReader<'de> {
    pub const fn new(buf: &'de [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            base: 0,
        }
    }

    /// Absolute offset of the cursor in the original input.
    #[inline(always)]
    pub const fn position(&self) -> usize {
        self.base + self.pos
    }

    #[inline(always)]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn as_slice(&self) -> &'de [u8] {
        &self.buf[self.pos..]
    }

    /// Local cursor position, for use with [`SliceReader::slice`].
    #[inline(always)]
    pub(crate) const fn mark(&self) -> usize {
        self.pos
    }

    /// Bytes between two marks taken from this reader.
    #[inline]
    pub(crate) fn slice(&self, start: usize, end: usize) -> &'de [u8] {
        &self.buf[start..end]
    }

    #[inline]
    pub fn read_byte(&mut self) -> Result<u8> {
        let Some(&byte) = self.buf.get(self.pos) else {
            return Err(truncated_input(self.position()));
        };
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let Some((chunk, _)) = self.as_slice().split_first_chunk::<N>() else {
            return Err(truncated_input(self.position()));
        };
        self.pos += N;
        Ok(*chunk)
    }

    /// Borrow exactly `len` bytes and advance past them.
    #[inline]
    pub fn borrow_exact(&mut self, len: usize) -> Result<&'de [u8]> {
        let Some(chunk) = self.as_slice().get(..len) else {
            return Err(truncated_input(self.position()));
        };
        self.pos += len;
        Ok(chunk)
    }

    #[inline]
    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.position();
        let (value, len) = decode_varint(self.as_slice()).map_err(|e| e.at_base(start))?;
        self.pos += len;
        Ok(value)
    }

    /// Read a varint length prefix, checked against `max_length` and the
    /// remaining input.
    #[inline]
    pub fn read_length(&mut self, max_length: usize) -> Result<usize> {
        let start = self.position();
        let len = self.read_varint()?;
        match usize::try_from(len) {
            Ok(len) if len <= max_length => Ok(len),
            _ => Err(length_limit(len, max_length, start)),
        }
    }

    /// Read a length-delimited payload and return a reader windowed over it.
    ///
    /// The returned reader reports offsets relative to the original input.
    pub fn read_length_delimited(&mut self, max_length: usize) -> Result<SliceReader<'de>> {
        let len = self.read_length(max_length)?;
        let base = self.position();
        let buf = self.borrow_exact(len)?;
        Ok(SliceReader { buf, pos: 0, base })
    }
}
