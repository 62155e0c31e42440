//! [`Writer`] implementations and the [`SliceReader`] decode cursor.
use crate::error::Result;

mod slice;
mod std_io;
mod vec;

pub use {slice::SliceReader, std_io::IoWriter};

/// Sink for encoded bytes.
///
/// The encoder computes the exact encoded size before it writes anything, so
/// implementations that can reject a write (fixed buffers, I/O sinks) only see
/// writes for messages that are already known to be encodable.
pub trait Writer {
    /// Write all of `src`.
    fn write(&mut self, src: &[u8]) -> Result<()>;

    #[inline(always)]
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }
}

impl<W: Writer + ?Sized> Writer for &mut W {
    #[inline(always)]
    fn write(&mut self, src: &[u8]) -> Result<()> {
        (**self).write(src)
    }

    #[inline(always)]
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        (**self).write_byte(byte)
    }
}
