use {
    super::Writer,
    crate::error::{Error, Result},
    std::io::Write,
};

/// Adapts any [`std::io::Write`] into a [`Writer`].
///
/// Writes go straight through to the inner sink; wrap it in a
/// [`std::io::BufWriter`] when the sink is unbuffered.
pub struct IoWriter<W> {
    inner: W,
}

impl<W: Write> IoWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Consume the [`IoWriter`] and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Writer for IoWriter<W> {
    #[inline]
    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.inner.write_all(src).map_err(Error::from)
    }
}
