//! Stored codec (no compression).

use std::io::{self, Read, Write};

use super::{CompressionMethod, Decoder, Encoder};

/// Passes data through unchanged.
#[derive(Debug)]
pub struct StoredEncoder<W> {
    inner: W,
}

impl<W: Write> StoredEncoder<W> {
    /// Creates a stored encoder.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for StoredEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Encoder<W> for StoredEncoder<W> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Stored
    }

    fn finish(self: Box<Self>) -> io::Result<W> {
        Ok(self.inner)
    }
}

/// Passes data through unchanged. The inner reader bounds the entry.
#[derive(Debug)]
pub struct StoredDecoder<R> {
    inner: R,
}

impl<R: Read> StoredDecoder<R> {
    /// Creates a stored decoder.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> Read for StoredDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Decoder<R> for StoredDecoder<R> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Stored
    }

    fn into_inner(self: Box<Self>) -> R {
        self.inner
    }
}
