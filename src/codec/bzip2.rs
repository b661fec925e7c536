//! BZip2 (method 12).
//!
//! Parallel bzip2 tools emit several concatenated streams for one entry;
//! the decoder reads them all.

use std::io::{self, Read, Write};

use bzip2::Compression;
use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;

use super::{CompressionMethod, Decoder, Encoder};

/// Block size in units of 100 kB when an entry does not ask for one.
pub const DEFAULT_LEVEL: u32 = 9;

/// Compresses into the entry's encryption layer.
pub struct Bzip2Encoder<W: Write> {
    inner: BzEncoder<W>,
}

impl<W: Write> Bzip2Encoder<W> {
    /// Starts a stream; `level` is the block size (1..=9, in 100 kB).
    pub fn new(output: W, level: Option<u32>) -> Self {
        let level = level.unwrap_or(DEFAULT_LEVEL).clamp(1, 9);
        Self {
            inner: BzEncoder::new(output, Compression::new(level)),
        }
    }
}

impl<W: Write> std::fmt::Debug for Bzip2Encoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bzip2Encoder")
            .field("total_in", &self.inner.total_in())
            .finish_non_exhaustive()
    }
}

impl<W: Write> Write for Bzip2Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Encoder<W> for Bzip2Encoder<W> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Bzip2
    }

    fn finish(self: Box<Self>) -> io::Result<W> {
        self.inner.finish()
    }
}

/// Decompresses one or more concatenated bzip2 streams.
pub struct Bzip2Decoder<R> {
    inner: MultiBzDecoder<R>,
}

impl<R: Read> Bzip2Decoder<R> {
    /// Wraps the compressed input.
    pub fn new(input: R) -> Self {
        Self {
            inner: MultiBzDecoder::new(input),
        }
    }
}

impl<R> std::fmt::Debug for Bzip2Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bzip2Decoder").finish_non_exhaustive()
    }
}

impl<R: Read> Read for Bzip2Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Decoder<R> for Bzip2Decoder<R> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Bzip2
    }

    fn into_inner(self: Box<Self>) -> R {
        self.inner.into_inner()
    }
}
