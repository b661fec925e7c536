//! Deflate (method 8), raw RFC 1951 streams without a zlib wrapper.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder as RawInflater;
use flate2::write::DeflateEncoder as RawDeflater;

use super::{CompressionMethod, Decoder, Encoder};

/// Level used when an entry does not ask for one.
pub const DEFAULT_LEVEL: u32 = 6;

/// Highest level; larger requests are lowered to it.
pub const MAX_LEVEL: u32 = 9;

/// Compresses into the entry's encryption layer.
pub struct DeflateEncoder<W: Write> {
    inner: RawDeflater<W>,
    level: u32,
}

impl<W: Write> DeflateEncoder<W> {
    /// Starts a stream at `level` (0 = stored blocks, 9 = smallest).
    pub fn new(output: W, level: Option<u32>) -> Self {
        let level = level.unwrap_or(DEFAULT_LEVEL).min(MAX_LEVEL);
        Self {
            inner: RawDeflater::new(output, Compression::new(level)),
            level,
        }
    }

    /// The effective level.
    pub fn level(&self) -> u32 {
        self.level
    }
}

impl<W: Write> std::fmt::Debug for DeflateEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateEncoder")
            .field("level", &self.level)
            .field("total_in", &self.inner.total_in())
            .field("total_out", &self.inner.total_out())
            .finish()
    }
}

impl<W: Write> Write for DeflateEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Encoder<W> for DeflateEncoder<W> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }

    fn finish(self: Box<Self>) -> io::Result<W> {
        self.inner.finish()
    }
}

/// Inflates an entry's payload.
///
/// The decoder reads ahead; the input must already be bounded to the
/// entry's compressed size.
pub struct DeflateDecoder<R> {
    inner: RawInflater<R>,
}

impl<R: Read> DeflateDecoder<R> {
    /// Wraps the compressed input.
    pub fn new(input: R) -> Self {
        Self {
            inner: RawInflater::new(input),
        }
    }
}

impl<R> std::fmt::Debug for DeflateDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateDecoder")
            .field("total_in", &self.inner.total_in())
            .field("total_out", &self.inner.total_out())
            .finish()
    }
}

impl<R: Read> Read for DeflateDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Decoder<R> for DeflateDecoder<R> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }

    fn into_inner(self: Box<Self>) -> R {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deflate(data: &[u8], level: Option<u32>) -> Vec<u8> {
        let mut encoder = Box::new(DeflateEncoder::new(Vec::new(), level));
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn inflate(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        DeflateDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_raw_stream_has_no_zlib_header() {
        let data = b"ZIP entries carry raw deflate streams. ".repeat(30);
        let compressed = deflate(&data, None);
        // A zlib stream would start with 0x78.
        assert_ne!(compressed[0], 0x78);
        assert!(compressed.len() < data.len());
        assert_eq!(inflate(&compressed), data);
    }

    #[test]
    fn test_levels() {
        assert_eq!(DeflateEncoder::new(Vec::new(), None).level(), DEFAULT_LEVEL);
        assert_eq!(DeflateEncoder::new(Vec::new(), Some(15)).level(), MAX_LEVEL);

        let data = vec![7u8; 4096];
        let stored_blocks = deflate(&data, Some(0));
        assert!(stored_blocks.len() > data.len());
        assert_eq!(inflate(&stored_blocks), data);
    }
}
