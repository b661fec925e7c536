//! Zstandard (method 93).

use std::io::{self, BufReader, Read, Write};

use zstd::stream::read::Decoder as FrameReader;
use zstd::stream::write::Encoder as FrameWriter;

use super::{CompressionMethod, Decoder, Encoder};

/// Level used when an entry does not ask for one.
pub const DEFAULT_LEVEL: u32 = 3;

/// Highest level; larger requests are lowered to it.
pub const MAX_LEVEL: u32 = 22;

/// Compresses into the entry's encryption layer.
pub struct ZstdEncoder<W: Write> {
    inner: FrameWriter<'static, W>,
}

impl<W: Write> ZstdEncoder<W> {
    /// Starts a frame at `level` (1..=22). The frame records its content
    /// size only when known, which it never is for streamed entries.
    pub fn new(output: W, level: Option<u32>) -> io::Result<Self> {
        let level = level.unwrap_or(DEFAULT_LEVEL).clamp(1, MAX_LEVEL);
        Ok(Self {
            inner: FrameWriter::new(output, level as i32)?,
        })
    }
}

impl<W: Write> std::fmt::Debug for ZstdEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdEncoder").finish_non_exhaustive()
    }
}

impl<W: Write> Write for ZstdEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Encoder<W> for ZstdEncoder<W> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }

    fn finish(self: Box<Self>) -> io::Result<W> {
        self.inner.finish()
    }
}

/// Decompresses every frame of an entry's payload.
pub struct ZstdDecoder<R: Read> {
    inner: FrameReader<'static, BufReader<R>>,
}

impl<R: Read> ZstdDecoder<R> {
    /// Wraps the compressed input.
    pub fn new(input: R) -> io::Result<Self> {
        Ok(Self {
            inner: FrameReader::new(input)?,
        })
    }
}

impl<R: Read> std::fmt::Debug for ZstdDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdDecoder").finish_non_exhaustive()
    }
}

impl<R: Read> Read for ZstdDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Decoder<R> for ZstdDecoder<R> {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }

    fn into_inner(self: Box<Self>) -> R {
        self.inner.finish().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compress(data: &[u8], level: Option<u32>) -> Vec<u8> {
        let mut encoder = Box::new(ZstdEncoder::new(Vec::new(), level).unwrap());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_frame_magic_and_roundtrip() {
        let data = b"zstd zstd zstd zstd zstd zstd zstd".repeat(20);
        let compressed = compress(&data, None);
        assert_eq!(&compressed[..4], &[0x28, 0xB5, 0x2F, 0xFD]);
        assert!(compressed.len() < data.len());

        let mut out = Vec::new();
        ZstdDecoder::new(&compressed[..])
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_multiple_frames() {
        let mut payload = compress(b"one ", Some(0));
        payload.extend(compress(b"two", Some(99)));
        let mut out = Vec::new();
        ZstdDecoder::new(&payload[..])
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"one two");
    }
}
