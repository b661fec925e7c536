//! Compression codecs for ZIP entries.
//!
//! Each codec is a pair of stream adapters: an [`Encoder`] that compresses
//! into an inner writer and hands it back on [`Encoder::finish`], and a
//! [`Decoder`] that decompresses from an inner reader and hands it back on
//! [`Decoder::into_inner`]. Returning the inner stream lets the entry
//! pipeline finish the encryption layer underneath the codec.

#[cfg(feature = "bzip2")]
pub mod bzip2;
mod copy;
#[cfg(feature = "deflate")]
pub mod deflate;
#[cfg(feature = "zstd")]
pub mod zstd;

use std::io::{self, Read, Write};

use crate::format::version;
use crate::{Error, Result};

pub use copy::{StoredDecoder, StoredEncoder};

/// A decoder that reads compressed data and produces uncompressed output.
pub trait Decoder<R: Read>: Read {
    /// The method this decoder handles.
    fn method(&self) -> CompressionMethod;

    /// Returns the compressed-side reader.
    ///
    /// Bytes the decoder buffered but did not consume are lost.
    fn into_inner(self: Box<Self>) -> R;
}

/// An encoder that takes uncompressed data and produces compressed output.
pub trait Encoder<W: Write>: Write {
    /// The method this encoder produces.
    fn method(&self) -> CompressionMethod;

    /// Finishes encoding, flushes all data and returns the inner writer.
    fn finish(self: Box<Self>) -> io::Result<W>;
}

/// Compression method of an entry, as stored in its headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionMethod {
    /// No compression (method 0).
    Stored,
    /// Deflate (method 8).
    #[default]
    Deflate,
    /// BZip2 (method 12).
    Bzip2,
    /// Zstandard (method 93).
    Zstd,
    /// Any other method id. Listed, but cannot be read or written.
    Other(u16),
}

impl CompressionMethod {
    /// Maps an on-disk method id.
    pub fn from_u16(id: u16) -> Self {
        match id {
            0 => Self::Stored,
            8 => Self::Deflate,
            12 => Self::Bzip2,
            93 => Self::Zstd,
            other => Self::Other(other),
        }
    }

    /// The on-disk method id.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Stored => 0,
            Self::Deflate => 8,
            Self::Bzip2 => 12,
            Self::Zstd => 93,
            Self::Other(id) => id,
        }
    }

    /// Minimum "version needed to extract" for this method.
    pub fn version_needed(self) -> u16 {
        match self {
            Self::Bzip2 => version::BZIP2,
            Self::Zstd => version::ZSTD,
            _ => version::DEFAULT,
        }
    }

    /// Whether this build can encode and decode the method.
    pub fn is_supported(self) -> bool {
        match self {
            Self::Stored => true,
            Self::Deflate => cfg!(feature = "deflate"),
            Self::Bzip2 => cfg!(feature = "bzip2"),
            Self::Zstd => cfg!(feature = "zstd"),
            Self::Other(_) => false,
        }
    }
}

fn unsupported(method: CompressionMethod) -> Error {
    Error::UnsupportedMethod {
        method: method.to_u16(),
    }
}

/// Builds the encoder for `method`.
///
/// `level` is codec specific; `None` selects the codec default.
pub fn build_encoder<'a, W: Write + 'a>(
    method: CompressionMethod,
    level: Option<u32>,
    output: W,
) -> Result<Box<dyn Encoder<W> + 'a>> {
    #[cfg(not(any(feature = "deflate", feature = "bzip2", feature = "zstd")))]
    let _ = level;
    match method {
        CompressionMethod::Stored => Ok(Box::new(StoredEncoder::new(output))),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate => Ok(Box::new(deflate::DeflateEncoder::new(output, level))),
        #[cfg(feature = "bzip2")]
        CompressionMethod::Bzip2 => Ok(Box::new(bzip2::Bzip2Encoder::new(output, level))),
        #[cfg(feature = "zstd")]
        CompressionMethod::Zstd => Ok(Box::new(zstd::ZstdEncoder::new(output, level)?)),
        other => Err(unsupported(other)),
    }
}

/// Builds the decoder for `method`.
pub fn build_decoder<'a, R: Read + 'a>(
    method: CompressionMethod,
    input: R,
) -> Result<Box<dyn Decoder<R> + 'a>> {
    match method {
        CompressionMethod::Stored => Ok(Box::new(StoredDecoder::new(input))),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate => Ok(Box::new(deflate::DeflateDecoder::new(input))),
        #[cfg(feature = "bzip2")]
        CompressionMethod::Bzip2 => Ok(Box::new(bzip2::Bzip2Decoder::new(input))),
        #[cfg(feature = "zstd")]
        CompressionMethod::Zstd => Ok(Box::new(zstd::ZstdDecoder::new(input)?)),
        other => Err(unsupported(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(method: CompressionMethod, data: &[u8]) -> Vec<u8> {
        let mut encoder = build_encoder(method, None, Vec::new()).unwrap();
        assert_eq!(encoder.method(), method);
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut decoder = build_decoder(method, &compressed[..]).unwrap();
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_method_ids() {
        for id in [0u16, 8, 12, 93, 14, 98] {
            assert_eq!(CompressionMethod::from_u16(id).to_u16(), id);
        }
        assert_eq!(CompressionMethod::from_u16(14), CompressionMethod::Other(14));
        assert_eq!(CompressionMethod::Bzip2.version_needed(), 46);
        assert_eq!(CompressionMethod::Zstd.version_needed(), 63);
        assert_eq!(CompressionMethod::Deflate.version_needed(), 20);
    }

    #[test]
    fn test_supported_methods_roundtrip() {
        let data = b"compressible compressible compressible ".repeat(50);
        for method in [
            CompressionMethod::Stored,
            CompressionMethod::Deflate,
            CompressionMethod::Bzip2,
            CompressionMethod::Zstd,
        ] {
            if method.is_supported() {
                assert_eq!(roundtrip(method, &data), data, "{method:?}");
            }
        }
    }

    #[test]
    fn test_unknown_method_rejected() {
        let method = CompressionMethod::Other(14);
        assert!(matches!(
            build_encoder(method, None, Vec::new()),
            Err(Error::UnsupportedMethod { method: 14 })
        ));
        assert!(matches!(
            build_decoder(method, &b""[..]),
            Err(Error::UnsupportedMethod { method: 14 })
        ));
    }
}
