//! Data descriptor.
//!
//! Follows the data of an entry written with bit 3 set:
//! `signature(4) crc(4) compressed(4|8) uncompressed(4|8)`. The 8-byte
//! form is used when the entry is Zip64. The signature is optional on read
//! but always written.

use std::io::{self, Read, Write};

use crate::format::bytes::{ByteReader, put_u32_le, put_u64_le, read_u32_le, read_vec};
use crate::format::signature;
use crate::{Error, Result};

/// CRC-32 and sizes of a streamed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    /// CRC-32 of the plaintext.
    pub crc32: u32,
    /// Size of the data region.
    pub compressed_size: u64,
    /// Size of the plaintext.
    pub uncompressed_size: u64,
}

impl DataDescriptor {
    /// Encoded length with the signature.
    pub fn encoded_len(zip64: bool) -> usize {
        if zip64 { 24 } else { 16 }
    }

    /// Serializes the descriptor.
    ///
    /// Fails if `zip64` is false but a size does not fit in 32 bits.
    pub fn to_bytes(&self, zip64: bool) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::encoded_len(zip64));
        put_u32_le(&mut buf, signature::DATA_DESCRIPTOR);
        put_u32_le(&mut buf, self.crc32);
        if zip64 {
            put_u64_le(&mut buf, self.compressed_size);
            put_u64_le(&mut buf, self.uncompressed_size);
        } else {
            let narrow = |v: u64| {
                u32::try_from(v).map_err(|_| Error::InvalidState {
                    operation: "write data descriptor",
                    state: "size exceeds 32 bits without zip64",
                })
            };
            put_u32_le(&mut buf, narrow(self.compressed_size)?);
            put_u32_le(&mut buf, narrow(self.uncompressed_size)?);
        }
        Ok(buf)
    }

    /// Writes the descriptor.
    pub fn write<W: Write>(&self, w: &mut W, zip64: bool) -> Result<()> {
        w.write_all(&self.to_bytes(zip64)?)?;
        Ok(())
    }

    /// Reads a descriptor, with or without its signature.
    pub fn read<R: Read>(r: &mut R, zip64: bool, offset: u64) -> Result<(Self, usize)> {
        let truncated = |e: io::Error| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::corrupt_header(offset, "data descriptor truncated")
            } else {
                Error::Io(e)
            }
        };
        let first = read_u32_le(r).map_err(truncated)?;
        let (crc32, mut consumed) = if first == signature::DATA_DESCRIPTOR {
            (read_u32_le(r).map_err(truncated)?, 8)
        } else {
            (first, 4)
        };
        let sizes_len = if zip64 { 16 } else { 8 };
        let sizes = read_vec(r, sizes_len).map_err(truncated)?;
        consumed += sizes_len;

        let mut s = ByteReader::new(&sizes, offset + consumed as u64 - sizes_len as u64);
        let (compressed_size, uncompressed_size) = if zip64 {
            (s.u64_le()?, s.u64_le()?)
        } else {
            (s.u32_le()? as u64, s.u32_le()? as u64)
        };
        Ok((
            Self {
                crc32,
                compressed_size,
                uncompressed_size,
            },
            consumed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DD: DataDescriptor = DataDescriptor {
        crc32: 0x1234_5678,
        compressed_size: 10,
        uncompressed_size: 20,
    };

    #[test]
    fn test_32bit_layout() {
        let bytes = DD.to_bytes(false).unwrap();
        assert_eq!(
            bytes,
            [
                0x50, 0x4b, 0x07, 0x08, 0x78, 0x56, 0x34, 0x12, 10, 0, 0, 0, 20, 0, 0, 0
            ]
        );
        let (parsed, used) = DataDescriptor::read(&mut Cursor::new(&bytes), false, 0).unwrap();
        assert_eq!(parsed, DD);
        assert_eq!(used, 16);
    }

    #[test]
    fn test_64bit_layout() {
        let dd = DataDescriptor {
            compressed_size: 0x1_0000_0001,
            ..DD
        };
        let bytes = dd.to_bytes(true).unwrap();
        assert_eq!(bytes.len(), DataDescriptor::encoded_len(true));
        let (parsed, used) = DataDescriptor::read(&mut Cursor::new(&bytes), true, 0).unwrap();
        assert_eq!(parsed, dd);
        assert_eq!(used, 24);
    }

    #[test]
    fn test_unsigned_descriptor_accepted() {
        let bytes = DD.to_bytes(false).unwrap();
        let (parsed, used) = DataDescriptor::read(&mut Cursor::new(&bytes[4..]), false, 0).unwrap();
        assert_eq!(parsed, DD);
        assert_eq!(used, 12);
    }

    #[test]
    fn test_narrow_overflow_rejected() {
        let dd = DataDescriptor {
            uncompressed_size: 0x1_0000_0000,
            ..DD
        };
        assert!(matches!(
            dd.to_bytes(false),
            Err(Error::InvalidState { .. })
        ));
    }
}
