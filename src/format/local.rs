//! Local file header.
//!
//! ```text
//! signature(4) version(2) flags(2) method(2) time(2) date(2) crc(4)
//! compressed(4) uncompressed(4) nameLen(2) extraLen(2) name extra
//! ```
//!
//! A Zip64 local header writes `0xFFFFFFFF` in both size fields and carries
//! both sizes in the Zip64 extra block. A streamed entry (bit 3) writes
//! zeros in place of CRC and sizes; the real values follow the data in a
//! data descriptor.

use std::io::{self, Read, Write};

use crate::ZipEntry;
use crate::format::bytes::{ByteReader, put_u16_le, put_u32_le, read_vec};
use crate::format::extra::{self, ExtraField, Zip64Extra, Zip64Fields};
use crate::format::{ZIP64_SENTINEL_32, signature};
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

/// Fixed part of the header, signature included.
pub const FIXED_LEN: usize = 30;

/// A parsed or to-be-written local file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose flags.
    pub flags: u16,
    /// Method id as stored (99 for WinZip AES).
    pub method: u16,
    /// Last modification time.
    pub last_modified: DosDateTime,
    /// CRC-32 (zero when deferred or AE-2).
    pub crc32: u32,
    /// Compressed size (zero when deferred).
    pub compressed_size: u64,
    /// Uncompressed size (zero when deferred).
    pub uncompressed_size: u64,
    /// Sizes live in a Zip64 extra block.
    pub zip64: bool,
    /// Raw file name bytes.
    pub name: Vec<u8>,
    /// Extra blocks other than Zip64.
    pub extra_fields: Vec<ExtraField>,
}

impl LocalFileHeader {
    /// Builds the header for `entry`.
    ///
    /// With `deferred` set, CRC and sizes are zero and bit 3 is set. The
    /// entry's `zip64` flag decides whether the Zip64 block is present; for
    /// a deferred entry this reserves it so the data descriptor may use
    /// 64-bit sizes.
    pub fn for_entry(entry: &ZipEntry, deferred: bool) -> Self {
        let (crc32, compressed_size, uncompressed_size) = if deferred {
            (0, 0, 0)
        } else {
            (entry.crc32, entry.compressed_size, entry.uncompressed_size)
        };
        Self {
            version_needed: entry.version_needed(),
            flags: entry.derived_flags(deferred),
            method: entry.stored_method(),
            last_modified: entry.last_modified,
            crc32,
            compressed_size,
            uncompressed_size,
            zip64: entry.zip64,
            name: entry.name.as_bytes().to_vec(),
            extra_fields: extra::entry_fields(entry),
        }
    }

    fn extra_bytes(&self) -> Result<Vec<u8>> {
        let mut fields = Vec::with_capacity(self.extra_fields.len() + 1);
        if self.zip64 {
            fields.push(ExtraField::Zip64(Zip64Extra {
                uncompressed_size: Some(self.uncompressed_size),
                compressed_size: Some(self.compressed_size),
                ..Default::default()
            }));
        }
        fields.extend(self.extra_fields.iter().cloned());
        extra::serialize(&fields)
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.name.len() > u16::MAX as usize {
            return Err(Error::InvalidFormat(format!(
                "file name of {} bytes exceeds 65535",
                self.name.len()
            )));
        }
        let extra = self.extra_bytes()?;
        let (compressed, uncompressed) = if self.zip64 {
            (ZIP64_SENTINEL_32, ZIP64_SENTINEL_32)
        } else {
            (self.compressed_size as u32, self.uncompressed_size as u32)
        };

        let mut buf = Vec::with_capacity(FIXED_LEN + self.name.len() + extra.len());
        put_u32_le(&mut buf, signature::LOCAL_FILE_HEADER);
        put_u16_le(&mut buf, self.version_needed);
        put_u16_le(&mut buf, self.flags);
        put_u16_le(&mut buf, self.method);
        put_u16_le(&mut buf, self.last_modified.time());
        put_u16_le(&mut buf, self.last_modified.date());
        put_u32_le(&mut buf, self.crc32);
        put_u32_le(&mut buf, compressed);
        put_u32_le(&mut buf, uncompressed);
        put_u16_le(&mut buf, self.name.len() as u16);
        put_u16_le(&mut buf, extra.len() as u16);
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&extra);
        Ok(buf)
    }

    /// Serialized length.
    pub fn encoded_len(&self) -> Result<usize> {
        Ok(FIXED_LEN + self.name.len() + self.extra_bytes()?.len())
    }

    /// Writes the header.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    /// Reads a header; `offset` is its position, for error messages.
    pub fn read<R: Read>(r: &mut R, offset: u64) -> Result<Self> {
        let truncated = |e: io::Error| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::corrupt_header(offset, "local file header truncated")
            } else {
                Error::Io(e)
            }
        };
        let fixed = read_vec(r, FIXED_LEN).map_err(truncated)?;
        let mut h = ByteReader::new(&fixed, offset);
        h.expect_signature(signature::LOCAL_FILE_HEADER, "local file header")?;
        let version_needed = h.u16_le()?;
        let flags = h.u16_le()?;
        let method = h.u16_le()?;
        let time = h.u16_le()?;
        let date = h.u16_le()?;
        let crc32 = h.u32_le()?;
        let compressed = h.u32_le()?;
        let uncompressed = h.u32_le()?;
        let name_len = h.u16_le()? as usize;
        let extra_len = h.u16_le()? as usize;

        let name = read_vec(r, name_len).map_err(truncated)?;
        let extra_data = read_vec(r, extra_len).map_err(truncated)?;
        let extra_base = offset + (FIXED_LEN + name_len) as u64;

        let any_sentinel = compressed == ZIP64_SENTINEL_32 || uncompressed == ZIP64_SENTINEL_32;
        let both = Zip64Fields {
            uncompressed_size: any_sentinel,
            compressed_size: any_sentinel,
            ..Default::default()
        };
        // Local headers should carry both sizes, but some writers only
        // store the overflowing one.
        let fields = ExtraField::parse_all(&extra_data, both, extra_base).or_else(|_| {
            let strict = Zip64Fields {
                uncompressed_size: uncompressed == ZIP64_SENTINEL_32,
                compressed_size: compressed == ZIP64_SENTINEL_32,
                ..Default::default()
            };
            ExtraField::parse_all(&extra_data, strict, extra_base)
        })?;

        let zip64_block = extra::find_zip64(&fields).copied();
        let zip64 = zip64_block.is_some();
        let compressed_size = zip64_block
            .and_then(|z| z.compressed_size)
            .unwrap_or(compressed as u64);
        let uncompressed_size = zip64_block
            .and_then(|z| z.uncompressed_size)
            .unwrap_or(uncompressed as u64);

        Ok(Self {
            version_needed,
            flags,
            method,
            last_modified: DosDateTime::from_raw(date, time),
            crc32,
            compressed_size,
            uncompressed_size,
            zip64,
            name,
            extra_fields: fields
                .into_iter()
                .filter(|f| !matches!(f, ExtraField::Zip64(_)))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressionMethod;
    use crate::crypto::{AesStrength, EncryptionMethod};
    use crate::format::flags;
    use std::io::Cursor;

    fn entry() -> ZipEntry {
        let mut entry = ZipEntry::new("dir/file.txt");
        entry.compression = CompressionMethod::Deflate;
        entry.crc32 = 0xDEAD_BEEF;
        entry.compressed_size = 100;
        entry.uncompressed_size = 250;
        entry.last_modified = DosDateTime::from_parts(2023, 6, 1, 12, 0, 0).unwrap();
        entry
    }

    #[test]
    fn test_plain_header_layout() {
        let header = LocalFileHeader::for_entry(&entry(), false);
        let bytes = header.to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0x50, 0x4b, 0x03, 0x04]);
        assert_eq!(bytes.len(), FIXED_LEN + 12);
        assert_eq!(&bytes[14..18], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(&bytes[18..22], &100u32.to_le_bytes());
        assert_eq!(&bytes[22..26], &250u32.to_le_bytes());
        assert_eq!(header.encoded_len().unwrap(), bytes.len());

        let parsed = LocalFileHeader::read(&mut Cursor::new(&bytes), 0).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_deferred_header_zeroes_crc_and_sizes() {
        let header = LocalFileHeader::for_entry(&entry(), true);
        assert_ne!(header.flags & flags::DATA_DESCRIPTOR, 0);
        let bytes = header.to_bytes().unwrap();
        assert_eq!(&bytes[14..26], &[0u8; 12]);
    }

    #[test]
    fn test_zip64_header_uses_sentinels_and_extra() {
        let mut e = entry();
        e.uncompressed_size = 0x1_0000_0000;
        e.zip64 = true;
        let header = LocalFileHeader::for_entry(&e, false);
        assert_eq!(header.version_needed, 45);
        let bytes = header.to_bytes().unwrap();
        assert_eq!(&bytes[18..26], &[0xFF; 8]);
        // zip64 block: id, size 16, uncompressed, compressed
        let extra = &bytes[FIXED_LEN + 12..];
        assert_eq!(&extra[..4], &[0x01, 0x00, 16, 0]);
        assert_eq!(&extra[4..12], &0x1_0000_0000u64.to_le_bytes());
        assert_eq!(&extra[12..20], &100u64.to_le_bytes());

        let parsed = LocalFileHeader::read(&mut Cursor::new(&bytes), 0).unwrap();
        assert!(parsed.zip64);
        assert_eq!(parsed.uncompressed_size, 0x1_0000_0000);
        assert_eq!(parsed.compressed_size, 100);
    }

    #[test]
    fn test_aes_header_carries_extra() {
        let mut e = entry();
        e.encryption = EncryptionMethod::Aes(AesStrength::Aes192);
        let header = LocalFileHeader::for_entry(&e, false);
        assert_eq!(header.method, 99);
        let bytes = header.to_bytes().unwrap();
        let parsed = LocalFileHeader::read(&mut Cursor::new(&bytes), 0).unwrap();
        let aes = extra::find_aes(&parsed.extra_fields).unwrap();
        assert_eq!(aes.strength, AesStrength::Aes192);
        assert_eq!(aes.method, CompressionMethod::Deflate);
    }

    #[test]
    fn test_bad_signature() {
        let mut bytes = LocalFileHeader::for_entry(&entry(), false)
            .to_bytes()
            .unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            LocalFileHeader::read(&mut Cursor::new(&bytes), 77),
            Err(Error::CorruptHeader { offset: 77, .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let bytes = LocalFileHeader::for_entry(&entry(), false)
            .to_bytes()
            .unwrap();
        assert!(matches!(
            LocalFileHeader::read(&mut Cursor::new(&bytes[..35]), 0),
            Err(Error::CorruptHeader { .. })
        ));
    }
}
