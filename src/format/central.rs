//! Central directory file header.
//!
//! ```text
//! signature(4) madeBy(2) needed(2) flags(2) method(2) time(2) date(2)
//! crc(4) compressed(4) uncompressed(4) nameLen(2) extraLen(2)
//! commentLen(2) disk(2) internalAttr(2) externalAttr(4) offset(4)
//! name extra comment
//! ```
//!
//! Values that do not fit are replaced by sentinels and stored in the
//! Zip64 extra block in APPNOTE order. Sizes move to the block whenever
//! the entry is Zip64; offset and disk number only when they overflow.

use crate::codec::CompressionMethod;
use crate::crypto::{EncryptionMethod, StrongAlgorithm};
use crate::entry::ZipEntry;
use crate::format::bytes::{ByteReader, put_u16_le, put_u32_le};
use crate::format::extra::{self, ExtraField, Zip64Extra, Zip64Fields};
use crate::format::{
    METHOD_AES, ZIP64_SENTINEL_16, ZIP64_SENTINEL_32, ZIP64_THRESHOLD_16, ZIP64_THRESHOLD_32,
    flags, signature,
};
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

/// Fixed part of the header, signature included.
pub const FIXED_LEN: usize = 46;

/// A central directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    /// Version made by.
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose flags.
    pub flags: u16,
    /// Method id as stored (99 for WinZip AES).
    pub method: u16,
    /// Last modification time.
    pub last_modified: DosDateTime,
    /// CRC-32 as stored.
    pub crc32: u32,
    /// Data region size.
    pub compressed_size: u64,
    /// Plaintext size.
    pub uncompressed_size: u64,
    /// Disk holding the local header.
    pub disk_number: u32,
    /// Internal attributes.
    pub internal_attributes: u16,
    /// External attributes.
    pub external_attributes: u32,
    /// Offset of the local header within its disk.
    pub header_offset: u64,
    /// Whether the sizes are stored in the Zip64 block.
    pub zip64: bool,
    /// Raw file name.
    pub name: Vec<u8>,
    /// Extra blocks other than Zip64.
    pub extra_fields: Vec<ExtraField>,
    /// Raw comment.
    pub comment: Vec<u8>,
}

impl CentralDirectoryHeader {
    /// Builds the record for a finished entry.
    pub fn for_entry(entry: &ZipEntry) -> Self {
        Self {
            version_made_by: entry.version_made_by,
            version_needed: entry.version_needed(),
            flags: entry.flags,
            method: entry.stored_method(),
            last_modified: entry.last_modified,
            crc32: entry.crc32,
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
            disk_number: entry.disk_number,
            internal_attributes: entry.internal_attributes,
            external_attributes: entry.external_attributes,
            header_offset: entry.header_offset,
            zip64: entry.zip64,
            name: entry.name.as_bytes().to_vec(),
            extra_fields: extra::entry_fields(entry),
            comment: entry.comment.as_bytes().to_vec(),
        }
    }

    /// The Zip64 block for this record.
    ///
    /// A value of exactly `0xFFFFFFFF` (or `0xFFFF`) does not promote on its
    /// own. Once a block is written for another reason, such a value goes
    /// into the block too, so that every sentinel in the fixed part has a
    /// wide counterpart.
    fn zip64_extra(&self) -> Zip64Extra {
        let sizes_over = self.compressed_size > ZIP64_THRESHOLD_32
            || self.uncompressed_size > ZIP64_THRESHOLD_32;
        let offset_over = self.header_offset > ZIP64_THRESHOLD_32;
        let disk_over = self.disk_number as u64 > ZIP64_THRESHOLD_16;
        let any = self.zip64 || sizes_over || offset_over || disk_over;

        let sizes = self.zip64
            || sizes_over
            || (any
                && (self.compressed_size == ZIP64_THRESHOLD_32
                    || self.uncompressed_size == ZIP64_THRESHOLD_32));
        let offset = offset_over || (any && self.header_offset == ZIP64_THRESHOLD_32);
        let disk = disk_over || (any && self.disk_number as u64 == ZIP64_THRESHOLD_16);
        Zip64Extra {
            uncompressed_size: sizes.then_some(self.uncompressed_size),
            compressed_size: sizes.then_some(self.compressed_size),
            header_offset: offset.then_some(self.header_offset),
            disk_number: disk.then_some(self.disk_number),
        }
    }

    /// Serializes the record.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        for (what, len) in [("file name", self.name.len()), ("comment", self.comment.len())] {
            if len > u16::MAX as usize {
                return Err(Error::InvalidFormat(format!(
                    "{} of {} bytes exceeds 65535",
                    what, len
                )));
            }
        }
        let zip64 = self.zip64_extra();
        let present = zip64.fields();
        let mut fields = Vec::with_capacity(self.extra_fields.len() + 1);
        if present.any() {
            fields.push(ExtraField::Zip64(zip64));
        }
        fields.extend(self.extra_fields.iter().cloned());
        let extra = extra::serialize(&fields)?;

        let narrow32 = |present: bool, v: u64| if present { ZIP64_SENTINEL_32 } else { v as u32 };

        let mut buf =
            Vec::with_capacity(FIXED_LEN + self.name.len() + extra.len() + self.comment.len());
        put_u32_le(&mut buf, signature::CENTRAL_FILE_HEADER);
        put_u16_le(&mut buf, self.version_made_by);
        put_u16_le(&mut buf, self.version_needed);
        put_u16_le(&mut buf, self.flags);
        put_u16_le(&mut buf, self.method);
        put_u16_le(&mut buf, self.last_modified.time());
        put_u16_le(&mut buf, self.last_modified.date());
        put_u32_le(&mut buf, self.crc32);
        put_u32_le(&mut buf, narrow32(present.compressed_size, self.compressed_size));
        put_u32_le(&mut buf, narrow32(present.uncompressed_size, self.uncompressed_size));
        put_u16_le(&mut buf, self.name.len() as u16);
        put_u16_le(&mut buf, extra.len() as u16);
        put_u16_le(&mut buf, self.comment.len() as u16);
        put_u16_le(
            &mut buf,
            if present.disk_number {
                ZIP64_SENTINEL_16
            } else {
                self.disk_number as u16
            },
        );
        put_u16_le(&mut buf, self.internal_attributes);
        put_u32_le(&mut buf, self.external_attributes);
        put_u32_le(&mut buf, narrow32(present.header_offset, self.header_offset));
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&extra);
        buf.extend_from_slice(&self.comment);
        Ok(buf)
    }

    /// Parses one record from an in-memory central directory.
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        r.expect_signature(signature::CENTRAL_FILE_HEADER, "central directory header")?;
        let version_made_by = r.u16_le()?;
        let version_needed = r.u16_le()?;
        let flags = r.u16_le()?;
        let method = r.u16_le()?;
        let time = r.u16_le()?;
        let date = r.u16_le()?;
        let crc32 = r.u32_le()?;
        let compressed = r.u32_le()?;
        let uncompressed = r.u32_le()?;
        let name_len = r.u16_le()? as usize;
        let extra_len = r.u16_le()? as usize;
        let comment_len = r.u16_le()? as usize;
        let disk = r.u16_le()?;
        let internal_attributes = r.u16_le()?;
        let external_attributes = r.u32_le()?;
        let offset = r.u32_le()?;
        let name = r.take(name_len)?.to_vec();
        let extra_base = r.offset();
        let extra_data = r.take(extra_len)?;
        let comment = r.take(comment_len)?.to_vec();

        let expected = Zip64Fields {
            uncompressed_size: uncompressed == ZIP64_SENTINEL_32,
            compressed_size: compressed == ZIP64_SENTINEL_32,
            header_offset: offset == ZIP64_SENTINEL_32,
            disk_number: disk == ZIP64_SENTINEL_16,
        };
        let fields = ExtraField::parse_all(extra_data, expected, extra_base)?;
        let zip64 = extra::find_zip64(&fields).copied();
        if expected.any() && zip64.is_none() {
            // An unpromoted value of exactly 0xFFFFFFFF looks like a sentinel.
            log::debug!(
                "central header at {}: sentinel value without a zip64 extra field, keeping it",
                r.offset()
            );
        }
        let z = zip64.unwrap_or_default();

        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            last_modified: DosDateTime::from_raw(date, time),
            crc32,
            compressed_size: z.compressed_size.unwrap_or(compressed as u64),
            uncompressed_size: z.uncompressed_size.unwrap_or(uncompressed as u64),
            disk_number: z.disk_number.unwrap_or(disk as u32),
            internal_attributes,
            external_attributes,
            header_offset: z.header_offset.unwrap_or(offset as u64),
            zip64: zip64.is_some(),
            name,
            extra_fields: fields
                .into_iter()
                .filter(|f| !matches!(f, ExtraField::Zip64(_)))
                .collect(),
            comment,
        })
    }

    /// Converts the record into the entry model.
    pub fn to_entry(&self) -> Result<ZipEntry> {
        let mut entry = ZipEntry::new(String::from_utf8_lossy(&self.name).into_owned());
        entry.comment = String::from_utf8_lossy(&self.comment).into_owned();
        entry.flags = self.flags;
        entry.last_modified = self.last_modified;
        entry.crc32 = self.crc32;
        entry.compressed_size = self.compressed_size;
        entry.uncompressed_size = self.uncompressed_size;
        entry.disk_number = self.disk_number;
        entry.header_offset = self.header_offset;
        entry.zip64 = self.zip64;
        entry.version_made_by = self.version_made_by;
        entry.internal_attributes = self.internal_attributes;
        entry.external_attributes = self.external_attributes;
        entry.compression = CompressionMethod::from_u16(self.method);
        entry.extra_fields = self
            .extra_fields
            .iter()
            .filter(|f| matches!(f, ExtraField::Unknown { .. }))
            .cloned()
            .collect();

        if self.flags & flags::ENCRYPTED != 0 {
            entry.encryption = if self.method == METHOD_AES {
                let aes = extra::find_aes(&self.extra_fields).ok_or_else(|| {
                    Error::corrupt_header(
                        self.header_offset,
                        format!("{}: method 99 without an AES extra field", entry.name),
                    )
                })?;
                entry.compression = aes.method;
                entry.aes_version = Some(aes.version);
                EncryptionMethod::Aes(aes.strength)
            } else if self.flags & flags::STRONG_ENCRYPTION != 0 {
                match extra::find_strong(&self.extra_fields) {
                    Some(strong) => match StrongAlgorithm::from_id(strong.algorithm_id) {
                        Ok(algorithm) => EncryptionMethod::Strong(algorithm),
                        Err(_) => EncryptionMethod::Unknown(strong.algorithm_id),
                    },
                    None => {
                        log::warn!(
                            "{}: strong encryption flag without a 0x0017 extra field",
                            entry.name
                        );
                        EncryptionMethod::Unknown(0)
                    }
                }
            } else {
                EncryptionMethod::Pkware
            };
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AesStrength;
    use crate::format::extra::StrongExtra;

    fn roundtrip(header: &CentralDirectoryHeader) -> (Vec<u8>, CentralDirectoryHeader) {
        let bytes = header.to_bytes().unwrap();
        let mut r = ByteReader::new(&bytes, 0);
        let parsed = CentralDirectoryHeader::parse(&mut r).unwrap();
        assert!(r.is_empty());
        (bytes, parsed)
    }

    #[test]
    fn test_plain_roundtrip() {
        let mut entry = ZipEntry::new("hello.txt");
        entry.crc32 = 7;
        entry.compressed_size = 5;
        entry.uncompressed_size = 9;
        entry.header_offset = 1234;
        entry.comment = "note".into();
        let header = CentralDirectoryHeader::for_entry(&entry);
        let (bytes, parsed) = roundtrip(&header);
        assert_eq!(bytes.len(), FIXED_LEN + 9 + 4);
        assert_eq!(parsed, header);
        assert_eq!(parsed.to_entry().unwrap(), entry);
    }

    #[test]
    fn test_only_overflowing_offset_in_zip64_block() {
        let mut entry = ZipEntry::new("far");
        entry.compressed_size = 10;
        entry.uncompressed_size = 10;
        entry.header_offset = 0x1_0000_0000;
        let header = CentralDirectoryHeader::for_entry(&entry);
        let (bytes, parsed) = roundtrip(&header);
        // sizes stay 32-bit, offset is the sentinel
        assert_eq!(&bytes[20..28], &[10, 0, 0, 0, 10, 0, 0, 0]);
        assert_eq!(&bytes[42..46], &[0xFF; 4]);
        let extra = &bytes[FIXED_LEN + 3..];
        assert_eq!(&extra[..4], &[0x01, 0x00, 8, 0]);
        assert_eq!(parsed.header_offset, 0x1_0000_0000);
        assert!(parsed.zip64);
    }

    #[test]
    fn test_boundary_values_not_promoted() {
        let mut entry = ZipEntry::new("edge");
        entry.uncompressed_size = 0xFFFF_FFFF;
        entry.compressed_size = 0xFFFF_FFFF;
        entry.header_offset = 0xFFFF_FFFF;
        entry.disk_number = 0xFFFF;
        let header = CentralDirectoryHeader::for_entry(&entry);
        assert!(!header.zip64_extra().fields().any());

        let (bytes, parsed) = roundtrip(&header);
        assert_eq!(&bytes[20..28], &[0xFF; 8]);
        assert_eq!(&bytes[42..46], &[0xFF; 4]);
        assert!(!parsed.zip64);
        assert_eq!(parsed.uncompressed_size, 0xFFFF_FFFF);
        assert_eq!(parsed.compressed_size, 0xFFFF_FFFF);
        assert_eq!(parsed.header_offset, 0xFFFF_FFFF);
        assert_eq!(parsed.disk_number, 0xFFFF);
        assert_eq!(parsed.to_entry().unwrap(), entry);
    }

    #[test]
    fn test_boundary_offset_joins_block_of_promoted_entry() {
        let mut entry = ZipEntry::new("wide");
        entry.uncompressed_size = 0x1_0000_0000;
        entry.compressed_size = 0x1_0000_0000;
        entry.header_offset = 0xFFFF_FFFF;
        entry.zip64 = true;
        let header = CentralDirectoryHeader::for_entry(&entry);
        let fields = header.zip64_extra().fields();
        assert!(fields.header_offset);
        assert!(!fields.disk_number);

        let (_, parsed) = roundtrip(&header);
        assert_eq!(parsed.header_offset, 0xFFFF_FFFF);
        assert_eq!(parsed.uncompressed_size, 0x1_0000_0000);
    }

    #[test]
    fn test_zip64_sizes_and_disk() {
        let mut entry = ZipEntry::new("big");
        entry.uncompressed_size = 0x2_0000_0000;
        entry.compressed_size = 0x1_8000_0000;
        entry.disk_number = 0x1_0000;
        entry.zip64 = true;
        let header = CentralDirectoryHeader::for_entry(&entry);
        let (bytes, parsed) = roundtrip(&header);
        assert_eq!(&bytes[34..36], &[0xFF, 0xFF]);
        let entry2 = parsed.to_entry().unwrap();
        assert_eq!(entry2.uncompressed_size, 0x2_0000_0000);
        assert_eq!(entry2.compressed_size, 0x1_8000_0000);
        assert_eq!(entry2.disk_number, 0x1_0000);
        assert!(entry2.zip64);
    }

    #[test]
    fn test_sentinel_without_block_is_corrupt() {
        let header = CentralDirectoryHeader::for_entry(&ZipEntry::new("x"));
        let mut bytes = header.to_bytes().unwrap();
        bytes[20..24].copy_from_slice(&[0xFF; 4]);
        let mut r = ByteReader::new(&bytes, 0);
        assert!(matches!(
            CentralDirectoryHeader::parse(&mut r),
            Err(Error::CorruptHeader { .. })
        ));
    }

    #[test]
    fn test_encryption_detection() {
        let mut entry = ZipEntry::new("secret");
        entry.flags = flags::ENCRYPTED;
        entry.encryption = EncryptionMethod::Aes(AesStrength::Aes128);
        entry.compression = CompressionMethod::Stored;
        let parsed = roundtrip(&CentralDirectoryHeader::for_entry(&entry)).1;
        let back = parsed.to_entry().unwrap();
        assert_eq!(back.encryption, EncryptionMethod::Aes(AesStrength::Aes128));
        assert_eq!(back.compression, CompressionMethod::Stored);

        let mut header = CentralDirectoryHeader::for_entry(&ZipEntry::new("rc4"));
        header.flags = flags::ENCRYPTED | flags::STRONG_ENCRYPTION;
        header.extra_fields = vec![ExtraField::Strong(StrongExtra {
            format: 2,
            algorithm_id: 0x6801,
            bit_length: 128,
            flags: 1,
        })];
        let back = roundtrip(&header).1.to_entry().unwrap();
        assert_eq!(back.encryption, EncryptionMethod::Unknown(0x6801));

        let mut header = CentralDirectoryHeader::for_entry(&ZipEntry::new("zc"));
        header.flags = flags::ENCRYPTED;
        assert_eq!(
            roundtrip(&header).1.to_entry().unwrap().encryption,
            EncryptionMethod::Pkware
        );
    }
}
