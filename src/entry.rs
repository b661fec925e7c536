//! The per-entry record shared by the reading and writing sessions.

use crate::codec::CompressionMethod;
use crate::crypto::{AesVendorVersion, CheckByte, EncryptionMethod};
use crate::format::extra::ExtraField;
use crate::format::{METHOD_AES, ZIP64_THRESHOLD_16, ZIP64_THRESHOLD_32, flags, version};
use crate::timestamp::DosDateTime;

/// An entry in a ZIP archive.
///
/// While an entry is being written the session fills in sizes, CRC and
/// offset as they become known; callers receive a copy once the entry's
/// local header (or data descriptor) has been emitted.
///
/// This struct is marked `#[non_exhaustive]`; construct it with
/// [`ZipEntry::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ZipEntry {
    /// Name within the archive, `/`-separated.
    pub name: String,
    /// Entry comment.
    pub comment: String,
    /// Real compression method (for AES entries, the one inside the 0x9901 field).
    pub compression: CompressionMethod,
    /// Encryption scheme.
    pub encryption: EncryptionMethod,
    /// AE-1/AE-2 for WinZip AES entries.
    pub aes_version: Option<AesVendorVersion>,
    /// CRC-32 of the uncompressed data (0 for AE-2 entries on disk).
    pub crc32: u32,
    /// Size of the data region: compressed payload plus encryption overhead.
    pub compressed_size: u64,
    /// Size of the plaintext.
    pub uncompressed_size: u64,
    /// Offset of the local header within its disk.
    pub header_offset: u64,
    /// Disk on which the local header starts.
    pub disk_number: u32,
    /// Whether the entry uses Zip64 fields. Never reset once set.
    pub zip64: bool,
    /// General purpose bit flags.
    pub flags: u16,
    /// Last modification time.
    pub last_modified: DosDateTime,
    /// "Version made by" from the central directory.
    pub version_made_by: u16,
    /// Internal file attributes.
    pub internal_attributes: u16,
    /// External file attributes (host specific).
    pub external_attributes: u32,
    /// Extra field blocks this crate does not interpret, kept verbatim.
    pub extra_fields: Vec<ExtraField>,
}

impl ZipEntry {
    /// Creates an entry with default metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            compression: CompressionMethod::default(),
            encryption: EncryptionMethod::None,
            aes_version: None,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            header_offset: 0,
            disk_number: 0,
            zip64: false,
            flags: 0,
            last_modified: DosDateTime::default(),
            version_made_by: version::MADE_BY,
            internal_attributes: 0,
            external_attributes: 0,
            extra_fields: Vec::new(),
        }
    }

    /// Whether the name denotes a directory.
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Whether the data is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_encrypted()
    }

    /// Whether CRC and sizes follow the data in a data descriptor.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & flags::DATA_DESCRIPTOR != 0
    }

    /// The method id written in headers (99 for WinZip AES).
    pub fn stored_method(&self) -> u16 {
        match self.encryption {
            EncryptionMethod::Aes(_) => METHOD_AES,
            _ => self.compression.to_u16(),
        }
    }

    /// The general purpose flags implied by the entry's settings.
    pub(crate) fn derived_flags(&self, streamed: bool) -> u16 {
        let mut f = self.flags & !(flags::ENCRYPTED | flags::DATA_DESCRIPTOR | flags::STRONG_ENCRYPTION);
        if self.is_encrypted() {
            f |= flags::ENCRYPTED;
        }
        if matches!(
            self.encryption,
            EncryptionMethod::Strong(_) | EncryptionMethod::Unknown(_)
        ) {
            f |= flags::STRONG_ENCRYPTION;
        }
        if streamed {
            f |= flags::DATA_DESCRIPTOR;
        }
        if !self.name.is_ascii() || !self.comment.is_ascii() {
            f |= flags::UTF8;
        }
        f
    }

    /// Source of the PKWARE check byte for this entry.
    pub fn check_byte(&self) -> CheckByte {
        if self.has_data_descriptor() {
            CheckByte::ModTime(self.last_modified.time())
        } else {
            CheckByte::Crc(self.crc32)
        }
    }

    /// Whether the stored CRC-32 is meaningful.
    ///
    /// False only for AE-2 entries, which store zero and rely on the MAC.
    pub fn crc_is_reliable(&self) -> bool {
        match (self.encryption, self.aes_version) {
            (EncryptionMethod::Aes(_), Some(v)) => v.verifies_crc(),
            (EncryptionMethod::Aes(_), None) => false,
            _ => true,
        }
    }

    /// Whether sizes, offset or disk number exceed their 32/16-bit fields.
    pub fn exceeds_legacy_limits(&self) -> bool {
        self.compressed_size > ZIP64_THRESHOLD_32
            || self.uncompressed_size > ZIP64_THRESHOLD_32
            || self.header_offset > ZIP64_THRESHOLD_32
            || self.disk_number as u64 > ZIP64_THRESHOLD_16
    }

    /// "Version needed to extract" for this entry.
    pub fn version_needed(&self) -> u16 {
        let mut needed = self
            .compression
            .version_needed()
            .max(self.encryption.version_needed());
        if self.zip64 {
            needed = needed.max(version::ZIP64);
        }
        needed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{AesStrength, StrongAlgorithm};

    #[test]
    fn test_new_defaults() {
        let entry = ZipEntry::new("docs/readme.txt");
        assert_eq!(entry.compression, CompressionMethod::Deflate);
        assert!(!entry.is_encrypted());
        assert!(!entry.is_dir());
        assert!(ZipEntry::new("docs/").is_dir());
        assert_eq!(entry.version_needed(), 20);
    }

    #[test]
    fn test_aes_uses_method_99() {
        let mut entry = ZipEntry::new("a");
        entry.encryption = EncryptionMethod::Aes(AesStrength::Aes128);
        entry.compression = CompressionMethod::Bzip2;
        assert_eq!(entry.stored_method(), 99);
        assert_eq!(entry.version_needed(), 51);
    }

    #[test]
    fn test_check_byte_source() {
        let mut entry = ZipEntry::new("a");
        entry.crc32 = 0xAB00_0000;
        entry.last_modified = DosDateTime::from_raw(0x21, 0x7C00);
        assert_eq!(entry.check_byte().value(), 0xAB);
        entry.flags |= flags::DATA_DESCRIPTOR;
        assert_eq!(entry.check_byte().value(), 0x7C);
    }

    #[test]
    fn test_crc_reliability() {
        let mut entry = ZipEntry::new("a");
        assert!(entry.crc_is_reliable());
        entry.encryption = EncryptionMethod::Aes(AesStrength::Aes256);
        entry.aes_version = Some(AesVendorVersion::Ae2);
        assert!(!entry.crc_is_reliable());
        entry.aes_version = Some(AesVendorVersion::Ae1);
        assert!(entry.crc_is_reliable());
    }

    #[test]
    fn test_derived_flags() {
        let mut entry = ZipEntry::new("ünïcode");
        entry.encryption = EncryptionMethod::Strong(StrongAlgorithm::Aes256);
        let f = entry.derived_flags(true);
        assert_ne!(f & flags::ENCRYPTED, 0);
        assert_ne!(f & flags::STRONG_ENCRYPTION, 0);
        assert_ne!(f & flags::DATA_DESCRIPTOR, 0);
        assert_ne!(f & flags::UTF8, 0);
        assert_eq!(ZipEntry::new("plain").derived_flags(false), 0);
    }

    #[test]
    fn test_legacy_limits() {
        let mut entry = ZipEntry::new("big");
        entry.uncompressed_size = 0xFFFF_FFFF;
        assert!(!entry.exceeds_legacy_limits());
        entry.uncompressed_size = 0x1_0000_0000;
        assert!(entry.exceeds_legacy_limits());

        let mut entry = ZipEntry::new("disk");
        entry.disk_number = 0xFFFF;
        assert!(!entry.exceeds_legacy_limits());
        entry.disk_number = 0x1_0000;
        assert!(entry.exceeds_legacy_limits());
    }
}
