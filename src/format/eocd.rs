//! End of central directory records.
//!
//! ```text
//! EOCD:          signature(4) disk(2) cdDisk(2) entriesOnDisk(2)
//!                totalEntries(2) cdSize(4) cdOffset(4) commentLen(2) comment
//! Zip64 EOCD:    signature(4) recordSize(8) madeBy(2) needed(2) disk(4)
//!                cdDisk(4) entriesOnDisk(8) totalEntries(8) cdSize(8)
//!                cdOffset(8) [extensible data]
//! Zip64 locator: signature(4) zip64EocdDisk(4) zip64EocdOffset(8) totalDisks(4)
//! ```
//!
//! The EOCD is located by scanning backwards from the end of the archive
//! through the largest possible comment window.

use std::io::{Read, Seek, SeekFrom};

use crate::format::bytes::{ByteReader, put_u16_le, put_u32_le, put_u64_le};
use crate::format::{
    ZIP64_SENTINEL_16, ZIP64_SENTINEL_32, ZIP64_THRESHOLD_16, ZIP64_THRESHOLD_32, signature,
    version,
};
use crate::{Error, Result};

/// Fixed length of the EOCD record.
pub const EOCD_LEN: usize = 22;

/// Fixed length of the Zip64 EOCD record, without extensible data.
pub const ZIP64_EOCD_LEN: usize = 56;

/// Length of the Zip64 EOCD locator.
pub const ZIP64_LOCATOR_LEN: usize = 20;

/// Longest span from the end of the archive that can hold the EOCD.
pub const EOCD_SEARCH_WINDOW: usize = EOCD_LEN + u16::MAX as usize;

/// Where the central directory lives, in full-width values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryLocation {
    /// Disk holding the end records.
    pub disk_number: u32,
    /// Disk on which the central directory starts.
    pub cd_start_disk: u32,
    /// Central directory records on the last disk.
    pub entries_on_disk: u64,
    /// Total central directory records.
    pub total_entries: u64,
    /// Size of the central directory in bytes.
    pub cd_size: u64,
    /// Offset of the central directory within its start disk.
    pub cd_offset: u64,
}

impl DirectoryLocation {
    /// Whether any value overflows its legacy field.
    pub fn exceeds_legacy_limits(&self) -> bool {
        self.disk_number as u64 > ZIP64_THRESHOLD_16
            || self.cd_start_disk as u64 > ZIP64_THRESHOLD_16
            || self.entries_on_disk > ZIP64_THRESHOLD_16
            || self.total_entries > ZIP64_THRESHOLD_16
            || self.cd_size > ZIP64_THRESHOLD_32
            || self.cd_offset > ZIP64_THRESHOLD_32
    }
}

/// The classic end of central directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eocd {
    /// Number of this disk.
    pub disk_number: u16,
    /// Disk on which the central directory starts.
    pub cd_start_disk: u16,
    /// Records on this disk.
    pub entries_on_disk: u16,
    /// Total records.
    pub total_entries: u16,
    /// Central directory size.
    pub cd_size: u32,
    /// Central directory offset.
    pub cd_offset: u32,
    /// Archive comment.
    pub comment: Vec<u8>,
}

impl Eocd {
    /// Builds the record, writing sentinels for every value that overflows.
    pub fn for_location(location: &DirectoryLocation, comment: Vec<u8>) -> Self {
        let narrow16 = |v: u64| {
            if v > ZIP64_THRESHOLD_16 {
                ZIP64_SENTINEL_16
            } else {
                v as u16
            }
        };
        let narrow32 = |v: u64| {
            if v > ZIP64_THRESHOLD_32 {
                ZIP64_SENTINEL_32
            } else {
                v as u32
            }
        };
        Self {
            disk_number: narrow16(location.disk_number as u64),
            cd_start_disk: narrow16(location.cd_start_disk as u64),
            entries_on_disk: narrow16(location.entries_on_disk),
            total_entries: narrow16(location.total_entries),
            cd_size: narrow32(location.cd_size),
            cd_offset: narrow32(location.cd_offset),
            comment,
        }
    }

    /// Full-width view of the record's values.
    pub fn location(&self) -> DirectoryLocation {
        DirectoryLocation {
            disk_number: self.disk_number as u32,
            cd_start_disk: self.cd_start_disk as u32,
            entries_on_disk: self.entries_on_disk as u64,
            total_entries: self.total_entries as u64,
            cd_size: self.cd_size as u64,
            cd_offset: self.cd_offset as u64,
        }
    }

    /// Whether any field holds a Zip64 sentinel.
    pub fn has_sentinel(&self) -> bool {
        self.disk_number == ZIP64_SENTINEL_16
            || self.cd_start_disk == ZIP64_SENTINEL_16
            || self.entries_on_disk == ZIP64_SENTINEL_16
            || self.total_entries == ZIP64_SENTINEL_16
            || self.cd_size == ZIP64_SENTINEL_32
            || self.cd_offset == ZIP64_SENTINEL_32
    }

    /// Serializes the record.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.comment.len() > u16::MAX as usize {
            return Err(Error::InvalidFormat(format!(
                "archive comment of {} bytes exceeds 65535",
                self.comment.len()
            )));
        }
        let mut buf = Vec::with_capacity(EOCD_LEN + self.comment.len());
        put_u32_le(&mut buf, signature::END_OF_CENTRAL_DIRECTORY);
        put_u16_le(&mut buf, self.disk_number);
        put_u16_le(&mut buf, self.cd_start_disk);
        put_u16_le(&mut buf, self.entries_on_disk);
        put_u16_le(&mut buf, self.total_entries);
        put_u32_le(&mut buf, self.cd_size);
        put_u32_le(&mut buf, self.cd_offset);
        put_u16_le(&mut buf, self.comment.len() as u16);
        buf.extend_from_slice(&self.comment);
        Ok(buf)
    }

    /// Parses a record; a comment running past `data` is corrupt.
    pub fn parse(data: &[u8], offset: u64) -> Result<Self> {
        let mut r = ByteReader::new(data, offset);
        r.expect_signature(signature::END_OF_CENTRAL_DIRECTORY, "end of central directory")?;
        let disk_number = r.u16_le()?;
        let cd_start_disk = r.u16_le()?;
        let entries_on_disk = r.u16_le()?;
        let total_entries = r.u16_le()?;
        let cd_size = r.u32_le()?;
        let cd_offset = r.u32_le()?;
        let comment = r.prefixed_u16()?.to_vec();
        Ok(Self {
            disk_number,
            cd_start_disk,
            entries_on_disk,
            total_entries,
            cd_size,
            cd_offset,
            comment,
        })
    }
}

/// The Zip64 end of central directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64Eocd {
    /// Version made by.
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// Full-width directory location.
    pub location: DirectoryLocation,
    /// Extensible data sector, kept verbatim.
    pub extensible_data: Vec<u8>,
}

impl Zip64Eocd {
    /// Builds the record for a location.
    pub fn new(location: DirectoryLocation) -> Self {
        Self {
            version_made_by: version::MADE_BY,
            version_needed: version::ZIP64,
            location,
            extensible_data: Vec::new(),
        }
    }

    /// Serialized length.
    pub fn encoded_len(&self) -> usize {
        ZIP64_EOCD_LEN + self.extensible_data.len()
    }

    /// Serializes the record.
    pub fn to_bytes(&self) -> Vec<u8> {
        let loc = &self.location;
        let mut buf = Vec::with_capacity(self.encoded_len());
        put_u32_le(&mut buf, signature::ZIP64_END_OF_CENTRAL_DIRECTORY);
        // size of the record after this field
        put_u64_le(&mut buf, (self.encoded_len() - 12) as u64);
        put_u16_le(&mut buf, self.version_made_by);
        put_u16_le(&mut buf, self.version_needed);
        put_u32_le(&mut buf, loc.disk_number);
        put_u32_le(&mut buf, loc.cd_start_disk);
        put_u64_le(&mut buf, loc.entries_on_disk);
        put_u64_le(&mut buf, loc.total_entries);
        put_u64_le(&mut buf, loc.cd_size);
        put_u64_le(&mut buf, loc.cd_offset);
        buf.extend_from_slice(&self.extensible_data);
        buf
    }

    /// Reads the record at the current position of `r`.
    pub fn read<R: Read>(r: &mut R, offset: u64) -> Result<Self> {
        let mut fixed = [0u8; ZIP64_EOCD_LEN];
        r.read_exact(&mut fixed)
            .map_err(|_| Error::corrupt_header(offset, "zip64 end of central directory truncated"))?;
        let mut h = ByteReader::new(&fixed, offset);
        h.expect_signature(
            signature::ZIP64_END_OF_CENTRAL_DIRECTORY,
            "zip64 end of central directory",
        )?;
        let record_size = h.u64_le()?;
        if record_size < (ZIP64_EOCD_LEN - 12) as u64 {
            return Err(Error::corrupt_header(
                offset + 4,
                format!("zip64 end of central directory size {} too small", record_size),
            ));
        }
        let version_made_by = h.u16_le()?;
        let version_needed = h.u16_le()?;
        let location = DirectoryLocation {
            disk_number: h.u32_le()?,
            cd_start_disk: h.u32_le()?,
            entries_on_disk: h.u64_le()?,
            total_entries: h.u64_le()?,
            cd_size: h.u64_le()?,
            cd_offset: h.u64_le()?,
        };
        let extensible_len = record_size - (ZIP64_EOCD_LEN - 12) as u64;
        let extensible_len = usize::try_from(extensible_len)
            .ok()
            .filter(|&n| n <= u16::MAX as usize * 16)
            .ok_or_else(|| {
                Error::corrupt_header(offset + 4, "zip64 extensible data sector too large")
            })?;
        let mut extensible_data = vec![0u8; extensible_len];
        r.read_exact(&mut extensible_data).map_err(|_| {
            Error::corrupt_header(offset, "zip64 extensible data sector truncated")
        })?;
        Ok(Self {
            version_made_by,
            version_needed,
            location,
            extensible_data,
        })
    }
}

/// The Zip64 end of central directory locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64Locator {
    /// Disk holding the Zip64 EOCD record.
    pub eocd_disk: u32,
    /// Offset of the Zip64 EOCD within that disk.
    pub eocd_offset: u64,
    /// Total number of disks.
    pub total_disks: u32,
}

impl Zip64Locator {
    /// Serializes the locator.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ZIP64_LOCATOR_LEN);
        put_u32_le(&mut buf, signature::ZIP64_LOCATOR);
        put_u32_le(&mut buf, self.eocd_disk);
        put_u64_le(&mut buf, self.eocd_offset);
        put_u32_le(&mut buf, self.total_disks);
        buf
    }

    /// Parses a locator from exactly [`ZIP64_LOCATOR_LEN`] bytes.
    ///
    /// Returns `None` if the signature does not match.
    pub fn parse(data: &[u8], offset: u64) -> Result<Option<Self>> {
        let mut r = ByteReader::new(data, offset);
        if r.u32_le()? != signature::ZIP64_LOCATOR {
            return Ok(None);
        }
        Ok(Some(Self {
            eocd_disk: r.u32_le()?,
            eocd_offset: r.u64_le()?,
            total_disks: r.u32_le()?,
        }))
    }
}

/// Finds the EOCD by scanning backwards from the end of `reader`.
///
/// Returns the record and its absolute offset. A candidate is accepted
/// only if its comment fits before the end of the data.
pub fn find_eocd<R: Read + Seek>(reader: &mut R) -> Result<(Eocd, u64)> {
    let end = reader.seek(SeekFrom::End(0))?;
    let window = end.min(EOCD_SEARCH_WINDOW as u64);
    let start = end - window;
    reader.seek(SeekFrom::Start(start))?;
    let mut buffer = vec![0u8; window as usize];
    reader.read_exact(&mut buffer)?;

    let magic = signature::END_OF_CENTRAL_DIRECTORY.to_le_bytes();
    let mut pos = buffer.len().saturating_sub(EOCD_LEN);
    loop {
        if buffer.len() >= EOCD_LEN && buffer[pos..pos + 4] == magic {
            let comment_len = u16::from_le_bytes([buffer[pos + 20], buffer[pos + 21]]) as usize;
            if pos + EOCD_LEN + comment_len <= buffer.len() {
                let offset = start + pos as u64;
                let eocd = Eocd::parse(&buffer[pos..pos + EOCD_LEN + comment_len], offset)?;
                if pos + EOCD_LEN + comment_len != buffer.len() {
                    log::debug!(
                        "{} trailing bytes after end of central directory",
                        buffer.len() - pos - EOCD_LEN - comment_len
                    );
                }
                return Ok((eocd, offset));
            }
        }
        if pos == 0 {
            break;
        }
        pos -= 1;
    }
    Err(Error::InvalidFormat(
        "end of central directory record not found".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn location() -> DirectoryLocation {
        DirectoryLocation {
            disk_number: 0,
            cd_start_disk: 0,
            entries_on_disk: 3,
            total_entries: 3,
            cd_size: 150,
            cd_offset: 1000,
        }
    }

    #[test]
    fn test_eocd_layout() {
        let eocd = Eocd::for_location(&location(), b"hi".to_vec());
        let bytes = eocd.to_bytes().unwrap();
        assert_eq!(bytes.len(), EOCD_LEN + 2);
        assert_eq!(&bytes[..4], &[0x50, 0x4b, 0x05, 0x06]);
        assert_eq!(Eocd::parse(&bytes, 0).unwrap(), eocd);
        assert_eq!(eocd.location(), location());
        assert!(!eocd.has_sentinel());
    }

    #[test]
    fn test_overflowing_values_become_sentinels() {
        let loc = DirectoryLocation {
            total_entries: 0x1_0000,
            entries_on_disk: 0xFFFF,
            cd_offset: 0x1_0000_0000,
            ..location()
        };
        assert!(loc.exceeds_legacy_limits());
        let eocd = Eocd::for_location(&loc, Vec::new());
        assert_eq!(eocd.total_entries, 0xFFFF);
        assert_eq!(eocd.cd_offset, 0xFFFF_FFFF);
        assert_eq!(eocd.cd_size, 150);
        assert!(eocd.has_sentinel());

        let exact = DirectoryLocation {
            total_entries: 0xFFFF,
            cd_offset: 0xFFFF_FFFF,
            ..location()
        };
        assert!(!exact.exceeds_legacy_limits());
    }

    #[test]
    fn test_zip64_records_roundtrip() {
        let loc = DirectoryLocation {
            total_entries: 70_000,
            entries_on_disk: 70_000,
            cd_offset: 0x2_0000_0000,
            ..location()
        };
        let record = Zip64Eocd::new(loc);
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), ZIP64_EOCD_LEN);
        assert_eq!(&bytes[4..12], &44u64.to_le_bytes());
        let parsed = Zip64Eocd::read(&mut Cursor::new(&bytes), 0).unwrap();
        assert_eq!(parsed, record);

        let locator = Zip64Locator {
            eocd_disk: 0,
            eocd_offset: 0x2_0000_1000,
            total_disks: 1,
        };
        let bytes = locator.to_bytes();
        assert_eq!(bytes.len(), ZIP64_LOCATOR_LEN);
        assert_eq!(Zip64Locator::parse(&bytes, 0).unwrap(), Some(locator));
        assert_eq!(Zip64Locator::parse(&[0u8; 20], 0).unwrap(), None);
    }

    #[test]
    fn test_find_eocd_with_comment_and_prefix() {
        let mut data = vec![0xAAu8; 500];
        let eocd = Eocd::for_location(&location(), b"archive comment".to_vec());
        data.extend(eocd.to_bytes().unwrap());
        let (found, offset) = find_eocd(&mut Cursor::new(&data)).unwrap();
        assert_eq!(offset, 500);
        assert_eq!(found.comment, b"archive comment");
    }

    #[test]
    fn test_find_eocd_skips_signature_inside_comment() {
        // A comment containing a fake signature whose length overruns the end.
        let mut comment = vec![0x50, 0x4b, 0x05, 0x06];
        comment.extend([0u8; 16]);
        comment.extend([0xFF, 0x00]);
        let eocd = Eocd::for_location(&location(), comment.clone());
        let data = eocd.to_bytes().unwrap();
        let (found, offset) = find_eocd(&mut Cursor::new(&data)).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(found.comment, comment);
    }

    #[test]
    fn test_find_eocd_missing() {
        let data = vec![0u8; 100];
        assert!(matches!(
            find_eocd(&mut Cursor::new(&data)),
            Err(Error::InvalidFormat(_))
        ));
        assert!(find_eocd(&mut Cursor::new(Vec::<u8>::new())).is_err());
    }
}
