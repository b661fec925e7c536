//! Reading ZIP archives.
//!
//! A [`ZipArchive`] locates the end of central directory record, follows
//! the Zip64 locator when one is present, and parses the whole central
//! directory up front. Entry data is read lazily through an
//! [`EntryReader`].
//!
//! # Example
//!
//! ```rust
//! use zipvault::{EntryOptions, Password, ZipArchive, ZipWriter};
//! use zipvault::EncryptionMethod;
//! use std::io::Cursor;
//!
//! let mut writer = ZipWriter::create(Vec::new())?;
//! let options = EntryOptions::new()
//!     .encryption(EncryptionMethod::Pkware)
//!     .password("secret");
//! writer.write_entry_whole("notes.txt", &options, b"remember the milk")?;
//! let (_, sink) = writer.finish_into_inner()?;
//!
//! let mut archive = ZipArchive::new(Cursor::new(sink.into_inner()))?;
//! let data = archive.read_to_vec(0, &Password::new("secret"))?;
//! assert_eq!(data, b"remember the milk");
//! # Ok::<(), zipvault::Error>(())
//! ```

mod entry;
mod options;

use std::fs::File;
use std::io::{BufReader, Read, SeekFrom};
use std::path::Path;

use crate::crypto::{EncryptionHeader, Password, PasswordProvider};
use crate::format::bytes::{ByteReader, read_vec};
use crate::format::central::{self, CentralDirectoryHeader};
use crate::format::eocd::{
    self, DirectoryLocation, EOCD_LEN, ZIP64_EOCD_LEN, ZIP64_LOCATOR_LEN, Zip64Eocd, Zip64Locator,
};
use crate::format::signature;
use crate::format::span::{Span, SpanKind, SpanRecorder};
use crate::volume::{ArchiveSource, DiskPosition, SplitReader};
use crate::{Error, Result, ZipEntry};

pub use entry::EntryReader;
pub use options::ReadOptions;

use entry::{read_local_header, record};

/// Upper bound for the buffer preallocated by [`ZipArchive::read_to_vec`].
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// The end records as found in the archive.
struct EndRecords {
    location: DirectoryLocation,
    comment: Vec<u8>,
    /// Logical position of the first end record (where the directory ends).
    records_start: u64,
    zip64: bool,
}

/// A ZIP archive opened for reading.
pub struct ZipArchive<R: ArchiveSource> {
    source: R,
    entries: Vec<ZipEntry>,
    comment: String,
    location: DirectoryLocation,
    zip64: bool,
    /// Bytes in front of the archive (a stub or an appended-to file).
    prefix: u64,
    options: ReadOptions,
    recorder: Option<Box<dyn SpanRecorder>>,
}

impl<R: ArchiveSource> std::fmt::Debug for ZipArchive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchive")
            .field("entries", &self.entries.len())
            .field("zip64", &self.zip64)
            .field("prefix", &self.prefix)
            .field("location", &self.location)
            .finish()
    }
}

impl ZipArchive<BufReader<File>> {
    /// Opens a single-file archive from disk.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl ZipArchive<SplitReader> {
    /// Opens a split archive by the path of its last disk.
    pub fn open_split(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(SplitReader::open(path)?)
    }
}

impl<R: ArchiveSource> ZipArchive<R> {
    /// Reads the central directory of `source` with default options.
    pub fn new(source: R) -> Result<Self> {
        Self::load(source, ReadOptions::default(), None)
    }

    /// Reads the central directory of `source`.
    pub fn with_options(source: R, options: ReadOptions) -> Result<Self> {
        Self::load(source, options, None)
    }

    /// Reads the central directory of `source`, reporting the byte range of
    /// every structure read to `recorder`.
    pub fn with_recorder(
        source: R,
        options: ReadOptions,
        recorder: impl SpanRecorder + 'static,
    ) -> Result<Self> {
        Self::load(source, options, Some(Box::new(recorder)))
    }

    fn load(
        mut source: R,
        options: ReadOptions,
        mut recorder: Option<Box<dyn SpanRecorder>>,
    ) -> Result<Self> {
        let end = Self::read_end_records(&mut source, &mut recorder)?;
        let location = end.location;
        if location.disk_number >= source.disk_count() {
            return Err(Error::InvalidFormat(format!(
                "archive spans {} disks but the source has {}; open it as a split archive",
                location.disk_number as u64 + 1,
                source.disk_count()
            )));
        }

        let cd_start = source.locate(DiskPosition {
            disk: location.cd_start_disk,
            offset: location.cd_offset,
        })?;
        let cd_end = cd_start.checked_add(location.cd_size).ok_or_else(|| {
            Error::corrupt_header(end.records_start, "central directory size overflows")
        })?;
        let prefix = if source.disk_count() == 1 {
            end.records_start.checked_sub(cd_end).ok_or_else(|| {
                Error::corrupt_header(
                    end.records_start,
                    "central directory overlaps the end records",
                )
            })?
        } else {
            if cd_end > end.records_start {
                return Err(Error::corrupt_header(
                    end.records_start,
                    "central directory overlaps the end records",
                ));
            }
            0
        };
        if prefix > 0 {
            log::debug!("{} bytes precede the archive", prefix);
        }

        let min_size = location
            .total_entries
            .checked_mul(central::FIXED_LEN as u64)
            .unwrap_or(u64::MAX);
        if min_size > location.cd_size {
            return Err(Error::corrupt_header(
                end.records_start,
                format!(
                    "{} entries cannot fit in a {} byte central directory",
                    location.total_entries, location.cd_size
                ),
            ));
        }

        let cd_pos = cd_start + prefix;
        source.seek(SeekFrom::Start(cd_pos))?;
        let cd_len = usize::try_from(location.cd_size)
            .map_err(|_| Error::corrupt_header(cd_pos, "central directory too large"))?;
        let directory = read_vec(&mut source, cd_len)
            .map_err(|_| Error::corrupt_header(cd_pos, "central directory truncated"))?;

        let mut r = ByteReader::new(&directory, cd_pos);
        let mut entries = Vec::with_capacity(location.total_entries as usize);
        for index in 0..location.total_entries as usize {
            let start = r.offset();
            let header = CentralDirectoryHeader::parse(&mut r)?;
            entries.push(header.to_entry()?);
            record(
                &mut recorder,
                Span::new(SpanKind::CentralHeader, Some(index), start, r.offset()),
            );
        }
        if !r.is_empty() {
            log::debug!(
                "{} unparsed bytes at the end of the central directory",
                r.remaining()
            );
        }

        if recorder.is_some() {
            Self::record_split_marker(&mut source, &mut recorder, prefix)?;
        }

        log::debug!(
            "opened archive: {} entries, {} disks{}",
            entries.len(),
            source.disk_count(),
            if end.zip64 { ", zip64" } else { "" }
        );
        Ok(Self {
            source,
            entries,
            comment: String::from_utf8_lossy(&end.comment).into_owned(),
            location,
            zip64: end.zip64,
            prefix,
            options,
            recorder,
        })
    }

    /// Finds the EOCD and, if present, the Zip64 locator and record.
    fn read_end_records(
        source: &mut R,
        recorder: &mut Option<Box<dyn SpanRecorder>>,
    ) -> Result<EndRecords> {
        let (record_eocd, eocd_pos) = eocd::find_eocd(source)?;
        let eocd_end = eocd_pos + (EOCD_LEN + record_eocd.comment.len()) as u64;

        let locator = if eocd_pos >= ZIP64_LOCATOR_LEN as u64 {
            let locator_pos = eocd_pos - ZIP64_LOCATOR_LEN as u64;
            source.seek(SeekFrom::Start(locator_pos))?;
            let buf = read_vec(source, ZIP64_LOCATOR_LEN)?;
            Zip64Locator::parse(&buf, locator_pos)?.map(|l| (l, locator_pos))
        } else {
            None
        };

        let Some((locator, locator_pos)) = locator else {
            if record_eocd.has_sentinel() {
                log::warn!("end of central directory holds zip64 sentinels but no locator");
            }
            record(
                recorder,
                Span::new(SpanKind::EndOfCentralDirectory, None, eocd_pos, eocd_end),
            );
            return Ok(EndRecords {
                location: record_eocd.location(),
                comment: record_eocd.comment,
                records_start: eocd_pos,
                zip64: false,
            });
        };

        let (zip64_record, zip64_pos) = Self::read_zip64_record(source, &locator, locator_pos)?;
        record(
            recorder,
            Span::new(
                SpanKind::Zip64EndRecord,
                None,
                zip64_pos,
                zip64_pos + zip64_record.encoded_len() as u64,
            ),
        );
        record(
            recorder,
            Span::new(SpanKind::Zip64Locator, None, locator_pos, eocd_pos),
        );
        record(
            recorder,
            Span::new(SpanKind::EndOfCentralDirectory, None, eocd_pos, eocd_end),
        );
        Ok(EndRecords {
            location: zip64_record.location,
            comment: record_eocd.comment,
            records_start: zip64_pos,
            zip64: true,
        })
    }

    /// Reads the Zip64 end record the locator points to.
    ///
    /// In a single-file archive with data in front of it the declared
    /// offset is off by the prefix; the record is then looked for directly
    /// before the locator.
    fn read_zip64_record(
        source: &mut R,
        locator: &Zip64Locator,
        locator_pos: u64,
    ) -> Result<(Zip64Eocd, u64)> {
        let declared = source.locate(DiskPosition {
            disk: locator.eocd_disk,
            offset: locator.eocd_offset,
        })?;
        source.seek(SeekFrom::Start(declared))?;
        match Zip64Eocd::read(source, declared) {
            Ok(record) => Ok((record, declared)),
            Err(err) if source.disk_count() == 1 && locator_pos >= ZIP64_EOCD_LEN as u64 => {
                let adjacent = locator_pos - ZIP64_EOCD_LEN as u64;
                if adjacent == declared {
                    return Err(err);
                }
                log::debug!(
                    "zip64 end record not at declared offset {:#x}, trying {:#x}",
                    declared,
                    adjacent
                );
                source.seek(SeekFrom::Start(adjacent))?;
                Ok((Zip64Eocd::read(source, adjacent)?, adjacent))
            }
            Err(err) => Err(err),
        }
    }

    fn record_split_marker(
        source: &mut R,
        recorder: &mut Option<Box<dyn SpanRecorder>>,
        prefix: u64,
    ) -> Result<()> {
        source.seek(SeekFrom::Start(prefix))?;
        let mut marker = [0u8; 4];
        if source.read_exact(&mut marker).is_ok() {
            let marker = u32::from_le_bytes(marker);
            if marker == signature::SPLIT_ARCHIVE || marker == signature::SINGLE_DISK_ARCHIVE {
                record(
                    recorder,
                    Span::new(SpanKind::SplitMarker, None, prefix, prefix + 4),
                );
            }
        }
        Ok(())
    }

    /// All entries, in central directory order.
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry at `index`.
    pub fn entry(&self, index: usize) -> Option<&ZipEntry> {
        self.entries.get(index)
    }

    /// Index of the first entry named `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// The first entry named `name`.
    pub fn by_name(&self, name: &str) -> Option<&ZipEntry> {
        self.index_of(name).map(|i| &self.entries[i])
    }

    /// Archive comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Whether the archive has Zip64 end records.
    pub fn is_zip64(&self) -> bool {
        self.zip64
    }

    /// Full-width location of the central directory.
    pub fn directory_location(&self) -> DirectoryLocation {
        self.location
    }

    /// Bytes found in front of the archive.
    pub fn prefix_len(&self) -> u64 {
        self.prefix
    }

    /// The options the archive was opened with.
    pub fn read_options(&self) -> &ReadOptions {
        &self.options
    }

    /// Returns the source.
    pub fn into_inner(self) -> R {
        self.source
    }

    fn entry_or_err(&self, index: usize) -> Result<&ZipEntry> {
        self.entries.get(index).ok_or_else(|| {
            Error::InvalidFormat(format!(
                "entry index {} out of range ({} entries)",
                index,
                self.entries.len()
            ))
        })
    }

    fn header_position(&self, entry: &ZipEntry) -> Result<u64> {
        let pos = self.source.locate(DiskPosition {
            disk: entry.disk_number,
            offset: entry.header_offset,
        })?;
        Ok(pos + self.prefix)
    }

    fn resolve_password<P: PasswordProvider + ?Sized>(
        &self,
        entry: &ZipEntry,
        provider: &P,
    ) -> Result<Option<Password>> {
        if !entry.is_encrypted() {
            return Ok(None);
        }
        provider
            .password_for(entry)
            .or_else(|| self.options.password.clone())
            .map(Some)
            .ok_or_else(|| Error::PasswordRequired {
                entry_name: entry.name.clone(),
            })
    }

    /// Opens the entry at `index` for reading.
    ///
    /// `provider` is asked for a password if the entry is encrypted; the
    /// password from [`ReadOptions`] is used when it has none.
    ///
    /// # Errors
    ///
    /// Fails before reading any data if the method or scheme is not
    /// supported or no password is available, and with
    /// [`Error::WrongPassword`] if the scheme header rejects the password.
    pub fn open<P: PasswordProvider + ?Sized>(
        &mut self,
        index: usize,
        provider: &P,
    ) -> Result<EntryReader<'_, R>> {
        let entry = self.entry_or_err(index)?.clone();
        entry.encryption.ensure_available()?;
        if !entry.compression.is_supported() {
            return Err(Error::UnsupportedMethod {
                method: entry.compression.to_u16(),
            });
        }
        let password = self.resolve_password(&entry, provider)?;
        let header_pos = self.header_position(&entry)?;
        EntryReader::open(
            &mut self.source,
            &mut self.recorder,
            index,
            entry,
            header_pos,
            password,
            &self.options,
        )
    }

    /// Opens the first entry named `name`.
    pub fn open_by_name<P: PasswordProvider + ?Sized>(
        &mut self,
        name: &str,
        provider: &P,
    ) -> Result<EntryReader<'_, R>> {
        let index = self
            .index_of(name)
            .ok_or_else(|| Error::InvalidFormat(format!("no entry named '{}'", name)))?;
        self.open(index, provider)
    }

    /// Reads and verifies the whole entry at `index`.
    pub fn read_to_vec<P: PasswordProvider + ?Sized>(
        &mut self,
        index: usize,
        provider: &P,
    ) -> Result<Vec<u8>> {
        let mut reader = self.open(index, provider)?;
        let capacity = reader.entry().uncompressed_size.min(MAX_PREALLOCATION) as usize;
        let mut data = Vec::with_capacity(capacity);
        reader.read_to_end(&mut data).map_err(Error::from_io)?;
        Ok(data)
    }

    /// Reads the encryption header of the entry at `index` without
    /// decrypting anything.
    ///
    /// Returns `None` for unencrypted entries.
    pub fn encryption_header(&mut self, index: usize) -> Result<Option<EncryptionHeader>> {
        let entry = self.entry_or_err(index)?.clone();
        if !entry.is_encrypted() {
            return Ok(None);
        }
        let header_pos = self.header_position(&entry)?;
        let (_, data_start) = read_local_header(&mut self.source, &entry, header_pos)?;
        let mut limited = (&mut self.source).take(entry.compressed_size);
        EncryptionHeader::read(&mut limited, entry.encryption).map_err(|e| match e {
            Error::CorruptHeader { reason, .. } => Error::corrupt_header(
                data_start,
                format!("{}: {}", entry.name, reason),
            ),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressionMethod;
    use crate::crypto::EncryptionMethod;
    use crate::error::PasswordDetectionMethod;
    use crate::format::span::SpanLog;
    use crate::timestamp::DosDateTime;
    use crate::{EntryOptions, WriteOptions, ZipWriter};
    use std::io::{Cursor, Write};
    use std::sync::{Arc, Mutex};

    fn stored() -> EntryOptions {
        EntryOptions::new()
            .compression(CompressionMethod::Stored)
            .last_modified(DosDateTime::from_raw(0x5721, 0x6000))
    }

    fn build(f: impl FnOnce(&mut ZipWriter<crate::volume::OffsetWriter<Vec<u8>>>)) -> Vec<u8> {
        let mut writer = ZipWriter::create(Vec::new()).unwrap();
        f(&mut writer);
        let (_, sink) = writer.finish_into_inner().unwrap();
        sink.into_inner()
    }

    #[test]
    fn test_reads_whole_and_streamed_entries() {
        let bytes = build(|w| {
            w.write_entry_whole("a.txt", &stored(), b"Hello, World!").unwrap();
            let mut entry = w.start_entry("b.txt", &stored()).unwrap();
            entry.write_all(b"streamed").unwrap();
            entry.close().unwrap();
        });
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        assert!(!archive.is_zip64());
        assert_eq!(archive.read_to_vec(0, &()).unwrap(), b"Hello, World!");
        assert_eq!(archive.read_to_vec(1, &()).unwrap(), b"streamed");
        assert!(archive.entries()[1].has_data_descriptor());
        assert_eq!(archive.index_of("b.txt"), Some(1));
    }

    #[test]
    fn test_comment_and_forced_zip64() {
        let mut writer = ZipWriter::create(Vec::new())
            .unwrap()
            .options(WriteOptions::new().force_zip64(true).comment("archive note"));
        writer.write_entry_whole("z", &stored(), b"zip64").unwrap();
        let (_, sink) = writer.finish_into_inner().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(sink.into_inner())).unwrap();
        assert!(archive.is_zip64());
        assert_eq!(archive.comment(), "archive note");
        assert!(archive.entries()[0].zip64);
        assert_eq!(archive.read_to_vec(0, &()).unwrap(), b"zip64");
    }

    #[test]
    fn test_prefixed_archive() {
        let bytes = build(|w| {
            w.write_entry_whole("p", &stored(), b"after a stub").unwrap();
        });
        let mut prefixed = b"#!/bin/sh\nexit 0\n".to_vec();
        let stub = prefixed.len() as u64;
        prefixed.extend_from_slice(&bytes);

        let mut archive = ZipArchive::new(Cursor::new(prefixed)).unwrap();
        assert_eq!(archive.prefix_len(), stub);
        assert_eq!(archive.read_to_vec(0, &()).unwrap(), b"after a stub");
    }

    #[test]
    fn test_crc_mismatch_detected() {
        let mut bytes = build(|w| {
            w.write_entry_whole("a.txt", &stored(), b"Hello, World!").unwrap();
        });
        bytes[35] ^= 0x01;
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        match archive.read_to_vec(0, &()) {
            Err(Error::CrcMismatch { entry_name, .. }) => assert_eq!(entry_name, "a.txt"),
            other => panic!("expected CrcMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_crc_check_can_be_disabled() {
        let mut bytes = build(|w| {
            w.write_entry_whole("a.txt", &stored(), b"Hello, World!").unwrap();
        });
        bytes[35] ^= 0x01;
        let options = ReadOptions::new().verify_crc(false);
        let mut archive = ZipArchive::with_options(Cursor::new(bytes), options).unwrap();
        assert_eq!(archive.read_to_vec(0, &()).unwrap(), b"Iello, World!");
    }

    #[test]
    fn test_descriptor_disagreement_is_corrupt() {
        let mut bytes = build(|w| {
            let mut entry = w.start_entry("s.txt", &stored()).unwrap();
            entry.write_all(b"streamed").unwrap();
            entry.close().unwrap();
        });
        // Uncompressed size field of the descriptor after the payload.
        bytes[35 + 8 + 12] = 9;
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            archive.read_to_vec(0, &()),
            Err(Error::CorruptHeader { .. })
        ));
    }

    #[test]
    fn test_password_required_names_entry() {
        let options = stored()
            .encryption(EncryptionMethod::Pkware)
            .password("pw");
        let bytes = build(|w| {
            w.write_entry_whole("locked", &options, b"secret").unwrap();
        });
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        match archive.open(0, &()) {
            Err(Error::PasswordRequired { entry_name }) => assert_eq!(entry_name, "locked"),
            other => panic!("expected PasswordRequired, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_pkware_wrong_password() {
        let options = stored()
            .encryption(EncryptionMethod::Pkware)
            .password("right");
        let bytes = build(|w| {
            w.write_entry_whole("locked", &options, b"secret data").unwrap();
        });
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(
            archive.read_to_vec(0, &Password::new("right")).unwrap(),
            b"secret data"
        );
        match archive.read_to_vec(0, &Password::new("wrong")) {
            Err(Error::WrongPassword {
                entry_name,
                detection_method,
            }) => {
                assert_eq!(entry_name.as_deref(), Some("locked"));
                assert!(matches!(
                    detection_method,
                    PasswordDetectionMethod::CheckByte | PasswordDetectionMethod::CrcMismatch
                ));
            }
            other => panic!("expected WrongPassword, got {:?}", other),
        }
    }

    #[test]
    fn test_fallback_password_from_options() {
        let options = stored()
            .encryption(EncryptionMethod::Pkware)
            .password("pw");
        let bytes = build(|w| {
            w.write_entry_whole("locked", &options, b"secret").unwrap();
        });
        let read = ReadOptions::new().password("pw");
        let mut archive = ZipArchive::with_options(Cursor::new(bytes), read).unwrap();
        assert_eq!(archive.read_to_vec(0, &()).unwrap(), b"secret");
        assert!(matches!(
            archive.encryption_header(0).unwrap(),
            Some(EncryptionHeader::Pkware(_))
        ));
    }

    #[test]
    fn test_close_drains_and_verifies() {
        let bytes = build(|w| {
            w.write_entry_whole("a.txt", &stored(), b"Hello, World!").unwrap();
        });
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut reader = archive.open(0, &()).unwrap();
        let mut first = [0u8; 5];
        reader.read_exact(&mut first).unwrap();
        assert_eq!(&first, b"Hello");
        assert!(!reader.is_verified());
        reader.close().unwrap();
        assert!(reader.is_verified());
        reader.close().unwrap();
    }

    #[test]
    fn test_unsupported_method_rejected_before_reading() {
        let mut bytes = build(|w| {
            w.write_entry_whole("m", &stored(), b"data").unwrap();
        });
        // Method field of the central directory header.
        let cd = bytes.len() - EOCD_LEN - (central::FIXED_LEN + 1);
        bytes[cd + 10] = 14;
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            archive.open(0, &()),
            Err(Error::UnsupportedMethod { method: 14 })
        ));
    }

    #[test]
    fn test_not_an_archive() {
        assert!(ZipArchive::new(Cursor::new(b"plain text, no zip".to_vec())).is_err());
    }

    #[test]
    fn test_read_spans_match_written_spans() {
        let written = Arc::new(Mutex::new(SpanLog::new()));
        let mut writer = ZipWriter::create(Vec::new())
            .unwrap()
            .with_recorder(written.clone());
        writer.write_entry_whole("one", &stored(), b"1111").unwrap();
        let mut entry = writer.start_entry("two", &stored()).unwrap();
        entry.write_all(b"22").unwrap();
        entry.close().unwrap();
        drop(entry);
        let (_, sink) = writer.finish_into_inner().unwrap();

        let read = Arc::new(Mutex::new(SpanLog::new()));
        let mut archive =
            ZipArchive::with_recorder(Cursor::new(sink.into_inner()), ReadOptions::new(), read.clone())
                .unwrap();
        archive.read_to_vec(0, &()).unwrap();
        archive.read_to_vec(1, &()).unwrap();

        let mut written: Vec<Span> = written.lock().unwrap().spans().to_vec();
        let mut read: Vec<Span> = read.lock().unwrap().spans().to_vec();
        written.sort_by_key(|s| s.start);
        read.sort_by_key(|s| s.start);
        assert_eq!(written, read);
    }
}
