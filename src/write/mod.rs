//! Archive writing.
//!
//! A [`ZipWriter`] owns the archive sink and the offset cursor. Entries are
//! written one at a time, either streamed through an [`EntryWriter`]
//! (sizes follow the data in a data descriptor) or whole with
//! [`ZipWriter::write_entry_whole`] (the payload is buffered and the local
//! header carries the real sizes). [`ZipWriter::finish`] appends the
//! central directory and the end records.
//!
//! # Example
//!
//! ```rust
//! use std::io::Write;
//! use zipvault::{EncryptionMethod, EntryOptions, ZipWriter};
//!
//! let mut writer = ZipWriter::create(Vec::new())?;
//! writer.write_entry_whole("hello.txt", &EntryOptions::new(), b"Hello, World!")?;
//!
//! let options = EntryOptions::new()
//!     .encryption(EncryptionMethod::Pkware)
//!     .password("secret");
//! let mut entry = writer.start_entry("notes.txt", &options)?;
//! entry.write_all(b"streamed and encrypted")?;
//! entry.close()?;
//! drop(entry);
//!
//! let (result, sink) = writer.finish_into_inner()?;
//! assert_eq!(result.entries_written, 2);
//! let bytes = sink.into_inner();
//! # let _ = bytes;
//! # Ok::<(), zipvault::Error>(())
//! ```

mod entry;
mod options;
pub mod zip64;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::checksum::{Checksum, Crc32};
use crate::crypto::NonceSource;
use crate::format::central::CentralDirectoryHeader;
use crate::format::eocd::{
    DirectoryLocation, EOCD_LEN, Eocd, ZIP64_EOCD_LEN, ZIP64_LOCATOR_LEN, Zip64Eocd, Zip64Locator,
};
use crate::format::signature;
use crate::format::span::{Span, SpanKind, SpanRecorder};
use crate::timestamp::DosDateTime;
use crate::volume::{ArchiveSink, OffsetWriter, SplitWriter, VolumeConfig};
use crate::{Error, Result, ZipEntry};

pub use entry::EntryWriter;
pub use options::{EntryOptions, WriteOptions, WriteResult};
pub use zip64::{CountingSink, SizeAccounting, Zip64Promoter};

use entry::{PayloadPipeline, place_local_header, record_data_spans};

/// State of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Accepting new entries.
    AcceptingEntries,
    /// Central directory written.
    Finished,
}

/// Everything a writing session tracks besides the sink.
///
/// Kept apart from the sink so an [`EntryWriter`] can borrow both.
pub(crate) struct Session {
    options: WriteOptions,
    pub(crate) promoter: Zip64Promoter,
    pub(crate) nonce: NonceSource,
    pub(crate) entries: Vec<ZipEntry>,
    recorder: Option<Box<dyn SpanRecorder>>,
    state: WriterState,
    marker_pending: bool,
    total_size: u64,
    compressed_size: u64,
}

impl Session {
    fn new(options: WriteOptions, split: bool) -> Self {
        Self {
            promoter: Zip64Promoter::new(options.force_zip64),
            nonce: options.nonce_policy.source(),
            options,
            entries: Vec::new(),
            recorder: None,
            state: WriterState::AcceptingEntries,
            marker_pending: split,
            total_size: 0,
            compressed_size: 0,
        }
    }

    pub(crate) fn record(&mut self, kind: SpanKind, entry: Option<usize>, start: u64, end: u64) {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(Span::new(kind, entry, start, end));
        }
    }

    pub(crate) fn push_entry(&mut self, entry: ZipEntry) {
        self.total_size += entry.uncompressed_size;
        self.compressed_size += entry.compressed_size;
        self.entries.push(entry);
    }

    fn ensure_accepting(&self, operation: &'static str) -> Result<()> {
        match self.state {
            WriterState::AcceptingEntries => Ok(()),
            WriterState::Finished => Err(Error::InvalidState {
                operation,
                state: "archive finished",
            }),
        }
    }

    /// Builds the entry record and rejects settings that cannot be written
    /// before any byte reaches the sink.
    fn prepare_entry(&self, name: String, options: &EntryOptions) -> Result<ZipEntry> {
        if name.is_empty() {
            return Err(Error::InvalidFormat("entry name is empty".into()));
        }
        if !options.compression.is_supported() {
            return Err(Error::UnsupportedMethod {
                method: options.compression.to_u16(),
            });
        }
        options.encryption.ensure_available()?;
        if options.encryption.is_encrypted() && options.password.is_none() {
            return Err(Error::PasswordRequired { entry_name: name });
        }

        let mut entry = ZipEntry::new(name);
        entry.compression = options.compression;
        entry.encryption = options.encryption;
        if matches!(options.encryption, crate::EncryptionMethod::Aes(_)) {
            entry.aes_version = Some(options.aes_version);
        }
        entry.last_modified = options.last_modified.unwrap_or_else(DosDateTime::now);
        entry.comment = options.comment.clone();
        Ok(entry)
    }
}

/// A ZIP archive writer.
pub struct ZipWriter<S: ArchiveSink> {
    sink: S,
    session: Session,
}

impl<S: ArchiveSink> std::fmt::Debug for ZipWriter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipWriter")
            .field("position", &self.sink.position())
            .field("entries", &self.session.entries.len())
            .field("state", &self.session.state)
            .finish()
    }
}

impl<W: Write> ZipWriter<OffsetWriter<W>> {
    /// Creates a writer producing a single-file archive.
    pub fn create(writer: W) -> Result<Self> {
        Self::with_sink(OffsetWriter::new(writer))
    }
}

impl ZipWriter<OffsetWriter<BufWriter<File>>> {
    /// Creates a new archive file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref()).map_err(Error::Io)?;
        Self::create(BufWriter::new(file))
    }
}

impl ZipWriter<SplitWriter> {
    /// Creates a split archive writer.
    ///
    /// Disks are named after `config`'s archive path; see
    /// [`VolumeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the first disk cannot be created.
    pub fn create_split(config: VolumeConfig) -> Result<Self> {
        Self::with_sink(SplitWriter::create(config)?)
    }
}

impl<S: ArchiveSink> ZipWriter<S> {
    /// Creates a writer over any sink.
    pub fn with_sink(sink: S) -> Result<Self> {
        let split = sink.is_split() && sink.logical_position() == 0;
        Ok(Self {
            sink,
            session: Session::new(WriteOptions::default(), split),
        })
    }

    /// Replaces the archive-wide options.
    pub fn options(mut self, options: WriteOptions) -> Self {
        self.session.promoter = Zip64Promoter::new(options.force_zip64);
        self.session.nonce = options.nonce_policy.source();
        self.session.options = options;
        self
    }

    /// Records the byte range of every structure written from now on.
    pub fn with_recorder(mut self, recorder: impl SpanRecorder + 'static) -> Self {
        self.session.recorder = Some(Box::new(recorder));
        self
    }

    /// Entries completed so far, in archive order.
    pub fn entries(&self) -> &[ZipEntry] {
        &self.session.entries
    }

    /// The sink.
    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    fn write_split_marker(&mut self) -> Result<()> {
        if self.session.marker_pending {
            self.session.marker_pending = false;
            let start = self.sink.logical_position();
            self.sink.write_all(&signature::SPLIT_ARCHIVE.to_le_bytes())?;
            let end = self.sink.logical_position();
            self.session.record(SpanKind::SplitMarker, None, start, end);
        }
        Ok(())
    }

    /// Starts a streamed entry.
    ///
    /// The local header is written immediately with bit 3 set; CRC-32 and
    /// sizes follow the data in a data descriptor. Set
    /// [`EntryOptions::large_file`] when the entry may exceed 4 GiB.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if the method or scheme is not
    /// available or a password is missing.
    pub fn start_entry(
        &mut self,
        name: impl Into<String>,
        options: &EntryOptions,
    ) -> Result<EntryWriter<'_, S>> {
        self.session.ensure_accepting("start entry")?;
        let entry = self.session.prepare_entry(name.into(), options)?;
        self.write_split_marker()?;
        EntryWriter::begin(&mut self.sink, &mut self.session, entry, options)
    }

    /// Writes an entry whose data is fully available.
    ///
    /// The payload is compressed and encrypted into a buffer first, so the
    /// local header carries the real CRC-32 and sizes and no data
    /// descriptor is written.
    pub fn write_entry_whole(
        &mut self,
        name: impl Into<String>,
        options: &EntryOptions,
        data: &[u8],
    ) -> Result<ZipEntry> {
        self.session.ensure_accepting("write entry")?;
        let mut entry = self.session.prepare_entry(name.into(), options)?;
        self.write_split_marker()?;

        entry.flags = entry.derived_flags(false);
        // The PKWARE check byte comes from the CRC.
        entry.crc32 = Crc32::compute(data);

        let mut pipeline =
            PayloadPipeline::start(Vec::new(), &entry, options, &mut self.session.nonce)?;
        pipeline.write_all(data).map_err(Error::from_io)?;
        let header_len = pipeline.header_len();
        let (payload, accounting) = pipeline.finish()?;
        accounting.apply(&mut entry);

        let index = self.session.entries.len();
        let header = place_local_header(&mut self.sink, &mut entry, false, &self.session.promoter)?;
        let header_start = self.sink.logical_position();
        self.sink.write_all(&header)?;
        let data_start = self.sink.logical_position();
        self.session
            .record(SpanKind::LocalHeader, Some(index), header_start, data_start);
        self.sink.write_all(&payload)?;
        record_data_spans(
            &mut self.session,
            index,
            entry.encryption,
            header_len,
            data_start,
            self.sink.logical_position(),
        );
        log::debug!(
            "wrote entry '{}': {} -> {} bytes at disk {} offset {}",
            entry.name,
            entry.uncompressed_size,
            entry.compressed_size,
            entry.disk_number,
            entry.header_offset
        );

        self.session.push_entry(entry.clone());
        Ok(entry)
    }

    /// Adds a directory entry; a trailing `/` is appended if missing.
    pub fn add_directory(&mut self, name: impl Into<String>) -> Result<ZipEntry> {
        let mut name = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        let options = EntryOptions::new().compression(crate::CompressionMethod::Stored);
        self.write_entry_whole(name, &options, &[])
    }

    /// Writes the central directory and end records, finalizes the sink
    /// and returns it.
    pub fn finish_into_inner(mut self) -> Result<(WriteResult, S)> {
        self.session.ensure_accepting("finish archive")?;
        self.write_split_marker()?;

        let (mut location, cd_disks) = self.write_central_directory()?;
        let zip64 = self.write_end_records(&mut location, &cd_disks)?;
        self.session.state = WriterState::Finished;

        let volume_sizes = self.sink.finalize()?;
        log::debug!(
            "archive finished: {} entries, {} disks, zip64 {}",
            self.session.entries.len(),
            volume_sizes.len(),
            zip64
        );
        let result = WriteResult {
            entries_written: self.session.entries.len(),
            total_size: self.session.total_size,
            compressed_size: self.session.compressed_size,
            zip64,
            volume_count: volume_sizes.len() as u32,
            volume_sizes,
        };
        Ok((result, self.sink))
    }

    /// Finishes the archive, dropping the sink.
    pub fn finish(self) -> Result<WriteResult> {
        let (result, _sink) = self.finish_into_inner()?;
        Ok(result)
    }

    /// Writes one header per entry. Returns the directory location without
    /// the final disk fields, and the disk each header starts on.
    fn write_central_directory(&mut self) -> Result<(DirectoryLocation, Vec<u32>)> {
        let mut location = DirectoryLocation {
            total_entries: self.session.entries.len() as u64,
            ..Default::default()
        };
        let mut cd_disks = Vec::with_capacity(self.session.entries.len());
        let mut cd_logical_start = None;

        for index in 0..self.session.entries.len() {
            let bytes = CentralDirectoryHeader::for_entry(&self.session.entries[index]).to_bytes()?;
            self.sink.reserve(bytes.len() as u64)?;
            let position = self.sink.position();
            let start = self.sink.logical_position();
            if cd_logical_start.is_none() {
                cd_logical_start = Some(start);
                location.cd_start_disk = position.disk;
                location.cd_offset = position.offset;
            }
            cd_disks.push(position.disk);
            self.sink.write_all(&bytes)?;
            self.session.record(
                SpanKind::CentralHeader,
                Some(index),
                start,
                self.sink.logical_position(),
            );
        }

        match cd_logical_start {
            Some(start) => location.cd_size = self.sink.logical_position() - start,
            None => {
                // An empty directory starts where the end records go.
                self.sink.reserve(self.tail_len(false))?;
                let position = self.sink.position();
                location.cd_start_disk = position.disk;
                location.cd_offset = position.offset;
            }
        }
        Ok((location, cd_disks))
    }

    fn tail_len(&self, zip64: bool) -> u64 {
        let mut len = (EOCD_LEN + self.session.options.comment.len()) as u64;
        if zip64 {
            len += (ZIP64_EOCD_LEN + ZIP64_LOCATOR_LEN) as u64;
        }
        len
    }

    /// Writes the Zip64 end record and locator when needed, then the EOCD.
    /// Returns whether the Zip64 records were written.
    fn write_end_records(&mut self, location: &mut DirectoryLocation, cd_disks: &[u32]) -> Result<bool> {
        let mut zip64 = false;
        loop {
            self.sink.reserve(self.tail_len(zip64))?;
            location.disk_number = self.sink.position().disk;
            location.entries_on_disk = cd_disks
                .iter()
                .filter(|&&disk| disk == location.disk_number)
                .count() as u64;
            if zip64 || !self.session.promoter.promote_directory(location) {
                break;
            }
            zip64 = true;
        }

        if zip64 {
            let record_at = self.sink.position();
            let start = self.sink.logical_position();
            self.sink.write_all(&Zip64Eocd::new(*location).to_bytes())?;
            let locator_start = self.sink.logical_position();
            self.session
                .record(SpanKind::Zip64EndRecord, None, start, locator_start);

            let locator = Zip64Locator {
                eocd_disk: record_at.disk,
                eocd_offset: record_at.offset,
                total_disks: location.disk_number + 1,
            };
            self.sink.write_all(&locator.to_bytes())?;
            self.session.record(
                SpanKind::Zip64Locator,
                None,
                locator_start,
                self.sink.logical_position(),
            );
        }

        let comment = self.session.options.comment.as_bytes().to_vec();
        let eocd = Eocd::for_location(location, comment);
        let start = self.sink.logical_position();
        self.sink.write_all(&eocd.to_bytes()?)?;
        self.session.record(
            SpanKind::EndOfCentralDirectory,
            None,
            start,
            self.sink.logical_position(),
        );
        Ok(zip64)
    }
}
