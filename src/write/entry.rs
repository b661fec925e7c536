//! The write half of the entry pipeline.
//!
//! Plaintext passes through the stages in a fixed order:
//!
//! ```text
//! plaintext -> CRC-32 -> compression -> encryption -> byte counter -> sink
//! ```
//!
//! [`PayloadPipeline`] owns that chain. [`EntryWriter`] drives it for a
//! streamed entry and walks the states `HeaderPending -> Payload ->
//! TrailerPending -> Closed`: the local header and the encryption header
//! are written before the first payload byte, and the codec trailer, the
//! cipher trailer and the data descriptor after the last.

use std::io::{self, Write};
use std::mem;

use super::options::EntryOptions;
use super::zip64::{CountingSink, SizeAccounting, Zip64Promoter};
use super::Session;
use crate::codec::{self, Encoder};
use crate::crypto::{EncryptionMethod, EntryEncoder, NonceSource};
use crate::format::descriptor::DataDescriptor;
use crate::format::local::LocalFileHeader;
use crate::format::span::{self, SpanKind};
use crate::volume::ArchiveSink;
use crate::{Error, Result, ZipEntry};

type Stage<'a, W> = Box<dyn Encoder<EntryEncoder<CountingSink<W>>> + 'a>;

/// Compression and encryption of one entry's payload.
pub(crate) struct PayloadPipeline<'a, W: Write + 'a> {
    stage: Stage<'a, W>,
    accounting: SizeAccounting,
    header_len: u64,
}

impl<'a, W: Write + 'a> PayloadPipeline<'a, W> {
    /// Writes the encryption header to `out` and builds the stages.
    ///
    /// `entry.flags` and, for PKWARE, `entry.crc32` must be final: they
    /// select the check byte.
    pub(crate) fn start(
        out: W,
        entry: &ZipEntry,
        options: &EntryOptions,
        nonce: &mut NonceSource,
    ) -> Result<Self> {
        let cipher = EntryEncoder::start(
            CountingSink::new(out),
            entry.encryption,
            options.password.as_ref(),
            entry.check_byte(),
            nonce,
        )
        .map_err(|e| e.with_entry_name(&entry.name))?;
        let header_len = cipher.get_ref().bytes_written();
        let stage = codec::build_encoder(entry.compression, options.level, cipher)?;
        Ok(Self {
            stage,
            accounting: SizeAccounting::new(),
            header_len,
        })
    }

    /// Bytes of encryption header already written.
    pub(crate) fn header_len(&self) -> u64 {
        self.header_len
    }

    /// Finishes the codec, then the cipher, and returns the output with
    /// the entry's totals.
    pub(crate) fn finish(self) -> Result<(W, SizeAccounting)> {
        let mut accounting = self.accounting;
        let cipher = self.stage.finish().map_err(Error::from_io)?;
        let counter = cipher.finish().map_err(Error::from_io)?;
        accounting.set_compressed(counter.bytes_written());
        Ok((counter.into_inner(), accounting))
    }
}

impl<'a, W: Write + 'a> Write for PayloadPipeline<'a, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.stage.write(buf)?;
        self.accounting.observe_plaintext(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stage.flush()
    }
}

/// Reserves room for the local header, fixes the entry's disk and offset,
/// and returns the serialized header.
///
/// Repeats when the offset or disk promotes the entry to Zip64, which
/// lengthens the header.
pub(crate) fn place_local_header<S: ArchiveSink>(
    sink: &mut S,
    entry: &mut ZipEntry,
    deferred: bool,
    promoter: &Zip64Promoter,
) -> Result<Vec<u8>> {
    loop {
        promoter.promote_entry(entry);
        let bytes = LocalFileHeader::for_entry(entry, deferred).to_bytes()?;
        sink.reserve(bytes.len() as u64)?;
        let position = sink.position();
        entry.header_offset = position.offset;
        entry.disk_number = position.disk;
        let was_zip64 = entry.zip64;
        if promoter.promote_entry(entry) == was_zip64 {
            return Ok(bytes);
        }
    }
}

/// Records the encryption header, payload and authentication code spans
/// of the data region `[data_start, data_end)`.
pub(crate) fn record_data_spans(
    session: &mut Session,
    index: usize,
    encryption: EncryptionMethod,
    header_len: u64,
    data_start: u64,
    data_end: u64,
) {
    let trailer_len = encryption.trailer_len();
    for span in span::data_region(index, data_start, data_end, header_len, trailer_len) {
        session.record(span.kind, span.entry, span.start, span.end);
    }
}

enum EntryState<'a, S: ArchiveSink> {
    HeaderPending(&'a mut S),
    Payload {
        pipeline: PayloadPipeline<'a, &'a mut S>,
        data_start: u64,
    },
    TrailerPending,
    Closed(Option<ZipEntry>),
}

impl<'a, S: ArchiveSink + 'a> EntryState<'a, S> {
    fn name(&self) -> &'static str {
        match self {
            Self::HeaderPending(_) => "header pending",
            Self::Payload { .. } => "writing payload",
            Self::TrailerPending => "writing trailer",
            Self::Closed(_) => "entry closed",
        }
    }
}

/// A streamed entry being written.
///
/// Obtained from [`ZipWriter::start_entry`](super::ZipWriter::start_entry).
/// The local header is already written; write the plaintext with the
/// [`Write`] impl and call [`close`](Self::close). CRC-32 and sizes follow
/// the data in a data descriptor (bit 3).
///
/// Dropping an entry without closing it finishes it on a best-effort basis
/// and logs any error.
pub struct EntryWriter<'a, S: ArchiveSink> {
    session: &'a mut Session,
    entry: ZipEntry,
    index: usize,
    options: EntryOptions,
    state: EntryState<'a, S>,
}

impl<'a, S: ArchiveSink + 'a> std::fmt::Debug for EntryWriter<'a, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryWriter")
            .field("name", &self.entry.name)
            .field("index", &self.index)
            .field("state", &self.state.name())
            .finish()
    }
}

impl<'a, S: ArchiveSink + 'a> EntryWriter<'a, S> {
    /// Writes the local and encryption headers and returns the writer in
    /// the payload state.
    pub(crate) fn begin(
        sink: &'a mut S,
        session: &'a mut Session,
        mut entry: ZipEntry,
        options: &EntryOptions,
    ) -> Result<Self> {
        entry.flags = entry.derived_flags(true);
        if options.large_file {
            entry.zip64 = true;
        }
        let index = session.entries.len();
        let mut writer = Self {
            session,
            entry,
            index,
            options: options.clone(),
            state: EntryState::HeaderPending(sink),
        };
        writer.write_headers()?;
        Ok(writer)
    }

    fn write_headers(&mut self) -> Result<()> {
        let sink = match mem::replace(&mut self.state, EntryState::Closed(None)) {
            EntryState::HeaderPending(sink) => sink,
            other => {
                let state = other.name();
                self.state = other;
                return Err(Error::InvalidState {
                    operation: "write local header",
                    state,
                });
            }
        };
        let header = place_local_header(sink, &mut self.entry, true, &self.session.promoter)?;
        let header_start = sink.logical_position();
        sink.write_all(&header)?;
        let data_start = sink.logical_position();
        self.session
            .record(SpanKind::LocalHeader, Some(self.index), header_start, data_start);
        log::debug!(
            "streaming entry '{}' at disk {} offset {} (zip64 reserved: {})",
            self.entry.name,
            self.entry.disk_number,
            self.entry.header_offset,
            self.entry.zip64
        );

        let pipeline =
            PayloadPipeline::start(sink, &self.entry, &self.options, &mut self.session.nonce)?;
        self.state = EntryState::Payload {
            pipeline,
            data_start,
        };
        Ok(())
    }

    /// The entry as known so far.
    pub fn entry(&self) -> &ZipEntry {
        &self.entry
    }

    /// Finishes the entry: codec trailer, cipher trailer, data descriptor.
    ///
    /// Returns the completed entry. Closing an entry again returns the same
    /// entry without writing anything.
    pub fn close(&mut self) -> Result<ZipEntry> {
        match mem::replace(&mut self.state, EntryState::TrailerPending) {
            EntryState::Payload {
                pipeline,
                data_start,
            } => {
                let result = self.write_trailer(pipeline, data_start);
                self.state = EntryState::Closed(result.as_ref().ok().cloned());
                result
            }
            EntryState::Closed(Some(entry)) => {
                self.state = EntryState::Closed(Some(entry.clone()));
                Ok(entry)
            }
            other => {
                let state = match &other {
                    EntryState::Closed(None) => "entry failed",
                    other => other.name(),
                };
                self.state = other;
                Err(Error::InvalidState {
                    operation: "close entry",
                    state,
                })
            }
        }
    }

    fn write_trailer(
        &mut self,
        pipeline: PayloadPipeline<'a, &'a mut S>,
        data_start: u64,
    ) -> Result<ZipEntry> {
        let header_len = pipeline.header_len();
        let (sink, accounting) = pipeline.finish()?;
        accounting.apply(&mut self.entry);
        self.session.promoter.promote_entry(&mut self.entry);

        let data_end = sink.logical_position();
        record_data_spans(
            self.session,
            self.index,
            self.entry.encryption,
            header_len,
            data_start,
            data_end,
        );

        let descriptor = DataDescriptor {
            crc32: self.entry.crc32,
            compressed_size: self.entry.compressed_size,
            uncompressed_size: self.entry.uncompressed_size,
        };
        sink.write_all(&descriptor.to_bytes(self.entry.zip64)?)?;
        self.session.record(
            SpanKind::DataDescriptor,
            Some(self.index),
            data_end,
            sink.logical_position(),
        );

        self.session.push_entry(self.entry.clone());
        Ok(self.entry.clone())
    }

    /// Abandons the payload after a failed write.
    fn abort(&mut self) {
        if let EntryState::Payload { pipeline, .. } =
            mem::replace(&mut self.state, EntryState::Closed(None))
        {
            if let Err(e) = pipeline.finish() {
                log::warn!(
                    "entry '{}': trailer after failed write also failed: {}",
                    self.entry.name,
                    e
                );
            }
        }
    }
}

impl<'a, S: ArchiveSink + 'a> Write for EntryWriter<'a, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = match &mut self.state {
            EntryState::Payload { pipeline, .. } => pipeline.write(buf),
            other => {
                return Err(io::Error::other(Error::InvalidState {
                    operation: "write entry data",
                    state: other.name(),
                }));
            }
        };
        if result.is_err() {
            self.abort();
        }
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.state {
            EntryState::Payload { pipeline, .. } => pipeline.flush(),
            _ => Ok(()),
        }
    }
}

impl<'a, S: ArchiveSink + 'a> Drop for EntryWriter<'a, S> {
    fn drop(&mut self) {
        if matches!(self.state, EntryState::Payload { .. }) {
            log::warn!(
                "entry '{}' dropped without close; finishing it",
                self.entry.name
            );
            if let Err(e) = self.close() {
                log::warn!("failed to finish entry '{}': {}", self.entry.name, e);
            }
        }
    }
}
