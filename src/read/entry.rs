//! Reading one entry's data.
//!
//! An [`EntryReader`] runs the write pipeline backwards: the archive
//! source is bounded to the entry's data region, the scheme header is
//! checked by [`EntryDecoder::start`], and the decompressor reads from the
//! decrypting stream. The plaintext is checksummed on its way out.
//!
//! Verification happens when the decoder reports end of data, in this
//! order: the scheme trailer (the WinZip AES authentication code), the
//! CRC-32, the uncompressed size, and finally the data descriptor against
//! the central directory. A failure is returned from that final `read`,
//! so `read_to_end` surfaces it.

use std::io::{self, Read, SeekFrom, Take};
use std::mem;

use crate::checksum::{Checksum, Crc32};
use crate::codec::{self, Decoder};
use crate::crypto::{EncryptionMethod, EntryDecoder, Password};
use crate::error::PasswordDetectionMethod;
use crate::format::descriptor::DataDescriptor;
use crate::format::local::LocalFileHeader;
use crate::format::span::{self, Span, SpanKind, SpanRecorder};
use crate::volume::ArchiveSource;
use crate::{Error, Result, ZipEntry};

use super::options::ReadOptions;

type Stage<'a, R> = Box<dyn Decoder<EntryDecoder<Take<&'a mut R>>> + 'a>;

pub(crate) fn record(recorder: &mut Option<Box<dyn SpanRecorder>>, span: Span) {
    if let Some(recorder) = recorder.as_mut() {
        recorder.record(span);
    }
}

/// Seeks to the local header at `header_pos`, reads it and returns it with
/// the logical position of the entry's data.
pub(crate) fn read_local_header<R: ArchiveSource>(
    source: &mut R,
    entry: &ZipEntry,
    header_pos: u64,
) -> Result<(LocalFileHeader, u64)> {
    source.seek(SeekFrom::Start(header_pos))?;
    let local = LocalFileHeader::read(source, header_pos)?;
    if local.name != entry.name.as_bytes() {
        log::warn!(
            "local header at {:#x} names '{}', central directory names '{}'",
            header_pos,
            String::from_utf8_lossy(&local.name),
            entry.name
        );
    }
    let data_start = source.stream_position()?;
    Ok((local, data_start))
}

enum ReaderState<'a, R: Read> {
    Payload(Stage<'a, R>),
    Verified,
    Failed,
}

impl<R: Read> ReaderState<'_, R> {
    fn name(&self) -> &'static str {
        match self {
            Self::Payload(_) => "reading payload",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }
}

/// Streaming reader for one entry's plaintext.
///
/// Obtained from [`ZipArchive::open`](super::ZipArchive::open). Integrity
/// checks run when the end of the data is reached; call
/// [`close`](Self::close) to drain and verify an entry that was only
/// partly read.
pub struct EntryReader<'a, R: Read> {
    entry: ZipEntry,
    index: usize,
    verify_crc: bool,
    verify_descriptor: bool,
    crc: Crc32,
    produced: u64,
    data_end: u64,
    recorder: &'a mut Option<Box<dyn SpanRecorder>>,
    state: ReaderState<'a, R>,
}

impl<'a, R: ArchiveSource> EntryReader<'a, R> {
    /// Reads the local header at `header_pos` and starts the decoders.
    pub(crate) fn open(
        source: &'a mut R,
        recorder: &'a mut Option<Box<dyn SpanRecorder>>,
        index: usize,
        entry: ZipEntry,
        header_pos: u64,
        password: Option<Password>,
        options: &ReadOptions,
    ) -> Result<Self> {
        let (_, data_start) = read_local_header(source, &entry, header_pos)?;
        let data_end = data_start + entry.compressed_size;
        record(
            recorder,
            Span::new(SpanKind::LocalHeader, Some(index), header_pos, data_start),
        );

        let limited = source.take(entry.compressed_size);
        let cipher = EntryDecoder::start(
            limited,
            entry.encryption,
            password.as_ref(),
            entry.check_byte(),
            entry.compressed_size,
        )
        .map_err(|e| e.with_entry_name(&entry.name))?;

        let trailer_len = entry.encryption.trailer_len();
        for span in span::data_region(index, data_start, data_end, cipher.header_len(), trailer_len)
        {
            record(recorder, span);
        }

        let stage = codec::build_decoder(entry.compression, cipher)?;
        log::debug!(
            "reading '{}' ({:?}, {:?}, {} bytes at {:#x})",
            entry.name,
            entry.compression,
            entry.encryption,
            entry.compressed_size,
            data_start
        );
        Ok(Self {
            entry,
            index,
            verify_crc: options.verify_crc,
            verify_descriptor: options.verify_descriptor,
            crc: Crc32::default(),
            produced: 0,
            data_end,
            recorder,
            state: ReaderState::Payload(stage),
        })
    }

    /// The entry being read, as described by the central directory.
    pub fn entry(&self) -> &ZipEntry {
        &self.entry
    }

    /// Whether all data has been read and verified.
    pub fn is_verified(&self) -> bool {
        matches!(self.state, ReaderState::Verified)
    }

    /// Reads the remaining data and verifies the entry.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            ReaderState::Verified => Ok(()),
            ReaderState::Failed => Err(Error::InvalidState {
                operation: "close entry",
                state: self.state.name(),
            }),
            ReaderState::Payload(_) => {
                io::copy(self, &mut io::sink()).map_err(Error::from_io)?;
                Ok(())
            }
        }
    }

    /// The error for a CRC mismatch; for schemes without their own
    /// authentication it is the wrong-password signal.
    fn crc_error(&self, actual: u32) -> Error {
        match self.entry.encryption {
            EncryptionMethod::Pkware | EncryptionMethod::Strong(_) => Error::wrong_password(
                Some(self.entry.name.clone()),
                PasswordDetectionMethod::CrcMismatch,
            ),
            _ => Error::CrcMismatch {
                entry_name: self.entry.name.clone(),
                expected: self.entry.crc32,
                actual,
            },
        }
    }

    fn size_error(&self) -> Error {
        Error::SizeMismatch {
            entry_name: self.entry.name.clone(),
            expected: self.entry.uncompressed_size,
            actual: self.produced,
        }
    }

    /// Runs the end-of-data checks.
    fn verify(&mut self, stage: Stage<'a, R>) -> Result<()> {
        let name = &self.entry.name;
        let limited = stage
            .into_inner()
            .finish()
            .map_err(|e| e.with_entry_name(name))?;

        // PKWARE and strong entries have no MAC; the CRC is their only
        // wrong-password check, so it always runs.
        let crc_authenticates = matches!(
            self.entry.encryption,
            EncryptionMethod::Pkware | EncryptionMethod::Strong(_)
        );
        if (self.verify_crc || crc_authenticates) && self.entry.crc_is_reliable() {
            let actual = self.crc.finalize();
            if actual != self.entry.crc32 {
                return Err(self.crc_error(actual));
            }
        }
        if self.produced != self.entry.uncompressed_size {
            return Err(self.size_error());
        }

        if self.entry.has_data_descriptor() && self.verify_descriptor {
            let source = limited.into_inner();
            source.seek(SeekFrom::Start(self.data_end))?;
            let (descriptor, len) = DataDescriptor::read(source, self.entry.zip64, self.data_end)?;
            let expected = DataDescriptor {
                crc32: self.entry.crc32,
                compressed_size: self.entry.compressed_size,
                uncompressed_size: self.entry.uncompressed_size,
            };
            if descriptor != expected {
                return Err(Error::corrupt_header(
                    self.data_end,
                    format!(
                        "data descriptor of '{}' disagrees with the central directory",
                        self.entry.name
                    ),
                ));
            }
            record(
                &mut *self.recorder,
                Span::new(
                    SpanKind::DataDescriptor,
                    Some(self.index),
                    self.data_end,
                    self.data_end + len as u64,
                ),
            );
        }
        log::trace!("verified '{}'", self.entry.name);
        Ok(())
    }

    /// Maps a decoder failure to the error the caller should see.
    fn read_error(&self, err: io::Error) -> Error {
        let err = Error::from_io(err).with_entry_name(&self.entry.name);
        // Without authentication, undecodable plaintext is the only sign
        // of a wrong PKWARE password that passed the check byte.
        let undecodable = matches!(
            &err,
            Error::Io(e) if matches!(e.kind(), io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof)
        );
        if undecodable && self.entry.encryption == EncryptionMethod::Pkware {
            return Error::wrong_password(
                Some(self.entry.name.clone()),
                PasswordDetectionMethod::CrcMismatch,
            );
        }
        err
    }
}

impl<R: ArchiveSource> Read for EntryReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let stage = match &mut self.state {
            ReaderState::Payload(stage) => stage,
            ReaderState::Verified => return Ok(0),
            ReaderState::Failed => {
                return Err(Error::InvalidState {
                    operation: "read entry",
                    state: "failed",
                }
                .into());
            }
        };

        let n = match stage.read(buf) {
            Ok(n) => n,
            Err(e) => {
                let err = self.read_error(e);
                self.state = ReaderState::Failed;
                return Err(err.into());
            }
        };

        if n > 0 {
            self.crc.update(&buf[..n]);
            self.produced += n as u64;
            if self.produced > self.entry.uncompressed_size {
                let err = if self.entry.encryption == EncryptionMethod::Pkware {
                    self.crc_error(0)
                } else {
                    self.size_error()
                };
                self.state = ReaderState::Failed;
                return Err(err.into());
            }
            return Ok(n);
        }

        let ReaderState::Payload(stage) = mem::replace(&mut self.state, ReaderState::Failed) else {
            return Ok(0);
        };
        self.verify(stage)?;
        self.state = ReaderState::Verified;
        Ok(0)
    }
}

impl<R: Read> Drop for EntryReader<'_, R> {
    fn drop(&mut self) {
        if matches!(self.state, ReaderState::Payload(_)) {
            log::trace!(
                "entry '{}' dropped after {} of {} bytes; not verified",
                self.entry.name,
                self.produced,
                self.entry.uncompressed_size
            );
        }
    }
}

impl<R: Read> std::fmt::Debug for EntryReader<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryReader")
            .field("entry", &self.entry.name)
            .field("state", &self.state.name())
            .field("produced", &self.produced)
            .finish()
    }
}
