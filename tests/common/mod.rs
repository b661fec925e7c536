//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zipvault::crypto::NoncePolicy;
use zipvault::format::span::{Span, SpanKind, SpanLog};
use zipvault::volume::{ArchiveSource, OffsetWriter};
use zipvault::{CompressionMethod, DosDateTime, EntryOptions, WriteOptions, WriteResult, ZipWriter};

/// A fixed timestamp so archives are reproducible.
pub fn fixed_time() -> DosDateTime {
    DosDateTime::from_parts(2024, 5, 17, 10, 30, 0).unwrap()
}

/// Stored entry options with a fixed timestamp.
pub fn stored() -> EntryOptions {
    EntryOptions::new()
        .compression(CompressionMethod::Stored)
        .last_modified(fixed_time())
}

/// Write options with reproducible salts and IVs.
pub fn deterministic() -> WriteOptions {
    WriteOptions::new().nonce_policy(NoncePolicy::deterministic([7u8; 32]))
}

/// Pseudo-random bytes from a seed.
pub fn random_data(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

/// Text-like data that compresses well.
pub fn compressible_data(len: usize) -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .cycle()
        .take(len)
        .copied()
        .collect()
}

/// Creates an in-memory archive from whole entries.
pub fn create_archive(
    options: WriteOptions,
    entries: &[(&str, EntryOptions, &[u8])],
) -> zipvault::Result<(Vec<u8>, WriteResult)> {
    let mut writer = ZipWriter::create(Vec::new())?.options(options);
    for (name, entry_options, data) in entries {
        writer.write_entry_whole(*name, entry_options, data)?;
    }
    let (result, sink) = writer.finish_into_inner()?;
    Ok((sink.into_inner(), result))
}

/// Creates an in-memory archive from streamed entries, writing each in
/// chunks of `chunk` bytes.
pub fn create_streamed_archive(
    options: WriteOptions,
    entries: &[(&str, EntryOptions, &[u8])],
    chunk: usize,
) -> zipvault::Result<Vec<u8>> {
    let mut writer = ZipWriter::create(Vec::new())?.options(options);
    for (name, entry_options, data) in entries {
        let mut entry = writer.start_entry(*name, entry_options)?;
        for part in data.chunks(chunk.max(1)) {
            entry.write_all(part)?;
        }
        entry.close()?;
    }
    let (_, sink) = writer.finish_into_inner()?;
    Ok(sink.into_inner())
}

/// Creates an archive while recording spans; returns bytes and spans.
pub fn create_recorded(
    options: WriteOptions,
    entries: &[(&str, EntryOptions, &[u8])],
) -> (Vec<u8>, Vec<Span>) {
    let log = Arc::new(Mutex::new(SpanLog::new()));
    let mut writer = ZipWriter::create(Vec::new())
        .unwrap()
        .options(options)
        .with_recorder(log.clone());
    for (name, entry_options, data) in entries {
        writer.write_entry_whole(*name, entry_options, data).unwrap();
    }
    let (_, sink) = writer.finish_into_inner().unwrap();
    let spans = log.lock().unwrap().spans().to_vec();
    (sink.into_inner(), spans)
}

/// The first span of `kind` for `entry`.
pub fn span_of(spans: &[Span], kind: SpanKind, entry: usize) -> Span {
    *spans
        .iter()
        .find(|s| s.kind == kind && s.entry == Some(entry))
        .unwrap_or_else(|| panic!("no {:?} span for entry {}", kind, entry))
}

/// Unwraps the error of a result whose Ok type is not `Debug`.
pub fn expect_err<T, E>(result: Result<T, E>) -> E {
    match result {
        Ok(_) => panic!("Expected error but got Ok"),
        Err(e) => e,
    }
}

/// A writer whose offsets start at `shift`, for archives that would sit
/// beyond 4 GiB.
pub fn shifted_writer(shift: u64) -> ZipWriter<OffsetWriter<Vec<u8>>> {
    ZipWriter::with_sink(OffsetWriter::starting_at(Vec::new(), shift)).unwrap()
}

/// A source that places `data` at logical offset `shift`; bytes before it
/// read as zeros.
pub struct ShiftedSource {
    data: Cursor<Vec<u8>>,
    shift: u64,
    position: u64,
}

impl ShiftedSource {
    pub fn new(data: Vec<u8>, shift: u64) -> Self {
        Self {
            data: Cursor::new(data),
            shift,
            position: 0,
        }
    }

    fn len(&self) -> u64 {
        self.shift + self.data.get_ref().len() as u64
    }
}

impl Read for ShiftedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position < self.shift {
            let n = buf.len().min((self.shift - self.position) as usize);
            buf[..n].fill(0);
            self.position += n as u64;
            return Ok(n);
        }
        self.data.set_position(self.position - self.shift);
        let n = self.data.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for ShiftedSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.len().checked_add_signed(d),
            SeekFrom::Current(d) => self.position.checked_add_signed(d),
        };
        self.position =
            target.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "negative seek"))?;
        Ok(self.position)
    }
}

impl ArchiveSource for ShiftedSource {}
