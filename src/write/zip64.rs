//! Size accounting and Zip64 promotion.
//!
//! An entry's sizes are only known once its payload has passed through the
//! pipeline. [`SizeAccounting`] collects them: the CRC-32 and length of the
//! plaintext on one side, and the bytes that reached the archive (through a
//! [`CountingSink`]) on the other. [`Zip64Promoter`] then decides whether
//! the entry, and later the directory, needs Zip64 records.
//!
//! Promotion is one-way: once an entry or a directory is Zip64 it stays
//! so, even if a later check would pass without it.

use std::io::{self, Write};

use crate::ZipEntry;
use crate::checksum::{Checksum, Crc32};
use crate::format::eocd::DirectoryLocation;

/// Writer that counts the bytes passed to the inner writer.
#[derive(Debug)]
pub struct CountingSink<W> {
    inner: W,
    bytes_written: u64,
}

impl<W: Write> CountingSink<W> {
    /// Wraps `inner` with a zero count.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Borrows the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Running totals for one entry.
#[derive(Debug, Clone, Default)]
pub struct SizeAccounting {
    crc: Crc32,
    uncompressed: u64,
    compressed: u64,
}

impl SizeAccounting {
    /// Starts empty totals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds plaintext bytes into the CRC and the uncompressed size.
    pub fn observe_plaintext(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.uncompressed += data.len() as u64;
    }

    /// Records the size of the data region as written.
    pub fn set_compressed(&mut self, bytes: u64) {
        self.compressed = bytes;
    }

    /// CRC-32 of the plaintext seen so far.
    pub fn crc32(&self) -> u32 {
        self.crc.finalize()
    }

    /// Plaintext bytes seen so far.
    pub fn uncompressed(&self) -> u64 {
        self.uncompressed
    }

    /// Bytes of the data region.
    pub fn compressed(&self) -> u64 {
        self.compressed
    }

    /// Copies CRC and sizes into `entry`.
    ///
    /// AE-2 entries store a zero CRC.
    pub fn apply(&self, entry: &mut ZipEntry) {
        entry.uncompressed_size = self.uncompressed;
        entry.compressed_size = self.compressed;
        entry.crc32 = if entry.crc_is_reliable() {
            self.crc32()
        } else {
            0
        };
    }
}

/// Decides when entries and the directory need Zip64 records.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zip64Promoter {
    force: bool,
}

impl Zip64Promoter {
    /// Creates a promoter; with `force` every entry and the directory are
    /// written as Zip64.
    pub fn new(force: bool) -> Self {
        Self { force }
    }

    /// Whether entries are promoted before their sizes are known.
    pub fn forced(&self) -> bool {
        self.force
    }

    /// Promotes `entry` if forced or if a size, its offset or its disk
    /// exceeds the legacy field width. Returns the entry's final flag.
    pub fn promote_entry(&self, entry: &mut ZipEntry) -> bool {
        if !entry.zip64 && (self.force || entry.exceeds_legacy_limits()) {
            log::debug!(
                "promoting '{}' to zip64 (compressed {}, uncompressed {}, offset {}, disk {})",
                entry.name,
                entry.compressed_size,
                entry.uncompressed_size,
                entry.header_offset,
                entry.disk_number
            );
            entry.zip64 = true;
        }
        entry.zip64
    }

    /// Whether the directory needs a Zip64 end record and locator.
    ///
    /// Decided from the directory's own values; Zip64 entries alone do not
    /// promote it.
    pub fn promote_directory(&self, location: &DirectoryLocation) -> bool {
        let promote = self.force || location.exceeds_legacy_limits();
        if promote {
            log::debug!(
                "writing zip64 end records ({} entries, directory {} bytes at {})",
                location.total_entries,
                location.cd_size,
                location.cd_offset
            );
        }
        promote
    }
}
