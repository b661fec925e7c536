//! Archive sinks and sources, single-file and split.
//!
//! A ZIP archive may be split across several files ("disks"). Every offset
//! in its headers is relative to the disk the structure starts on, so the
//! writing and reading sessions work against two small traits instead of a
//! bare stream:
//!
//! - [`ArchiveSink`]: a `Write` that reports the current `(disk, offset)`
//!   and can keep a record from straddling a disk boundary.
//! - [`ArchiveSource`]: a `Read + Seek` over the logical concatenation of
//!   all disks that maps `(disk, offset)` to a logical position.
//!
//! Single-file archives use [`OffsetWriter`] and any seekable reader.
//! Split archives use [`SplitWriter`] and [`SplitReader`].
//!
//! # Writing a split archive
//!
//! ```rust,no_run
//! use zipvault::volume::VolumeConfig;
//! use zipvault::{EntryOptions, ZipWriter};
//!
//! let config = VolumeConfig::new("backup.zip", 64 * 1024 * 1024)?;
//! let mut writer = ZipWriter::create_split(config)?;
//! writer.write_entry_whole("big.bin", &EntryOptions::new(), &vec![0u8; 1 << 20])?;
//! let result = writer.finish()?;
//! println!("{} disks", result.volume_count);
//! # Ok::<(), zipvault::Error>(())
//! ```
//!
//! # Naming
//!
//! For `backup.zip`, disks are `backup.z01`, `backup.z02`, ... and the last
//! disk is `backup.zip`.

mod config;
mod reader;
mod writer;

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};

use crate::{Error, Result};

pub use config::{MIN_VOLUME_SIZE, VolumeConfig};
pub use reader::SplitReader;
pub use writer::{OffsetWriter, SplitWriter};

/// A position expressed the way ZIP headers store it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct DiskPosition {
    /// Disk number (0-based).
    pub disk: u32,
    /// Offset within the disk.
    pub offset: u64,
}

/// Destination of a writing session.
pub trait ArchiveSink: io::Write {
    /// Where the next byte will be written.
    fn position(&self) -> DiskPosition;

    /// Bytes written so far across all disks.
    fn logical_position(&self) -> u64;

    /// Whether this sink produces a split archive.
    fn is_split(&self) -> bool {
        false
    }

    /// Ensures the next `len` bytes land on a single disk.
    fn reserve(&mut self, len: u64) -> Result<()> {
        let _ = len;
        Ok(())
    }

    /// Flushes everything and returns the size of each disk.
    fn finalize(&mut self) -> Result<Vec<u64>> {
        self.flush()?;
        Ok(vec![self.logical_position()])
    }
}

/// Source of a reading session.
///
/// Reads and seeks address the logical concatenation of all disks.
pub trait ArchiveSource: Read + Seek {
    /// Number of disks.
    fn disk_count(&self) -> u32 {
        1
    }

    /// Logical position of byte 0 of `disk`.
    fn disk_start(&self, disk: u32) -> Result<u64> {
        if disk == 0 {
            Ok(0)
        } else {
            Err(Error::InvalidFormat(format!(
                "disk {} referenced in a single-file archive",
                disk
            )))
        }
    }

    /// Logical position of `pos`.
    fn locate(&self, pos: DiskPosition) -> Result<u64> {
        Ok(self.disk_start(pos.disk)? + pos.offset)
    }
}

impl ArchiveSource for File {}

impl<T: AsRef<[u8]>> ArchiveSource for Cursor<T> {}

impl<R: Read + Seek> ArchiveSource for BufReader<R> {}

impl<S: ArchiveSource + ?Sized> ArchiveSource for Box<S> {
    fn disk_count(&self) -> u32 {
        (**self).disk_count()
    }

    fn disk_start(&self, disk: u32) -> Result<u64> {
        (**self).disk_start(disk)
    }
}
