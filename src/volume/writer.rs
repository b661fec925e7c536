//! Archive sinks: a counting single-file writer and the split writer.

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use super::{ArchiveSink, DiskPosition, VolumeConfig};
use crate::format::signature;
use crate::{Error, Result};

/// Single-file sink that tracks its write offset.
///
/// `start` is the offset of the first byte written, for archives appended
/// to existing data.
#[derive(Debug)]
pub struct OffsetWriter<W> {
    inner: W,
    start: u64,
    written: u64,
}

impl<W: Write> OffsetWriter<W> {
    /// Wraps a writer positioned at offset 0.
    pub fn new(inner: W) -> Self {
        Self::starting_at(inner, 0)
    }

    /// Wraps a writer whose next byte lands at `start`.
    pub fn starting_at(inner: W, start: u64) -> Self {
        Self {
            inner,
            start,
            written: 0,
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Borrows the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for OffsetWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> ArchiveSink for OffsetWriter<W> {
    fn position(&self) -> DiskPosition {
        DiskPosition {
            disk: 0,
            offset: self.start + self.written,
        }
    }

    fn logical_position(&self) -> u64 {
        self.start + self.written
    }

    fn finalize(&mut self) -> Result<Vec<u64>> {
        self.inner.flush()?;
        Ok(vec![self.start + self.written])
    }
}

/// A sink that splits output across disks of a fixed size.
///
/// Disks are written sequentially; a new one is opened lazily when the
/// current one is full and more bytes arrive. On [`finalize`](ArchiveSink::finalize)
/// the last disk is renamed to the archive path. If only one disk was
/// written and it starts with the split marker, the marker is rewritten to
/// the single-disk marker `PK00`.
pub struct SplitWriter {
    config: VolumeConfig,
    current: Option<BufWriter<File>>,
    disk: u32,
    disk_written: u64,
    total_written: u64,
    completed_sizes: Vec<u64>,
    leading_marker: bool,
    finished: bool,
}

impl std::fmt::Debug for SplitWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitWriter")
            .field("archive_path", &self.config.archive_path())
            .field("disk", &self.disk)
            .field("disk_written", &self.disk_written)
            .field("total_written", &self.total_written)
            .finish()
    }
}

impl SplitWriter {
    /// Creates the first disk.
    pub fn create(config: VolumeConfig) -> Result<Self> {
        let file = Self::create_disk(&config, 0)?;
        Ok(Self {
            config,
            current: Some(BufWriter::new(file)),
            disk: 0,
            disk_written: 0,
            total_written: 0,
            completed_sizes: Vec::new(),
            leading_marker: false,
            finished: false,
        })
    }

    fn create_disk(config: &VolumeConfig, disk: u32) -> Result<File> {
        let path = config.disk_path(disk);
        File::create(&path).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("failed to create disk {}: {}", path.display(), e),
            ))
        })
    }

    fn advance(&mut self) -> Result<()> {
        if let Some(mut file) = self.current.take() {
            file.flush()?;
        }
        self.completed_sizes.push(self.disk_written);
        self.disk += 1;
        log::trace!(
            "split archive: disk {} full at {} bytes, opening disk {}",
            self.disk - 1,
            self.disk_written,
            self.disk
        );
        self.current = Some(BufWriter::new(Self::create_disk(&self.config, self.disk)?));
        self.disk_written = 0;
        Ok(())
    }

    fn remaining(&self) -> u64 {
        self.config.volume_size().saturating_sub(self.disk_written)
    }

    /// Number of disks opened so far.
    pub fn disk_count(&self) -> u32 {
        self.disk + 1
    }

    /// Sizes of the disks completed so far.
    pub fn completed_sizes(&self) -> &[u64] {
        &self.completed_sizes
    }

    /// The configuration in use.
    pub fn config(&self) -> &VolumeConfig {
        &self.config
    }
}

impl Write for SplitWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.finished {
            return Err(io::Error::other(Error::InvalidState {
                operation: "write",
                state: "split archive finalized",
            }));
        }
        if self.total_written == 0 {
            self.leading_marker = buf.starts_with(&signature::SPLIT_ARCHIVE.to_le_bytes());
        }
        if self.remaining() == 0 {
            self.advance().map_err(io::Error::from)?;
        }
        let to_write = buf.len().min(self.remaining() as usize);
        let file = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::other("current disk not open"))?;
        let n = file.write(&buf[..to_write])?;
        self.disk_written += n as u64;
        self.total_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl ArchiveSink for SplitWriter {
    fn position(&self) -> DiskPosition {
        if self.remaining() == 0 {
            DiskPosition {
                disk: self.disk + 1,
                offset: 0,
            }
        } else {
            DiskPosition {
                disk: self.disk,
                offset: self.disk_written,
            }
        }
    }

    fn logical_position(&self) -> u64 {
        self.total_written
    }

    fn is_split(&self) -> bool {
        true
    }

    fn reserve(&mut self, len: u64) -> Result<()> {
        if len > self.config.volume_size() {
            return Err(Error::InvalidFormat(format!(
                "record of {} bytes does not fit on a {}-byte disk",
                len,
                self.config.volume_size()
            )));
        }
        if len > self.remaining() && self.disk_written > 0 {
            self.advance()?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u64>> {
        if self.finished {
            return Ok(self.completed_sizes.clone());
        }
        let mut file = self.current.take().ok_or(Error::InvalidState {
            operation: "finalize split archive",
            state: "no disk open",
        })?;
        if self.disk == 0 && self.leading_marker {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&signature::SINGLE_DISK_ARCHIVE.to_le_bytes())?;
            log::debug!(
                "split archive fits on one disk; marker {:#010x} replaced",
                signature::SPLIT_ARCHIVE
            );
        }
        file.flush()?;
        drop(file);
        self.completed_sizes.push(self.disk_written);
        self.finished = true;

        let from = self.config.disk_path(self.disk);
        fs::rename(&from, self.config.archive_path()).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!(
                    "failed to rename {} to {}: {}",
                    from.display(),
                    self.config.archive_path().display(),
                    e
                ),
            ))
        })?;
        Ok(self.completed_sizes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_offset_writer_counts() {
        let mut w = OffsetWriter::starting_at(Vec::new(), 100);
        w.write_all(b"hello").unwrap();
        assert_eq!(
            w.position(),
            DiskPosition {
                disk: 0,
                offset: 105
            }
        );
        assert_eq!(w.finalize().unwrap(), vec![105]);
        assert_eq!(w.into_inner(), b"hello");
    }

    #[test]
    fn test_split_writer_rolls_over() {
        let dir = TempDir::new().unwrap();
        let config = VolumeConfig::new(dir.path().join("out.zip"), 100).unwrap();
        let mut w = SplitWriter::create(config.clone()).unwrap();
        w.write_all(&[1u8; 250]).unwrap();
        assert_eq!(w.disk_count(), 3);
        assert_eq!(
            w.position(),
            DiskPosition {
                disk: 2,
                offset: 50
            }
        );
        let sizes = w.finalize().unwrap();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert!(config.disk_path(0).exists());
        assert!(config.disk_path(1).exists());
        assert!(!config.disk_path(2).exists());
        assert_eq!(fs::metadata(config.archive_path()).unwrap().len(), 50);
    }

    #[test]
    fn test_position_after_full_disk_points_to_next() {
        let dir = TempDir::new().unwrap();
        let config = VolumeConfig::new(dir.path().join("p.zip"), 64).unwrap();
        let mut w = SplitWriter::create(config).unwrap();
        w.write_all(&[0u8; 64]).unwrap();
        assert_eq!(w.disk_count(), 1);
        assert_eq!(
            w.position(),
            DiskPosition {
                disk: 1,
                offset: 0
            }
        );
    }

    #[test]
    fn test_reserve_moves_to_next_disk() {
        let dir = TempDir::new().unwrap();
        let config = VolumeConfig::new(dir.path().join("r.zip"), 100).unwrap();
        let mut w = SplitWriter::create(config).unwrap();
        w.write_all(&[0u8; 90]).unwrap();
        w.reserve(5).unwrap();
        assert_eq!(w.position().disk, 0);
        w.reserve(30).unwrap();
        assert_eq!(
            w.position(),
            DiskPosition {
                disk: 1,
                offset: 0
            }
        );
        assert!(w.reserve(101).is_err());
    }

    #[test]
    fn test_single_disk_marker_rewritten() {
        let dir = TempDir::new().unwrap();
        let config = VolumeConfig::new(dir.path().join("one.zip"), 1000).unwrap();
        let mut w = SplitWriter::create(config.clone()).unwrap();
        w.write_all(&signature::SPLIT_ARCHIVE.to_le_bytes()).unwrap();
        w.write_all(b"rest").unwrap();
        w.finalize().unwrap();
        let data = fs::read(config.archive_path()).unwrap();
        assert_eq!(&data[..4], b"PK00");
        assert!(w.write(b"x").is_err());
    }
}
