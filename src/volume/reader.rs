//! Split archive reader.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::ArchiveSource;
use super::config::disk_path_for;
use crate::format::eocd::{self, ZIP64_LOCATOR_LEN, Zip64Locator};
use crate::format::ZIP64_SENTINEL_16;
use crate::{Error, Result};

/// The disk a [`SplitReader`] currently reads, and the file position.
struct OpenDisk {
    index: usize,
    reader: BufReader<File>,
    offset: u64,
}

/// Reads a split archive as one logical stream.
///
/// Open it with the path of the last disk (`name.zip`); the other disks
/// (`name.z01` ...) are found next to it. The number of disks comes from
/// the end of central directory record, so a missing disk is reported when
/// the archive is opened rather than when an entry on it is read.
///
/// # Example
///
/// ```rust,no_run
/// use zipvault::volume::SplitReader;
/// use zipvault::ZipArchive;
///
/// let reader = SplitReader::open("backup.zip")?;
/// println!("archive spans {} disks", reader.disk_sizes().len());
/// let archive = ZipArchive::new(reader)?;
/// # Ok::<(), zipvault::Error>(())
/// ```
pub struct SplitReader {
    paths: Vec<PathBuf>,
    disk_sizes: Vec<u64>,
    disk_starts: Vec<u64>,
    total_size: u64,
    current: Option<OpenDisk>,
    position: u64,
}

impl SplitReader {
    /// Opens a split archive by the path of its last disk.
    ///
    /// An archive that turns out to have a single disk is accepted too.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VolumeMissing`] for the first disk that cannot be
    /// found, and format errors if the last disk has no end record.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut last = File::open(path).map_err(|e| Error::VolumeMissing {
            disk: 0,
            path: path.display().to_string(),
            source: e,
        })?;
        let disk_count = Self::read_disk_count(&mut last)?;
        let mut paths = Vec::with_capacity(disk_count as usize);
        let mut disk_sizes = Vec::with_capacity(disk_count as usize);
        for disk in 0..disk_count {
            let disk_path = disk_path_for(path, disk, disk_count);
            let meta = std::fs::metadata(&disk_path).map_err(|e| Error::VolumeMissing {
                disk,
                path: disk_path.display().to_string(),
                source: e,
            })?;
            disk_sizes.push(meta.len());
            paths.push(disk_path);
        }

        let mut disk_starts = Vec::with_capacity(disk_sizes.len());
        let mut total_size = 0u64;
        for size in &disk_sizes {
            disk_starts.push(total_size);
            total_size += size;
        }
        log::debug!(
            "opened split archive {} with {} disks, {} bytes",
            path.display(),
            disk_count,
            total_size
        );

        Ok(Self {
            paths,
            disk_sizes,
            disk_starts,
            total_size,
            current: None,
            position: 0,
        })
    }

    /// Reads the disk count from the end records of the last disk.
    fn read_disk_count(last: &mut File) -> Result<u32> {
        let (record, offset) = eocd::find_eocd(last)?;
        if record.disk_number != ZIP64_SENTINEL_16 {
            return Ok(record.disk_number as u32 + 1);
        }
        if offset < ZIP64_LOCATOR_LEN as u64 {
            return Err(Error::corrupt_header(
                offset,
                "disk number sentinel without a zip64 locator",
            ));
        }
        let locator_at = offset - ZIP64_LOCATOR_LEN as u64;
        last.seek(SeekFrom::Start(locator_at))?;
        let mut buf = [0u8; ZIP64_LOCATOR_LEN];
        last.read_exact(&mut buf)?;
        let locator = Zip64Locator::parse(&buf, locator_at)?.ok_or_else(|| {
            Error::corrupt_header(locator_at, "disk number sentinel without a zip64 locator")
        })?;
        Ok(locator.total_disks.max(1))
    }

    /// Paths of all disks, in order.
    pub fn disk_paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Sizes of all disks, in order.
    pub fn disk_sizes(&self) -> &[u64] {
        &self.disk_sizes
    }

    /// Logical size of the archive.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    fn disk_at(&self, pos: u64) -> (usize, u64) {
        let idx = match self.disk_starts.binary_search(&pos) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        // Skip empty disks so reads make progress.
        let mut idx = idx;
        while idx + 1 < self.disk_sizes.len() && pos - self.disk_starts[idx] >= self.disk_sizes[idx]
        {
            idx += 1;
        }
        (idx, pos - self.disk_starts[idx])
    }

    fn open_disk(&mut self, index: usize, offset: u64) -> io::Result<&mut OpenDisk> {
        let reopen = !matches!(&self.current, Some(open) if open.index == index);
        if reopen {
            let path = &self.paths[index];
            let file = File::open(path).map_err(|e| {
                io::Error::other(Error::VolumeMissing {
                    disk: index as u32,
                    path: path.display().to_string(),
                    source: e,
                })
            })?;
            log::trace!("split archive: switching to disk {}", index);
            self.current = Some(OpenDisk {
                index,
                reader: BufReader::new(file),
                offset: 0,
            });
        }
        let open = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::other("disk not open"))?;
        if open.offset != offset {
            open.reader.seek(SeekFrom::Start(offset))?;
            open.offset = offset;
        }
        Ok(open)
    }
}

impl Read for SplitReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.total_size {
            return Ok(0);
        }
        let (idx, offset) = self.disk_at(self.position);
        let available = self.disk_sizes[idx] - offset;
        let to_read = buf.len().min(available as usize);
        let disk = self.open_disk(idx, offset)?;
        let n = disk.reader.read(&mut buf[..to_read])?;
        disk.offset += n as u64;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("disk {} shorter than when the archive was opened", idx),
            ));
        }
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for SplitReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.total_size.checked_add_signed(d),
            SeekFrom::Current(d) => self.position.checked_add_signed(d),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot seek before start of split archive",
            )
        })?;
        self.position = target;
        Ok(self.position)
    }
}

impl ArchiveSource for SplitReader {
    fn disk_count(&self) -> u32 {
        self.disk_sizes.len() as u32
    }

    fn disk_start(&self, disk: u32) -> Result<u64> {
        self.disk_starts
            .get(disk as usize)
            .copied()
            .ok_or_else(|| Error::VolumeMissing {
                disk,
                path: format!("disk {} of {}", disk, self.disk_sizes.len()),
                source: io::Error::new(io::ErrorKind::NotFound, "disk beyond the last disk"),
            })
    }
}

impl std::fmt::Debug for SplitReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitReader")
            .field("disks", &self.paths.len())
            .field("total_size", &self.total_size)
            .field("position", &self.position)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::eocd::{DirectoryLocation, Eocd};
    use crate::volume::VolumeConfig;
    use std::io::Write;
    use tempfile::TempDir;

    /// Writes `parts` as disks of `name.zip`, ending the last with an EOCD
    /// that names the last disk.
    fn create_disks(dir: &Path, parts: &[&[u8]]) -> PathBuf {
        let archive = dir.join("set.zip");
        let config = VolumeConfig::new(&archive, 1024).unwrap();
        let count = parts.len() as u32;
        for (i, part) in parts.iter().enumerate() {
            let mut file = File::create(config.path_for(i as u32, count)).unwrap();
            file.write_all(part).unwrap();
            if i + 1 == parts.len() {
                let location = DirectoryLocation {
                    disk_number: count - 1,
                    cd_start_disk: count - 1,
                    ..Default::default()
                };
                let eocd = Eocd::for_location(&location, Vec::new());
                file.write_all(&eocd.to_bytes().unwrap()).unwrap();
            }
        }
        archive
    }

    #[test]
    fn test_reads_across_disks() {
        let dir = TempDir::new().unwrap();
        let path = create_disks(dir.path(), &[b"abc", b"defg", b"hi"]);
        let mut reader = SplitReader::open(&path).unwrap();
        assert_eq!(reader.disk_count(), 3);
        assert_eq!(reader.disk_sizes()[..2], [3, 4]);
        assert_eq!(reader.disk_start(2).unwrap(), 7);

        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        assert_eq!(&data[..9], b"abcdefghi");

        reader.seek(SeekFrom::Start(2)).unwrap();
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"cdef");
    }

    #[test]
    fn test_missing_disk_reported() {
        let dir = TempDir::new().unwrap();
        let path = create_disks(dir.path(), &[b"abc", b"defg", b"hi"]);
        std::fs::remove_file(dir.path().join("set.z02")).unwrap();
        match SplitReader::open(&path) {
            Err(Error::VolumeMissing { disk, path, .. }) => {
                assert_eq!(disk, 1);
                assert!(path.ends_with("set.z02"));
            }
            other => panic!("expected VolumeMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_disk_beyond_last() {
        let dir = TempDir::new().unwrap();
        let path = create_disks(dir.path(), &[b"only"]);
        let reader = SplitReader::open(&path).unwrap();
        assert_eq!(reader.disk_count(), 1);
        assert!(matches!(
            reader.disk_start(3),
            Err(Error::VolumeMissing { disk: 3, .. })
        ));
    }
}
