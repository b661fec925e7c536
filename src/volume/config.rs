//! Configuration for split archives.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Smallest accepted disk size.
///
/// Every record the writer keeps on a single disk (a local header, a
/// central directory header, the end records) must fit on one disk.
pub const MIN_VOLUME_SIZE: u64 = 64;

/// Size and naming of the disks of a split archive.
///
/// Disks are named after the archive path: for `backup.zip` the disks are
/// `backup.z01`, `backup.z02`, ... and the last one is `backup.zip` itself.
///
/// # Example
///
/// ```rust
/// use zipvault::volume::VolumeConfig;
///
/// let config = VolumeConfig::new("backup.zip", 64 * 1024).unwrap();
/// assert_eq!(config.disk_path(0).to_str().unwrap(), "backup.z01");
/// assert_eq!(config.disk_path(11).to_str().unwrap(), "backup.z12");
/// assert_eq!(config.archive_path().to_str().unwrap(), "backup.zip");
/// ```
#[derive(Debug, Clone)]
pub struct VolumeConfig {
    volume_size: u64,
    archive_path: PathBuf,
}

impl VolumeConfig {
    /// Creates a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if `volume_size` is below
    /// [`MIN_VOLUME_SIZE`].
    pub fn new(archive_path: impl AsRef<Path>, volume_size: u64) -> Result<Self> {
        if volume_size < MIN_VOLUME_SIZE {
            return Err(Error::InvalidFormat(format!(
                "volume size {} is below the minimum of {}",
                volume_size, MIN_VOLUME_SIZE
            )));
        }
        Ok(Self {
            volume_size,
            archive_path: archive_path.as_ref().to_path_buf(),
        })
    }

    /// Maximum bytes per disk.
    pub fn volume_size(&self) -> u64 {
        self.volume_size
    }

    /// Path of the last disk, which carries the central directory.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Path of a non-final disk (0-based), `name.zNN`.
    pub fn disk_path(&self, disk: u32) -> PathBuf {
        disk_path_for(&self.archive_path, disk, u32::MAX)
    }

    /// Path of `disk` in an archive of `disk_count` disks.
    pub fn path_for(&self, disk: u32, disk_count: u32) -> PathBuf {
        disk_path_for(&self.archive_path, disk, disk_count)
    }

    /// Creates a config for 1.44 MB floppy-sized disks.
    pub fn floppy(archive_path: impl AsRef<Path>) -> Self {
        Self {
            volume_size: 1_457_664,
            archive_path: archive_path.as_ref().to_path_buf(),
        }
    }

    /// Creates a config for ~700 MB CD-sized disks.
    pub fn cd(archive_path: impl AsRef<Path>) -> Self {
        Self {
            volume_size: 700 * 1024 * 1024,
            archive_path: archive_path.as_ref().to_path_buf(),
        }
    }

    /// Creates a config for FAT32-compatible disks (4 GiB - 1).
    pub fn fat32(archive_path: impl AsRef<Path>) -> Self {
        Self {
            volume_size: 4 * 1024 * 1024 * 1024 - 1,
            archive_path: archive_path.as_ref().to_path_buf(),
        }
    }
}

/// Path of `disk` in an archive of `disk_count` disks whose last disk is
/// `archive_path`.
pub(crate) fn disk_path_for(archive_path: &Path, disk: u32, disk_count: u32) -> PathBuf {
    if disk.checked_add(1) == Some(disk_count) {
        archive_path.to_path_buf()
    } else {
        archive_path.with_extension(format!("z{:02}", disk + 1))
    }
}
