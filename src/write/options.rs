//! Options for writing entries and archives.

use crate::codec::CompressionMethod;
use crate::crypto::{AesVendorVersion, EncryptionMethod, NoncePolicy, Password};
use crate::timestamp::DosDateTime;

/// Per-entry settings.
///
/// # Example
///
/// ```rust
/// use zipvault::{CompressionMethod, EncryptionMethod, EntryOptions};
/// use zipvault::crypto::AesStrength;
///
/// let options = EntryOptions::new()
///     .compression(CompressionMethod::Deflate)
///     .level(9)
///     .encryption(EncryptionMethod::Aes(AesStrength::Aes256))
///     .password("secret");
/// assert!(options.is_encrypted());
/// ```
#[derive(Clone)]
pub struct EntryOptions {
    /// Compression method.
    pub compression: CompressionMethod,
    /// Codec specific level; `None` selects the codec default.
    pub level: Option<u32>,
    /// Encryption scheme.
    pub encryption: EncryptionMethod,
    /// Password for the encryption scheme.
    pub password: Option<Password>,
    /// AE-1 or AE-2 for WinZip AES entries.
    pub aes_version: AesVendorVersion,
    /// Last modification time; `None` stamps the entry with the current time.
    pub last_modified: Option<DosDateTime>,
    /// Reserve Zip64 fields for a streamed entry that may exceed 4 GiB.
    ///
    /// A streamed entry's local header is written before its size is
    /// known, so it can only carry Zip64 sizes if they are reserved up
    /// front.
    pub large_file: bool,
    /// Entry comment.
    pub comment: String,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            compression: if cfg!(feature = "deflate") {
                CompressionMethod::Deflate
            } else {
                CompressionMethod::Stored
            },
            level: None,
            encryption: EncryptionMethod::None,
            password: None,
            aes_version: AesVendorVersion::default(),
            last_modified: None,
            large_file: false,
            comment: String::new(),
        }
    }
}

impl std::fmt::Debug for EntryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryOptions")
            .field("compression", &self.compression)
            .field("level", &self.level)
            .field("encryption", &self.encryption)
            .field("has_password", &self.password.is_some())
            .field("aes_version", &self.aes_version)
            .field("last_modified", &self.last_modified)
            .field("large_file", &self.large_file)
            .field("comment", &self.comment)
            .finish()
    }
}

impl EntryOptions {
    /// Creates entry options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression method.
    pub fn compression(mut self, method: CompressionMethod) -> Self {
        self.compression = method;
        self
    }

    /// Sets the codec specific compression level.
    pub fn level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets the encryption scheme.
    pub fn encryption(mut self, method: EncryptionMethod) -> Self {
        self.encryption = method;
        self
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the WinZip AES vendor version.
    pub fn aes_version(mut self, version: AesVendorVersion) -> Self {
        self.aes_version = version;
        self
    }

    /// Sets the last modification time.
    pub fn last_modified(mut self, time: DosDateTime) -> Self {
        self.last_modified = Some(time);
        self
    }

    /// Reserves Zip64 fields for a streamed entry.
    pub fn large_file(mut self, large: bool) -> Self {
        self.large_file = large;
        self
    }

    /// Sets the entry comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Returns whether an encryption scheme is selected.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_encrypted()
    }
}

/// Archive-wide settings.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Archive comment, stored in the end of central directory record.
    pub comment: String,
    /// Write every entry and the directory with Zip64 records.
    pub force_zip64: bool,
    /// Source of salts, IVs and PKWARE header bytes.
    pub nonce_policy: NoncePolicy,
}

impl WriteOptions {
    /// Creates write options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the archive comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Forces Zip64 records for every entry and the directory.
    pub fn force_zip64(mut self, force: bool) -> Self {
        self.force_zip64 = force;
        self
    }

    /// Sets the nonce policy.
    pub fn nonce_policy(mut self, policy: NoncePolicy) -> Self {
        self.nonce_policy = policy;
        self
    }
}

/// Result of a finished writing session.
#[derive(Debug, Clone, Default)]
pub struct WriteResult {
    /// Number of entries written.
    pub entries_written: usize,
    /// Total uncompressed bytes.
    pub total_size: u64,
    /// Total bytes of entry data regions.
    pub compressed_size: u64,
    /// Whether Zip64 end records were written.
    pub zip64: bool,
    /// Number of disks written (1 for single-file archives).
    pub volume_count: u32,
    /// Size of each disk in bytes.
    pub volume_sizes: Vec<u64>,
}

impl WriteResult {
    /// Returns the compression ratio (compressed / uncompressed).
    pub fn compression_ratio(&self) -> f64 {
        if self.total_size == 0 {
            1.0
        } else {
            self.compressed_size as f64 / self.total_size as f64
        }
    }
}
