//! Options for reading archives.

use crate::crypto::Password;

/// Settings for a reading session.
///
/// # Example
///
/// ```rust
/// use zipvault::ReadOptions;
///
/// let options = ReadOptions::new().password("secret").verify_descriptor(false);
/// assert!(options.verify_crc);
/// ```
#[derive(Clone)]
pub struct ReadOptions {
    /// Fallback password for encrypted entries when the provider passed to
    /// [`ZipArchive::open`](super::ZipArchive::open) has none.
    pub password: Option<Password>,
    /// Check the CRC-32 of every entry once its data has been read.
    pub verify_crc: bool,
    /// Compare data descriptors with the central directory.
    pub verify_descriptor: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            password: None,
            verify_crc: true,
            verify_descriptor: true,
        }
    }
}

impl std::fmt::Debug for ReadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOptions")
            .field("has_password", &self.password.is_some())
            .field("verify_crc", &self.verify_crc)
            .field("verify_descriptor", &self.verify_descriptor)
            .finish()
    }
}

impl ReadOptions {
    /// Creates read options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback password.
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Enables or disables CRC-32 verification.
    ///
    /// Applies to unencrypted and WinZip AES entries only. PKWARE and
    /// strong encryption have no authentication code, so their CRC is
    /// always checked and a mismatch reports a wrong password. AE-2
    /// entries carry no CRC and are never checked.
    pub fn verify_crc(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// Enables or disables data descriptor verification.
    pub fn verify_descriptor(mut self, verify: bool) -> Self {
        self.verify_descriptor = verify;
        self
    }
}
