//! Error types for ZIP archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when reading or writing ZIP archives, along with a
//! convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Decoding
//! an entry is all-or-nothing: once an entry fails (bad header, wrong
//! password, checksum mismatch) its reader is closed, but the surrounding
//! [`ZipArchive`](crate::ZipArchive) remains usable for other entries.
//!
//! ```rust,no_run
//! use zipvault::{Error, Password, ZipArchive};
//!
//! fn read_secret(path: &str) -> zipvault::Result<Vec<u8>> {
//!     let file = std::fs::File::open(path)?;
//!     let mut archive = ZipArchive::new(file)?;
//!     match archive.read_to_vec(0, &Password::new("secret")) {
//!         Err(e @ Error::WrongPassword { .. }) => {
//!             eprintln!("Incorrect password: {e}");
//!             Err(e)
//!         }
//!         other => other,
//!     }
//! }
//! ```

use std::io;

/// How a wrong password was detected.
///
/// Each encryption scheme has a different (and differently reliable) way of
/// noticing a bad password. Use [`Error::PasswordRequired`] when no password
/// was available at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PasswordDetectionMethod {
    /// The last byte of the decrypted 12-byte PKWARE header did not match.
    ///
    /// One wrong password in 256 passes this check.
    CheckByte,

    /// The 2-byte WinZip AES password verifier did not match.
    PasswordVerifier,

    /// The WinZip AES authentication code did not match the ciphertext.
    ///
    /// Either the password is wrong or the encrypted payload was modified.
    MacMismatch,

    /// Strong encryption password validation data did not decrypt correctly.
    ValidationData,

    /// The CRC-32 of the decrypted plaintext did not match the stored value.
    CrcMismatch,
}

impl std::fmt::Display for PasswordDetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CheckByte => write!(f, "header check byte"),
            Self::PasswordVerifier => write!(f, "password verifier"),
            Self::MacMismatch => write!(f, "authentication code mismatch"),
            Self::ValidationData => write!(f, "password validation data"),
            Self::CrcMismatch => write!(f, "CRC mismatch after decryption"),
        }
    }
}

/// Helper struct for formatting WrongPassword error messages.
struct WrongPasswordDisplay<'a> {
    entry_name: Option<&'a str>,
    detection_method: PasswordDetectionMethod,
}

impl std::fmt::Display for WrongPasswordDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Wrong password")?;
        if let Some(name) = self.entry_name {
            write!(f, " for entry '{}'", name)?;
        }
        write!(f, " (detected by {})", self.detection_method)
    }
}

/// The main error type for ZIP archive operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io], [`VolumeMissing`][Self::VolumeMissing] | File system operations |
/// | Format | [`InvalidFormat`][Self::InvalidFormat], [`CorruptHeader`][Self::CorruptHeader] | Invalid archive data |
/// | Encryption | [`WrongPassword`][Self::WrongPassword], [`PasswordRequired`][Self::PasswordRequired], [`CryptoError`][Self::CryptoError] | Passwords and ciphers |
/// | Compatibility | [`UnsupportedMethod`][Self::UnsupportedMethod], [`UnsupportedScheme`][Self::UnsupportedScheme], [`UnsupportedFeature`][Self::UnsupportedFeature] | Missing features |
/// | Integrity | [`CrcMismatch`][Self::CrcMismatch], [`SizeMismatch`][Self::SizeMismatch] | Data corruption |
/// | Usage | [`InvalidState`][Self::InvalidState] | API misuse |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading or writing the archive.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The data is not a ZIP archive, or a required structure is missing.
    #[error("Invalid ZIP format: {0}")]
    InvalidFormat(String),

    /// A header is corrupt or truncated.
    ///
    /// Raised for bad signatures, truncated records, and headers whose
    /// declared size does not match the number of bytes actually parsed.
    #[error("Corrupt header at offset {offset:#x}: {reason}")]
    CorruptHeader {
        /// The byte offset where corruption was detected.
        offset: u64,
        /// A description of the corruption.
        reason: String,
    },

    /// The entry uses a compression method not supported by this build.
    ///
    /// Common ZIP method numbers:
    /// - `0`: Stored
    /// - `8`: Deflate
    /// - `12`: BZip2
    /// - `14`: LZMA
    /// - `93`: Zstandard
    #[error("Unsupported compression method: {method}")]
    UnsupportedMethod {
        /// The ZIP compression method number.
        method: u16,
    },

    /// The entry uses an unknown encryption scheme or cipher algorithm id.
    #[error("Unsupported {context}: {id:#06x}")]
    UnsupportedScheme {
        /// The identifier found in the archive.
        id: u16,
        /// Which kind of identifier it was (e.g. "strong encryption algorithm").
        context: &'static str,
    },

    /// A feature required by the archive is not supported.
    ///
    /// Returned, for instance, when an AES entry is met by a build without
    /// the `aes` feature, or when a strong encryption header is only
    /// decryptable with a certificate.
    #[error("Unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The name of the unsupported feature.
        feature: &'static str,
    },

    /// The password is incorrect or the encrypted data is corrupted.
    ///
    /// See [`PasswordDetectionMethod`] for how the mismatch was noticed.
    #[error("{}", WrongPasswordDisplay { entry_name: entry_name.as_deref(), detection_method: *detection_method })]
    WrongPassword {
        /// The entry name (if known).
        entry_name: Option<String>,
        /// How the wrong password was detected.
        detection_method: PasswordDetectionMethod,
    },

    /// The entry is encrypted but no password was provided.
    #[error("Password required for encrypted entry '{entry_name}'")]
    PasswordRequired {
        /// The encrypted entry.
        entry_name: String,
    },

    /// The CRC-32 of an unencrypted entry does not match the stored value.
    ///
    /// For encrypted entries a CRC mismatch is reported as
    /// [`Error::WrongPassword`] with [`PasswordDetectionMethod::CrcMismatch`].
    #[error("CRC mismatch for entry '{entry_name}': expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// The entry name.
        entry_name: String,
        /// Expected CRC value.
        expected: u32,
        /// Actual CRC value.
        actual: u32,
    },

    /// The number of bytes produced does not match the recorded size.
    #[error("Size mismatch for entry '{entry_name}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// The entry name.
        entry_name: String,
        /// Recorded size.
        expected: u64,
        /// Actual size.
        actual: u64,
    },

    /// A cryptographic operation failed (bad key length, malformed padding).
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// A disk of a split archive could not be opened.
    #[error("Missing disk {disk}: {path}")]
    VolumeMissing {
        /// Disk number (0-based).
        disk: u32,
        /// Expected file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An operation was attempted in a state that does not allow it.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The state the object was in.
        state: &'static str,
    },
}

impl Error {
    /// Returns `true` if this is a data corruption error.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CrcMismatch { .. } | Error::CorruptHeader { .. } | Error::SizeMismatch { .. }
        )
    }

    /// Returns `true` if this is an encryption-related error.
    pub fn is_encryption_error(&self) -> bool {
        matches!(
            self,
            Error::WrongPassword { .. } | Error::CryptoError(_) | Error::PasswordRequired { .. }
        )
    }

    /// Returns `true` if this error is related to unsupported features or methods.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedMethod { .. }
                | Error::UnsupportedScheme { .. }
                | Error::UnsupportedFeature { .. }
        )
    }

    /// Returns the entry name associated with this error, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Error::WrongPassword { entry_name, .. } => entry_name.as_deref(),
            Error::PasswordRequired { entry_name } => Some(entry_name.as_str()),
            Error::CrcMismatch { entry_name, .. } => Some(entry_name.as_str()),
            Error::SizeMismatch { entry_name, .. } => Some(entry_name.as_str()),
            _ => None,
        }
    }

    /// Attaches an entry name to a [`Error::WrongPassword`] or
    /// [`Error::PasswordRequired`] that lacks one.
    ///
    /// Cipher layers do not know which entry they decrypt; the pipeline
    /// fills the name in on the way out.
    pub(crate) fn with_entry_name(self, name: &str) -> Self {
        match self {
            Error::PasswordRequired { entry_name } if entry_name.is_empty() => {
                Error::PasswordRequired {
                    entry_name: name.to_string(),
                }
            }
            Error::WrongPassword {
                entry_name: None,
                detection_method,
            } => Error::WrongPassword {
                entry_name: Some(name.to_string()),
                detection_method,
            },
            other => other,
        }
    }

    /// Creates a WrongPassword error.
    pub fn wrong_password(
        entry_name: Option<String>,
        detection_method: PasswordDetectionMethod,
    ) -> Self {
        Error::WrongPassword {
            entry_name,
            detection_method,
        }
    }

    /// Creates a CorruptHeader error.
    pub fn corrupt_header(offset: u64, reason: impl Into<String>) -> Self {
        Error::CorruptHeader {
            offset,
            reason: reason.into(),
        }
    }

    /// Recovers a crate error that travelled through an [`io::Error`].
    ///
    /// Stream adapters (`Read`/`Write` impls) can only return
    /// `io::Error`; they wrap crate errors with [`io::Error::other`].
    /// This unwraps them again so callers see the original variant.
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(e)) => *e,
            _ => Error::InvalidFormat("unrecoverable wrapped error".into()),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}

/// A specialized Result type for ZIP operations.
pub type Result<T> = std::result::Result<T, Error>;
