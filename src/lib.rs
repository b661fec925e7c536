//! # zipvault
//!
//! A pure-Rust codec for the ZIP container format with Zip64, split
//! archives, and three encryption schemes: traditional PKWARE encryption,
//! WinZip AES (AE-1/AE-2) and PKWARE strong encryption.
//!
//! Every entry passes through the same pipeline: CRC-32 over the
//! plaintext, then the compressor, then the cipher, then a byte counter in
//! front of the archive sink. Reading runs it backwards and checks the
//! authentication code, the CRC-32 and the data descriptor once the data
//! ends.
//!
//! ## Quick Start
//!
//! ### Creating an Archive
//!
//! ```rust
//! use zipvault::{EntryOptions, Result, ZipWriter};
//! use std::io::Write;
//!
//! fn main() -> Result<()> {
//!     let mut writer = ZipWriter::create(Vec::new())?;
//!
//!     // Data that is fully available: sizes go into the local header.
//!     writer.write_entry_whole("hello.txt", &EntryOptions::new(), b"Hello, World!")?;
//!
//!     // Data of unknown length: sizes follow in a data descriptor.
//!     let mut entry = writer.start_entry("log.txt", &EntryOptions::new())?;
//!     entry.write_all(b"line 1\n")?;
//!     entry.write_all(b"line 2\n")?;
//!     entry.close()?;
//!     drop(entry);
//!
//!     let result = writer.finish()?;
//!     assert_eq!(result.entries_written, 2);
//!     Ok(())
//! }
//! ```
//!
//! ### Reading an Encrypted Entry
//!
//! ```rust
//! # #[cfg(feature = "aes")]
//! # fn main() -> zipvault::Result<()> {
//! use zipvault::crypto::AesStrength;
//! use zipvault::{EncryptionMethod, EntryOptions, Password, ZipArchive, ZipWriter};
//! use std::io::Cursor;
//!
//! let options = EntryOptions::new()
//!     .encryption(EncryptionMethod::Aes(AesStrength::Aes256))
//!     .password("secret");
//! let mut writer = ZipWriter::create(Vec::new())?;
//! writer.write_entry_whole("secret.txt", &options, b"attack at dawn")?;
//! let (_, sink) = writer.finish_into_inner()?;
//!
//! let mut archive = ZipArchive::new(Cursor::new(sink.into_inner()))?;
//! let plain = archive.read_to_vec(0, &Password::new("secret"))?;
//! assert_eq!(plain, b"attack at dawn");
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "aes"))]
//! # fn main() {}
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Provides |
//! |---------|---------|----------|
//! | `deflate` | yes | Deflate (method 8) via `flate2` |
//! | `bzip2` | yes | BZip2 (method 12) |
//! | `aes` | yes | WinZip AES and strong encryption |
//! | `zstd` | no | Zstandard (method 93) |
//!
//! Archives using a method or scheme that is compiled out can still be
//! listed; opening such an entry fails with an "unsupported" error.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod checksum;
pub mod codec;
pub mod crypto;
mod entry;
pub mod error;
pub mod format;
pub mod read;
pub mod timestamp;
pub mod volume;
pub mod write;

pub use entry::ZipEntry;
pub use error::{Error, PasswordDetectionMethod, Result};
pub use timestamp::DosDateTime;

pub use codec::CompressionMethod;
pub use crypto::{EncryptionMethod, Password, PasswordProvider};

// Re-export reading API at crate root for convenience
pub use read::{EntryReader, ReadOptions, ZipArchive};

// Re-export writing API at crate root for convenience
pub use write::{EntryOptions, EntryWriter, WriteOptions, WriteResult, ZipWriter};

// Re-export volume API at crate root for convenience
pub use volume::{SplitReader, VolumeConfig};
