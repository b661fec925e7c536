//! ZIP container format constants, record layouts, and header codecs.
//!
//! All multi-byte values in the ZIP format are little-endian. Each record
//! type lives in its own submodule and is a plain value: parsing validates
//! the record completely, and serialization never fails for a value that
//! was successfully constructed.

pub mod bytes;
pub mod central;
pub mod descriptor;
pub mod eocd;
pub mod extra;
pub mod local;
pub mod span;

/// Record signatures.
pub mod signature {
    /// Local file header (`PK\x03\x04`).
    pub const LOCAL_FILE_HEADER: u32 = 0x0403_4b50;
    /// Data descriptor (`PK\x07\x08`).
    pub const DATA_DESCRIPTOR: u32 = 0x0807_4b50;
    /// Split archive marker at the start of disk 0 (`PK\x07\x08`).
    pub const SPLIT_ARCHIVE: u32 = 0x0807_4b50;
    /// Marker of a split archive that fit on one disk (`PK00`).
    pub const SINGLE_DISK_ARCHIVE: u32 = 0x3030_4b50;
    /// Central directory file header (`PK\x01\x02`).
    pub const CENTRAL_FILE_HEADER: u32 = 0x0201_4b50;
    /// End of central directory record (`PK\x05\x06`).
    pub const END_OF_CENTRAL_DIRECTORY: u32 = 0x0605_4b50;
    /// Zip64 end of central directory record (`PK\x06\x06`).
    pub const ZIP64_END_OF_CENTRAL_DIRECTORY: u32 = 0x0606_4b50;
    /// Zip64 end of central directory locator (`PK\x06\x07`).
    pub const ZIP64_LOCATOR: u32 = 0x0706_4b50;
}

/// General purpose bit flags.
pub mod flags {
    /// Bit 0: the entry is encrypted.
    pub const ENCRYPTED: u16 = 1 << 0;
    /// Bit 3: CRC and sizes are deferred to a data descriptor.
    pub const DATA_DESCRIPTOR: u16 = 1 << 3;
    /// Bit 6: strong encryption.
    pub const STRONG_ENCRYPTION: u16 = 1 << 6;
    /// Bit 11: the file name is UTF-8.
    pub const UTF8: u16 = 1 << 11;
}

/// "Version needed to extract" values.
pub mod version {
    /// Default (deflate, folders, PKWARE encryption).
    pub const DEFAULT: u16 = 20;
    /// Zip64 extensions.
    pub const ZIP64: u16 = 45;
    /// BZip2 compression.
    pub const BZIP2: u16 = 46;
    /// Strong encryption with DES/3DES.
    pub const STRONG_DES: u16 = 50;
    /// AES encryption (strong encryption AES and WinZip AES).
    pub const AES: u16 = 51;
    /// Zstandard and newer methods.
    pub const ZSTD: u16 = 63;
    /// Produced by: MS-DOS host, APPNOTE 6.3.
    pub const MADE_BY: u16 = 63;
}

/// Largest value a 16-bit field can hold before Zip64 is required.
pub const ZIP64_THRESHOLD_16: u64 = 0xFFFF;

/// Largest value a 32-bit field can hold before Zip64 is required.
pub const ZIP64_THRESHOLD_32: u64 = 0xFFFF_FFFF;

/// Placeholder written to a 16-bit field whose value lives in a Zip64 record.
pub const ZIP64_SENTINEL_16: u16 = 0xFFFF;

/// Placeholder written to a 32-bit field whose value lives in a Zip64 record.
pub const ZIP64_SENTINEL_32: u32 = 0xFFFF_FFFF;

/// Compression method number marking a WinZip AES entry.
pub const METHOD_AES: u16 = 99;
