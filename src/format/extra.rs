//! Extra field blocks.
//!
//! An extra field area is a sequence of `id(2) size(2) data(size)` blocks.
//! Three ids are interpreted; everything else is kept verbatim so it
//! survives a read-modify-write cycle.
//!
//! | id       | meaning                                     |
//! |----------|---------------------------------------------|
//! | `0x0001` | Zip64 extended information                  |
//! | `0x0017` | strong encryption header                    |
//! | `0x9901` | WinZip AES                                  |

use crate::ZipEntry;
use crate::codec::CompressionMethod;
use crate::crypto::{AesStrength, AesVendorVersion, EncryptionMethod};
use crate::format::bytes::{ByteReader, put_u16_le, put_u32_le, put_u64_le};
use crate::{Error, Result};

/// Extra field ids.
pub mod id {
    /// Zip64 extended information.
    pub const ZIP64: u16 = 0x0001;
    /// Strong encryption header.
    pub const STRONG_ENCRYPTION: u16 = 0x0017;
    /// WinZip AES.
    pub const AES: u16 = 0x9901;
}

/// Vendor id stored in the AES extra field.
pub const AES_VENDOR_ID: [u8; 2] = *b"AE";

/// Which header fields hold the Zip64 sentinel.
///
/// The Zip64 block stores only the values whose 32/16-bit field overflowed,
/// always in the order uncompressed size, compressed size, header offset,
/// disk number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Fields {
    /// Uncompressed size is in the block.
    pub uncompressed_size: bool,
    /// Compressed size is in the block.
    pub compressed_size: bool,
    /// Local header offset is in the block.
    pub header_offset: bool,
    /// Starting disk number is in the block.
    pub disk_number: bool,
}

impl Zip64Fields {
    /// Whether any field is present.
    pub fn any(self) -> bool {
        self.uncompressed_size || self.compressed_size || self.header_offset || self.disk_number
    }

    /// Size of the block's data for these fields.
    pub fn data_len(self) -> usize {
        8 * (self.uncompressed_size as usize
            + self.compressed_size as usize
            + self.header_offset as usize)
            + 4 * self.disk_number as usize
    }
}

/// Zip64 extended information (`0x0001`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Extra {
    /// Uncompressed size.
    pub uncompressed_size: Option<u64>,
    /// Compressed size.
    pub compressed_size: Option<u64>,
    /// Offset of the local header.
    pub header_offset: Option<u64>,
    /// Starting disk number.
    pub disk_number: Option<u32>,
}

impl Zip64Extra {
    /// The fields this block carries.
    pub fn fields(&self) -> Zip64Fields {
        Zip64Fields {
            uncompressed_size: self.uncompressed_size.is_some(),
            compressed_size: self.compressed_size.is_some(),
            header_offset: self.header_offset.is_some(),
            disk_number: self.disk_number.is_some(),
        }
    }

    /// Parses the block's data, reading exactly the fields in `expected`.
    ///
    /// Trailing bytes are tolerated; a block too short for `expected` is
    /// corrupt.
    pub fn parse(data: &[u8], expected: Zip64Fields, base: u64) -> Result<Self> {
        if data.len() < expected.data_len() {
            return Err(Error::corrupt_header(
                base,
                format!(
                    "zip64 extra field has {} bytes, header needs {}",
                    data.len(),
                    expected.data_len()
                ),
            ));
        }
        let mut r = ByteReader::new(data, base);
        let mut out = Self::default();
        if expected.uncompressed_size {
            out.uncompressed_size = Some(r.u64_le()?);
        }
        if expected.compressed_size {
            out.compressed_size = Some(r.u64_le()?);
        }
        if expected.header_offset {
            out.header_offset = Some(r.u64_le()?);
        }
        if expected.disk_number {
            out.disk_number = Some(r.u32_le()?);
        }
        Ok(out)
    }

    fn write_data(&self, buf: &mut Vec<u8>) {
        if let Some(v) = self.uncompressed_size {
            put_u64_le(buf, v);
        }
        if let Some(v) = self.compressed_size {
            put_u64_le(buf, v);
        }
        if let Some(v) = self.header_offset {
            put_u64_le(buf, v);
        }
        if let Some(v) = self.disk_number {
            put_u32_le(buf, v);
        }
    }
}

/// WinZip AES information (`0x9901`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesExtra {
    /// AE-1 or AE-2.
    pub version: AesVendorVersion,
    /// Key strength.
    pub strength: AesStrength,
    /// The real compression method (the header says 99).
    pub method: CompressionMethod,
}

impl AesExtra {
    /// Data length of the block.
    pub const DATA_LEN: usize = 7;

    /// Parses the block's data.
    pub fn parse(data: &[u8], base: u64) -> Result<Self> {
        if data.len() != Self::DATA_LEN {
            return Err(Error::corrupt_header(
                base,
                format!("AES extra field has {} bytes, expected 7", data.len()),
            ));
        }
        let mut r = ByteReader::new(data, base);
        let version = AesVendorVersion::from_u16(r.u16_le()?)?;
        let vendor = r.take(2)?;
        if vendor != AES_VENDOR_ID {
            return Err(Error::corrupt_header(
                base + 2,
                format!("AES extra field vendor {:02x?}, expected \"AE\"", vendor),
            ));
        }
        let strength = AesStrength::from_u8(r.u8()?)?;
        let method = CompressionMethod::from_u16(r.u16_le()?);
        Ok(Self {
            version,
            strength,
            method,
        })
    }

    fn write_data(&self, buf: &mut Vec<u8>) {
        put_u16_le(buf, self.version as u16);
        buf.extend_from_slice(&AES_VENDOR_ID);
        buf.push(self.strength as u8);
        put_u16_le(buf, self.method.to_u16());
    }
}

/// Strong encryption information (`0x0017`).
///
/// The algorithm id is kept raw so that entries using algorithms this
/// crate cannot decrypt can still be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrongExtra {
    /// Record format (2).
    pub format: u16,
    /// Cipher algorithm id.
    pub algorithm_id: u16,
    /// Key length in bits.
    pub bit_length: u16,
    /// Processing flags.
    pub flags: u16,
}

impl StrongExtra {
    /// Format value written by this crate.
    pub const FORMAT: u16 = 2;

    /// Flag: the key is derived from a password.
    pub const FLAG_PASSWORD: u16 = 0x0001;

    /// Parses the block's data.
    pub fn parse(data: &[u8], base: u64) -> Result<Self> {
        let mut r = ByteReader::new(data, base);
        let extra = Self {
            format: r.u16_le()?,
            algorithm_id: r.u16_le()?,
            bit_length: r.u16_le()?,
            flags: r.u16_le()?,
        };
        // Newer writers append certificate data; it is not interpreted.
        if !r.is_empty() {
            log::trace!(
                "strong encryption extra field: ignoring {} trailing bytes",
                r.remaining()
            );
        }
        Ok(extra)
    }

    fn write_data(&self, buf: &mut Vec<u8>) {
        put_u16_le(buf, self.format);
        put_u16_le(buf, self.algorithm_id);
        put_u16_le(buf, self.bit_length);
        put_u16_le(buf, self.flags);
    }
}

/// One extra field block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// Zip64 extended information.
    Zip64(Zip64Extra),
    /// WinZip AES.
    Aes(AesExtra),
    /// Strong encryption.
    Strong(StrongExtra),
    /// Any other block, kept verbatim.
    Unknown {
        /// Header id.
        id: u16,
        /// Block data.
        data: Vec<u8>,
    },
}

impl ExtraField {
    /// The block's header id.
    pub fn id(&self) -> u16 {
        match self {
            Self::Zip64(_) => id::ZIP64,
            Self::Aes(_) => id::AES,
            Self::Strong(_) => id::STRONG_ENCRYPTION,
            Self::Unknown { id, .. } => *id,
        }
    }

    /// Appends the block (header included) to `buf`.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        let mut data = Vec::new();
        match self {
            Self::Zip64(z) => z.write_data(&mut data),
            Self::Aes(a) => a.write_data(&mut data),
            Self::Strong(s) => s.write_data(&mut data),
            Self::Unknown { data: raw, .. } => data.extend_from_slice(raw),
        }
        put_u16_le(buf, self.id());
        put_u16_le(buf, data.len() as u16);
        buf.extend_from_slice(&data);
    }

    /// Parses an extra field area.
    ///
    /// `zip64` says which values the Zip64 block must carry (the fields
    /// that hold sentinels in the enclosing header). `base` is the archive
    /// offset of `data[0]`, used in error messages.
    pub fn parse_all(data: &[u8], zip64: Zip64Fields, base: u64) -> Result<Vec<Self>> {
        let mut r = ByteReader::new(data, base);
        let mut fields = Vec::new();
        while !r.is_empty() {
            // Some writers pad the extra area with fewer than four zero bytes.
            if r.remaining() < 4 {
                log::trace!("ignoring {} bytes of extra field padding", r.remaining());
                break;
            }
            let header_id = r.u16_le()?;
            let block_base = r.offset() + 2;
            let block = r.prefixed_u16()?;
            let field = match header_id {
                id::ZIP64 => Self::Zip64(Zip64Extra::parse(block, zip64, block_base)?),
                id::AES => Self::Aes(AesExtra::parse(block, block_base)?),
                id::STRONG_ENCRYPTION => Self::Strong(StrongExtra::parse(block, block_base)?),
                other => Self::Unknown {
                    id: other,
                    data: block.to_vec(),
                },
            };
            fields.push(field);
        }
        Ok(fields)
    }
}

/// Serializes a list of blocks, failing if the area exceeds 65535 bytes.
pub fn serialize(fields: &[ExtraField]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for field in fields {
        field.write_to(&mut buf);
    }
    if buf.len() > u16::MAX as usize {
        return Err(Error::InvalidFormat(format!(
            "extra field area of {} bytes exceeds 65535",
            buf.len()
        )));
    }
    Ok(buf)
}

/// The blocks describing an entry's encryption scheme, followed by the
/// entry's preserved blocks. The Zip64 block is added by the header codecs.
pub(crate) fn entry_fields(entry: &ZipEntry) -> Vec<ExtraField> {
    let mut fields = Vec::with_capacity(entry.extra_fields.len() + 1);
    match entry.encryption {
        EncryptionMethod::Aes(strength) => fields.push(ExtraField::Aes(AesExtra {
            version: entry.aes_version.unwrap_or_default(),
            strength,
            method: entry.compression,
        })),
        EncryptionMethod::Strong(algorithm) => fields.push(ExtraField::Strong(StrongExtra {
            format: StrongExtra::FORMAT,
            algorithm_id: algorithm.id(),
            bit_length: algorithm.bit_length(),
            flags: StrongExtra::FLAG_PASSWORD,
        })),
        EncryptionMethod::Unknown(algorithm_id) => fields.push(ExtraField::Strong(StrongExtra {
            format: StrongExtra::FORMAT,
            algorithm_id,
            bit_length: 0,
            flags: StrongExtra::FLAG_PASSWORD,
        })),
        EncryptionMethod::None | EncryptionMethod::Pkware => {}
    }
    fields.extend(
        entry
            .extra_fields
            .iter()
            .filter(|f| matches!(f, ExtraField::Unknown { .. }))
            .cloned(),
    );
    fields
}

/// Finds the Zip64 block.
pub fn find_zip64(fields: &[ExtraField]) -> Option<&Zip64Extra> {
    fields.iter().find_map(|f| match f {
        ExtraField::Zip64(z) => Some(z),
        _ => None,
    })
}

/// Finds the WinZip AES block.
pub fn find_aes(fields: &[ExtraField]) -> Option<&AesExtra> {
    fields.iter().find_map(|f| match f {
        ExtraField::Aes(a) => Some(a),
        _ => None,
    })
}

/// Finds the strong encryption block.
pub fn find_strong(fields: &[ExtraField]) -> Option<&StrongExtra> {
    fields.iter().find_map(|f| match f {
        ExtraField::Strong(s) => Some(s),
        _ => None,
    })
}
