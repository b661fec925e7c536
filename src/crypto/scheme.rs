//! Encryption scheme identifiers.
//!
//! These types describe which scheme protects an entry. They carry no
//! cipher code, so archive metadata can be parsed and reported even when
//! the `aes` feature (and with it the AES and strong ciphers) is disabled.

use crate::{Error, Result};

/// Length of the password verifier following the salt.
pub const PASSWORD_VERIFIER_LEN: usize = 2;

/// Length of the trailing authentication code.
pub const AUTH_CODE_LEN: usize = 10;

/// AES key strength, as stored in the 0x9901 extra field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AesStrength {
    /// AES-128.
    Aes128 = 1,
    /// AES-192.
    Aes192 = 2,
    /// AES-256.
    Aes256 = 3,
}

impl AesStrength {
    /// Parses the extra-field strength byte.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Aes128),
            2 => Ok(Self::Aes192),
            3 => Ok(Self::Aes256),
            other => Err(Error::UnsupportedScheme {
                id: other as u16,
                context: "AES strength",
            }),
        }
    }

    /// Key size in bits.
    pub fn bits(self) -> u16 {
        match self {
            Self::Aes128 => 128,
            Self::Aes192 => 192,
            Self::Aes256 => 256,
        }
    }

    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        self.bits() as usize / 8
    }

    /// Salt length in bytes (half the key length).
    pub fn salt_len(self) -> usize {
        self.key_len() / 2
    }

    /// Length of the header preceding the ciphertext.
    pub fn header_len(self) -> usize {
        self.salt_len() + PASSWORD_VERIFIER_LEN
    }

    /// Bytes the scheme adds around the ciphertext.
    pub fn overhead(self) -> u64 {
        (self.header_len() + AUTH_CODE_LEN) as u64
    }
}

/// AE-1 stores a real CRC-32; AE-2 stores zero and relies on the MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AesVendorVersion {
    /// AE-1: CRC-32 is stored and verified in addition to the MAC.
    Ae1 = 1,
    /// AE-2: CRC-32 field is zero and not checked.
    #[default]
    Ae2 = 2,
}

impl AesVendorVersion {
    /// Parses the extra-field version number.
    pub fn from_u16(value: u16) -> Result<Self> {
        match value {
            1 => Ok(Self::Ae1),
            2 => Ok(Self::Ae2),
            other => Err(Error::UnsupportedScheme {
                id: other,
                context: "AES vendor version",
            }),
        }
    }

    /// Whether the stored CRC-32 is meaningful.
    pub fn verifies_crc(self) -> bool {
        matches!(self, Self::Ae1)
    }
}

/// Block cipher used by a strong encryption entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrongAlgorithm {
    /// Triple DES with three keys (168-bit).
    TripleDes168,
    /// Triple DES with two keys (112-bit).
    TripleDes112,
    /// AES-128.
    Aes128,
    /// AES-192.
    Aes192,
    /// AES-256.
    Aes256,
}

impl StrongAlgorithm {
    /// Parses an algorithm id from a decryption header or 0x0017 extra field.
    ///
    /// DES, RC2, RC4 and the other legacy ids yield
    /// [`Error::UnsupportedScheme`].
    pub fn from_id(id: u16) -> Result<Self> {
        match id {
            0x6603 => Ok(Self::TripleDes168),
            0x6609 => Ok(Self::TripleDes112),
            0x660E => Ok(Self::Aes128),
            0x660F => Ok(Self::Aes192),
            0x6610 => Ok(Self::Aes256),
            other => Err(Error::UnsupportedScheme {
                id: other,
                context: "strong encryption algorithm",
            }),
        }
    }

    /// Algorithm id as stored on disk.
    pub fn id(self) -> u16 {
        match self {
            Self::TripleDes168 => 0x6603,
            Self::TripleDes112 => 0x6609,
            Self::Aes128 => 0x660E,
            Self::Aes192 => 0x660F,
            Self::Aes256 => 0x6610,
        }
    }

    /// Nominal key size in bits.
    pub fn bit_length(self) -> u16 {
        match self {
            Self::TripleDes168 => 168,
            Self::TripleDes112 => 112,
            Self::Aes128 => 128,
            Self::Aes192 => 192,
            Self::Aes256 => 256,
        }
    }

    /// Key length in bytes (DES parity bits included).
    pub fn key_len(self) -> usize {
        match self {
            Self::TripleDes168 => 24,
            Self::TripleDes112 => 16,
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Cipher block size in bytes.
    pub fn block_size(self) -> usize {
        match self {
            Self::TripleDes168 | Self::TripleDes112 => 8,
            Self::Aes128 | Self::Aes192 | Self::Aes256 => 16,
        }
    }

    /// Whether this is one of the AES profiles.
    pub fn is_aes(self) -> bool {
        matches!(self, Self::Aes128 | Self::Aes192 | Self::Aes256)
    }
}

/// The scheme protecting one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncryptionMethod {
    /// Not encrypted.
    #[default]
    None,
    /// Traditional PKWARE stream cipher.
    Pkware,
    /// WinZip AES with the given key strength.
    Aes(AesStrength),
    /// PKWARE strong encryption with the given block cipher.
    Strong(StrongAlgorithm),
    /// Strong encryption with an algorithm id this crate cannot decrypt.
    Unknown(u16),
}

impl EncryptionMethod {
    /// Whether the entry's data is encrypted.
    pub fn is_encrypted(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Bytes the scheme appends after the ciphertext.
    pub fn trailer_len(self) -> u64 {
        match self {
            Self::Aes(_) => AUTH_CODE_LEN as u64,
            _ => 0,
        }
    }

    /// Minimum "version needed to extract" for this scheme.
    pub fn version_needed(self) -> u16 {
        use crate::format::version;
        match self {
            Self::None | Self::Pkware => version::DEFAULT,
            Self::Aes(_) => version::AES,
            Self::Strong(algorithm) if algorithm.is_aes() => version::AES,
            Self::Strong(_) | Self::Unknown(_) => version::STRONG_DES,
        }
    }

    /// Checks that the cipher behind this scheme is known and compiled in.
    pub fn ensure_available(self) -> Result<()> {
        match self {
            Self::Unknown(id) => Err(Error::UnsupportedScheme {
                id,
                context: "strong encryption algorithm",
            }),
            Self::Aes(_) | Self::Strong(_) if !cfg!(feature = "aes") => {
                Err(Error::UnsupportedFeature {
                    feature: "AES and strong encryption (enable the `aes` feature)",
                })
            }
            _ => Ok(()),
        }
    }
}
