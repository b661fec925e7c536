//! Entry encryption.
//!
//! Three schemes are supported:
//!
//! - [`pkware`]: the traditional PKWARE stream cipher ("ZipCrypto").
//! - [`aes`]: WinZip AES (AE-1/AE-2), AES-CTR with an HMAC-SHA1 tag.
//! - [`strong`]: PKWARE strong encryption, 3DES or AES in CBC mode.
//!
//! [`EntryEncoder`] and [`EntryDecoder`] wrap a byte stream in whichever
//! scheme an entry uses. Both are closed sums: each scheme has its own
//! variant and the stream impls dispatch with a `match`.
//!
//! The AES and strong ciphers need the `aes` feature. Without it the
//! [`EncryptionMethod`] values are still parsed so callers can report
//! what an archive uses.

#[cfg(feature = "aes")]
pub mod aes;
#[cfg(feature = "aes")]
pub mod kdf;
mod password;
pub mod pkware;
mod properties;
mod scheme;
#[cfg(feature = "aes")]
pub mod strong;

use std::io::{self, Read, Write};

use crate::{Error, Result};

pub use password::{Password, PasswordProvider};
pub use pkware::CheckByte;
pub use properties::{NoncePolicy, NonceSource};
pub use scheme::{
    AUTH_CODE_LEN, AesStrength, AesVendorVersion, EncryptionMethod, PASSWORD_VERIFIER_LEN,
    StrongAlgorithm,
};

use pkware::{PKWARE_HEADER_LEN, PkwareDecoder, PkwareEncoder};

fn require_password(password: Option<&Password>) -> Result<&Password> {
    password.ok_or_else(|| Error::PasswordRequired {
        entry_name: String::new(),
    })
}

/// The scheme header at the start of an encrypted entry's data, as stored.
///
/// Reading one does not need a password; it is what the decoders parse
/// before they derive keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionHeader {
    /// The 12 still-encrypted PKWARE header bytes.
    Pkware([u8; PKWARE_HEADER_LEN]),
    /// WinZip AES salt and password verifier.
    #[cfg(feature = "aes")]
    Aes(aes::AesHeader),
    /// Strong encryption decryption header.
    #[cfg(feature = "aes")]
    Strong(strong::DecryptionHeader),
}

impl EncryptionHeader {
    /// Reads the header for `method` from the start of an entry's data.
    ///
    /// Returns `None` for unencrypted entries.
    pub fn read<R: Read>(r: &mut R, method: EncryptionMethod) -> Result<Option<Self>> {
        method.ensure_available()?;
        match method {
            EncryptionMethod::None => Ok(None),
            EncryptionMethod::Pkware => {
                let mut header = [0u8; PKWARE_HEADER_LEN];
                r.read_exact(&mut header).map_err(|e| {
                    if e.kind() == io::ErrorKind::UnexpectedEof {
                        Error::corrupt_header(0, "entry too short for PKWARE encryption header")
                    } else {
                        Error::Io(e)
                    }
                })?;
                Ok(Some(Self::Pkware(header)))
            }
            #[cfg(feature = "aes")]
            EncryptionMethod::Aes(strength) => {
                Ok(Some(Self::Aes(aes::AesHeader::read(r, strength)?)))
            }
            #[cfg(feature = "aes")]
            EncryptionMethod::Strong(_) => {
                Ok(Some(Self::Strong(strong::DecryptionHeader::read(r)?)))
            }
            _ => Err(Error::InvalidState {
                operation: "read encryption header",
                state: "scheme unavailable",
            }),
        }
    }

    /// Bytes the header occupies on disk.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Pkware(h) => h.len(),
            #[cfg(feature = "aes")]
            Self::Aes(h) => h.strength().header_len(),
            #[cfg(feature = "aes")]
            Self::Strong(h) => h.encoded_len(),
        }
    }
}

/// Encrypting side of an entry's data stream.
///
/// Bytes written here are the (compressed) payload; the scheme's header is
/// emitted by [`start`](Self::start) and its trailer by
/// [`finish`](Self::finish).
#[derive(Debug)]
pub enum EntryEncoder<W: Write> {
    /// Pass-through.
    None(W),
    /// PKWARE stream cipher.
    Pkware(PkwareEncoder<W>),
    /// WinZip AES.
    #[cfg(feature = "aes")]
    Aes(aes::AesEncoder<W>),
    /// Strong encryption.
    #[cfg(feature = "aes")]
    Strong(strong::StrongEncoder<W>),
}

impl<W: Write> EntryEncoder<W> {
    /// Writes the scheme header to `inner` and returns the encoder.
    ///
    /// `check` is only used by the PKWARE scheme.
    pub fn start(
        inner: W,
        method: EncryptionMethod,
        password: Option<&Password>,
        check: CheckByte,
        nonce: &mut NonceSource,
    ) -> Result<Self> {
        method.ensure_available()?;
        match method {
            EncryptionMethod::None => Ok(Self::None(inner)),
            EncryptionMethod::Pkware => Ok(Self::Pkware(PkwareEncoder::new(
                inner,
                require_password(password)?,
                check,
                nonce,
            )?)),
            #[cfg(feature = "aes")]
            EncryptionMethod::Aes(strength) => Ok(Self::Aes(aes::AesEncoder::new(
                inner,
                require_password(password)?,
                strength,
                nonce,
            )?)),
            #[cfg(feature = "aes")]
            EncryptionMethod::Strong(algorithm) => Ok(Self::Strong(strong::StrongEncoder::new(
                inner,
                require_password(password)?,
                algorithm,
                nonce,
            )?)),
            _ => Err(Error::InvalidState {
                operation: "start encryption",
                state: "scheme unavailable",
            }),
        }
    }

    /// Borrows the inner writer.
    pub fn get_ref(&self) -> &W {
        match self {
            Self::None(w) => w,
            Self::Pkware(e) => e.get_ref(),
            #[cfg(feature = "aes")]
            Self::Aes(e) => e.get_ref(),
            #[cfg(feature = "aes")]
            Self::Strong(e) => e.get_ref(),
        }
    }

    /// Writes the scheme trailer and returns the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::None(w) => Ok(w),
            Self::Pkware(e) => e.finish(),
            #[cfg(feature = "aes")]
            Self::Aes(e) => e.finish(),
            #[cfg(feature = "aes")]
            Self::Strong(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for EntryEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::None(w) => w.write(buf),
            Self::Pkware(e) => e.write(buf),
            #[cfg(feature = "aes")]
            Self::Aes(e) => e.write(buf),
            #[cfg(feature = "aes")]
            Self::Strong(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::None(w) => w.flush(),
            Self::Pkware(e) => e.flush(),
            #[cfg(feature = "aes")]
            Self::Aes(e) => e.flush(),
            #[cfg(feature = "aes")]
            Self::Strong(e) => e.flush(),
        }
    }
}

/// Decrypting side of an entry's data stream.
///
/// The inner reader must be bounded to the entry's data region.
#[derive(Debug)]
pub enum EntryDecoder<R: Read> {
    /// Pass-through.
    None(R),
    /// PKWARE stream cipher.
    Pkware(PkwareDecoder<R>),
    /// WinZip AES.
    #[cfg(feature = "aes")]
    Aes(aes::AesDecoder<R>),
    /// Strong encryption.
    #[cfg(feature = "aes")]
    Strong(strong::StrongDecoder<R>),
}

impl<R: Read> EntryDecoder<R> {
    /// Reads and checks the scheme header.
    ///
    /// `data_len` is the size of the entry's whole data region (the
    /// compressed size, scheme overhead included).
    pub fn start(
        inner: R,
        method: EncryptionMethod,
        password: Option<&Password>,
        check: CheckByte,
        data_len: u64,
    ) -> Result<Self> {
        method.ensure_available()?;
        #[cfg(not(feature = "aes"))]
        let _ = data_len;
        match method {
            EncryptionMethod::None => Ok(Self::None(inner)),
            EncryptionMethod::Pkware => Ok(Self::Pkware(PkwareDecoder::new(
                inner,
                require_password(password)?,
                check,
            )?)),
            #[cfg(feature = "aes")]
            EncryptionMethod::Aes(strength) => Ok(Self::Aes(aes::AesDecoder::new(
                inner,
                require_password(password)?,
                strength,
                data_len,
            )?)),
            #[cfg(feature = "aes")]
            EncryptionMethod::Strong(_) => Ok(Self::Strong(strong::StrongDecoder::new(
                inner,
                require_password(password)?,
                data_len,
            )?)),
            _ => Err(Error::InvalidState {
                operation: "start decryption",
                state: "scheme unavailable",
            }),
        }
    }

    /// Bytes of scheme header consumed by [`start`](Self::start).
    pub fn header_len(&self) -> u64 {
        match self {
            Self::None(_) => 0,
            Self::Pkware(_) => PKWARE_HEADER_LEN as u64,
            #[cfg(feature = "aes")]
            Self::Aes(d) => d.header_len(),
            #[cfg(feature = "aes")]
            Self::Strong(d) => d.header_len(),
        }
    }

    /// Consumes any unread ciphertext, verifies the scheme trailer and
    /// returns the inner reader.
    pub fn finish(self) -> Result<R> {
        match self {
            Self::None(r) => Ok(r),
            Self::Pkware(d) => Ok(d.into_inner()),
            #[cfg(feature = "aes")]
            Self::Aes(d) => d.finish(),
            #[cfg(feature = "aes")]
            Self::Strong(d) => d.finish(),
        }
    }
}

impl<R: Read> Read for EntryDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::None(r) => r.read(buf),
            Self::Pkware(d) => d.read(buf),
            #[cfg(feature = "aes")]
            Self::Aes(d) => d.read(buf),
            #[cfg(feature = "aes")]
            Self::Strong(d) => d.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(method: EncryptionMethod, data: &[u8]) -> Vec<u8> {
        let password = Password::new("entry pw");
        let check = CheckByte::ModTime(0x5A5A);
        let mut nonce = NoncePolicy::deterministic([1; 32]).source();
        let mut enc =
            EntryEncoder::start(Vec::new(), method, Some(&password), check, &mut nonce).unwrap();
        enc.write_all(data).unwrap();
        let encrypted = enc.finish().unwrap();

        let len = encrypted.len() as u64;
        let mut dec =
            EntryDecoder::start(Cursor::new(encrypted), method, Some(&password), check, len)
                .unwrap();
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        dec.finish().unwrap();
        out
    }

    #[test]
    fn test_none_is_passthrough() {
        let mut nonce = NoncePolicy::default().source();
        let mut enc = EntryEncoder::start(
            Vec::new(),
            EncryptionMethod::None,
            None,
            CheckByte::Crc(0),
            &mut nonce,
        )
        .unwrap();
        enc.write_all(b"plain").unwrap();
        assert_eq!(enc.finish().unwrap(), b"plain");
    }

    #[test]
    fn test_every_scheme_roundtrips() {
        let data = b"The quick brown fox jumps over the lazy dog".repeat(9);
        let mut methods = vec![EncryptionMethod::None, EncryptionMethod::Pkware];
        if cfg!(feature = "aes") {
            methods.push(EncryptionMethod::Aes(AesStrength::Aes256));
            methods.push(EncryptionMethod::Strong(StrongAlgorithm::TripleDes168));
            methods.push(EncryptionMethod::Strong(StrongAlgorithm::Aes192));
        }
        for method in methods {
            assert_eq!(roundtrip(method, &data), data, "{method:?}");
        }
    }

    #[test]
    fn test_encryption_header_read() {
        let password = Password::new("pw");
        let mut nonce = NoncePolicy::deterministic([2; 32]).source();
        let mut enc = EntryEncoder::start(
            Vec::new(),
            EncryptionMethod::Pkware,
            Some(&password),
            CheckByte::Crc(0),
            &mut nonce,
        )
        .unwrap();
        enc.write_all(b"abc").unwrap();
        let bytes = enc.finish().unwrap();

        let header = EncryptionHeader::read(&mut &bytes[..], EncryptionMethod::Pkware)
            .unwrap()
            .unwrap();
        assert_eq!(header.encoded_len(), PKWARE_HEADER_LEN);
        assert_eq!(header, EncryptionHeader::Pkware(bytes[..12].try_into().unwrap()));
        assert!(
            EncryptionHeader::read(&mut &bytes[..], EncryptionMethod::None)
                .unwrap()
                .is_none()
        );
    }

    #[cfg(feature = "aes")]
    #[test]
    fn test_strong_header_len_matches_data_offset() {
        let password = Password::new("pw");
        let method = EncryptionMethod::Strong(StrongAlgorithm::Aes256);
        let mut nonce = NoncePolicy::deterministic([4; 32]).source();
        let mut enc =
            EntryEncoder::start(Vec::new(), method, Some(&password), CheckByte::Crc(0), &mut nonce)
                .unwrap();
        enc.write_all(&[0u8; 20]).unwrap();
        let bytes = enc.finish().unwrap();

        let header = EncryptionHeader::read(&mut &bytes[..], method).unwrap().unwrap();
        // 20 bytes of payload pad to 32.
        assert_eq!(header.encoded_len() + 32, bytes.len());
    }

    #[test]
    fn test_missing_password() {
        let mut nonce = NoncePolicy::default().source();
        let err = EntryEncoder::start(
            Vec::new(),
            EncryptionMethod::Pkware,
            None,
            CheckByte::Crc(0),
            &mut nonce,
        )
        .unwrap_err();
        assert!(matches!(err, Error::PasswordRequired { .. }));
    }
}
