//! WinZip AES encryption (AE-1 / AE-2).
//!
//! Layout of an encrypted entry's data region:
//!
//! ```text
//! salt (8/12/16) | password verifier (2) | ciphertext (n) | auth code (10)
//! ```
//!
//! Keys come from PBKDF2-HMAC-SHA1 (1000 iterations) over the password and
//! salt. The payload is AES in counter mode with a 16-byte little-endian
//! counter starting at 1, so ciphertext and plaintext have equal length.
//! HMAC-SHA1 over the ciphertext, truncated to 10 bytes, authenticates it.

use std::io::{self, Read, Take, Write};

use aes::{Aes128, Aes192, Aes256};
use ctr::Ctr128LE;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroizing;

use super::Password;
use super::scheme::{AUTH_CODE_LEN, AesStrength, PASSWORD_VERIFIER_LEN};
use super::kdf::{AES_KDF_ITERATIONS, pbkdf2_sha1};
use super::properties::NonceSource;
use crate::{Error, PasswordDetectionMethod, Result};

type HmacSha1 = Hmac<Sha1>;

/// The salt and password verifier written before the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AesHeader {
    strength: AesStrength,
    salt: Vec<u8>,
    password_verifier: [u8; PASSWORD_VERIFIER_LEN],
}

impl AesHeader {
    /// Creates a header, checking the salt length against the strength.
    pub fn new(
        strength: AesStrength,
        salt: Vec<u8>,
        password_verifier: [u8; PASSWORD_VERIFIER_LEN],
    ) -> Result<Self> {
        if salt.len() != strength.salt_len() {
            return Err(Error::CryptoError(format!(
                "AES-{} needs a {}-byte salt, got {}",
                strength.bits(),
                strength.salt_len(),
                salt.len()
            )));
        }
        Ok(Self {
            strength,
            salt,
            password_verifier,
        })
    }

    /// Reads the header for an entry of the given strength.
    pub fn read<R: Read>(r: &mut R, strength: AesStrength) -> Result<Self> {
        let mut buf = vec![0u8; strength.header_len()];
        r.read_exact(&mut buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::corrupt_header(0, "entry too short for AES header")
            } else {
                Error::Io(e)
            }
        })?;
        let verifier = [buf[strength.salt_len()], buf[strength.salt_len() + 1]];
        buf.truncate(strength.salt_len());
        Self::new(strength, buf, verifier)
    }

    /// Writes salt and verifier.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.salt)?;
        w.write_all(&self.password_verifier)
    }

    /// Key strength.
    pub fn strength(&self) -> AesStrength {
        self.strength
    }

    /// The salt.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// The 2-byte password verifier.
    pub fn password_verifier(&self) -> [u8; PASSWORD_VERIFIER_LEN] {
        self.password_verifier
    }
}

/// Key material derived from a password and salt.
struct AesKeys {
    encryption: Zeroizing<Vec<u8>>,
    mac: Zeroizing<Vec<u8>>,
    verifier: [u8; PASSWORD_VERIFIER_LEN],
}

impl AesKeys {
    fn derive(password: &Password, strength: AesStrength, salt: &[u8]) -> Self {
        let key_len = strength.key_len();
        let material = pbkdf2_sha1(
            password.as_bytes(),
            salt,
            AES_KDF_ITERATIONS,
            2 * key_len + PASSWORD_VERIFIER_LEN,
        );
        Self {
            encryption: Zeroizing::new(material[..key_len].to_vec()),
            mac: Zeroizing::new(material[key_len..2 * key_len].to_vec()),
            verifier: [material[2 * key_len], material[2 * key_len + 1]],
        }
    }
}

/// AES-CTR keystream for the three key sizes.
enum AesCtr {
    Aes128(Ctr128LE<Aes128>),
    Aes192(Ctr128LE<Aes192>),
    Aes256(Ctr128LE<Aes256>),
}

impl AesCtr {
    fn new(strength: AesStrength, key: &[u8]) -> Result<Self> {
        // Counter block 1, little-endian.
        let mut iv = [0u8; 16];
        iv[0] = 1;
        let invalid = |_| Error::CryptoError("invalid AES key length".into());
        Ok(match strength {
            AesStrength::Aes128 => Self::Aes128(Ctr128LE::new_from_slices(key, &iv).map_err(invalid)?),
            AesStrength::Aes192 => Self::Aes192(Ctr128LE::new_from_slices(key, &iv).map_err(invalid)?),
            AesStrength::Aes256 => Self::Aes256(Ctr128LE::new_from_slices(key, &iv).map_err(invalid)?),
        })
    }

    fn apply(&mut self, buf: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.apply_keystream(buf),
            Self::Aes192(c) => c.apply_keystream(buf),
            Self::Aes256(c) => c.apply_keystream(buf),
        }
    }
}

fn new_mac(key: &[u8]) -> Result<HmacSha1> {
    HmacSha1::new_from_slice(key).map_err(|_| Error::CryptoError("invalid HMAC key length".into()))
}

/// Encrypting writer for WinZip AES entries.
pub struct AesEncoder<W> {
    inner: W,
    cipher: AesCtr,
    mac: HmacSha1,
    scratch: Vec<u8>,
}

impl<W> std::fmt::Debug for AesEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesEncoder").finish_non_exhaustive()
    }
}

impl<W: Write> AesEncoder<W> {
    /// Derives keys from a fresh salt, writes the header, and returns the encoder.
    pub fn new(
        mut inner: W,
        password: &Password,
        strength: AesStrength,
        nonce: &mut NonceSource,
    ) -> Result<Self> {
        let salt = nonce.bytes(b"aes-salt", strength.salt_len())?;
        let keys = AesKeys::derive(password, strength, &salt);
        let header = AesHeader::new(strength, salt, keys.verifier)?;
        header.write(&mut inner)?;

        Ok(Self {
            inner,
            cipher: AesCtr::new(strength, &keys.encryption)?,
            mac: new_mac(&keys.mac)?,
            scratch: Vec::new(),
        })
    }

    /// Borrows the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Writes the authentication code and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let tag = self.mac.finalize().into_bytes();
        self.inner.write_all(&tag[..AUTH_CODE_LEN])?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for AesEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.cipher.apply(&mut self.scratch);
        self.mac.update(&self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypting reader for WinZip AES entries.
///
/// The reader stops before the authentication code; [`finish`](Self::finish)
/// reads and checks it.
pub struct AesDecoder<R> {
    inner: Take<R>,
    cipher: AesCtr,
    mac: HmacSha1,
    strength: AesStrength,
}

impl<R> std::fmt::Debug for AesDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesDecoder").finish_non_exhaustive()
    }
}

impl<R: Read> AesDecoder<R> {
    /// Reads the header and checks the password verifier.
    ///
    /// `data_len` is the full size of the entry's data region (the ZIP
    /// "compressed size"), including header and authentication code.
    pub fn new(
        mut inner: R,
        password: &Password,
        strength: AesStrength,
        data_len: u64,
    ) -> Result<Self> {
        let payload_len = data_len.checked_sub(strength.overhead()).ok_or_else(|| {
            Error::corrupt_header(
                0,
                format!(
                    "AES entry data ({} bytes) shorter than salt, verifier and auth code",
                    data_len
                ),
            )
        })?;

        let header = AesHeader::read(&mut inner, strength)?;
        let keys = AesKeys::derive(password, strength, header.salt());
        if keys.verifier != header.password_verifier() {
            return Err(Error::wrong_password(
                None,
                PasswordDetectionMethod::PasswordVerifier,
            ));
        }

        Ok(Self {
            inner: inner.take(payload_len),
            cipher: AesCtr::new(strength, &keys.encryption)?,
            mac: new_mac(&keys.mac)?,
            strength,
        })
    }

    /// Length of the salt and verifier that preceded the payload.
    pub fn header_len(&self) -> u64 {
        self.strength.header_len() as u64
    }

    /// Consumes any unread ciphertext, then verifies the authentication code.
    pub fn finish(mut self) -> Result<R> {
        io::copy(&mut self, &mut io::sink())?;

        let mut inner = self.inner.into_inner();
        let mut tag = [0u8; AUTH_CODE_LEN];
        inner.read_exact(&mut tag).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::corrupt_header(0, "AES authentication code truncated")
            } else {
                Error::Io(e)
            }
        })?;

        self.mac
            .verify_truncated_left(&tag)
            .map_err(|_| Error::wrong_password(None, PasswordDetectionMethod::MacMismatch))?;
        Ok(inner)
    }
}

impl<R: Read> Read for AesDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.mac.update(&buf[..n]);
        self.cipher.apply(&mut buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::NoncePolicy;
    use std::io::Cursor;

    const ALL: [AesStrength; 3] = [AesStrength::Aes128, AesStrength::Aes192, AesStrength::Aes256];

    fn encrypt(data: &[u8], password: &str, strength: AesStrength) -> Vec<u8> {
        let mut nonce = NoncePolicy::deterministic([9; 32]).source();
        let mut out = Vec::new();
        let mut enc = AesEncoder::new(&mut out, &Password::new(password), strength, &mut nonce)
            .unwrap();
        // Odd chunk sizes exercise counter continuation across writes.
        for chunk in data.chunks(7) {
            enc.write_all(chunk).unwrap();
        }
        enc.finish().unwrap();
        out
    }

    fn decrypt(encrypted: &[u8], password: &str, strength: AesStrength) -> Result<Vec<u8>> {
        let mut dec = AesDecoder::new(
            Cursor::new(encrypted),
            &Password::new(password),
            strength,
            encrypted.len() as u64,
        )?;
        let mut out = Vec::new();
        dec.read_to_end(&mut out)?;
        dec.finish()?;
        Ok(out)
    }

    #[test]
    fn test_roundtrip_all_strengths() {
        let data: Vec<u8> = (0..500u32).map(|i| (i % 256) as u8).collect();
        for strength in ALL {
            let encrypted = encrypt(&data, "password", strength);
            assert_eq!(encrypted.len() as u64, data.len() as u64 + strength.overhead());
            assert_eq!(decrypt(&encrypted, "password", strength).unwrap(), data);
        }
    }

    #[test]
    fn test_ciphertext_same_length_as_plaintext() {
        let data = b"short";
        let encrypted = encrypt(data, "pw", AesStrength::Aes128);
        let header_len = AesStrength::Aes128.header_len();
        let payload = &encrypted[header_len..encrypted.len() - AUTH_CODE_LEN];
        assert_eq!(payload.len(), data.len());
        assert_ne!(payload, data);
    }

    #[test]
    fn test_tamper_detected_at_finish() {
        let data = vec![0x42u8; 64];
        let encrypted = encrypt(&data, "pw", AesStrength::Aes256);
        let header_len = AesStrength::Aes256.header_len();
        for pos in [header_len, header_len + 31, encrypted.len() - AUTH_CODE_LEN - 1] {
            let mut tampered = encrypted.clone();
            tampered[pos] ^= 0x01;
            match decrypt(&tampered, "pw", AesStrength::Aes256) {
                Err(Error::WrongPassword {
                    detection_method, ..
                }) => assert_eq!(detection_method, PasswordDetectionMethod::MacMismatch),
                other => panic!("expected MAC failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_tampered_auth_code_detected() {
        let encrypted = encrypt(b"hello", "pw", AesStrength::Aes128);
        let mut tampered = encrypted.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xFF;
        assert!(matches!(
            decrypt(&tampered, "pw", AesStrength::Aes128),
            Err(Error::WrongPassword { .. })
        ));
    }

    #[test]
    fn test_wrong_password_rejected() {
        let encrypted = encrypt(b"payload", "right", AesStrength::Aes192);
        // Either the verifier (65535 in 65536) or the MAC catches it.
        assert!(matches!(
            decrypt(&encrypted, "wrong", AesStrength::Aes192),
            Err(Error::WrongPassword { .. })
        ));
    }

    #[test]
    fn test_finish_verifies_unread_tail() {
        let data = vec![1u8; 100];
        let encrypted = encrypt(&data, "pw", AesStrength::Aes128);
        let mut dec = AesDecoder::new(
            Cursor::new(&encrypted),
            &Password::new("pw"),
            AesStrength::Aes128,
            encrypted.len() as u64,
        )
        .unwrap();
        let mut first = [0u8; 10];
        dec.read_exact(&mut first).unwrap();
        assert_eq!(first, [1u8; 10]);
        dec.finish().unwrap();
    }

    #[test]
    fn test_data_too_short() {
        let err = AesDecoder::new(
            Cursor::new(vec![0u8; 10]),
            &Password::new("pw"),
            AesStrength::Aes256,
            10,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { .. }));
    }

    #[test]
    fn test_header_validation() {
        assert!(AesHeader::new(AesStrength::Aes128, vec![0; 16], [0, 0]).is_err());
        let header = AesHeader::new(AesStrength::Aes128, vec![5; 8], [1, 2]).unwrap();
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 10);
        let parsed = AesHeader::read(&mut Cursor::new(buf), AesStrength::Aes128).unwrap();
        assert_eq!(parsed, header);
    }
}
