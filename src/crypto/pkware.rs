//! Traditional PKWARE ("ZipCrypto") stream cipher.
//!
//! Three 32-bit key registers are seeded from the password through a
//! CRC-32 step function. Each byte is XORed with a keystream byte derived
//! from register 2, then the registers are updated with the *plaintext*
//! byte on both the encrypt and the decrypt side.
//!
//! Each encrypted entry starts with a 12-byte header: 11 random bytes and
//! one check byte (high byte of the CRC-32, or of the DOS modification time
//! for entries streamed with a data descriptor). The check byte is the only
//! early password check and lets one wrong password in 256 through; the
//! final CRC comparison in the entry pipeline catches the rest.
//!
//! This cipher is cryptographically broken. It exists for compatibility.

use std::io::{self, Read, Write};

use zeroize::Zeroize;

use super::Password;
use super::properties::NonceSource;
use crate::{Error, PasswordDetectionMethod, Result};

/// Length of the encryption header preceding the payload.
pub const PKWARE_HEADER_LEN: usize = 12;

const CRC_TABLE: [u32; 256] = make_crc_table();

const fn make_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// One raw CRC-32 step, without the pre/post inversion of a full CRC.
#[inline]
fn crc32_step(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

/// The three cipher registers.
#[derive(Clone)]
pub struct PkwareKeys {
    key0: u32,
    key1: u32,
    key2: u32,
}

impl PkwareKeys {
    /// Initializes the registers and mixes in the password.
    pub fn new(password: &[u8]) -> Self {
        let mut keys = Self {
            key0: 0x1234_5678,
            key1: 0x2345_6789,
            key2: 0x3456_7890,
        };
        for &b in password {
            keys.update(b);
        }
        keys
    }

    #[inline]
    fn update(&mut self, plain: u8) {
        self.key0 = crc32_step(self.key0, plain);
        self.key1 = self
            .key1
            .wrapping_add(self.key0 & 0xFF)
            .wrapping_mul(0x0808_8405)
            .wrapping_add(1);
        self.key2 = crc32_step(self.key2, (self.key1 >> 24) as u8);
    }

    #[inline]
    fn stream_byte(&self) -> u8 {
        let t = (self.key2 as u16) | 2;
        (t.wrapping_mul(t ^ 1) >> 8) as u8
    }

    /// Encrypts one byte.
    #[inline]
    pub fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.stream_byte();
        self.update(plain);
        cipher
    }

    /// Decrypts one byte.
    #[inline]
    pub fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.stream_byte();
        self.update(plain);
        plain
    }

    /// Encrypts a buffer in place.
    pub fn encrypt_in_place(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.encrypt_byte(*b);
        }
    }

    /// Decrypts a buffer in place.
    pub fn decrypt_in_place(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.decrypt_byte(*b);
        }
    }
}

impl Drop for PkwareKeys {
    fn drop(&mut self) {
        self.key0.zeroize();
        self.key1.zeroize();
        self.key2.zeroize();
    }
}

impl std::fmt::Debug for PkwareKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkwareKeys").finish_non_exhaustive()
    }
}

/// Where the last header byte comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckByte {
    /// High byte of the entry CRC-32 (sizes known up front).
    Crc(u32),
    /// High byte of the DOS modification time (data descriptor entries).
    ModTime(u16),
}

impl CheckByte {
    /// The byte written to/expected in the header.
    pub fn value(self) -> u8 {
        match self {
            CheckByte::Crc(crc) => (crc >> 24) as u8,
            CheckByte::ModTime(time) => (time >> 8) as u8,
        }
    }
}

/// Encrypting writer for PKWARE entries.
pub struct PkwareEncoder<W> {
    inner: W,
    keys: PkwareKeys,
    scratch: Vec<u8>,
}

impl<W> std::fmt::Debug for PkwareEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkwareEncoder").finish_non_exhaustive()
    }
}

impl<W: Write> PkwareEncoder<W> {
    /// Writes the encrypted 12-byte header and returns the payload encoder.
    pub fn new(
        mut inner: W,
        password: &Password,
        check: CheckByte,
        nonce: &mut NonceSource,
    ) -> Result<Self> {
        let mut header = [0u8; PKWARE_HEADER_LEN];
        nonce.fill(b"pkware-header", &mut header[..PKWARE_HEADER_LEN - 1])?;
        header[PKWARE_HEADER_LEN - 1] = check.value();

        let mut keys = PkwareKeys::new(password.as_bytes());
        keys.encrypt_in_place(&mut header);
        inner.write_all(&header)?;

        Ok(Self {
            inner,
            keys,
            scratch: Vec::new(),
        })
    }

    /// Borrows the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Finishes the entry. The cipher has no trailer.
    pub fn finish(self) -> io::Result<W> {
        Ok(self.inner)
    }
}

impl<W: Write> Write for PkwareEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.keys.encrypt_in_place(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypting reader for PKWARE entries.
pub struct PkwareDecoder<R> {
    inner: R,
    keys: PkwareKeys,
}

impl<R> std::fmt::Debug for PkwareDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkwareDecoder").finish_non_exhaustive()
    }
}

impl<R: Read> PkwareDecoder<R> {
    /// Reads and checks the 12-byte header.
    ///
    /// Fails with [`PasswordDetectionMethod::CheckByte`] if the decrypted
    /// check byte does not match `check`.
    pub fn new(mut inner: R, password: &Password, check: CheckByte) -> Result<Self> {
        let mut header = [0u8; PKWARE_HEADER_LEN];
        inner.read_exact(&mut header).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::corrupt_header(0, "entry too short for PKWARE encryption header")
            } else {
                Error::Io(e)
            }
        })?;

        let mut keys = PkwareKeys::new(password.as_bytes());
        keys.decrypt_in_place(&mut header);
        if header[PKWARE_HEADER_LEN - 1] != check.value() {
            return Err(Error::wrong_password(
                None,
                PasswordDetectionMethod::CheckByte,
            ));
        }

        Ok(Self { inner, keys })
    }

    /// Returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for PkwareDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.keys.decrypt_in_place(&mut buf[..n]);
        Ok(n)
    }
}
