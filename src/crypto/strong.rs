//! PKWARE strong encryption (password-based, 3DES or AES in CBC mode).
//!
//! An entry's data region starts with a decryption header:
//!
//! ```text
//! ivSize(2) iv totalSize(4) [ version(2) algId(2) bitLen(2) flags(2)
//!   erdSize(2) erd recipientCount(4) (hashAlg(2) hashSize(2))?
//!   recipients... pvSize(2) pvData ]
//! ```
//!
//! `totalSize` counts the bracketed bytes; a header whose fields do not add
//! up to it is corrupt. Each recipient is `size(2) hash(hashSize)
//! keyBlob(size - hashSize)`; the hash fields are present only when there
//! is at least one recipient.
//!
//! Key schedule for password-based decryption:
//!
//! 1. `master = DeriveKey(SHA1(password))`
//! 2. `random = CBC-decrypt(master, iv, erd)`, PKCS#7 padded
//! 3. `file key = DeriveKey(SHA1(iv || random))`
//! 4. `CBC-decrypt(file key, iv, pvData)` must end with the CRC-32 of the
//!    bytes before it, otherwise the password is wrong.
//!
//! The payload is CBC with the file key and `iv`, PKCS#7 padded. There is
//! no MAC; the pipeline's final CRC comparison is the integrity check.

use std::io::{self, Read, Take, Write};

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use des::{TdesEde2, TdesEde3};
use zeroize::Zeroizing;

use super::Password;
use super::scheme::StrongAlgorithm;
use super::kdf::{derive_strong_key, sha1_digest};
use super::properties::NonceSource;
use crate::checksum::{Checksum, Crc32};
use crate::format::bytes::{ByteReader, put_u16_le, put_u32_le, read_u16_le, read_u32_le, read_vec};
use crate::{Error, PasswordDetectionMethod, Result};

/// Decryption header format version written by this crate.
pub const DECRYPTION_HEADER_VERSION: u16 = 3;

/// Hash algorithm id for SHA-1 recipient hashes.
pub const HASH_SHA1: u16 = 0x8004;

/// Header flag bits.
pub mod flags {
    /// The file key can be derived from a password.
    pub const PASSWORD_KEY: u16 = 0x0001;
    /// The file key is wrapped for certificate recipients.
    pub const CERTIFICATE_KEY: u16 = 0x0002;
}

/// Length of the random data generated for each entry.
const RANDOM_DATA_LEN: usize = 16;

/// Length of the random part of the password validation data.
const VALIDATION_RANDOM_LEN: usize = 12;

/// One key-wrapping entry of a decryption header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    hash: Vec<u8>,
    key_blob: Vec<u8>,
}

impl Recipient {
    /// Creates a recipient from its public-key hash and wrapped key blob.
    pub fn new(hash: Vec<u8>, key_blob: Vec<u8>) -> Result<Self> {
        if hash.len() + key_blob.len() > u16::MAX as usize {
            return Err(Error::CryptoError("recipient larger than 65535 bytes".into()));
        }
        Ok(Self { hash, key_blob })
    }

    /// Hash of the recipient's public key.
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// The wrapped file key.
    pub fn key_blob(&self) -> &[u8] {
        &self.key_blob
    }

    /// Value of the on-disk `size` field.
    pub fn size(&self) -> u16 {
        (self.hash.len() + self.key_blob.len()) as u16
    }
}

/// A parsed and validated strong encryption decryption header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionHeader {
    iv: Vec<u8>,
    version: u16,
    algorithm: StrongAlgorithm,
    bit_length: u16,
    flags: u16,
    encrypted_random_data: Vec<u8>,
    hash_algorithm: Option<u16>,
    recipients: Vec<Recipient>,
    password_validation_data: Vec<u8>,
}

impl DecryptionHeader {
    /// Builds a header, validating field sizes and recipient consistency.
    ///
    /// All recipients must share one hash length (the header stores a
    /// single `hashSize`), and a hash algorithm is required exactly when
    /// recipients are present.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        iv: Vec<u8>,
        version: u16,
        algorithm: StrongAlgorithm,
        flags: u16,
        encrypted_random_data: Vec<u8>,
        hash_algorithm: Option<u16>,
        recipients: Vec<Recipient>,
        password_validation_data: Vec<u8>,
    ) -> Result<Self> {
        if iv.len() > u16::MAX as usize
            || encrypted_random_data.len() > u16::MAX as usize
            || password_validation_data.len() > u16::MAX as usize
        {
            return Err(Error::CryptoError(
                "decryption header field exceeds 65535 bytes".into(),
            ));
        }
        if recipients.is_empty() != hash_algorithm.is_none() {
            return Err(Error::CryptoError(
                "hash algorithm must be present exactly when recipients are".into(),
            ));
        }
        if let Some(first) = recipients.first() {
            let hash_len = first.hash.len();
            if recipients.iter().any(|r| r.hash.len() != hash_len) {
                return Err(Error::CryptoError(
                    "all recipients must use the same hash length".into(),
                ));
            }
        }
        Ok(Self {
            iv,
            version,
            algorithm,
            bit_length: algorithm.bit_length(),
            flags,
            encrypted_random_data,
            hash_algorithm,
            recipients,
            password_validation_data,
        })
    }

    /// The initialization vector.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Record format version.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Cipher algorithm.
    pub fn algorithm(&self) -> StrongAlgorithm {
        self.algorithm
    }

    /// Declared key length in bits.
    pub fn bit_length(&self) -> u16 {
        self.bit_length
    }

    /// Processing flags (see [`flags`]).
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Random data encrypted with the master key.
    pub fn encrypted_random_data(&self) -> &[u8] {
        &self.encrypted_random_data
    }

    /// Recipient hash algorithm, if recipients are present.
    pub fn hash_algorithm(&self) -> Option<u16> {
        self.hash_algorithm
    }

    /// Recipients in wire order.
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Encrypted password validation data.
    pub fn password_validation_data(&self) -> &[u8] {
        &self.password_validation_data
    }

    fn hash_size(&self) -> usize {
        self.recipients.first().map_or(0, |r| r.hash.len())
    }

    /// Length of the region counted by `totalSize`.
    pub fn body_len(&self) -> usize {
        let mut len = 2 + 2 + 2 + 2 + 2 + self.encrypted_random_data.len() + 4;
        if !self.recipients.is_empty() {
            len += 4;
            len += self
                .recipients
                .iter()
                .map(|r| 2 + r.hash.len() + r.key_blob.len())
                .sum::<usize>();
        }
        len + 2 + self.password_validation_data.len()
    }

    /// Total on-disk length including `ivSize`, `iv` and `totalSize`.
    pub fn encoded_len(&self) -> usize {
        2 + self.iv.len() + 4 + self.body_len()
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        put_u16_le(&mut buf, self.iv.len() as u16);
        buf.extend_from_slice(&self.iv);
        put_u32_le(&mut buf, self.body_len() as u32);
        put_u16_le(&mut buf, self.version);
        put_u16_le(&mut buf, self.algorithm.id());
        put_u16_le(&mut buf, self.bit_length);
        put_u16_le(&mut buf, self.flags);
        put_u16_le(&mut buf, self.encrypted_random_data.len() as u16);
        buf.extend_from_slice(&self.encrypted_random_data);
        put_u32_le(&mut buf, self.recipients.len() as u32);
        if let Some(hash_algorithm) = self.hash_algorithm {
            put_u16_le(&mut buf, hash_algorithm);
            put_u16_le(&mut buf, self.hash_size() as u16);
            for recipient in &self.recipients {
                put_u16_le(&mut buf, recipient.size());
                buf.extend_from_slice(&recipient.hash);
                buf.extend_from_slice(&recipient.key_blob);
            }
        }
        put_u16_le(&mut buf, self.password_validation_data.len() as u16);
        buf.extend_from_slice(&self.password_validation_data);
        buf
    }

    /// Writes the header.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    /// Reads a header from a stream.
    ///
    /// Fails with [`Error::CorruptHeader`] when the bracketed fields do not
    /// occupy exactly `totalSize` bytes.
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        Self::read_within(r, u64::MAX)
    }

    /// Reads a header that must fit in the first `limit` bytes of the
    /// entry's data. Declared sizes are checked against `limit` before any
    /// field is read.
    pub fn read_within<R: Read>(r: &mut R, limit: u64) -> Result<Self> {
        let eof = |e: io::Error| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::corrupt_header(0, "decryption header truncated")
            } else {
                Error::Io(e)
            }
        };
        let too_large = |declared: u64| {
            Error::corrupt_header(
                0,
                format!(
                    "decryption header declares {} bytes, entry data holds {}",
                    declared, limit
                ),
            )
        };
        let iv_size = read_u16_le(r).map_err(eof)? as usize;
        if 2 + iv_size as u64 + 4 > limit {
            return Err(too_large(2 + iv_size as u64 + 4));
        }
        let iv = read_vec(r, iv_size).map_err(eof)?;
        let total_size = read_u32_le(r).map_err(eof)? as usize;
        let declared = 2 + iv_size as u64 + 4 + total_size as u64;
        if declared > limit {
            return Err(too_large(declared));
        }
        let body = read_vec(r, total_size).map_err(eof)?;
        Self::parse_body(iv, &body, (2 + iv_size + 4) as u64)
    }

    /// Parses a header from a byte slice, returning it and the bytes used.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize)> {
        let mut reader = ByteReader::new(data, 0);
        let iv = reader.prefixed_u16()?.to_vec();
        let total_size = reader.u32_le()? as usize;
        let body_start = reader.position();
        let body = reader.take(total_size)?;
        let header = Self::parse_body(iv, body, body_start as u64)?;
        Ok((header, reader.position()))
    }

    fn parse_body(iv: Vec<u8>, body: &[u8], base: u64) -> Result<Self> {
        let mut r = ByteReader::new(body, base);
        let version = r.u16_le()?;
        let algorithm = StrongAlgorithm::from_id(r.u16_le()?)?;
        let bit_length = r.u16_le()?;
        let flags = r.u16_le()?;
        let encrypted_random_data = r.prefixed_u16()?.to_vec();
        let recipient_count = r.u32_le()?;

        let mut hash_algorithm = None;
        let mut recipients = Vec::new();
        if recipient_count > 0 {
            hash_algorithm = Some(r.u16_le()?);
            let hash_size = r.u16_le()? as usize;
            for _ in 0..recipient_count {
                let offset = r.offset();
                let size = r.u16_le()? as usize;
                if size < hash_size {
                    return Err(Error::corrupt_header(
                        offset,
                        format!("recipient size {} smaller than hash size {}", size, hash_size),
                    ));
                }
                let hash = r.take(hash_size)?.to_vec();
                let key_blob = r.take(size - hash_size)?.to_vec();
                recipients.push(Recipient { hash, key_blob });
            }
        }

        let password_validation_data = r.prefixed_u16()?.to_vec();

        if !r.is_empty() {
            return Err(Error::corrupt_header(
                r.offset(),
                format!(
                    "decryption header declares {} bytes but fields occupy {}",
                    body.len(),
                    r.position()
                ),
            ));
        }

        if bit_length != algorithm.bit_length() {
            log::warn!(
                "decryption header bit length {} does not match algorithm {:?}",
                bit_length,
                algorithm
            );
        }

        Ok(Self {
            iv,
            version,
            algorithm,
            bit_length,
            flags,
            encrypted_random_data,
            hash_algorithm,
            recipients,
            password_validation_data,
        })
    }
}

// ---------------------------------------------------------------------------
// CBC plumbing
// ---------------------------------------------------------------------------

enum CbcEncryptor {
    TripleDes168(cbc::Encryptor<TdesEde3>),
    TripleDes112(cbc::Encryptor<TdesEde2>),
    Aes128(cbc::Encryptor<Aes128>),
    Aes192(cbc::Encryptor<Aes192>),
    Aes256(cbc::Encryptor<Aes256>),
}

enum CbcDecryptor {
    TripleDes168(cbc::Decryptor<TdesEde3>),
    TripleDes112(cbc::Decryptor<TdesEde2>),
    Aes128(cbc::Decryptor<Aes128>),
    Aes192(cbc::Decryptor<Aes192>),
    Aes256(cbc::Decryptor<Aes256>),
}

fn cbc_error(_: cbc::cipher::InvalidLength) -> Error {
    Error::CryptoError("invalid key or IV length for strong encryption".into())
}

fn encrypt_blocks<C: BlockEncryptMut>(cipher: &mut C, buf: &mut [u8]) {
    for block in buf.chunks_exact_mut(C::block_size()) {
        cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

fn decrypt_blocks<C: BlockDecryptMut>(cipher: &mut C, buf: &mut [u8]) {
    for block in buf.chunks_exact_mut(C::block_size()) {
        cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

impl CbcEncryptor {
    fn new(algorithm: StrongAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self> {
        let iv = &iv[..algorithm.block_size().min(iv.len())];
        Ok(match algorithm {
            StrongAlgorithm::TripleDes168 => {
                Self::TripleDes168(KeyIvInit::new_from_slices(key, iv).map_err(cbc_error)?)
            }
            StrongAlgorithm::TripleDes112 => {
                Self::TripleDes112(KeyIvInit::new_from_slices(key, iv).map_err(cbc_error)?)
            }
            StrongAlgorithm::Aes128 => {
                Self::Aes128(KeyIvInit::new_from_slices(key, iv).map_err(cbc_error)?)
            }
            StrongAlgorithm::Aes192 => {
                Self::Aes192(KeyIvInit::new_from_slices(key, iv).map_err(cbc_error)?)
            }
            StrongAlgorithm::Aes256 => {
                Self::Aes256(KeyIvInit::new_from_slices(key, iv).map_err(cbc_error)?)
            }
        })
    }

    /// Encrypts whole blocks in place; `buf.len()` must be a block multiple.
    fn encrypt(&mut self, buf: &mut [u8]) {
        match self {
            Self::TripleDes168(c) => encrypt_blocks(c, buf),
            Self::TripleDes112(c) => encrypt_blocks(c, buf),
            Self::Aes128(c) => encrypt_blocks(c, buf),
            Self::Aes192(c) => encrypt_blocks(c, buf),
            Self::Aes256(c) => encrypt_blocks(c, buf),
        }
    }
}

impl CbcDecryptor {
    fn new(algorithm: StrongAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self> {
        let iv = &iv[..algorithm.block_size().min(iv.len())];
        Ok(match algorithm {
            StrongAlgorithm::TripleDes168 => {
                Self::TripleDes168(KeyIvInit::new_from_slices(key, iv).map_err(cbc_error)?)
            }
            StrongAlgorithm::TripleDes112 => {
                Self::TripleDes112(KeyIvInit::new_from_slices(key, iv).map_err(cbc_error)?)
            }
            StrongAlgorithm::Aes128 => {
                Self::Aes128(KeyIvInit::new_from_slices(key, iv).map_err(cbc_error)?)
            }
            StrongAlgorithm::Aes192 => {
                Self::Aes192(KeyIvInit::new_from_slices(key, iv).map_err(cbc_error)?)
            }
            StrongAlgorithm::Aes256 => {
                Self::Aes256(KeyIvInit::new_from_slices(key, iv).map_err(cbc_error)?)
            }
        })
    }

    fn decrypt(&mut self, buf: &mut [u8]) {
        match self {
            Self::TripleDes168(c) => decrypt_blocks(c, buf),
            Self::TripleDes112(c) => decrypt_blocks(c, buf),
            Self::Aes128(c) => decrypt_blocks(c, buf),
            Self::Aes192(c) => decrypt_blocks(c, buf),
            Self::Aes256(c) => decrypt_blocks(c, buf),
        }
    }
}

fn pkcs7_pad(buf: &mut Vec<u8>, block_size: usize) {
    let pad = block_size - buf.len() % block_size;
    buf.resize(buf.len() + pad, pad as u8);
}

/// Returns the unpadded length, or `None` if the padding is malformed.
fn pkcs7_unpadded_len(buf: &[u8], block_size: usize) -> Option<usize> {
    let pad = *buf.last()? as usize;
    if pad == 0 || pad > block_size || pad > buf.len() {
        return None;
    }
    buf[buf.len() - pad..]
        .iter()
        .all(|&b| b as usize == pad)
        .then_some(buf.len() - pad)
}

fn cbc_encrypt_padded(
    algorithm: StrongAlgorithm,
    key: &[u8],
    iv: &[u8],
    plain: &[u8],
) -> Result<Vec<u8>> {
    let mut buf = plain.to_vec();
    pkcs7_pad(&mut buf, algorithm.block_size());
    CbcEncryptor::new(algorithm, key, iv)?.encrypt(&mut buf);
    Ok(buf)
}

fn cbc_decrypt_padded(
    algorithm: StrongAlgorithm,
    key: &[u8],
    iv: &[u8],
    cipher: &[u8],
) -> Result<Option<Zeroizing<Vec<u8>>>> {
    if cipher.is_empty() || cipher.len() % algorithm.block_size() != 0 {
        return Ok(None);
    }
    let mut buf = Zeroizing::new(cipher.to_vec());
    CbcDecryptor::new(algorithm, key, iv)?.decrypt(&mut buf);
    Ok(pkcs7_unpadded_len(&buf, algorithm.block_size()).map(|len| {
        buf.truncate(len);
        buf
    }))
}

fn master_key(password: &Password, algorithm: StrongAlgorithm) -> Result<Zeroizing<Vec<u8>>> {
    derive_strong_key(&sha1_digest(&[password.as_bytes()]), algorithm.key_len())
}

fn file_key(iv: &[u8], random: &[u8], algorithm: StrongAlgorithm) -> Result<Zeroizing<Vec<u8>>> {
    derive_strong_key(&sha1_digest(&[iv, random]), algorithm.key_len())
}

/// Recovers the file key from a header and password.
fn unlock(header: &DecryptionHeader, password: &Password) -> Result<Zeroizing<Vec<u8>>> {
    if header.flags & flags::PASSWORD_KEY == 0 {
        return Err(Error::UnsupportedFeature {
            feature: "certificate-only strong encryption",
        });
    }
    if header.iv.len() < header.algorithm.block_size() {
        return Err(Error::UnsupportedFeature {
            feature: "strong encryption without an explicit IV",
        });
    }
    let wrong = || Error::wrong_password(None, PasswordDetectionMethod::ValidationData);
    let algorithm = header.algorithm;

    let master = master_key(password, algorithm)?;
    let random = cbc_decrypt_padded(algorithm, &master, &header.iv, &header.encrypted_random_data)?
        .ok_or_else(wrong)?;
    let key = file_key(&header.iv, &random, algorithm)?;

    let validation = cbc_decrypt_padded(
        algorithm,
        &key,
        &header.iv,
        &header.password_validation_data,
    )?
    .ok_or_else(wrong)?;
    if validation.len() < 4 {
        return Err(wrong());
    }
    let (data, stored) = validation.split_at(validation.len() - 4);
    let stored = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
    if stored != Crc32::compute(data) {
        return Err(wrong());
    }
    Ok(key)
}

/// Encrypting writer for strong encryption entries.
pub struct StrongEncoder<W> {
    inner: W,
    cipher: CbcEncryptor,
    block_size: usize,
    partial: Vec<u8>,
    scratch: Vec<u8>,
}

impl<W> std::fmt::Debug for StrongEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrongEncoder")
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

impl<W: Write> StrongEncoder<W> {
    /// Generates IV, random data and validation data, writes the decryption
    /// header, and returns the payload encoder.
    pub fn new(
        mut inner: W,
        password: &Password,
        algorithm: StrongAlgorithm,
        nonce: &mut NonceSource,
    ) -> Result<Self> {
        let iv = nonce.bytes(b"strong-iv", algorithm.block_size())?;
        let random = Zeroizing::new(nonce.bytes(b"strong-random", RANDOM_DATA_LEN)?);

        let master = master_key(password, algorithm)?;
        let erd = cbc_encrypt_padded(algorithm, &master, &iv, &random)?;
        let key = file_key(&iv, &random, algorithm)?;

        let mut validation = nonce.bytes(b"strong-validation", VALIDATION_RANDOM_LEN)?;
        let crc = Crc32::compute(&validation);
        validation.extend_from_slice(&crc.to_le_bytes());
        let pv_data = cbc_encrypt_padded(algorithm, &key, &iv, &validation)?;

        let header = DecryptionHeader::new(
            iv,
            DECRYPTION_HEADER_VERSION,
            algorithm,
            flags::PASSWORD_KEY,
            erd,
            None,
            Vec::new(),
            pv_data,
        )?;
        header.write(&mut inner)?;

        Ok(Self {
            inner,
            cipher: CbcEncryptor::new(algorithm, &key, &header.iv)?,
            block_size: algorithm.block_size(),
            partial: Vec::new(),
            scratch: Vec::new(),
        })
    }

    /// Borrows the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Pads and writes the final block, then returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let mut last = std::mem::take(&mut self.partial);
        pkcs7_pad(&mut last, self.block_size);
        self.cipher.encrypt(&mut last);
        self.inner.write_all(&last)?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for StrongEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.partial.extend_from_slice(buf);
        let whole = self.partial.len() / self.block_size * self.block_size;
        if whole > 0 {
            self.scratch.clear();
            self.scratch.extend(self.partial.drain(..whole));
            self.cipher.encrypt(&mut self.scratch);
            self.inner.write_all(&self.scratch)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypting reader for strong encryption entries.
pub struct StrongDecoder<R> {
    inner: Take<R>,
    cipher: CbcDecryptor,
    block_size: usize,
    raw: Vec<u8>,
    plain: Vec<u8>,
    pos: usize,
    done: bool,
    header_len: u64,
}

impl<R> std::fmt::Debug for StrongDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrongDecoder")
            .field("block_size", &self.block_size)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: Read> StrongDecoder<R> {
    /// Reads the decryption header and checks the password.
    ///
    /// `data_len` is the entry's full data region size (header + padded
    /// ciphertext).
    pub fn new(mut inner: R, password: &Password, data_len: u64) -> Result<Self> {
        let header = DecryptionHeader::read_within(&mut inner, data_len)?;
        let payload_len = data_len
            .checked_sub(header.encoded_len() as u64)
            .ok_or_else(|| {
                Error::corrupt_header(0, "decryption header larger than entry data")
            })?;
        let block_size = header.algorithm.block_size() as u64;
        if payload_len == 0 || payload_len % block_size != 0 {
            return Err(Error::corrupt_header(
                0,
                format!(
                    "strong encryption payload of {} bytes is not a positive multiple of {}",
                    payload_len, block_size
                ),
            ));
        }
        let key = unlock(&header, password)?;

        Ok(Self {
            inner: inner.take(payload_len),
            cipher: CbcDecryptor::new(header.algorithm, &key, &header.iv)?,
            block_size: header.algorithm.block_size(),
            raw: Vec::new(),
            plain: Vec::new(),
            pos: 0,
            done: false,
            header_len: header.encoded_len() as u64,
        })
    }

    /// Length of the decryption header that preceded the payload.
    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; 4096];
        while self.pos >= self.plain.len() && !self.done {
            self.plain.clear();
            self.pos = 0;

            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                if self.inner.limit() > 0 || !self.raw.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "strong encryption payload truncated",
                    ));
                }
                self.done = true;
                break;
            }
            self.raw.extend_from_slice(&chunk[..n]);

            let whole = self.raw.len() / self.block_size * self.block_size;
            self.plain.extend(self.raw.drain(..whole));
            self.cipher.decrypt(&mut self.plain);

            if self.inner.limit() == 0 {
                let len = pkcs7_unpadded_len(&self.plain, self.block_size).ok_or_else(|| {
                    io::Error::other(Error::CryptoError(
                        "invalid padding in strong encryption payload".into(),
                    ))
                })?;
                self.plain.truncate(len);
                self.done = true;
            }
        }
        Ok(())
    }

    /// Consumes the rest of the payload (validating its padding) and
    /// returns the inner reader.
    pub fn finish(mut self) -> Result<R> {
        io::copy(&mut self, &mut io::sink()).map_err(Error::from_io)?;
        Ok(self.inner.into_inner())
    }
}

impl<R: Read> Read for StrongDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.fill()?;
        let available = &self.plain[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}
