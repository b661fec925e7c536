//! Password-to-key derivation.
//!
//! Two derivations are needed:
//!
//! - WinZip AES: PBKDF2-HMAC-SHA1 with 1000 iterations over the password and
//!   a per-entry salt, producing `encryption key || MAC key || verifier`.
//! - PKWARE strong encryption: the SHA-1 based `DeriveKey` construction
//!   (two SHA-1 digests over the hash XORed with 0x36 and 0x5C pads,
//!   concatenated and truncated to the key length).

use pbkdf2::pbkdf2_hmac;
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use crate::{Error, Result};

/// PBKDF2 iteration count fixed by the WinZip AES format.
pub const AES_KDF_ITERATIONS: u32 = 1000;

/// Length of a SHA-1 digest.
pub const SHA1_LEN: usize = 20;

/// Runs PBKDF2-HMAC-SHA1 and returns `out_len` bytes of key material.
pub fn pbkdf2_sha1(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out_len: usize,
) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(vec![0u8; out_len]);
    pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut out);
    out
}

/// SHA-1 of the concatenation of `parts`.
pub fn sha1_digest(parts: &[&[u8]]) -> Zeroizing<[u8; SHA1_LEN]> {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    Zeroizing::new(hasher.finalize().into())
}

/// Strong encryption `DeriveKey`: expands a SHA-1 digest into a cipher key.
///
/// ```text
/// b1 = SHA1((0x36 x 64) ^ digest)
/// b2 = SHA1((0x5C x 64) ^ digest)
/// key = (b1 || b2)[..key_len]
/// ```
///
/// At most 40 bytes can be produced, enough for every supported cipher.
pub fn derive_strong_key(digest: &[u8; SHA1_LEN], key_len: usize) -> Result<Zeroizing<Vec<u8>>> {
    if key_len > 2 * SHA1_LEN {
        return Err(Error::CryptoError(format!(
            "cannot derive a {}-byte key from SHA-1",
            key_len
        )));
    }
    let mut inner = Zeroizing::new([0x36u8; 64]);
    let mut outer = Zeroizing::new([0x5Cu8; 64]);
    for (i, b) in digest.iter().enumerate() {
        inner[i] ^= b;
        outer[i] ^= b;
    }
    let b1 = sha1_digest(&[&inner[..]]);
    let b2 = sha1_digest(&[&outer[..]]);

    let mut key = Zeroizing::new(Vec::with_capacity(2 * SHA1_LEN));
    key.extend_from_slice(&b1[..]);
    key.extend_from_slice(&b2[..]);
    key.truncate(key_len);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pbkdf2_rfc6070_vector() {
        // RFC 6070, iterations = 2
        let out = pbkdf2_sha1(b"password", b"salt", 2, 20);
        assert_eq!(
            &out[..],
            &[
                0xea, 0x6c, 0x01, 0x4d, 0xc7, 0x2d, 0x6f, 0x8c, 0xcd, 0x1e, 0xd9, 0x2a, 0xce,
                0x1d, 0x41, 0xf0, 0xd8, 0xde, 0x89, 0x57
            ]
        );
    }

    #[test]
    fn test_pbkdf2_length_and_determinism() {
        let a = pbkdf2_sha1(b"pw", &[1; 16], AES_KDF_ITERATIONS, 66);
        let b = pbkdf2_sha1(b"pw", &[1; 16], AES_KDF_ITERATIONS, 66);
        let c = pbkdf2_sha1(b"pw", &[2; 16], AES_KDF_ITERATIONS, 66);
        assert_eq!(a.len(), 66);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_sha1_known_value() {
        let digest = sha1_digest(&[b"ab", b"c"]);
        assert_eq!(
            &digest[..4],
            &[0xa9, 0x99, 0x3e, 0x36],
            "SHA1(\"abc\") starts with a9993e36"
        );
    }

    #[test]
    fn test_derive_strong_key_lengths() {
        let digest = sha1_digest(&[b"password"]);
        let k16 = derive_strong_key(&digest, 16).unwrap();
        let k32 = derive_strong_key(&digest, 32).unwrap();
        assert_eq!(k16.len(), 16);
        assert_eq!(k32.len(), 32);
        // Truncation of the same expansion.
        assert_eq!(&k32[..16], &k16[..]);
        assert!(derive_strong_key(&digest, 41).is_err());
    }
}
