//! CRC-32 of entry plaintext.
//!
//! Every ZIP header carries the CRC-32 (IEEE polynomial, reflected, initial
//! and final XOR `0xFFFFFFFF`) of the entry's uncompressed bytes. The
//! entry pipeline keeps one [`Crc32`] per entry on the plaintext side of
//! the compression stage, so the same value comes out whether the payload
//! is stored, compressed or encrypted.
//!
//! ```rust
//! use zipvault::checksum::{Checksum, Crc32};
//!
//! let mut crc = Crc32::default();
//! crc.update(b"Hello, ");
//! crc.update(b"World!");
//! assert_eq!(crc.finalize(), Crc32::compute(b"Hello, World!"));
//! ```

/// An incremental checksum.
pub trait Checksum: Default + Clone {
    /// The checksum value.
    type Output: Copy + Eq + std::fmt::Debug;

    /// Feeds more bytes.
    fn update(&mut self, data: &[u8]);

    /// The checksum of all bytes fed so far. Does not consume the state,
    /// so more bytes may follow.
    fn finalize(&self) -> Self::Output;

    /// Checksum of `data` alone.
    fn compute(data: &[u8]) -> Self::Output {
        let mut state = Self::default();
        state.update(data);
        state.finalize()
    }
}

/// CRC-32 as stored in local headers, data descriptors and the central
/// directory.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
    len: u64,
}

impl Crc32 {
    /// Number of bytes fed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if no bytes were fed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Crc32({:#010x} over {} bytes)", self.finalize(), self.len)
    }
}

impl Checksum for Crc32 {
    type Output = u32;

    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len += data.len() as u64;
    }

    fn finalize(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(Crc32::compute(b""), 0);
        assert_eq!(Crc32::compute(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_split_input_matches_whole() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let mut crc = Crc32::default();
        for chunk in data.chunks(7) {
            crc.update(chunk);
        }
        assert_eq!(crc.finalize(), 0x414F_A339);
        assert_eq!(crc.len(), data.len() as u64);
    }

    #[test]
    fn test_finalize_does_not_consume() {
        let mut crc = Crc32::default();
        assert!(crc.is_empty());
        crc.update(b"1234");
        let partial = crc.finalize();
        crc.update(b"56789");
        assert_eq!(partial, Crc32::compute(b"1234"));
        assert_eq!(crc.finalize(), 0xCBF4_3926);
    }
}
