//! Salt, IV and header randomness.
//!
//! Every encryption scheme consumes per-entry random bytes: the PKWARE
//! 12-byte header, WinZip AES salts, and the strong encryption IV, random
//! data and validation data. [`NoncePolicy`] selects where they come from.

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Source policy for per-entry random values.
#[derive(Debug, Clone, Default)]
pub enum NoncePolicy {
    /// Operating system CSPRNG (`getrandom`). The default.
    #[default]
    Random,

    /// Reproducible bytes expanded from a seed with SHA-256.
    ///
    /// Only for tests and reproducible builds: archives written twice with
    /// the same seed and password reuse salts and IVs.
    Deterministic {
        /// Seed for the expansion.
        seed: [u8; 32],
    },
}

impl NoncePolicy {
    /// Creates the random policy.
    pub fn random() -> Self {
        Self::Random
    }

    /// Creates a deterministic policy from a seed.
    pub fn deterministic(seed: [u8; 32]) -> Self {
        Self::Deterministic { seed }
    }

    /// Starts a stateful generator for one writing session.
    pub fn source(&self) -> NonceSource {
        NonceSource {
            policy: self.clone(),
            counter: 0,
        }
    }
}

/// Stateful generator created from a [`NoncePolicy`].
///
/// Each call to [`fill`](Self::fill) yields fresh bytes; the deterministic
/// policy mixes a call counter and the caller's label into the expansion.
#[derive(Debug, Clone)]
pub struct NonceSource {
    policy: NoncePolicy,
    counter: u64,
}

impl NonceSource {
    /// Fills `buf` with random bytes for the purpose named by `label`.
    pub fn fill(&mut self, label: &[u8], buf: &mut [u8]) -> Result<()> {
        self.counter += 1;
        match &self.policy {
            NoncePolicy::Random => getrandom::getrandom(buf)
                .map_err(|e| Error::CryptoError(format!("random source failed: {}", e))),
            NoncePolicy::Deterministic { seed } => {
                for (block, chunk) in buf.chunks_mut(32).enumerate() {
                    let mut hasher = Sha256::new();
                    hasher.update(seed);
                    hasher.update(label);
                    hasher.update(self.counter.to_le_bytes());
                    hasher.update((block as u64).to_le_bytes());
                    let digest = hasher.finalize();
                    chunk.copy_from_slice(&digest[..chunk.len()]);
                }
                Ok(())
            }
        }
    }

    /// Returns `len` fresh bytes.
    pub fn bytes(&mut self, label: &[u8], len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.fill(label, &mut out)?;
        Ok(out)
    }
}
