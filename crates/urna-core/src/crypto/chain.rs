//! Hash chaining for vote modification history.
//!
//! Each history entry hashes its canonical content together with the hash
//! of the previous entry for the same `(campaign, voter)` pair. The first
//! entry links to [`GENESIS_PREV_HASH`]. Removing, reordering, or editing
//! a row breaks the chain at a specific position instead of disappearing
//! quietly.

use thiserror::Error;

use crate::crypto::Commitment;

/// The zero hash used as the previous hash for the first history entry.
pub const GENESIS_PREV_HASH: Commitment = [0u8; 32];

/// Errors from history chain verification.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryChainError {
    /// An entry's stored hash does not match its recomputed hash.
    #[error("history entry hash mismatch at position {position}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Zero-based position of the entry in the chain.
        position: usize,
        /// The stored hash, hex-encoded.
        expected: String,
        /// The recomputed hash, hex-encoded.
        actual: String,
    },

    /// An entry's previous-hash link does not match the prior entry.
    #[error("history chain broken at position {position}: expected prev {expected}, got {actual}")]
    ChainBroken {
        /// Zero-based position of the entry whose link is wrong.
        position: usize,
        /// The hash of the prior entry, hex-encoded.
        expected: String,
        /// The previous-hash the entry actually carries, hex-encoded.
        actual: String,
    },
}

/// Hasher for history entries.
pub struct HistoryHasher;

impl HistoryHasher {
    /// Hashes entry content with chain linking: `H(prev_hash || content)`.
    #[must_use]
    pub fn hash_entry(content: &[u8], prev_hash: &Commitment) -> Commitment {
        let mut hasher = blake3::Hasher::new();
        hasher.update(prev_hash);
        hasher.update(content);
        *hasher.finalize().as_bytes()
    }

    /// Verifies an entire chain of entries.
    ///
    /// Each item is `(content, prev_hash, entry_hash)` in chain order.
    ///
    /// # Errors
    ///
    /// Returns the first broken link or hash mismatch found.
    pub fn verify_chain<'a>(
        entries: impl IntoIterator<Item = (&'a [u8], &'a Commitment, &'a Commitment)>,
    ) -> Result<(), HistoryChainError> {
        let mut expected_prev = GENESIS_PREV_HASH;
        for (position, (content, prev_hash, entry_hash)) in entries.into_iter().enumerate() {
            if *prev_hash != expected_prev {
                return Err(HistoryChainError::ChainBroken {
                    position,
                    expected: hex::encode(expected_prev),
                    actual: hex::encode(prev_hash),
                });
            }
            let computed = Self::hash_entry(content, prev_hash);
            if computed != *entry_hash {
                return Err(HistoryChainError::HashMismatch {
                    position,
                    expected: hex::encode(entry_hash),
                    actual: hex::encode(computed),
                });
            }
            expected_prev = *entry_hash;
        }
        Ok(())
    }
}
