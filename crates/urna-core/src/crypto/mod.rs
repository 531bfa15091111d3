//! Cryptographic primitives for the voting engine.
//!
//! Two concerns live here:
//!
//! - **Vote commitments**: each vote record carries a salted, one-way
//!   digest over its fields. Recomputing the digest from the stored
//!   plaintext and salt detects any post-cast mutation. The salt is fresh
//!   on every cast and revision, so identical votes by different voters
//!   (or successive revisions by the same voter) produce unlinkable
//!   hashes on disk.
//! - **History chaining**: vote modification history entries are linked
//!   into a per-vote hash chain, so a deleted or reordered audit row
//!   breaks the chain rather than vanishing silently.
//!
//! The digest algorithm behind commitments is swappable through
//! [`CommitmentDigest`]; SHA-256 is the default suite and BLAKE3 the
//! alternate.
//!
//! The threat model is tamper-detection and storage-at-rest obfuscation.
//! An adversary with full database read access including the salts can
//! link records; defeating that is out of scope.

mod chain;
mod commitment;

pub use chain::{GENESIS_PREV_HASH, HistoryChainError, HistoryHasher};
pub use commitment::{
    Blake3Digest, COMMITMENT_LEN, Commitment, CommitmentDigest, CommitmentInput, IntegrityCodec,
    IntegrityError, SALT_LEN, Salt, Sha256Digest,
};
