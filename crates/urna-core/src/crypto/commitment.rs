//! Salted vote commitments.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest as _, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::ids::{AnonymousId, CampaignId, VoterRef};
use crate::ledger::VoteDecision;

/// Size of a commitment in bytes (256-bit digest).
pub const COMMITMENT_LEN: usize = 32;

/// Size of a per-record salt in bytes.
pub const SALT_LEN: usize = 16;

/// A 256-bit vote commitment.
pub type Commitment = [u8; COMMITMENT_LEN];

/// A per-record random salt, generated fresh on every cast and revision.
pub type Salt = [u8; SALT_LEN];

/// Domain separator mixed into every commitment.
const COMMITMENT_DOMAIN: &[u8] = b"urna:vote_commitment:v1\0";

/// Errors surfaced by commitment verification.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IntegrityError {
    /// The recomputed commitment does not match the stored one. Signals
    /// corruption or tampering; never silently repaired.
    #[error("vote commitment mismatch: expected {expected}, got {actual}")]
    Mismatch {
        /// The stored commitment, hex-encoded.
        expected: String,
        /// The recomputed commitment, hex-encoded.
        actual: String,
    },
}

/// A digest suite usable for vote commitments.
///
/// Implementations must be pure functions of their input: the same bytes
/// always produce the same 256-bit output.
pub trait CommitmentDigest: Send + Sync {
    /// Stable name of the suite, recorded for diagnostics.
    fn name(&self) -> &'static str;

    /// Digests `input` into a 256-bit commitment.
    fn digest(&self, input: &[u8]) -> Commitment;
}

/// SHA-256 digest suite (default).
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Digest;

impl CommitmentDigest for Sha256Digest {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn digest(&self, input: &[u8]) -> Commitment {
        let mut hasher = Sha256::new();
        hasher.update(input);
        hasher.finalize().into()
    }
}

/// BLAKE3 digest suite.
#[derive(Debug, Default, Clone, Copy)]
pub struct Blake3Digest;

impl CommitmentDigest for Blake3Digest {
    fn name(&self) -> &'static str {
        "blake3"
    }

    fn digest(&self, input: &[u8]) -> Commitment {
        *blake3::hash(input).as_bytes()
    }
}

/// Borrowed view of the fields a commitment covers.
///
/// The sequence number is part of the committed data, so a replayed
/// earlier record (same fields, earlier sequence) verifies against its
/// own hash but can never impersonate the current record.
#[derive(Debug, Clone, Copy)]
pub struct CommitmentInput<'a> {
    /// The voter who cast the vote.
    pub voter: &'a VoterRef,
    /// The owning campaign.
    pub campaign_id: CampaignId,
    /// The candidate the vote names.
    pub candidate: &'a AnonymousId,
    /// The decision cast.
    pub decision: VoteDecision,
    /// Monotonic per-voter revision counter.
    pub sequence_number: u32,
    /// Per-record salt.
    pub salt: &'a Salt,
}

impl CommitmentInput<'_> {
    /// Canonical byte encoding of the committed fields.
    ///
    /// Every variable-length field is length-prefixed (little-endian u32)
    /// so that no two distinct field tuples share an encoding.
    fn canonical_bytes(&self) -> Vec<u8> {
        let campaign = self.campaign_id.to_string();
        let mut buf = Vec::with_capacity(
            COMMITMENT_DOMAIN.len()
                + self.voter.as_str().len()
                + campaign.len()
                + self.candidate.as_str().len()
                + 64,
        );
        buf.extend_from_slice(COMMITMENT_DOMAIN);
        for field in [
            self.voter.as_str().as_bytes(),
            campaign.as_bytes(),
            self.candidate.as_str().as_bytes(),
            self.decision.as_str().as_bytes(),
        ] {
            buf.extend_from_slice(&u32::try_from(field.len()).unwrap_or(u32::MAX).to_le_bytes());
            buf.extend_from_slice(field);
        }
        buf.extend_from_slice(&self.sequence_number.to_le_bytes());
        buf.extend_from_slice(self.salt);
        buf
    }
}

/// Computes and verifies vote commitments.
///
/// The codec owns the digest suite; everything else about a commitment
/// (domain separation, canonical encoding, salt handling) is fixed.
pub struct IntegrityCodec {
    digest: Box<dyn CommitmentDigest>,
}

impl std::fmt::Debug for IntegrityCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityCodec")
            .field("digest", &self.digest.name())
            .finish()
    }
}

impl Default for IntegrityCodec {
    fn default() -> Self {
        Self::sha256()
    }
}

impl IntegrityCodec {
    /// Codec using the default SHA-256 suite.
    #[must_use]
    pub fn sha256() -> Self {
        Self::with_digest(Box::new(Sha256Digest))
    }

    /// Codec using the BLAKE3 suite.
    #[must_use]
    pub fn blake3() -> Self {
        Self::with_digest(Box::new(Blake3Digest))
    }

    /// Codec using a caller-provided digest suite.
    #[must_use]
    pub fn with_digest(digest: Box<dyn CommitmentDigest>) -> Self {
        Self { digest }
    }

    /// Name of the digest suite in use.
    #[must_use]
    pub fn digest_name(&self) -> &'static str {
        self.digest.name()
    }

    /// Generates a fresh random salt from the operating system RNG.
    #[must_use]
    pub fn generate_salt() -> Salt {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        salt
    }

    /// Computes the commitment over `input`.
    #[must_use]
    pub fn commit(&self, input: &CommitmentInput<'_>) -> Commitment {
        self.digest.digest(&input.canonical_bytes())
    }

    /// Recomputes the commitment for `input` and compares it against
    /// `expected` in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::Mismatch`] if the stored fields no longer
    /// produce the stored commitment.
    pub fn verify(
        &self,
        input: &CommitmentInput<'_>,
        expected: &Commitment,
    ) -> Result<(), IntegrityError> {
        let actual = self.commit(input);
        if actual.ct_eq(expected).into() {
            Ok(())
        } else {
            Err(IntegrityError::Mismatch {
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            })
        }
    }
}
