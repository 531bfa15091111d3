//! The current vote record for a (campaign, voter) pair.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{Commitment, CommitmentInput, Salt};
use crate::ids::{AnonymousId, CampaignId, VoterRef};

/// Maximum number of revisions after the original cast.
///
/// A record is written at most three times in total: the original cast at
/// sequence number 0 plus two revisions, so the sequence number never
/// exceeds 2. The record becomes immutable the instant the owning
/// campaign closes or the ceiling is reached, whichever happens first.
pub const MAX_REVISIONS: u32 = 2;

/// A voter's decision on a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteDecision {
    /// In favor.
    Agree,
    /// Against.
    Disagree,
    /// Counted toward participation, excluded from the pass/fail
    /// denominator.
    Abstain,
}

impl VoteDecision {
    /// Stable string form, used in storage, hashing, and log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agree => "agree",
            Self::Disagree => "disagree",
            Self::Abstain => "abstain",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "agree" => Some(Self::Agree),
            "disagree" => Some(Self::Disagree),
            "abstain" => Some(Self::Abstain),
            _ => None,
        }
    }
}

impl fmt::Display for VoteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current vote of one voter in one campaign.
///
/// There is exactly one current record per `(campaign_id, voter)`; the
/// sequence number equals the count of prior revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// The owning campaign.
    pub campaign_id: CampaignId,
    /// The voter who cast this vote.
    pub voter: VoterRef,
    /// The candidate the vote names, by anonymous id.
    pub candidate: AnonymousId,
    /// The decision cast.
    pub decision: VoteDecision,
    /// Vote weight. Default 1.0, policy-adjustable by the caller.
    pub weight: f64,
    /// Monotonic per-voter revision counter, 0 for the original cast.
    pub sequence_number: u32,
    /// Per-record salt, regenerated on every write.
    pub salt: Salt,
    /// Salted commitment over the record fields.
    pub integrity_hash: Commitment,
    /// `true` once the campaign closed or the revision ceiling was hit;
    /// no further writes are accepted.
    pub finalized: bool,
    /// Set when a history anomaly froze this record; never cleared.
    pub anomaly: Option<String>,
    /// Instant of the original cast.
    pub cast_at: DateTime<Utc>,
    /// Instant of the most recent write.
    pub updated_at: DateTime<Utc>,
}

impl VoteRecord {
    /// Number of revisions still available for this record.
    #[must_use]
    pub const fn remaining_revisions(&self) -> u32 {
        MAX_REVISIONS.saturating_sub(self.sequence_number)
    }

    /// Borrowed commitment input over this record's committed fields.
    #[must_use]
    pub fn commitment_input(&self) -> CommitmentInput<'_> {
        CommitmentInput {
            voter: &self.voter,
            campaign_id: self.campaign_id,
            candidate: &self.candidate,
            decision: self.decision,
            sequence_number: self.sequence_number,
            salt: &self.salt,
        }
    }
}
