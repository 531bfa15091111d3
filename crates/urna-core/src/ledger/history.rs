//! Append-only audit rows for vote modifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{Commitment, HistoryHasher};
use crate::ids::{AnonymousId, CampaignId, VoterRef};
use crate::ledger::VoteDecision;

/// Domain separator mixed into every history entry hash.
const HISTORY_DOMAIN: &[u8] = b"urna:vote_history:v1\0";

/// Request provenance captured on a modification, for audit only.
///
/// These fields help an auditor reconstruct who touched what from where;
/// they are not part of the anonymity design and do not expose vote
/// content beyond what the history row already carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source address of the modifying request, if known.
    pub ip_address: Option<String>,
    /// Session identifier of the modifying request, if known.
    pub session_id: Option<String>,
}

/// One append-only audit row, written every time a vote record is
/// mutated.
///
/// Rows are never updated or deleted. The modification number strictly
/// increases per `(voter, campaign)`, and each row is hash-chained to its
/// predecessor, so a missing or reordered row is detectable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteModificationHistoryEntry {
    /// Row id assigned by storage; `None` until persisted.
    pub id: Option<u64>,
    /// The owning campaign.
    pub campaign_id: CampaignId,
    /// The voter whose record was modified.
    pub voter: VoterRef,
    /// 1-based count of this modification for the `(voter, campaign)`
    /// pair.
    pub modification_number: u32,
    /// Decision before the modification.
    pub old_decision: VoteDecision,
    /// Decision after the modification.
    pub new_decision: VoteDecision,
    /// Candidate before the modification.
    pub old_candidate: AnonymousId,
    /// Candidate after the modification.
    pub new_candidate: AnonymousId,
    /// Optional free-text reason supplied by the voter.
    pub reason: Option<String>,
    /// Instant of the modification.
    pub modified_at: DateTime<Utc>,
    /// Source address of the modifying request, if known.
    pub ip_address: Option<String>,
    /// Session identifier of the modifying request, if known.
    pub session_id: Option<String>,
    /// Hash of the previous entry in this vote's chain, or the genesis
    /// hash for the first entry.
    pub prev_hash: Commitment,
    /// Hash over this entry's content and `prev_hash`.
    pub entry_hash: Commitment,
}

impl VoteModificationHistoryEntry {
    /// Builds a new entry and seals it into the chain after `prev_hash`.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        campaign_id: CampaignId,
        voter: VoterRef,
        modification_number: u32,
        old_decision: VoteDecision,
        new_decision: VoteDecision,
        old_candidate: AnonymousId,
        new_candidate: AnonymousId,
        reason: Option<String>,
        modified_at: DateTime<Utc>,
        provenance: Provenance,
        prev_hash: Commitment,
    ) -> Self {
        let mut entry = Self {
            id: None,
            campaign_id,
            voter,
            modification_number,
            old_decision,
            new_decision,
            old_candidate,
            new_candidate,
            reason,
            modified_at,
            ip_address: provenance.ip_address,
            session_id: provenance.session_id,
            prev_hash,
            entry_hash: [0u8; 32],
        };
        entry.entry_hash = HistoryHasher::hash_entry(&entry.canonical_bytes(), &prev_hash);
        entry
    }

    /// Canonical byte encoding of the entry content.
    ///
    /// Covers every field except the storage-assigned id and the two
    /// chain hashes. Variable-length fields are length-prefixed; optional
    /// fields carry a presence byte.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        fn push_field(buf: &mut Vec<u8>, field: &[u8]) {
            buf.extend_from_slice(&u32::try_from(field.len()).unwrap_or(u32::MAX).to_le_bytes());
            buf.extend_from_slice(field);
        }
        fn push_opt(buf: &mut Vec<u8>, field: Option<&str>) {
            match field {
                Some(s) => {
                    buf.push(1);
                    push_field(buf, s.as_bytes());
                }
                None => buf.push(0),
            }
        }

        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(HISTORY_DOMAIN);
        push_field(&mut buf, self.campaign_id.to_string().as_bytes());
        push_field(&mut buf, self.voter.as_str().as_bytes());
        buf.extend_from_slice(&self.modification_number.to_le_bytes());
        push_field(&mut buf, self.old_decision.as_str().as_bytes());
        push_field(&mut buf, self.new_decision.as_str().as_bytes());
        push_field(&mut buf, self.old_candidate.as_str().as_bytes());
        push_field(&mut buf, self.new_candidate.as_str().as_bytes());
        push_opt(&mut buf, self.reason.as_deref());
        push_field(&mut buf, self.modified_at.to_rfc3339().as_bytes());
        push_opt(&mut buf, self.ip_address.as_deref());
        push_opt(&mut buf, self.session_id.as_deref());
        buf
    }
}
