//! Vote ledger error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::campaign::CampaignStatus;
use crate::ids::{AnonymousId, CampaignId, VoterRef};
use crate::ledger::MAX_REVISIONS;
use crate::storage::StorageError;

/// Errors that can occur during vote ledger operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// The campaign is not accepting votes, either because of its status
    /// or because the wall clock is outside the voting window.
    #[error(
        "campaign {campaign_id} is not accepting votes: status is {status}, voting window is {window_start} to {window_end}"
    )]
    CampaignNotActive {
        /// The campaign.
        campaign_id: CampaignId,
        /// Current campaign status.
        status: CampaignStatus,
        /// Start of the voting window.
        window_start: DateTime<Utc>,
        /// End of the voting window.
        window_end: DateTime<Utc>,
    },

    /// The voter is outside the eligibility snapshot taken at activation.
    #[error("voter {voter} is not eligible to vote in campaign {campaign_id}")]
    NotEligible {
        /// The ineligible voter.
        voter: VoterRef,
        /// The campaign.
        campaign_id: CampaignId,
    },

    /// The named candidate was not minted for this campaign.
    #[error("candidate {candidate} does not exist in campaign {campaign_id}")]
    UnknownCandidate {
        /// The unknown anonymous id.
        candidate: AnonymousId,
        /// The campaign.
        campaign_id: CampaignId,
    },

    /// The vote has already been revised up to the ceiling.
    #[error(
        "vote by {voter} in campaign {campaign_id} has used all {MAX_REVISIONS} revisions; 0 modifications remain"
    )]
    ModificationLimitExceeded {
        /// The voter.
        voter: VoterRef,
        /// The campaign.
        campaign_id: CampaignId,
    },

    /// A concurrent revision won the race; the caller should re-read the
    /// current record before retrying.
    #[error(
        "concurrent modification of vote by {voter} in campaign {campaign_id}: expected sequence {expected_sequence}"
    )]
    ConcurrentModification {
        /// The voter.
        voter: VoterRef,
        /// The campaign.
        campaign_id: CampaignId,
        /// The sequence number the losing write expected to replace.
        expected_sequence: u32,
    },

    /// The stored record no longer matches its commitment. Indicates a
    /// bug or tampering; logged to the tamper-alert channel.
    #[error("integrity violation on vote by {voter} in campaign {campaign_id}: {details}")]
    IntegrityViolation {
        /// The voter.
        voter: VoterRef,
        /// The campaign.
        campaign_id: CampaignId,
        /// Digest mismatch detail.
        details: String,
    },

    /// No current vote exists for this voter in this campaign.
    #[error("no vote by {voter} in campaign {campaign_id}")]
    VoteNotFound {
        /// The voter.
        voter: VoterRef,
        /// The campaign.
        campaign_id: CampaignId,
    },

    /// The vote's modification history has a numbering gap or a broken
    /// chain link. The record is frozen with an anomaly marker and
    /// refuses further revisions; it is never auto-healed.
    #[error("history anomaly on vote by {voter} in campaign {campaign_id}: {details}")]
    HistoryAnomaly {
        /// The voter.
        voter: VoterRef,
        /// The campaign.
        campaign_id: CampaignId,
        /// What was detected.
        details: String,
    },

    /// Storage-level failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
