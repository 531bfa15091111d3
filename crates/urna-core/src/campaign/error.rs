//! Campaign lifecycle error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{CampaignStatus, CampaignType};
use crate::ids::{CampaignId, EmployeeRef};

/// Errors that can occur during campaign lifecycle operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CampaignError {
    /// The voting window bounds are not strictly ordered.
    #[error("invalid voting window: start {start} must precede end {end}")]
    InvalidWindow {
        /// The requested window start.
        start: DateTime<Utc>,
        /// The requested window end.
        end: DateTime<Utc>,
    },

    /// The pass threshold is outside `(0, 1]`.
    #[error("invalid pass percentage {value}: must be within (0, 1]")]
    InvalidPassPercentage {
        /// The rejected threshold.
        value: f64,
    },

    /// Attempted a transition the state machine does not allow.
    #[error("invalid campaign transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: CampaignStatus,
        /// The requested status.
        to: CampaignStatus,
    },

    /// Activation was blocked because the campaign would open with no one
    /// to vote or no one to vote on.
    #[error(
        "campaign {campaign_id} cannot activate with {eligible_voters} eligible voters and {candidates} candidates"
    )]
    NoEligibleVotersOrCandidates {
        /// The campaign that failed to activate.
        campaign_id: CampaignId,
        /// Size of the eligibility snapshot at activation time.
        eligible_voters: usize,
        /// Number of candidates minted so far.
        candidates: usize,
    },

    /// A Draft or Active campaign already exists for this employee and
    /// campaign type.
    #[error("an open {campaign_type} campaign already exists for employee {employee}")]
    DuplicateCampaign {
        /// The employee under review.
        employee: EmployeeRef,
        /// The campaign type.
        campaign_type: CampaignType,
    },

    /// Cancelling an active disciplinary campaign needs a privileged
    /// override.
    #[error(
        "campaign {campaign_id} is an active disciplinary campaign and can only be cancelled with a privileged override"
    )]
    CancellationRequiresOverride {
        /// The campaign the cancellation targeted.
        campaign_id: CampaignId,
    },

    /// Cancellation was requested after votes were already cast.
    #[error("campaign {campaign_id} cannot be cancelled: {votes_cast} votes already cast")]
    CancellationAfterVotes {
        /// The campaign the cancellation targeted.
        campaign_id: CampaignId,
        /// Number of votes already on the ledger.
        votes_cast: u64,
    },

    /// No campaign exists with the given id.
    #[error("campaign not found: {campaign_id}")]
    NotFound {
        /// The unknown campaign id.
        campaign_id: CampaignId,
    },
}
