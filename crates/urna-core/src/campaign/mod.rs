//! Campaign entities and the campaign status state machine.
//!
//! A campaign is one voting event tied to a single employee and decision
//! type. Status moves `Draft → Active → Closed`, with `Draft → Cancelled`
//! and `Active → Cancelled` as administrative escape hatches; `Closed` and
//! `Cancelled` are terminal.
//!
//! The eligibility snapshot is taken once at activation and stored on the
//! campaign, so tallies stay reproducible no matter how the org roster
//! changes while the window is open.

mod error;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::CampaignError;

use crate::ids::{CampaignId, EmployeeRef, VoterRef};

/// The decision a campaign puts to the vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CampaignType {
    /// Convert a probationary employee to a regular position.
    ProbationConversion,
    /// Promote an employee to a higher position.
    PromotionRequest,
    /// Demote an employee as a disciplinary measure.
    DisciplinaryDemotion,
}

impl CampaignType {
    /// Stable string form, used in storage and log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProbationConversion => "probation_conversion",
            Self::PromotionRequest => "promotion_request",
            Self::DisciplinaryDemotion => "disciplinary_demotion",
        }
    }

    /// Bucket letter used in anonymous candidate ids minted for this
    /// campaign type.
    #[must_use]
    pub const fn bucket_letter(self) -> char {
        match self {
            Self::PromotionRequest => 'A',
            Self::DisciplinaryDemotion => 'B',
            Self::ProbationConversion => 'C',
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "probation_conversion" => Some(Self::ProbationConversion),
            "promotion_request" => Some(Self::PromotionRequest),
            "disciplinary_demotion" => Some(Self::DisciplinaryDemotion),
            _ => None,
        }
    }
}

impl fmt::Display for CampaignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CampaignStatus {
    /// Created but not yet accepting votes.
    Draft,
    /// Accepting votes within the window.
    Active,
    /// Window ended or force-closed; votes finalized, tally available.
    Closed,
    /// Administratively cancelled; no tally is ever produced.
    Cancelled,
}

impl CampaignStatus {
    /// Stable string form, used in storage and log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for `Closed` and `Cancelled`, which have no outgoing
    /// transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a campaign came to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignOrigin {
    /// Opened by an administrator.
    Manual,
    /// Opened by the trigger rule engine.
    SystemTriggered {
        /// Name of the rule that fired.
        rule: String,
        /// The specific metric or condition that tripped the rule.
        justification: String,
    },
}

/// The interval during which votes are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingWindow {
    /// Inclusive start of the window.
    pub start: DateTime<Utc>,
    /// Exclusive end of the window.
    pub end: DateTime<Utc>,
}

impl VotingWindow {
    /// Creates a window, requiring `start < end`.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidWindow`] when the bounds are not
    /// strictly ordered.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CampaignError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(CampaignError::InvalidWindow { start, end })
        }
    }

    /// Returns `true` if `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Returns `true` once `at` has reached or passed the window end.
    #[must_use]
    pub fn has_expired(&self, at: DateTime<Utc>) -> bool {
        at >= self.end
    }
}

/// Authority under which a cancellation is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelAuthority {
    /// Ordinary administrative cancellation.
    Standard,
    /// Higher-privilege override, required to cancel an active
    /// disciplinary campaign. Recorded in the audit log.
    PrivilegedOverride {
        /// The privileged actor invoking the override.
        actor: String,
    },
}

/// One voting event tied to a single employee and decision type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique campaign id.
    pub id: CampaignId,
    /// Human-readable title shown to voters.
    pub title: String,
    /// The decision type under vote.
    pub campaign_type: CampaignType,
    /// The real employee under review. Never exposed to voters.
    pub target_employee: EmployeeRef,
    /// Current role label, for display only.
    pub current_position: String,
    /// Role label the vote would move the employee to, for display only.
    pub target_position: String,
    /// The interval during which votes are accepted.
    pub window: VotingWindow,
    /// Fraction of non-abstaining votes required to pass, in `[0, 1]`.
    pub required_pass_percentage: f64,
    /// How the campaign came to exist.
    pub origin: CampaignOrigin,
    /// Lifecycle status.
    pub status: CampaignStatus,
    /// Voter eligibility snapshot, captured once at activation. Empty
    /// while the campaign is a draft.
    pub eligible_voters: HashSet<VoterRef>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Creates a new campaign in `Draft` status.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidPassPercentage`] when the threshold
    /// is outside `(0, 1]`, or [`CampaignError::InvalidWindow`] via the
    /// window constructor.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: impl Into<String>,
        campaign_type: CampaignType,
        target_employee: EmployeeRef,
        current_position: impl Into<String>,
        target_position: impl Into<String>,
        window: VotingWindow,
        required_pass_percentage: f64,
        origin: CampaignOrigin,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CampaignError> {
        if !(required_pass_percentage > 0.0 && required_pass_percentage <= 1.0) {
            return Err(CampaignError::InvalidPassPercentage {
                value: required_pass_percentage,
            });
        }
        Ok(Self {
            id: CampaignId::new(),
            title: title.into(),
            campaign_type,
            target_employee,
            current_position: current_position.into(),
            target_position: target_position.into(),
            window,
            required_pass_percentage,
            origin,
            status: CampaignStatus::Draft,
            eligible_voters: HashSet::new(),
            created_at,
        })
    }

    /// Returns `true` while the campaign counts against the one-open-
    /// campaign-per-(employee, type) uniqueness constraint.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.status, CampaignStatus::Draft | CampaignStatus::Active)
    }

    /// Transitions `Draft → Active`, installing the eligibility snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidTransition`] if the campaign is not
    /// a draft, or [`CampaignError::NoEligibleVotersOrCandidates`] if the
    /// snapshot is empty or no candidate has been minted.
    pub fn activate(
        &mut self,
        snapshot: HashSet<VoterRef>,
        candidate_count: usize,
    ) -> Result<(), CampaignError> {
        if self.status != CampaignStatus::Draft {
            return Err(CampaignError::InvalidTransition {
                from: self.status,
                to: CampaignStatus::Active,
            });
        }
        if snapshot.is_empty() || candidate_count == 0 {
            return Err(CampaignError::NoEligibleVotersOrCandidates {
                campaign_id: self.id,
                eligible_voters: snapshot.len(),
                candidates: candidate_count,
            });
        }
        self.eligible_voters = snapshot;
        self.status = CampaignStatus::Active;
        Ok(())
    }

    /// Transitions `Active → Closed`.
    ///
    /// The caller (the engine facade) is responsible for finalizing votes,
    /// running the tally, and emitting the decision; this only moves the
    /// status.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidTransition`] unless the campaign is
    /// active.
    pub fn close(&mut self) -> Result<(), CampaignError> {
        if self.status != CampaignStatus::Active {
            return Err(CampaignError::InvalidTransition {
                from: self.status,
                to: CampaignStatus::Closed,
            });
        }
        self.status = CampaignStatus::Closed;
        Ok(())
    }

    /// Transitions `Draft → Cancelled` or `Active → Cancelled`.
    ///
    /// An active disciplinary campaign requires a privileged override. An
    /// active promotion or probation campaign can only be cancelled while
    /// no vote has been cast.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidTransition`] from terminal states,
    /// [`CampaignError::CancellationRequiresOverride`] for an active
    /// disciplinary campaign without an override, and
    /// [`CampaignError::CancellationAfterVotes`] once votes exist on the
    /// other types.
    pub fn cancel(
        &mut self,
        votes_cast: u64,
        authority: &CancelAuthority,
    ) -> Result<(), CampaignError> {
        match self.status {
            CampaignStatus::Draft => {}
            CampaignStatus::Active => match self.campaign_type {
                CampaignType::DisciplinaryDemotion => {
                    if !matches!(authority, CancelAuthority::PrivilegedOverride { .. }) {
                        return Err(CampaignError::CancellationRequiresOverride {
                            campaign_id: self.id,
                        });
                    }
                }
                CampaignType::ProbationConversion | CampaignType::PromotionRequest => {
                    if votes_cast > 0 {
                        return Err(CampaignError::CancellationAfterVotes {
                            campaign_id: self.id,
                            votes_cast,
                        });
                    }
                }
            },
            CampaignStatus::Closed | CampaignStatus::Cancelled => {
                return Err(CampaignError::InvalidTransition {
                    from: self.status,
                    to: CampaignStatus::Cancelled,
                });
            }
        }
        self.status = CampaignStatus::Cancelled;
        Ok(())
    }
}
