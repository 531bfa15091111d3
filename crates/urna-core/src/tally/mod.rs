//! The tally engine.
//!
//! Aggregates a closed campaign's vote records into a decision. Tallies
//! are derived, never stored: recomputing over the same finalized record
//! set always produces the identical result.
//!
//! Policy, documented here because the source rules leave room: for
//! multi-candidate ballots only the leading candidate (by weighted Agree
//! count) is measured against the pass threshold, and a tie for the lead
//! fails outright: nobody is promoted by default on a tie.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::campaign::{Campaign, CampaignStatus};
use crate::ids::{AnonymousId, CampaignId};
use crate::ledger::{VoteDecision, VoteRecord};

/// Errors from tally computation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TallyError {
    /// Tallying was requested before the campaign closed. No partial
    /// result is produced, so premature numbers can never leak out and
    /// influence voting.
    #[error("campaign {campaign_id} is {status}; tally is only available once closed")]
    CampaignStillActive {
        /// The campaign.
        campaign_id: CampaignId,
        /// Its current status.
        status: CampaignStatus,
    },
}

/// Weighted counts for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTally {
    /// The candidate, by anonymous id.
    pub candidate: AnonymousId,
    /// Weighted Agree total.
    pub agree: f64,
    /// Weighted Disagree total.
    pub disagree: f64,
    /// Weighted Abstain total.
    pub abstain: f64,
}

impl CandidateTally {
    /// `Agree / (Agree + Disagree)`, or `None` when nobody took a side.
    #[must_use]
    pub fn approval_ratio(&self) -> Option<f64> {
        let denominator = self.agree + self.disagree;
        (denominator > 0.0).then(|| self.agree / denominator)
    }
}

/// The outcome of a closed campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TallyOutcome {
    /// The leading candidate met the pass threshold.
    Passed,
    /// The threshold was missed, no side was taken, or the lead was
    /// tied.
    Failed,
    /// Participation fell below the quorum floor; the Agree ratio is
    /// never consulted.
    NoQuorum,
}

/// The derived result of tallying a closed campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyResult {
    /// The campaign tallied.
    pub campaign_id: CampaignId,
    /// Per-candidate weighted counts, ordered by anonymous id.
    pub candidates: Vec<CandidateTally>,
    /// Size of the eligibility snapshot.
    pub total_eligible_voters: u64,
    /// Number of voters with a current record, abstentions included.
    pub total_cast: u64,
    /// `total_cast / total_eligible_voters`.
    pub participation_rate: f64,
    /// The leading candidate, when a sole leader exists.
    pub leading_candidate: Option<AnonymousId>,
    /// The decision.
    pub outcome: TallyOutcome,
}

/// Computes decisions from finalized vote records.
#[derive(Debug, Clone)]
pub struct TallyEngine {
    quorum_floor: f64,
}

impl TallyEngine {
    /// Creates an engine with the configured quorum floor.
    #[must_use]
    pub const fn new(quorum_floor: f64) -> Self {
        Self { quorum_floor }
    }

    /// Tallies a closed campaign.
    ///
    /// Abstentions count toward participation but are excluded from the
    /// pass/fail denominator.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::CampaignStillActive`] unless the campaign
    /// status is `Closed`.
    pub fn tally(
        &self,
        campaign: &Campaign,
        votes: &[VoteRecord],
    ) -> Result<TallyResult, TallyError> {
        if campaign.status != CampaignStatus::Closed {
            return Err(TallyError::CampaignStillActive {
                campaign_id: campaign.id,
                status: campaign.status,
            });
        }

        // BTreeMap keeps candidate order deterministic.
        let mut counts: BTreeMap<AnonymousId, CandidateTally> = BTreeMap::new();
        for vote in votes {
            let entry = counts
                .entry(vote.candidate.clone())
                .or_insert_with(|| CandidateTally {
                    candidate: vote.candidate.clone(),
                    agree: 0.0,
                    disagree: 0.0,
                    abstain: 0.0,
                });
            match vote.decision {
                VoteDecision::Agree => entry.agree += vote.weight,
                VoteDecision::Disagree => entry.disagree += vote.weight,
                VoteDecision::Abstain => entry.abstain += vote.weight,
            }
        }
        let candidates: Vec<CandidateTally> = counts.into_values().collect();

        let total_eligible_voters = campaign.eligible_voters.len() as u64;
        let total_cast = votes.len() as u64;
        #[allow(clippy::cast_precision_loss)]
        let participation_rate = if total_eligible_voters == 0 {
            0.0
        } else {
            total_cast as f64 / total_eligible_voters as f64
        };

        let leading_candidate = Self::sole_leader(&candidates);

        let outcome = if participation_rate < self.quorum_floor {
            TallyOutcome::NoQuorum
        } else {
            match &leading_candidate {
                None => TallyOutcome::Failed,
                Some(leader) => {
                    let ratio = candidates
                        .iter()
                        .find(|c| &c.candidate == leader)
                        .and_then(CandidateTally::approval_ratio);
                    match ratio {
                        Some(r) if r >= campaign.required_pass_percentage => TallyOutcome::Passed,
                        _ => TallyOutcome::Failed,
                    }
                }
            }
        };

        Ok(TallyResult {
            campaign_id: campaign.id,
            candidates,
            total_eligible_voters,
            total_cast,
            participation_rate,
            leading_candidate,
            outcome,
        })
    }

    /// The unique candidate with the highest weighted Agree count, or
    /// `None` when the lead is tied or there are no votes.
    fn sole_leader(candidates: &[CandidateTally]) -> Option<AnonymousId> {
        let best = candidates
            .iter()
            .map(|c| c.agree)
            .fold(f64::NEG_INFINITY, f64::max);
        if best == f64::NEG_INFINITY {
            return None;
        }
        let mut leaders = candidates.iter().filter(|c| c.agree == best);
        let first = leaders.next()?;
        if leaders.next().is_some() {
            None
        } else {
            Some(first.candidate.clone())
        }
    }
}
