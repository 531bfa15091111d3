//! Post-close audit export.
//!
//! Read-only access to the modification history plus the one privileged
//! operation in the system: resolving an anonymous candidate id back to
//! the real employee. Resolution requires an [`AuditGrant`], issued by
//! the privileged-access check living outside this crate, and only
//! succeeds once the owning campaign has reached a terminal status, so
//! identities stay sealed while voting can still be influenced.


use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::campaign::CampaignStatus;
use crate::crypto::{HistoryChainError, HistoryHasher, IntegrityCodec};
use crate::ids::{AnonymousId, CampaignId, EmployeeRef, VoterRef};
use crate::ledger::VoteModificationHistoryEntry;
use crate::registry::AnonymizationRegistry;
use crate::storage::{CampaignStore, CandidateStore, HistoryStore, StorageError, VoteStore};

/// Capability value authorizing real-identity resolution.
///
/// The engine does not decide who may audit; the privileged-access check
/// outside this crate does, and hands the approved actor a grant.
#[derive(Debug, Clone)]
pub struct AuditGrant {
    actor: String,
    issued_at: DateTime<Utc>,
}

impl AuditGrant {
    /// Issues a grant for the named actor.
    #[must_use]
    pub fn new(actor: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            actor: actor.into(),
            issued_at,
        }
    }

    /// The actor the grant was issued to.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// When the grant was issued.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Errors from audit export operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuditError {
    /// Identity resolution was attempted while the campaign could still
    /// accept votes.
    #[error("campaign {campaign_id} is {status}; identities unseal only after close")]
    CampaignStillOpen {
        /// The campaign.
        campaign_id: CampaignId,
        /// Its current status.
        status: CampaignStatus,
    },

    /// No campaign exists with the given id.
    #[error("campaign not found: {campaign_id}")]
    UnknownCampaign {
        /// The unknown id.
        campaign_id: CampaignId,
    },

    /// The anonymous id was never minted in the campaign.
    #[error("candidate {candidate} was never minted in campaign {campaign_id}")]
    UnknownCandidate {
        /// The unknown anonymous id.
        candidate: AnonymousId,
        /// The campaign.
        campaign_id: CampaignId,
    },

    /// A vote's history chain failed verification.
    #[error("history chain invalid for voter {voter} in campaign {campaign_id}: {source}")]
    ChainInvalid {
        /// The voter whose chain broke.
        voter: VoterRef,
        /// The campaign.
        campaign_id: CampaignId,
        /// The underlying chain failure.
        source: HistoryChainError,
    },

    /// A vote record failed commitment verification.
    #[error("integrity violation for voter {voter} in campaign {campaign_id}: {details}")]
    RecordInvalid {
        /// The voter whose record failed.
        voter: VoterRef,
        /// The campaign.
        campaign_id: CampaignId,
        /// Digest mismatch detail.
        details: String,
    },

    /// Storage-level failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Read-only audit access over one store.
pub struct AuditExporter<S> {
    store: std::sync::Arc<S>,
    registry: AnonymizationRegistry<S>,
    codec: std::sync::Arc<IntegrityCodec>,
}

impl<S> AuditExporter<S>
where
    S: CampaignStore + CandidateStore + VoteStore + HistoryStore,
{
    /// Creates an exporter over the given store and codec.
    pub fn new(store: std::sync::Arc<S>, codec: std::sync::Arc<IntegrityCodec>) -> Self {
        Self {
            registry: AnonymizationRegistry::new(store.clone()),
            store,
            codec,
        }
    }

    /// Every modification history row for a campaign, ordered by voter
    /// and modification number.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    pub fn history_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<VoteModificationHistoryEntry>, AuditError> {
        Ok(self.store.history_for_campaign(campaign_id)?)
    }

    /// Verifies every vote record and history chain in a campaign.
    ///
    /// # Errors
    ///
    /// Returns the first commitment mismatch or chain break found.
    pub fn verify_campaign(&self, campaign_id: CampaignId) -> Result<(), AuditError> {
        for record in self.store.votes_for_campaign(campaign_id)? {
            self.codec
                .verify(&record.commitment_input(), &record.integrity_hash)
                .map_err(|err| AuditError::RecordInvalid {
                    voter: record.voter.clone(),
                    campaign_id,
                    details: err.to_string(),
                })?;

            let entries = self.store.history_for_vote(campaign_id, &record.voter)?;
            let contents: Vec<Vec<u8>> = entries
                .iter()
                .map(VoteModificationHistoryEntry::canonical_bytes)
                .collect();
            HistoryHasher::verify_chain(
                entries
                    .iter()
                    .zip(&contents)
                    .map(|(e, content)| (content.as_slice(), &e.prev_hash, &e.entry_hash)),
            )
            .map_err(|source| AuditError::ChainInvalid {
                voter: record.voter.clone(),
                campaign_id,
                source,
            })?;
        }
        Ok(())
    }

    /// Resolves an anonymous candidate id to the real employee.
    ///
    /// Requires a grant and a campaign in terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::CampaignStillOpen`] while the campaign is
    /// Draft or Active, and [`AuditError::UnknownCandidate`] for ids
    /// never minted.
    pub fn resolve_candidate(
        &self,
        grant: &AuditGrant,
        campaign_id: CampaignId,
        candidate: &AnonymousId,
    ) -> Result<EmployeeRef, AuditError> {
        let campaign = self
            .store
            .campaign(campaign_id)?
            .ok_or(AuditError::UnknownCampaign { campaign_id })?;
        if !campaign.status.is_terminal() {
            return Err(AuditError::CampaignStillOpen {
                campaign_id,
                status: campaign.status,
            });
        }

        let employee = self
            .registry
            .resolve_real(campaign_id, candidate)?
            .ok_or_else(|| AuditError::UnknownCandidate {
                candidate: candidate.clone(),
                campaign_id,
            })?;

        tracing::warn!(
            target: "audit",
            campaign_id = %campaign_id,
            candidate = %candidate,
            actor = grant.actor(),
            "anonymous candidate resolved to real identity"
        );
        Ok(employee)
    }
}
