//! The anonymization registry.
//!
//! Assigns stable pseudonymous candidate identifiers of the form
//! `CANDIDATE_<bucket>_<seq>`, decoupled from employee records. The vote
//! ledger and tally engine only ever see the anonymous id; resolving it
//! back to a real employee is reserved to the post-close audit path.

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::campaign::{Campaign, CampaignStatus};
use crate::ids::{AnonymousId, CampaignId, EmployeeRef};
use crate::storage::{CandidateStore, StorageError};

/// A minted candidate pseudonym.
///
/// One real employee maps to at most one anonymous id per campaign, and
/// the mapping is immutable once minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// The owning campaign.
    pub campaign_id: CampaignId,
    /// The pseudonym voters and the tally engine see.
    pub anonymous_id: AnonymousId,
    /// The real employee behind the pseudonym. Never surfaced outside
    /// the registry and the post-close audit path.
    pub real_employee: EmployeeRef,
    /// Minting instant.
    pub minted_at: DateTime<Utc>,
}

/// Errors that can occur while minting candidates.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The same real employee was minted twice in one campaign.
    #[error("employee {employee} is already candidate {existing} in campaign {campaign_id}")]
    DuplicateCandidate {
        /// The employee that was re-minted.
        employee: EmployeeRef,
        /// The campaign.
        campaign_id: CampaignId,
        /// The anonymous id from the first minting, when known.
        existing: AnonymousId,
    },

    /// Candidates can only be minted while the campaign is a draft;
    /// the candidate set is frozen at activation.
    #[error("campaign {campaign_id} is {status}; candidates can only be minted in a draft")]
    CampaignNotDraft {
        /// The campaign.
        campaign_id: CampaignId,
        /// Its current status.
        status: CampaignStatus,
    },

    /// Storage-level failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Mints and looks up candidate pseudonyms.
pub struct AnonymizationRegistry<S> {
    store: std::sync::Arc<S>,
}

impl<S: CandidateStore> AnonymizationRegistry<S> {
    /// Creates a registry over the given candidate store.
    pub fn new(store: std::sync::Arc<S>) -> Self {
        Self { store }
    }

    /// Mints a pseudonym for `employee` in `campaign`.
    ///
    /// The id is `CANDIDATE_<bucket>_<seq>` where the bucket letter is
    /// derived from the campaign type and `seq` is a zero-padded 3-digit
    /// counter unique within the campaign.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateCandidate`] if the employee was
    /// already minted in this campaign, and
    /// [`RegistryError::CampaignNotDraft`] once the campaign has left
    /// draft status.
    pub fn mint(
        &self,
        campaign: &Campaign,
        employee: &EmployeeRef,
        minted_at: DateTime<Utc>,
    ) -> Result<Candidate, RegistryError> {
        if campaign.status != CampaignStatus::Draft {
            return Err(RegistryError::CampaignNotDraft {
                campaign_id: campaign.id,
                status: campaign.status,
            });
        }

        let existing = self.store.candidates_for_campaign(campaign.id)?;
        if let Some(previous) = existing.iter().find(|c| &c.real_employee == employee) {
            return Err(RegistryError::DuplicateCandidate {
                employee: employee.clone(),
                campaign_id: campaign.id,
                existing: previous.anonymous_id.clone(),
            });
        }

        let seq = existing.len() + 1;
        let anonymous_id = AnonymousId::new(format!(
            "CANDIDATE_{}_{:03}",
            campaign.campaign_type.bucket_letter(),
            seq
        ));
        let candidate = Candidate {
            campaign_id: campaign.id,
            anonymous_id,
            real_employee: employee.clone(),
            minted_at,
        };

        // The store enforces both uniqueness directions again, which is
        // what protects concurrent mints racing past the read above.
        match self.store.insert_candidate(&candidate) {
            Ok(()) => Ok(candidate),
            Err(StorageError::Duplicate { .. }) => Err(RegistryError::DuplicateCandidate {
                employee: employee.clone(),
                campaign_id: campaign.id,
                existing: candidate.anonymous_id,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves an anonymous id back to the real employee.
    ///
    /// Restricted to the audit path: callers outside this crate go
    /// through [`crate::audit::AuditExporter`], which gates on a grant
    /// and on the campaign being closed.
    pub(crate) fn resolve_real(
        &self,
        campaign_id: CampaignId,
        anonymous_id: &AnonymousId,
    ) -> Result<Option<EmployeeRef>, StorageError> {
        Ok(self
            .store
            .candidate_by_anonymous_id(campaign_id, anonymous_id)?
            .map(|c| c.real_employee))
    }
}
