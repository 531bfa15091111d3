//! Persistence boundary for the voting engine.
//!
//! The core components only assume atomic read-modify-write per entity,
//! expressed through the four store traits below. [`SqliteStore`] is the
//! bundled transactional backend; tests run it in memory.
//!
//! Logical layout: four append-mostly tables: campaigns (with the
//! eligibility snapshot embedded), candidates, vote records (mutable
//! within the revision ceiling), and vote modification history (strictly
//! append-only), with foreign keys candidates→campaigns,
//! `vote_records`→(campaigns, candidates), history→vote records.

mod sqlite;


use thiserror::Error;

pub use sqlite::SqliteStore;

use crate::campaign::{Campaign, CampaignStatus, CampaignType};
use crate::ids::{AnonymousId, CampaignId, EmployeeRef, VoterRef};
use crate::ledger::{VoteModificationHistoryEntry, VoteRecord};
use crate::registry::Candidate;

/// Errors surfaced by store implementations.
///
/// Kept deliberately engine-agnostic: backends translate their native
/// failures into these variants so the core never learns which storage
/// engine it runs on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate {entity}: {key}")]
    Duplicate {
        /// The entity kind.
        entity: &'static str,
        /// A human-readable rendering of the conflicting key.
        key: String,
    },

    /// The referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// The entity kind.
        entity: &'static str,
        /// A human-readable rendering of the missing key.
        key: String,
    },

    /// A compare-and-swap on the vote sequence number found a different
    /// sequence than expected; a concurrent writer got there first.
    #[error("sequence conflict: expected sequence {expected}")]
    SequenceConflict {
        /// The sequence number the write expected to replace.
        expected: u32,
    },

    /// Failure encoding or decoding a persisted field.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Storage for campaign entities.
pub trait CampaignStore: Send + Sync {
    /// Inserts a new campaign.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Duplicate`] if a Draft or Active campaign
    /// already exists for the same `(target_employee, campaign_type)`.
    /// This constraint is what makes the trigger sweep idempotent.
    fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StorageError>;

    /// Replaces the stored campaign row by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no such campaign exists.
    fn update_campaign(&self, campaign: &Campaign) -> Result<(), StorageError>;

    /// Fetches a campaign by id.
    ///
    /// # Errors
    ///
    /// Returns an error only on backend failure; an unknown id is `None`.
    fn campaign(&self, id: CampaignId) -> Result<Option<Campaign>, StorageError>;

    /// Finds the Draft or Active campaign for an employee and type, if
    /// one exists.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn find_open_campaign(
        &self,
        employee: &EmployeeRef,
        campaign_type: CampaignType,
    ) -> Result<Option<Campaign>, StorageError>;

    /// Lists campaigns with the given status.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn campaigns_by_status(&self, status: CampaignStatus) -> Result<Vec<Campaign>, StorageError>;
}

/// Storage for minted candidates.
pub trait CandidateStore: Send + Sync {
    /// Inserts a freshly minted candidate.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Duplicate`] if the employee or the
    /// anonymous id is already present in the campaign. Mappings are
    /// immutable once minted; there is no update operation.
    fn insert_candidate(&self, candidate: &Candidate) -> Result<(), StorageError>;

    /// Lists the candidates minted for a campaign, in minting order.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn candidates_for_campaign(&self, id: CampaignId) -> Result<Vec<Candidate>, StorageError>;

    /// Number of candidates minted for a campaign.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn candidate_count(&self, id: CampaignId) -> Result<usize, StorageError>;

    /// Fetches one candidate by anonymous id within a campaign.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure; an unknown id is `None`.
    fn candidate_by_anonymous_id(
        &self,
        id: CampaignId,
        anonymous_id: &AnonymousId,
    ) -> Result<Option<Candidate>, StorageError>;
}

/// Storage for vote records.
pub trait VoteStore: Send + Sync {
    /// Inserts the original cast for a `(campaign, voter)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Duplicate`] if a record already exists for
    /// the pair.
    fn insert_vote(&self, record: &VoteRecord) -> Result<(), StorageError>;

    /// Commits one revision: appends the history entry and replaces the
    /// record, in that order, atomically.
    ///
    /// The history row must be durably appended before the record update
    /// is considered committed, so a torn write can never produce a
    /// revised record without its audit row.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::SequenceConflict`] if the stored sequence
    /// number is not `expected_sequence` (a concurrent revision won), in
    /// which case nothing is written.
    fn update_vote(
        &self,
        record: &VoteRecord,
        expected_sequence: u32,
        history: &VoteModificationHistoryEntry,
    ) -> Result<(), StorageError>;

    /// Fetches the current vote for a `(campaign, voter)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure; no vote is `None`.
    fn vote(
        &self,
        campaign: CampaignId,
        voter: &VoterRef,
    ) -> Result<Option<VoteRecord>, StorageError>;

    /// Lists all current vote records for a campaign.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn votes_for_campaign(&self, campaign: CampaignId) -> Result<Vec<VoteRecord>, StorageError>;

    /// Number of current vote records for a campaign.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn vote_count(&self, campaign: CampaignId) -> Result<u64, StorageError>;

    /// Marks every record in the campaign `finalized`. Returns the number
    /// of records newly finalized.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn finalize_votes(&self, campaign: CampaignId) -> Result<u64, StorageError>;

    /// Finalizes one record and stamps it with an anomaly marker.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the record does not exist.
    fn freeze_vote(
        &self,
        campaign: CampaignId,
        voter: &VoterRef,
        anomaly: &str,
    ) -> Result<(), StorageError>;
}

/// Read-only storage access to the modification history.
///
/// Appending happens exclusively through [`VoteStore::update_vote`]; the
/// history table has no other write path.
pub trait HistoryStore: Send + Sync {
    /// Lists the history entries for one vote, ordered by modification
    /// number.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn history_for_vote(
        &self,
        campaign: CampaignId,
        voter: &VoterRef,
    ) -> Result<Vec<VoteModificationHistoryEntry>, StorageError>;

    /// Lists every history entry for a campaign, ordered by voter then
    /// modification number.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn history_for_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<Vec<VoteModificationHistoryEntry>, StorageError>;
}
