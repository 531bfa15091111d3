//! Vote ledger operations: cast, revise, read.

use std::sync::Arc;

use crate::campaign::{Campaign, CampaignStatus};
use crate::clock::Clock;
use crate::crypto::{GENESIS_PREV_HASH, HistoryHasher, IntegrityCodec};
use crate::ids::{AnonymousId, CampaignId, VoterRef};
use crate::ledger::{
    LedgerError, MAX_REVISIONS, Provenance, VoteDecision, VoteModificationHistoryEntry, VoteRecord,
};
use crate::storage::{CandidateStore, HistoryStore, StorageError, VoteStore};

/// Parameters of a cast or revision.
#[derive(Debug, Clone)]
pub struct CastRequest {
    /// The candidate the vote names.
    pub candidate: AnonymousId,
    /// The decision.
    pub decision: VoteDecision,
    /// Vote weight; `None` means the default of 1.0.
    pub weight: Option<f64>,
    /// Optional free-text reason, recorded in the history on revisions.
    pub reason: Option<String>,
    /// Request provenance for the audit trail.
    pub provenance: Provenance,
}

impl CastRequest {
    /// A plain request with default weight and no reason or provenance.
    #[must_use]
    pub fn new(candidate: AnonymousId, decision: VoteDecision) -> Self {
        Self {
            candidate,
            decision,
            weight: None,
            reason: None,
            provenance: Provenance::default(),
        }
    }
}

/// The vote ledger.
///
/// Owns cast/revise/read over vote records. Each write validates the
/// campaign window against the clock at that moment, recommits the record
/// through the integrity codec with a fresh salt, and (for revisions)
/// appends exactly one history entry in the same storage transaction as
/// the record update.
pub struct VoteLedger<S> {
    store: Arc<S>,
    codec: Arc<IntegrityCodec>,
    clock: Arc<dyn Clock>,
}

impl<S> VoteLedger<S>
where
    S: VoteStore + HistoryStore + CandidateStore,
{
    /// Creates a ledger over the given store, codec, and clock.
    pub fn new(store: Arc<S>, codec: Arc<IntegrityCodec>, clock: Arc<dyn Clock>) -> Self {
        Self { store, codec, clock }
    }

    /// Casts a vote.
    ///
    /// If the voter already has a record in this campaign, the call
    /// routes to a revision; casting twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CampaignNotActive`] outside the window or
    /// status, [`LedgerError::NotEligible`] for voters outside the
    /// snapshot, [`LedgerError::UnknownCandidate`] for unminted
    /// candidates, plus every revision error when routing.
    pub fn cast_vote(
        &self,
        campaign: &Campaign,
        voter: &VoterRef,
        request: CastRequest,
    ) -> Result<VoteRecord, LedgerError> {
        self.check_accepting(campaign)?;
        self.check_eligible(campaign, voter)?;
        self.check_candidate(campaign.id, &request.candidate)?;

        if let Some(existing) = self.store.vote(campaign.id, voter)? {
            return self.revise_existing(campaign, existing, request);
        }

        let now = self.clock.now();
        let salt = IntegrityCodec::generate_salt();
        let mut record = VoteRecord {
            campaign_id: campaign.id,
            voter: voter.clone(),
            candidate: request.candidate,
            decision: request.decision,
            weight: request.weight.unwrap_or(1.0),
            sequence_number: 0,
            salt,
            integrity_hash: [0u8; 32],
            finalized: false,
            anomaly: None,
            cast_at: now,
            updated_at: now,
        };
        record.integrity_hash = self.codec.commit(&record.commitment_input());

        match self.store.insert_vote(&record) {
            Ok(()) => {
                tracing::info!(
                    campaign_id = %campaign.id,
                    voter = %voter,
                    "vote cast"
                );
                Ok(record)
            }
            // Lost a first-cast race; the other write is now the current
            // record, so this call becomes a revision of it.
            Err(StorageError::Duplicate { .. }) => match self.store.vote(campaign.id, voter)? {
                Some(existing) => self.revise_existing(
                    campaign,
                    existing,
                    CastRequest {
                        candidate: record.candidate,
                        decision: record.decision,
                        weight: Some(record.weight),
                        reason: None,
                        provenance: Provenance::default(),
                    },
                ),
                None => Err(LedgerError::ConcurrentModification {
                    voter: voter.clone(),
                    campaign_id: campaign.id,
                    expected_sequence: 0,
                }),
            },
            Err(err) => Err(err.into()),
        }
    }

    /// Revises an existing vote.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::VoteNotFound`] if there is nothing to
    /// revise, [`LedgerError::ModificationLimitExceeded`] past the
    /// ceiling, [`LedgerError::ConcurrentModification`] on a lost race,
    /// [`LedgerError::IntegrityViolation`] if the stored record fails
    /// verification, and [`LedgerError::HistoryAnomaly`] if the audit
    /// trail is incomplete.
    pub fn revise_vote(
        &self,
        campaign: &Campaign,
        voter: &VoterRef,
        request: CastRequest,
    ) -> Result<VoteRecord, LedgerError> {
        self.check_accepting(campaign)?;
        self.check_eligible(campaign, voter)?;
        self.check_candidate(campaign.id, &request.candidate)?;

        let existing =
            self.store
                .vote(campaign.id, voter)?
                .ok_or_else(|| LedgerError::VoteNotFound {
                    voter: voter.clone(),
                    campaign_id: campaign.id,
                })?;
        self.revise_existing(campaign, existing, request)
    }

    /// Returns the current vote for a voter, verified against its
    /// commitment.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::IntegrityViolation`] if the stored record
    /// fails verification.
    pub fn current_vote(
        &self,
        campaign_id: CampaignId,
        voter: &VoterRef,
    ) -> Result<Option<VoteRecord>, LedgerError> {
        match self.store.vote(campaign_id, voter)? {
            Some(record) => {
                self.verify_record(&record)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Returns all current votes for a campaign, each verified against
    /// its commitment.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::IntegrityViolation`] on the first record
    /// that fails verification.
    pub fn verified_votes(&self, campaign_id: CampaignId) -> Result<Vec<VoteRecord>, LedgerError> {
        let votes = self.store.votes_for_campaign(campaign_id)?;
        for record in &votes {
            self.verify_record(record)?;
        }
        Ok(votes)
    }

    /// Marks every record in the campaign finalized. Called on the
    /// `Active → Closed` transition.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    pub fn finalize_campaign(&self, campaign_id: CampaignId) -> Result<u64, LedgerError> {
        Ok(self.store.finalize_votes(campaign_id)?)
    }

    /// Verifies a record against its stored commitment.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::IntegrityViolation`] on mismatch; the
    /// violation is also logged to the tamper-alert channel.
    pub fn verify_record(&self, record: &VoteRecord) -> Result<(), LedgerError> {
        self.codec
            .verify(&record.commitment_input(), &record.integrity_hash)
            .map_err(|err| {
                tracing::error!(
                    target: "tamper_alert",
                    campaign_id = %record.campaign_id,
                    voter = %record.voter,
                    sequence = record.sequence_number,
                    %err,
                    "vote record failed integrity verification"
                );
                LedgerError::IntegrityViolation {
                    voter: record.voter.clone(),
                    campaign_id: record.campaign_id,
                    details: err.to_string(),
                }
            })
    }

    fn check_accepting(&self, campaign: &Campaign) -> Result<(), LedgerError> {
        let now = self.clock.now();
        if campaign.status != CampaignStatus::Active || !campaign.window.contains(now) {
            return Err(LedgerError::CampaignNotActive {
                campaign_id: campaign.id,
                status: campaign.status,
                window_start: campaign.window.start,
                window_end: campaign.window.end,
            });
        }
        Ok(())
    }

    fn check_eligible(&self, campaign: &Campaign, voter: &VoterRef) -> Result<(), LedgerError> {
        if campaign.eligible_voters.contains(voter) {
            Ok(())
        } else {
            Err(LedgerError::NotEligible {
                voter: voter.clone(),
                campaign_id: campaign.id,
            })
        }
    }

    fn check_candidate(
        &self,
        campaign_id: CampaignId,
        candidate: &AnonymousId,
    ) -> Result<(), LedgerError> {
        if self
            .store
            .candidate_by_anonymous_id(campaign_id, candidate)?
            .is_some()
        {
            Ok(())
        } else {
            Err(LedgerError::UnknownCandidate {
                candidate: candidate.clone(),
                campaign_id,
            })
        }
    }

    /// Checks the audit trail for `record` and returns the hash the next
    /// entry must link to.
    ///
    /// A numbering gap or broken chain freezes the record with an
    /// anomaly marker; the missing entry is never guessed back into
    /// existence.
    fn check_history(
        &self,
        record: &VoteRecord,
    ) -> Result<crate::crypto::Commitment, LedgerError> {
        let entries = self.store.history_for_vote(record.campaign_id, &record.voter)?;

        let anomaly = if entries.len() != record.sequence_number as usize {
            Some(format!(
                "history gap: {} entries for sequence number {}",
                entries.len(),
                record.sequence_number
            ))
        } else {
            let chain_contents: Vec<Vec<u8>> =
                entries.iter().map(VoteModificationHistoryEntry::canonical_bytes).collect();
            HistoryHasher::verify_chain(
                entries
                    .iter()
                    .zip(&chain_contents)
                    .map(|(e, content)| (content.as_slice(), &e.prev_hash, &e.entry_hash)),
            )
            .err()
            .map(|err| err.to_string())
        };

        if let Some(details) = anomaly {
            tracing::error!(
                target: "tamper_alert",
                campaign_id = %record.campaign_id,
                voter = %record.voter,
                details,
                "vote history anomaly; freezing record"
            );
            self.store
                .freeze_vote(record.campaign_id, &record.voter, &details)?;
            return Err(LedgerError::HistoryAnomaly {
                voter: record.voter.clone(),
                campaign_id: record.campaign_id,
                details,
            });
        }

        Ok(entries
            .last()
            .map_or(GENESIS_PREV_HASH, |entry| entry.entry_hash))
    }

    fn revise_existing(
        &self,
        campaign: &Campaign,
        existing: VoteRecord,
        request: CastRequest,
    ) -> Result<VoteRecord, LedgerError> {
        if let Some(details) = &existing.anomaly {
            return Err(LedgerError::HistoryAnomaly {
                voter: existing.voter.clone(),
                campaign_id: existing.campaign_id,
                details: details.clone(),
            });
        }

        self.verify_record(&existing)?;

        if existing.sequence_number >= MAX_REVISIONS {
            return Err(LedgerError::ModificationLimitExceeded {
                voter: existing.voter.clone(),
                campaign_id: existing.campaign_id,
            });
        }
        if existing.finalized {
            // Finalized below the ceiling means the campaign closed
            // between our status check and now.
            return Err(LedgerError::CampaignNotActive {
                campaign_id: campaign.id,
                status: CampaignStatus::Closed,
                window_start: campaign.window.start,
                window_end: campaign.window.end,
            });
        }

        let prev_hash = self.check_history(&existing)?;

        let now = self.clock.now();
        let new_sequence = existing.sequence_number + 1;
        let salt = IntegrityCodec::generate_salt();
        let mut record = VoteRecord {
            candidate: request.candidate.clone(),
            decision: request.decision,
            weight: request.weight.unwrap_or(existing.weight),
            sequence_number: new_sequence,
            salt,
            integrity_hash: [0u8; 32],
            finalized: new_sequence >= MAX_REVISIONS,
            updated_at: now,
            ..existing.clone()
        };
        record.integrity_hash = self.codec.commit(&record.commitment_input());

        let entry = VoteModificationHistoryEntry::new(
            existing.campaign_id,
            existing.voter.clone(),
            new_sequence,
            existing.decision,
            request.decision,
            existing.candidate.clone(),
            request.candidate,
            request.reason,
            now,
            request.provenance,
            prev_hash,
        );

        match self
            .store
            .update_vote(&record, existing.sequence_number, &entry)
        {
            Ok(()) => {
                tracing::info!(
                    campaign_id = %campaign.id,
                    voter = %record.voter,
                    sequence = record.sequence_number,
                    remaining = record.remaining_revisions(),
                    "vote revised"
                );
                Ok(record)
            }
            Err(StorageError::SequenceConflict { expected }) => {
                Err(LedgerError::ConcurrentModification {
                    voter: record.voter,
                    campaign_id: record.campaign_id,
                    expected_sequence: expected,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}
