//! The engine facade.
//!
//! Wires the stores, integrity codec, clock, configuration, signal
//! sources, and notification sink into one surface:
//!
//! - administrative: create, activate, cancel, and close campaigns
//! - voter: cast, revise, and read votes
//! - scheduled: close expired campaigns
//! - read: tally a closed campaign
//!
//! Each campaign has its own exclusive lock. Cast and revise hold it for
//! their short critical section; the `Active → Closed` transition and the
//! tally run under it end to end, so no vote lands after tallying begins
//! and no tally starts while a revision is mid-flight. Campaigns are
//! independent units of concurrency; there is no cross-campaign locking.


use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::campaign::{
    Campaign, CampaignError, CampaignOrigin, CampaignType, CancelAuthority, VotingWindow,
};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::crypto::IntegrityCodec;
use crate::ids::{CampaignId, EmployeeRef, VoterRef};
use crate::ledger::{CastRequest, LedgerError, VoteLedger, VoteRecord};
use crate::notify::{CloseReason, NotificationEvent, Notifier};
use crate::registry::{AnonymizationRegistry, Candidate, RegistryError};
use crate::signals::{EligibilitySource, SignalError};
use crate::storage::{CampaignStore, CandidateStore, HistoryStore, StorageError, VoteStore};
use crate::tally::{TallyEngine, TallyError, TallyResult};

/// Umbrella error for engine facade operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Campaign lifecycle failure.
    #[error(transparent)]
    Campaign(#[from] CampaignError),

    /// Vote ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Candidate minting failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Tally failure.
    #[error(transparent)]
    Tally(#[from] TallyError),

    /// Signal source failure.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Storage-level failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Parameters for manually creating a campaign.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    /// Display title.
    pub title: String,
    /// The decision type under vote.
    pub campaign_type: CampaignType,
    /// The employee under review.
    pub target_employee: EmployeeRef,
    /// Current role label.
    pub current_position: String,
    /// Proposed role label.
    pub target_position: String,
    /// The voting window.
    pub window: VotingWindow,
    /// Pass threshold; `None` uses the configured default.
    pub required_pass_percentage: Option<f64>,
}

/// The anonymous promotion/punishment voting engine.
pub struct VotingEngine<S> {
    store: Arc<S>,
    ledger: VoteLedger<S>,
    registry: AnonymizationRegistry<S>,
    tally: TallyEngine,
    clock: Arc<dyn Clock>,
    eligibility: Arc<dyn EligibilitySource>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
    locks: Mutex<HashMap<CampaignId, Arc<Mutex<()>>>>,
}

impl<S> VotingEngine<S>
where
    S: CampaignStore + CandidateStore + VoteStore + HistoryStore,
{
    /// Assembles an engine over the given collaborators.
    pub fn new(
        store: Arc<S>,
        codec: Arc<IntegrityCodec>,
        clock: Arc<dyn Clock>,
        eligibility: Arc<dyn EligibilitySource>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger: VoteLedger::new(store.clone(), codec, clock.clone()),
            registry: AnonymizationRegistry::new(store.clone()),
            tally: TallyEngine::new(config.quorum_floor),
            store,
            clock,
            eligibility,
            notifier,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Creates a Draft campaign from administrative input.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::DuplicateCampaign`] if an open campaign
    /// already exists for the `(employee, type)` pair, plus validation
    /// errors from the campaign constructor.
    pub fn create_campaign(&self, new: NewCampaign) -> Result<Campaign, EngineError> {
        let campaign = Campaign::new(
            new.title,
            new.campaign_type,
            new.target_employee,
            new.current_position,
            new.target_position,
            new.window,
            new.required_pass_percentage
                .unwrap_or(self.config.default_pass_percentage),
            CampaignOrigin::Manual,
            self.clock.now(),
        )?;

        match self.store.insert_campaign(&campaign) {
            Ok(()) => {
                tracing::info!(
                    campaign_id = %campaign.id,
                    campaign_type = %campaign.campaign_type,
                    "campaign created"
                );
                Ok(campaign)
            }
            Err(StorageError::Duplicate { .. }) => {
                Err(CampaignError::DuplicateCampaign {
                    employee: campaign.target_employee,
                    campaign_type: campaign.campaign_type,
                }
                .into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Mints a candidate pseudonym into a draft campaign.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::NotFound`] for unknown campaigns and the
    /// registry errors for duplicates or non-draft campaigns.
    pub fn mint_candidate(
        &self,
        campaign_id: CampaignId,
        employee: &EmployeeRef,
    ) -> Result<Candidate, EngineError> {
        let campaign = self.require_campaign(campaign_id)?;
        Ok(self
            .registry
            .mint(&campaign, employee, self.clock.now())?)
    }

    /// Activates a draft campaign, snapshotting voter eligibility at
    /// this instant.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::NoEligibleVotersOrCandidates`] if the
    /// snapshot is empty or no candidate was minted, and
    /// [`CampaignError::InvalidTransition`] from any non-draft status.
    pub fn activate_campaign(&self, campaign_id: CampaignId) -> Result<Campaign, EngineError> {
        let lock = self.campaign_lock(campaign_id);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut campaign = self.require_campaign(campaign_id)?;
        let snapshot = self.eligibility.eligible_voters(self.clock.now())?;
        let candidates = self.store.candidate_count(campaign_id)?;
        campaign.activate(snapshot, candidates)?;
        self.store.update_campaign(&campaign)?;

        tracing::info!(
            campaign_id = %campaign.id,
            eligible_voters = campaign.eligible_voters.len(),
            candidates,
            "campaign activated"
        );
        self.emit(&NotificationEvent::CampaignOpened {
            campaign_id: campaign.id,
            title: campaign.title.clone(),
            campaign_type: campaign.campaign_type,
            window_end: campaign.window.end,
        });
        Ok(campaign)
    }

    /// Cancels a campaign under the given authority.
    ///
    /// A privileged override on an active disciplinary campaign is a
    /// sensitive action and is recorded as an audit event.
    ///
    /// # Errors
    ///
    /// Returns the campaign state machine's cancellation errors.
    pub fn cancel_campaign(
        &self,
        campaign_id: CampaignId,
        authority: &CancelAuthority,
    ) -> Result<Campaign, EngineError> {
        let lock = self.campaign_lock(campaign_id);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut campaign = self.require_campaign(campaign_id)?;
        let votes_cast = self.store.vote_count(campaign_id)?;
        campaign.cancel(votes_cast, authority)?;
        self.store.update_campaign(&campaign)?;

        if let CancelAuthority::PrivilegedOverride { actor } = authority {
            tracing::warn!(
                target: "audit",
                campaign_id = %campaign.id,
                actor,
                votes_cast,
                "campaign cancelled under privileged override"
            );
        } else {
            tracing::info!(campaign_id = %campaign.id, "campaign cancelled");
        }
        Ok(campaign)
    }

    /// Casts a vote. Calling again for the same voter routes to a
    /// revision.
    ///
    /// # Errors
    ///
    /// Returns the vote ledger's cast and revision errors.
    pub fn cast_vote(
        &self,
        campaign_id: CampaignId,
        voter: &VoterRef,
        request: CastRequest,
    ) -> Result<VoteRecord, EngineError> {
        let lock = self.campaign_lock(campaign_id);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let campaign = self.require_campaign(campaign_id)?;
        Ok(self.ledger.cast_vote(&campaign, voter, request)?)
    }

    /// Revises an existing vote.
    ///
    /// # Errors
    ///
    /// Returns the vote ledger's revision errors.
    pub fn revise_vote(
        &self,
        campaign_id: CampaignId,
        voter: &VoterRef,
        request: CastRequest,
    ) -> Result<VoteRecord, EngineError> {
        let lock = self.campaign_lock(campaign_id);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let campaign = self.require_campaign(campaign_id)?;
        Ok(self.ledger.revise_vote(&campaign, voter, request)?)
    }

    /// Returns the voter's current vote, verified against its
    /// commitment.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::IntegrityViolation`] on a tampered record.
    pub fn current_vote(
        &self,
        campaign_id: CampaignId,
        voter: &VoterRef,
    ) -> Result<Option<VoteRecord>, EngineError> {
        Ok(self.ledger.current_vote(campaign_id, voter)?)
    }

    /// Force-closes an active campaign and computes its decision.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidTransition`] unless the campaign
    /// is active.
    pub fn close_campaign(&self, campaign_id: CampaignId) -> Result<TallyResult, EngineError> {
        self.close_with_reason(campaign_id, CloseReason::ForceClosed)
    }

    /// Closes every active campaign whose window has expired, computing
    /// each decision. Intended for the scheduler.
    ///
    /// # Errors
    ///
    /// Returns the first close failure; earlier closures stay committed.
    pub fn close_expired_campaigns(&self) -> Result<Vec<TallyResult>, EngineError> {
        let now = self.clock.now();
        let mut results = Vec::new();
        for campaign in self
            .store
            .campaigns_by_status(crate::campaign::CampaignStatus::Active)?
        {
            if campaign.window.has_expired(now) {
                results.push(self.close_with_reason(campaign.id, CloseReason::WindowExpired)?);
            }
        }
        Ok(results)
    }

    /// Tallies a closed campaign.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::CampaignStillActive`] before close; no
    /// partial result is produced.
    pub fn tally(&self, campaign_id: CampaignId) -> Result<TallyResult, EngineError> {
        let campaign = self.require_campaign(campaign_id)?;
        let votes = self.ledger.verified_votes(campaign_id)?;
        Ok(self.tally.tally(&campaign, &votes)?)
    }

    /// Closes one campaign under its exclusive lock: finalize votes, run
    /// the tally, emit the decision.
    fn close_with_reason(
        &self,
        campaign_id: CampaignId,
        reason: CloseReason,
    ) -> Result<TallyResult, EngineError> {
        let lock = self.campaign_lock(campaign_id);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut campaign = self.require_campaign(campaign_id)?;
        campaign.close()?;
        self.store.update_campaign(&campaign)?;
        let finalized = self.ledger.finalize_campaign(campaign_id)?;

        let votes = self.ledger.verified_votes(campaign_id)?;
        let result = self.tally.tally(&campaign, &votes)?;

        tracing::info!(
            campaign_id = %campaign.id,
            ?reason,
            finalized,
            outcome = ?result.outcome,
            participation = result.participation_rate,
            "campaign closed"
        );
        self.emit(&NotificationEvent::CampaignClosed {
            campaign_id: campaign.id,
            reason,
        });
        self.emit(&NotificationEvent::DecisionReached {
            campaign_id: campaign.id,
            outcome: result.outcome,
            participation_rate: result.participation_rate,
        });
        Ok(result)
    }

    fn require_campaign(&self, campaign_id: CampaignId) -> Result<Campaign, EngineError> {
        self.store
            .campaign(campaign_id)?
            .ok_or_else(|| CampaignError::NotFound { campaign_id }.into())
    }

    /// Fire-and-forget notification: failures are logged, never
    /// propagated, and never roll anything back.
    fn emit(&self, event: &NotificationEvent) {
        if let Err(err) = self.notifier.notify(event) {
            tracing::warn!(%err, ?event, "notification delivery failed");
        }
    }

    fn campaign_lock(&self, campaign_id: CampaignId) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        locks
            .entry(campaign_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
