//! The trigger rule engine.
//!
//! Evaluates HR and attendance signals on a schedule (not per-request)
//! and opens Draft campaigns automatically. Rules are independent
//! predicate+action values over read-only snapshots; they keep no state
//! of their own.
//!
//! The sweep runs with at-least-once semantics. Idempotency comes from
//! the campaign store's uniqueness constraint (at most one Draft/Active
//! campaign per `(employee, campaign type)`), never from the rule
//! engine remembering what it already opened.

mod rules;


use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

pub use rules::{DisciplinaryDemotionRule, ProbationConversionRule, PromotionEligibilityRule};

use crate::campaign::{Campaign, CampaignError, CampaignOrigin, CampaignType, VotingWindow};
use crate::clock::Clock;
use crate::config::{EngineConfig, TriggerConfig};
use crate::ids::{CampaignId, EmployeeRef};
use crate::signals::{AttendanceSource, HrSource, SignalError};
use crate::storage::{CampaignStore, StorageError};

/// Errors from the trigger rule engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TriggerError {
    /// A signal source failed.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// A proposed campaign was itself invalid.
    #[error(transparent)]
    Campaign(#[from] CampaignError),

    /// Storage-level failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Read-only context handed to each rule evaluation.
pub struct RuleContext<'a> {
    /// Attendance and tenure signals.
    pub attendance: &'a dyn AttendanceSource,
    /// HR-side signals.
    pub hr: &'a dyn HrSource,
    /// Configured thresholds.
    pub config: &'a TriggerConfig,
    /// The sweep instant.
    pub now: DateTime<Utc>,
}

/// A campaign a rule proposes to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignProposal {
    /// The decision type to put to the vote.
    pub campaign_type: CampaignType,
    /// Display title for the campaign.
    pub title: String,
    /// Current role label.
    pub current_position: String,
    /// Proposed role label.
    pub target_position: String,
    /// The specific metric or condition that tripped the rule; becomes
    /// `origin.justification` for auditability.
    pub justification: String,
}

/// An independent predicate+action pair over signal snapshots.
pub trait TriggerRule: Send + Sync {
    /// Stable rule name, recorded in the campaign origin.
    fn name(&self) -> &'static str;

    /// Evaluates the rule for one employee.
    ///
    /// Returns `Some` when the rule wants a campaign opened. Must be
    /// pure with respect to the snapshot: no side effects, no memory
    /// between evaluations.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] when a consulted source fails.
    fn evaluate(
        &self,
        employee: &EmployeeRef,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<CampaignProposal>, SignalError>;
}

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Campaigns opened by this sweep.
    pub opened: Vec<CampaignId>,
    /// Proposals suppressed because an open campaign already existed.
    pub suppressed_duplicates: usize,
    /// Employees skipped because a signal source did not know them.
    pub skipped_unknown: usize,
}

/// Evaluates trigger rules across a roster and opens Draft campaigns.
pub struct TriggerRuleEngine<S> {
    store: Arc<S>,
    rules: Vec<Box<dyn TriggerRule>>,
    attendance: Arc<dyn AttendanceSource>,
    hr: Arc<dyn HrSource>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<S: CampaignStore> TriggerRuleEngine<S> {
    /// Creates an engine with the standard rule set: probation
    /// conversion, promotion eligibility, disciplinary demotion.
    pub fn new(
        store: Arc<S>,
        attendance: Arc<dyn AttendanceSource>,
        hr: Arc<dyn HrSource>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self::with_rules(
            store,
            attendance,
            hr,
            clock,
            config,
            vec![
                Box::new(ProbationConversionRule),
                Box::new(PromotionEligibilityRule),
                Box::new(DisciplinaryDemotionRule),
            ],
        )
    }

    /// Creates an engine with a caller-provided rule set.
    pub fn with_rules(
        store: Arc<S>,
        attendance: Arc<dyn AttendanceSource>,
        hr: Arc<dyn HrSource>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        rules: Vec<Box<dyn TriggerRule>>,
    ) -> Self {
        Self {
            store,
            rules,
            attendance,
            hr,
            clock,
            config,
        }
    }

    /// Runs every rule against every employee on the roster, opening a
    /// Draft campaign for each proposal that is not already covered by
    /// an open campaign.
    ///
    /// Safe to re-run: an unchanged roster yields zero new campaigns on
    /// the second pass.
    ///
    /// # Errors
    ///
    /// Returns an error if a signal source is unavailable or storage
    /// fails; employees merely unknown to a source are skipped and
    /// counted.
    pub fn sweep(&self, roster: &[EmployeeRef]) -> Result<SweepReport, TriggerError> {
        let now = self.clock.now();
        let ctx = RuleContext {
            attendance: self.attendance.as_ref(),
            hr: self.hr.as_ref(),
            config: &self.config.trigger,
            now,
        };

        let mut report = SweepReport::default();
        for employee in roster {
            for rule in &self.rules {
                let proposal = match rule.evaluate(employee, &ctx) {
                    Ok(Some(proposal)) => proposal,
                    Ok(None) => continue,
                    Err(SignalError::UnknownEmployee { .. }) => {
                        tracing::warn!(
                            rule = rule.name(),
                            employee = %employee,
                            "signal source does not know employee; skipping"
                        );
                        report.skipped_unknown += 1;
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                };

                if self
                    .store
                    .find_open_campaign(employee, proposal.campaign_type)?
                    .is_some()
                {
                    report.suppressed_duplicates += 1;
                    continue;
                }

                match self.open_campaign(employee, rule.name(), proposal, now) {
                    Ok(id) => report.opened.push(id),
                    // Lost a race with a concurrent sweep; the
                    // uniqueness constraint did its job.
                    Err(TriggerError::Storage(StorageError::Duplicate { .. })) => {
                        report.suppressed_duplicates += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        tracing::info!(
            opened = report.opened.len(),
            suppressed = report.suppressed_duplicates,
            skipped = report.skipped_unknown,
            "trigger sweep complete"
        );
        Ok(report)
    }

    fn open_campaign(
        &self,
        employee: &EmployeeRef,
        rule: &'static str,
        proposal: CampaignProposal,
        now: DateTime<Utc>,
    ) -> Result<CampaignId, TriggerError> {
        let window = VotingWindow::new(now, now + Duration::days(self.config.default_window_days))?;
        let campaign = Campaign::new(
            proposal.title,
            proposal.campaign_type,
            employee.clone(),
            proposal.current_position,
            proposal.target_position,
            window,
            self.config.default_pass_percentage,
            CampaignOrigin::SystemTriggered {
                rule: rule.to_owned(),
                justification: proposal.justification.clone(),
            },
            now,
        )?;
        let id = campaign.id;
        self.store.insert_campaign(&campaign)?;
        tracing::info!(
            campaign_id = %id,
            rule,
            campaign_type = %campaign.campaign_type,
            justification = proposal.justification,
            "trigger rule opened campaign"
        );
        Ok(id)
    }
}
