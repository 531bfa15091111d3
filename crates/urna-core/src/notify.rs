//! Notification sink boundary.
//!
//! Delivery mechanics (chat bots, push) live in external collaborators.
//! Notifications are fire-and-forget: a failed delivery is logged and
//! never rolls back a closed campaign or a computed decision.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::campaign::CampaignType;
use crate::ids::CampaignId;
use crate::tally::TallyOutcome;

/// Why a campaign was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// The wall clock reached the window end.
    WindowExpired,
    /// An administrator force-closed the campaign early.
    ForceClosed,
}

/// Events emitted to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationEvent {
    /// A campaign began accepting votes.
    CampaignOpened {
        /// The campaign.
        campaign_id: CampaignId,
        /// Its display title.
        title: String,
        /// The decision type under vote.
        campaign_type: CampaignType,
        /// When voting closes.
        window_end: chrono::DateTime<chrono::Utc>,
    },
    /// A campaign stopped accepting votes.
    CampaignClosed {
        /// The campaign.
        campaign_id: CampaignId,
        /// Why it closed.
        reason: CloseReason,
    },
    /// A decision was computed for a closed campaign.
    DecisionReached {
        /// The campaign.
        campaign_id: CampaignId,
        /// The outcome.
        outcome: TallyOutcome,
        /// Participation at close.
        participation_rate: f64,
    },
}

/// Errors a notification sink may report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotifyError {
    /// Delivery failed.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// The notification sink boundary.
pub trait Notifier: Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Delivery`] on failure; the engine logs and
    /// discards the error.
    fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// A sink that drops every event. Useful for tooling and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &NotificationEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}
