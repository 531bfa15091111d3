//! Anonymous promotion/punishment voting engine.
//!
//! Decides employee promotions, probation conversions, and disciplinary
//! demotions through company-wide ballots while concealing who is being
//! voted on, and guarantees that a tampered or replayed vote record is
//! detectable.
//!
//! # Architecture
//!
//! - [`crypto`]: salted integrity commitments for vote records and hash
//!   chaining for the modification history
//! - [`registry`]: mints pseudonymous candidate ids
//!   (`CANDIDATE_A_001`) decoupled from employee records
//! - [`campaign`]: campaign entities and the
//!   `Draft → Active → Closed/Cancelled` state machine
//! - [`ledger`]: vote casting with a bounded revision ceiling and an
//!   append-only audit history
//! - [`trigger`]: rule evaluation over HR/attendance signals, opening
//!   campaigns without human initiation
//! - [`tally`]: decision computation with quorum floor and pass
//!   threshold
//! - [`engine`]: the facade wiring everything together
//! - [`storage`]: store traits plus the bundled `SQLite` backend
//! - [`audit`]: post-close history export and grant-gated identity
//!   resolution
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use urna_core::campaign::{CampaignType, VotingWindow};
//! use urna_core::clock::SystemClock;
//! use urna_core::config::EngineConfig;
//! use urna_core::crypto::IntegrityCodec;
//! use urna_core::engine::{NewCampaign, VotingEngine};
//! use urna_core::ids::EmployeeRef;
//! use urna_core::notify::NullNotifier;
//! use urna_core::signals::StaticRoster;
//! use urna_core::storage::SqliteStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::open("/var/lib/urna/votes.db")?);
//! let roster = Arc::new(StaticRoster::new().with_voter("voter-1"));
//! let engine = VotingEngine::new(
//!     store,
//!     Arc::new(IntegrityCodec::sha256()),
//!     Arc::new(SystemClock),
//!     roster,
//!     Arc::new(NullNotifier),
//!     EngineConfig::default(),
//! );
//!
//! let now = chrono::Utc::now();
//! let campaign = engine.create_campaign(NewCampaign {
//!     title: "Promotion review".into(),
//!     campaign_type: CampaignType::PromotionRequest,
//!     target_employee: EmployeeRef::from("emp-42"),
//!     current_position: "Engineer II".into(),
//!     target_position: "Engineer III".into(),
//!     window: VotingWindow::new(now, now + chrono::Duration::days(7))?,
//!     required_pass_percentage: None,
//! })?;
//! engine.mint_candidate(campaign.id, &EmployeeRef::from("emp-42"))?;
//! engine.activate_campaign(campaign.id)?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod campaign;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod ids;
pub mod ledger;
pub mod notify;
pub mod registry;
pub mod signals;
pub mod storage;
pub mod tally;
pub mod trigger;

pub use engine::{EngineError, NewCampaign, VotingEngine};
pub use ids::{AnonymousId, CampaignId, EmployeeRef, VoterRef};
