//! The vote ledger: per-voter vote records and their bounded revision
//! history.
//!
//! A voter gets exactly one current [`VoteRecord`] per campaign. The
//! record may be rewritten up to [`MAX_REVISIONS`] times after the
//! original cast; every rewrite appends a [`VoteModificationHistoryEntry`]
//! and recommits the record with a fresh salt. History rows are
//! append-only and hash-chained, so the revision trail for a vote is
//! complete or detectably broken, never silently short.
//!
//! The ledger operates exclusively on anonymous candidate ids; real
//! employee references never pass through here.

mod error;
mod history;
mod record;

#[allow(clippy::module_inception)]
mod ledger;

#[cfg(test)]
mod tests;

pub use error::LedgerError;
pub use history::{Provenance, VoteModificationHistoryEntry};
pub use ledger::{CastRequest, VoteLedger};
pub use record::{MAX_REVISIONS, VoteDecision, VoteRecord};
