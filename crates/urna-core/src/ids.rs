//! Identifier newtypes shared across the engine.
//!
//! Employee and voter references are opaque: the engine never interprets
//! them, it only compares and stores them. Depending on deployment policy
//! the voter reference may itself already be a pseudonym.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(Uuid);

impl CampaignId {
    /// Generates a fresh random campaign id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a campaign id from its string form.
    ///
    /// # Errors
    ///
    /// Returns the underlying parse error if the input is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for CampaignId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque reference to a real employee record.
///
/// Never surfaced to voters; only the anonymization registry and the
/// post-close audit path may hold one next to an anonymous id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeRef(String);

impl EmployeeRef {
    /// Wraps an opaque employee reference.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EmployeeRef {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque reference to a voter identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterRef(String);

impl VoterRef {
    /// Wraps an opaque voter reference.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for VoterRef {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Pseudonymous candidate identifier, e.g. `CANDIDATE_A_001`.
///
/// Minted by the anonymization registry; the vote ledger and tally engine
/// operate exclusively on these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnonymousId(String);

impl AnonymousId {
    /// Wraps an already-minted anonymous id.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnonymousId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AnonymousId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
