//! Boundaries to the external HR collaborators.
//!
//! The engine consumes eligibility, attendance, and HR signals through
//! these traits; the real implementations (org roster service, attendance
//! database) live outside this crate. [`StaticRoster`] is a fixed
//! in-memory implementation for tests and tooling.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{EmployeeRef, VoterRef};

/// A calendar month, as attendance statistics are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Month {
    /// Calendar year.
    pub year: i32,
    /// Month of year, 1-12.
    pub month: u32,
}

impl Month {
    /// The month containing `at`.
    #[must_use]
    pub fn containing(at: DateTime<Utc>) -> Self {
        use chrono::Datelike;
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// The month before this one.
    #[must_use]
    pub const fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Monthly attendance statistics for one employee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyAttendance {
    /// Number of late arrivals in the month.
    pub late_count: u32,
    /// Total minutes late across the month.
    pub late_minutes: u32,
}

/// A promotion proposal from the external HR signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionProposal {
    /// The position the proposal would move the employee to.
    pub target_position: String,
    /// The HR-side rationale, carried into the campaign justification.
    pub rationale: String,
}

/// Errors from signal sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SignalError {
    /// The source has no data for the employee.
    #[error("no signal data for employee {employee}")]
    UnknownEmployee {
        /// The employee the query named.
        employee: EmployeeRef,
    },

    /// The source itself failed.
    #[error("signal source unavailable: {0}")]
    Unavailable(String),
}

/// Source of the voter eligibility snapshot.
pub trait EligibilitySource: Send + Sync {
    /// The set of voters eligible as of `as_of`. Snapshotted once at
    /// campaign activation.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is unavailable.
    fn eligible_voters(&self, as_of: DateTime<Utc>) -> Result<HashSet<VoterRef>, SignalError>;
}

/// Source of attendance statistics and tenure.
pub trait AttendanceSource: Send + Sync {
    /// Monthly attendance statistics for an employee.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::UnknownEmployee`] for employees the source
    /// does not track.
    fn monthly_stats(
        &self,
        employee: &EmployeeRef,
        month: Month,
    ) -> Result<MonthlyAttendance, SignalError>;

    /// Days of tenure for an employee.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::UnknownEmployee`] for employees the source
    /// does not track.
    fn tenure_days(&self, employee: &EmployeeRef) -> Result<u32, SignalError>;
}

/// Source of HR-side state: positions, disciplinary flags, promotion
/// proposals.
pub trait HrSource: Send + Sync {
    /// Current position label for an employee.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::UnknownEmployee`] for unknown employees.
    fn position(&self, employee: &EmployeeRef) -> Result<String, SignalError>;

    /// Whether the employee carries a disqualifying disciplinary flag.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::UnknownEmployee`] for unknown employees.
    fn disciplinary_flagged(&self, employee: &EmployeeRef) -> Result<bool, SignalError>;

    /// The pending promotion proposal for an employee, if HR has raised
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::UnknownEmployee`] for unknown employees.
    fn promotion_proposal(
        &self,
        employee: &EmployeeRef,
    ) -> Result<Option<PromotionProposal>, SignalError>;
}

/// A fixed in-memory roster implementing every signal trait.
#[derive(Debug, Default)]
pub struct StaticRoster {
    voters: HashSet<VoterRef>,
    positions: HashMap<EmployeeRef, String>,
    tenures: HashMap<EmployeeRef, u32>,
    attendance: HashMap<(EmployeeRef, Month), MonthlyAttendance>,
    flagged: HashSet<EmployeeRef>,
    proposals: HashMap<EmployeeRef, PromotionProposal>,
}

impl StaticRoster {
    /// An empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an eligible voter.
    #[must_use]
    pub fn with_voter(mut self, voter: impl Into<String>) -> Self {
        self.voters.insert(VoterRef::new(voter));
        self
    }

    /// Adds an employee with a position and tenure.
    #[must_use]
    pub fn with_employee(
        mut self,
        employee: impl Into<String>,
        position: impl Into<String>,
        tenure_days: u32,
    ) -> Self {
        let employee = EmployeeRef::new(employee);
        self.positions.insert(employee.clone(), position.into());
        self.tenures.insert(employee, tenure_days);
        self
    }

    /// Records attendance statistics for an employee and month.
    #[must_use]
    pub fn with_attendance(
        mut self,
        employee: impl Into<String>,
        month: Month,
        stats: MonthlyAttendance,
    ) -> Self {
        self.attendance.insert((EmployeeRef::new(employee), month), stats);
        self
    }

    /// Marks an employee as carrying a disciplinary flag.
    #[must_use]
    pub fn with_disciplinary_flag(mut self, employee: impl Into<String>) -> Self {
        self.flagged.insert(EmployeeRef::new(employee));
        self
    }

    /// Records a pending promotion proposal.
    #[must_use]
    pub fn with_promotion_proposal(
        mut self,
        employee: impl Into<String>,
        proposal: PromotionProposal,
    ) -> Self {
        self.proposals.insert(EmployeeRef::new(employee), proposal);
        self
    }

    fn known(&self, employee: &EmployeeRef) -> Result<(), SignalError> {
        if self.positions.contains_key(employee) {
            Ok(())
        } else {
            Err(SignalError::UnknownEmployee {
                employee: employee.clone(),
            })
        }
    }
}

impl EligibilitySource for StaticRoster {
    fn eligible_voters(&self, _as_of: DateTime<Utc>) -> Result<HashSet<VoterRef>, SignalError> {
        Ok(self.voters.clone())
    }
}

impl AttendanceSource for StaticRoster {
    fn monthly_stats(
        &self,
        employee: &EmployeeRef,
        month: Month,
    ) -> Result<MonthlyAttendance, SignalError> {
        self.known(employee)?;
        Ok(self
            .attendance
            .get(&(employee.clone(), month))
            .copied()
            .unwrap_or_default())
    }

    fn tenure_days(&self, employee: &EmployeeRef) -> Result<u32, SignalError> {
        self.tenures
            .get(employee)
            .copied()
            .ok_or_else(|| SignalError::UnknownEmployee {
                employee: employee.clone(),
            })
    }
}

impl HrSource for StaticRoster {
    fn position(&self, employee: &EmployeeRef) -> Result<String, SignalError> {
        self.positions
            .get(employee)
            .cloned()
            .ok_or_else(|| SignalError::UnknownEmployee {
                employee: employee.clone(),
            })
    }

    fn disciplinary_flagged(&self, employee: &EmployeeRef) -> Result<bool, SignalError> {
        self.known(employee)?;
        Ok(self.flagged.contains(employee))
    }

    fn promotion_proposal(
        &self,
        employee: &EmployeeRef,
    ) -> Result<Option<PromotionProposal>, SignalError> {
        self.known(employee)?;
        Ok(self.proposals.get(employee).cloned())
    }
}
