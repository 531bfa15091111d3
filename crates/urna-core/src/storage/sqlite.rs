//! `SQLite`-backed store implementation.
//!
//! Uses WAL mode for concurrent reads while a write is in progress. The
//! schema is embedded at compile time and applied idempotently at open;
//! the `schema_version` table records the installed revision.

// SQLite returns i64 for row counts; they're always non-negative here.
// Mutex poisoning indicates a panic in another thread, which is
// unrecoverable; the inner connection is still consistent.
#![allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};

use super::{CampaignStore, CandidateStore, HistoryStore, StorageError, VoteStore};
use crate::campaign::{Campaign, CampaignOrigin, CampaignStatus, CampaignType, VotingWindow};
use crate::ids::{AnonymousId, CampaignId, EmployeeRef, VoterRef};
use crate::ledger::{VoteDecision, VoteModificationHistoryEntry, VoteRecord};
use crate::registry::Candidate;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// The transactional store backing every engine trait.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates a store at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(backend)?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(SCHEMA_SQL).map_err(backend)
    }

    /// Installed schema version.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        let conn = self.lock();
        conn.query_row("SELECT version FROM schema_version", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|v| v as u32)
        .map_err(backend)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&self.lock())
    }
}

fn backend(err: rusqlite::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn decode_time(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp {s:?}: {e}")))
}

fn decode_campaign_id(s: &str) -> Result<CampaignId, StorageError> {
    CampaignId::parse(s).map_err(|e| StorageError::Serialization(format!("bad campaign id: {e}")))
}

fn decode_hash<const N: usize>(bytes: Vec<u8>) -> Result<[u8; N], StorageError> {
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| StorageError::Serialization(format!("expected {N}-byte blob, got {len}")))
}

fn campaign_from_row(row: &Row<'_>) -> Result<Campaign, StorageError> {
    let get = |idx: usize| -> Result<String, StorageError> {
        row.get::<_, String>(idx).map_err(backend)
    };

    let id = decode_campaign_id(&get(0)?)?;
    let campaign_type = CampaignType::parse(&get(2)?)
        .ok_or_else(|| StorageError::Serialization("unknown campaign type".into()))?;
    let status = CampaignStatus::parse(&get(10)?)
        .ok_or_else(|| StorageError::Serialization("unknown campaign status".into()))?;
    let origin: CampaignOrigin = serde_json::from_str(&get(9)?)
        .map_err(|e| StorageError::Serialization(format!("bad origin: {e}")))?;
    let eligible_voters: HashSet<VoterRef> = serde_json::from_str(&get(11)?)
        .map_err(|e| StorageError::Serialization(format!("bad eligibility snapshot: {e}")))?;

    Ok(Campaign {
        id,
        title: get(1)?,
        campaign_type,
        target_employee: EmployeeRef::new(get(3)?),
        current_position: get(4)?,
        target_position: get(5)?,
        window: VotingWindow {
            start: decode_time(&get(6)?)?,
            end: decode_time(&get(7)?)?,
        },
        required_pass_percentage: row.get::<_, f64>(8).map_err(backend)?,
        origin,
        status,
        eligible_voters,
        created_at: decode_time(&get(12)?)?,
    })
}

const CAMPAIGN_COLUMNS: &str = "id, title, campaign_type, target_employee, current_position, \
     target_position, window_start, window_end, required_pass_percentage, origin, status, \
     eligible_voters, created_at";

impl CampaignStore for SqliteStore {
    fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StorageError> {
        let origin = serde_json::to_string(&campaign.origin)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let voters = serde_json::to_string(&campaign.eligible_voters)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let conn = self.lock();
        conn.execute(
            "INSERT INTO campaigns (id, title, campaign_type, target_employee, current_position, \
             target_position, window_start, window_end, required_pass_percentage, origin, status, \
             eligible_voters, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                campaign.id.to_string(),
                campaign.title,
                campaign.campaign_type.as_str(),
                campaign.target_employee.as_str(),
                campaign.current_position,
                campaign.target_position,
                encode_time(campaign.window.start),
                encode_time(campaign.window.end),
                campaign.required_pass_percentage,
                origin,
                campaign.status.as_str(),
                voters,
                encode_time(campaign.created_at),
            ],
        )
        .map_err(|err| {
            if is_unique_violation(&err) {
                StorageError::Duplicate {
                    entity: "campaign",
                    key: format!(
                        "{}/{}",
                        campaign.target_employee, campaign.campaign_type
                    ),
                }
            } else {
                backend(err)
            }
        })?;
        Ok(())
    }

    fn update_campaign(&self, campaign: &Campaign) -> Result<(), StorageError> {
        let origin = serde_json::to_string(&campaign.origin)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let voters = serde_json::to_string(&campaign.eligible_voters)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let conn = self.lock();
        let changed = conn
            .execute(
                "UPDATE campaigns SET title = ?2, campaign_type = ?3, target_employee = ?4, \
                 current_position = ?5, target_position = ?6, window_start = ?7, window_end = ?8, \
                 required_pass_percentage = ?9, origin = ?10, status = ?11, eligible_voters = ?12, \
                 created_at = ?13
                 WHERE id = ?1",
                params![
                    campaign.id.to_string(),
                    campaign.title,
                    campaign.campaign_type.as_str(),
                    campaign.target_employee.as_str(),
                    campaign.current_position,
                    campaign.target_position,
                    encode_time(campaign.window.start),
                    encode_time(campaign.window.end),
                    campaign.required_pass_percentage,
                    origin,
                    campaign.status.as_str(),
                    voters,
                    encode_time(campaign.created_at),
                ],
            )
            .map_err(backend)?;
        if changed == 0 {
            return Err(StorageError::NotFound {
                entity: "campaign",
                key: campaign.id.to_string(),
            });
        }
        Ok(())
    }

    fn campaign(&self, id: CampaignId) -> Result<Option<Campaign>, StorageError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id.to_string()],
                |row| Ok(campaign_from_row(row)),
            )
            .optional()
            .map_err(backend)?;
        row.transpose()
    }

    fn find_open_campaign(
        &self,
        employee: &EmployeeRef,
        campaign_type: CampaignType,
    ) -> Result<Option<Campaign>, StorageError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                     WHERE target_employee = ?1 AND campaign_type = ?2
                       AND status IN ('draft', 'active')"
                ),
                params![employee.as_str(), campaign_type.as_str()],
                |row| Ok(campaign_from_row(row)),
            )
            .optional()
            .map_err(backend)?;
        row.transpose()
    }

    fn campaigns_by_status(&self, status: CampaignStatus) -> Result<Vec<Campaign>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE status = ?1 ORDER BY created_at"
            ))
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![status.as_str()], |row| Ok(campaign_from_row(row)))
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        rows.into_iter().collect()
    }
}

impl CandidateStore for SqliteStore {
    fn insert_candidate(&self, candidate: &Candidate) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO candidates (campaign_id, anonymous_id, real_employee, minted_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                candidate.campaign_id.to_string(),
                candidate.anonymous_id.as_str(),
                candidate.real_employee.as_str(),
                encode_time(candidate.minted_at),
            ],
        )
        .map_err(|err| {
            if is_unique_violation(&err) {
                StorageError::Duplicate {
                    entity: "candidate",
                    key: format!("{}/{}", candidate.campaign_id, candidate.real_employee),
                }
            } else {
                backend(err)
            }
        })?;
        Ok(())
    }

    fn candidates_for_campaign(&self, id: CampaignId) -> Result<Vec<Candidate>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT campaign_id, anonymous_id, real_employee, minted_at
                 FROM candidates WHERE campaign_id = ?1 ORDER BY anonymous_id",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;

        rows.into_iter()
            .map(|(campaign_id, anonymous_id, real_employee, minted_at)| {
                Ok(Candidate {
                    campaign_id: decode_campaign_id(&campaign_id)?,
                    anonymous_id: AnonymousId::new(anonymous_id),
                    real_employee: EmployeeRef::new(real_employee),
                    minted_at: decode_time(&minted_at)?,
                })
            })
            .collect()
    }

    fn candidate_count(&self, id: CampaignId) -> Result<usize, StorageError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM candidates WHERE campaign_id = ?1",
            params![id.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as usize)
        .map_err(backend)
    }

    fn candidate_by_anonymous_id(
        &self,
        id: CampaignId,
        anonymous_id: &AnonymousId,
    ) -> Result<Option<Candidate>, StorageError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT campaign_id, anonymous_id, real_employee, minted_at
                 FROM candidates WHERE campaign_id = ?1 AND anonymous_id = ?2",
                params![id.to_string(), anonymous_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(backend)?;

        row.map(|(campaign_id, anonymous_id, real_employee, minted_at)| {
            Ok(Candidate {
                campaign_id: decode_campaign_id(&campaign_id)?,
                anonymous_id: AnonymousId::new(anonymous_id),
                real_employee: EmployeeRef::new(real_employee),
                minted_at: decode_time(&minted_at)?,
            })
        })
        .transpose()
    }
}

fn vote_from_row(row: &Row<'_>) -> Result<VoteRecord, StorageError> {
    let decision_str: String = row.get(3).map_err(backend)?;
    let decision = VoteDecision::parse(&decision_str)
        .ok_or_else(|| StorageError::Serialization(format!("unknown decision {decision_str:?}")))?;

    Ok(VoteRecord {
        campaign_id: decode_campaign_id(&row.get::<_, String>(0).map_err(backend)?)?,
        voter: VoterRef::new(row.get::<_, String>(1).map_err(backend)?),
        candidate: AnonymousId::new(row.get::<_, String>(2).map_err(backend)?),
        decision,
        weight: row.get(4).map_err(backend)?,
        sequence_number: row.get::<_, i64>(5).map_err(backend)? as u32,
        salt: decode_hash(row.get::<_, Vec<u8>>(6).map_err(backend)?)?,
        integrity_hash: decode_hash(row.get::<_, Vec<u8>>(7).map_err(backend)?)?,
        finalized: row.get::<_, i64>(8).map_err(backend)? != 0,
        anomaly: row.get(9).map_err(backend)?,
        cast_at: decode_time(&row.get::<_, String>(10).map_err(backend)?)?,
        updated_at: decode_time(&row.get::<_, String>(11).map_err(backend)?)?,
    })
}

const VOTE_COLUMNS: &str = "campaign_id, voter, candidate, decision, weight, sequence_number, \
     salt, integrity_hash, finalized, anomaly, cast_at, updated_at";

const HISTORY_INSERT: &str = "INSERT INTO vote_modification_history (campaign_id, voter, \
     modification_number, old_decision, new_decision, old_candidate, new_candidate, reason, \
     modified_at, ip_address, session_id, prev_hash, entry_hash)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

impl VoteStore for SqliteStore {
    fn insert_vote(&self, record: &VoteRecord) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO vote_records (campaign_id, voter, candidate, decision, weight, \
             sequence_number, salt, integrity_hash, finalized, anomaly, cast_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.campaign_id.to_string(),
                record.voter.as_str(),
                record.candidate.as_str(),
                record.decision.as_str(),
                record.weight,
                record.sequence_number,
                record.salt.as_slice(),
                record.integrity_hash.as_slice(),
                record.finalized,
                record.anomaly,
                encode_time(record.cast_at),
                encode_time(record.updated_at),
            ],
        )
        .map_err(|err| {
            if is_unique_violation(&err) {
                StorageError::Duplicate {
                    entity: "vote_record",
                    key: format!("{}/{}", record.campaign_id, record.voter),
                }
            } else {
                backend(err)
            }
        })?;
        Ok(())
    }

    fn update_vote(
        &self,
        record: &VoteRecord,
        expected_sequence: u32,
        history: &VoteModificationHistoryEntry,
    ) -> Result<(), StorageError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(backend)?;

        // History first: the record update only commits together with its
        // audit row, and a concurrent revision that already claimed this
        // modification number trips the history uniqueness constraint.
        tx.execute(
            HISTORY_INSERT,
            params![
                history.campaign_id.to_string(),
                history.voter.as_str(),
                history.modification_number,
                history.old_decision.as_str(),
                history.new_decision.as_str(),
                history.old_candidate.as_str(),
                history.new_candidate.as_str(),
                history.reason,
                encode_time(history.modified_at),
                history.ip_address,
                history.session_id,
                history.prev_hash.as_slice(),
                history.entry_hash.as_slice(),
            ],
        )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StorageError::SequenceConflict {
                        expected: expected_sequence,
                    }
                } else {
                    backend(err)
                }
            })?;

        let changed = tx
            .execute(
                "UPDATE vote_records SET candidate = ?3, decision = ?4, weight = ?5, \
                 sequence_number = ?6, salt = ?7, integrity_hash = ?8, finalized = ?9, \
                 updated_at = ?10
                 WHERE campaign_id = ?1 AND voter = ?2 AND sequence_number = ?11 \
                   AND finalized = 0",
                params![
                    record.campaign_id.to_string(),
                    record.voter.as_str(),
                    record.candidate.as_str(),
                    record.decision.as_str(),
                    record.weight,
                    record.sequence_number,
                    record.salt.as_slice(),
                    record.integrity_hash.as_slice(),
                    record.finalized,
                    encode_time(record.updated_at),
                    expected_sequence,
                ],
            )
            .map_err(backend)?;

        if changed == 0 {
            // Rolls back the history insert with the transaction.
            return Err(StorageError::SequenceConflict {
                expected: expected_sequence,
            });
        }

        tx.commit().map_err(backend)
    }

    fn vote(
        &self,
        campaign: CampaignId,
        voter: &VoterRef,
    ) -> Result<Option<VoteRecord>, StorageError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {VOTE_COLUMNS} FROM vote_records
                     WHERE campaign_id = ?1 AND voter = ?2"
                ),
                params![campaign.to_string(), voter.as_str()],
                |row| Ok(vote_from_row(row)),
            )
            .optional()
            .map_err(backend)?;
        row.transpose()
    }

    fn votes_for_campaign(&self, campaign: CampaignId) -> Result<Vec<VoteRecord>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {VOTE_COLUMNS} FROM vote_records
                 WHERE campaign_id = ?1 ORDER BY voter"
            ))
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![campaign.to_string()], |row| Ok(vote_from_row(row)))
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        rows.into_iter().collect()
    }

    fn vote_count(&self, campaign: CampaignId) -> Result<u64, StorageError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM vote_records WHERE campaign_id = ?1",
            params![campaign.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as u64)
        .map_err(backend)
    }

    fn finalize_votes(&self, campaign: CampaignId) -> Result<u64, StorageError> {
        let conn = self.lock();
        let changed = conn
            .execute(
                "UPDATE vote_records SET finalized = 1
                 WHERE campaign_id = ?1 AND finalized = 0",
                params![campaign.to_string()],
            )
            .map_err(backend)?;
        Ok(changed as u64)
    }

    fn freeze_vote(
        &self,
        campaign: CampaignId,
        voter: &VoterRef,
        anomaly: &str,
    ) -> Result<(), StorageError> {
        let conn = self.lock();
        let changed = conn
            .execute(
                "UPDATE vote_records SET finalized = 1, anomaly = ?3
                 WHERE campaign_id = ?1 AND voter = ?2",
                params![campaign.to_string(), voter.as_str(), anomaly],
            )
            .map_err(backend)?;
        if changed == 0 {
            return Err(StorageError::NotFound {
                entity: "vote_record",
                key: format!("{campaign}/{voter}"),
            });
        }
        Ok(())
    }
}

fn history_from_row(row: &Row<'_>) -> Result<VoteModificationHistoryEntry, StorageError> {
    let decode_decision = |s: String| {
        VoteDecision::parse(&s)
            .ok_or_else(|| StorageError::Serialization(format!("unknown decision {s:?}")))
    };

    Ok(VoteModificationHistoryEntry {
        id: Some(row.get::<_, i64>(0).map_err(backend)? as u64),
        campaign_id: decode_campaign_id(&row.get::<_, String>(1).map_err(backend)?)?,
        voter: VoterRef::new(row.get::<_, String>(2).map_err(backend)?),
        modification_number: row.get::<_, i64>(3).map_err(backend)? as u32,
        old_decision: decode_decision(row.get(4).map_err(backend)?)?,
        new_decision: decode_decision(row.get(5).map_err(backend)?)?,
        old_candidate: AnonymousId::new(row.get::<_, String>(6).map_err(backend)?),
        new_candidate: AnonymousId::new(row.get::<_, String>(7).map_err(backend)?),
        reason: row.get(8).map_err(backend)?,
        modified_at: decode_time(&row.get::<_, String>(9).map_err(backend)?)?,
        ip_address: row.get(10).map_err(backend)?,
        session_id: row.get(11).map_err(backend)?,
        prev_hash: decode_hash(row.get::<_, Vec<u8>>(12).map_err(backend)?)?,
        entry_hash: decode_hash(row.get::<_, Vec<u8>>(13).map_err(backend)?)?,
    })
}

const HISTORY_COLUMNS: &str = "id, campaign_id, voter, modification_number, old_decision, \
     new_decision, old_candidate, new_candidate, reason, modified_at, ip_address, session_id, \
     prev_hash, entry_hash";

impl HistoryStore for SqliteStore {
    fn history_for_vote(
        &self,
        campaign: CampaignId,
        voter: &VoterRef,
    ) -> Result<Vec<VoteModificationHistoryEntry>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {HISTORY_COLUMNS} FROM vote_modification_history
                 WHERE campaign_id = ?1 AND voter = ?2 ORDER BY modification_number"
            ))
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![campaign.to_string(), voter.as_str()], |row| {
                Ok(history_from_row(row))
            })
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        rows.into_iter().collect()
    }

    fn history_for_campaign(
        &self,
        campaign: CampaignId,
    ) -> Result<Vec<VoteModificationHistoryEntry>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {HISTORY_COLUMNS} FROM vote_modification_history
                 WHERE campaign_id = ?1 ORDER BY voter, modification_number"
            ))
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![campaign.to_string()], |row| Ok(history_from_row(row)))
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        rows.into_iter().collect()
    }
}
