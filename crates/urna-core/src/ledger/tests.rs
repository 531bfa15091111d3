//! Tests for vote casting and bounded revision.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use super::*;
use crate::campaign::{Campaign, CampaignOrigin, CampaignType, VotingWindow};
use crate::clock::{Clock, ManualClock};
use crate::crypto::IntegrityCodec;
use crate::ids::{AnonymousId, EmployeeRef, VoterRef};
use crate::registry::Candidate;
use crate::storage::{CampaignStore, CandidateStore, SqliteStore, StorageError, VoteStore};

struct Harness {
    store: Arc<SqliteStore>,
    clock: Arc<ManualClock>,
    ledger: VoteLedger<SqliteStore>,
    campaign: Campaign,
}

fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn harness() -> Harness {
    let store = Arc::new(SqliteStore::in_memory().expect("open in-memory store"));
    let clock = Arc::new(ManualClock::new(start_time() + Duration::hours(1)));
    let codec = Arc::new(IntegrityCodec::sha256());

    let window = VotingWindow::new(start_time(), start_time() + Duration::days(7)).unwrap();
    let mut campaign = Campaign::new(
        "Promotion review",
        CampaignType::PromotionRequest,
        EmployeeRef::from("emp-1"),
        "Engineer II",
        "Engineer III",
        window,
        0.6,
        CampaignOrigin::Manual,
        start_time(),
    )
    .unwrap();
    store.insert_campaign(&campaign).unwrap();

    for seq in 1..=2 {
        store
            .insert_candidate(&Candidate {
                campaign_id: campaign.id,
                anonymous_id: AnonymousId::new(format!("CANDIDATE_A_{seq:03}")),
                real_employee: EmployeeRef::new(format!("emp-{seq}")),
                minted_at: start_time(),
            })
            .unwrap();
    }

    let voters: HashSet<VoterRef> = (0..5).map(|i| VoterRef::new(format!("v{i}"))).collect();
    campaign.activate(voters, 2).unwrap();
    store.update_campaign(&campaign).unwrap();

    let ledger = VoteLedger::new(store.clone(), codec, clock.clone());
    Harness {
        store,
        clock,
        ledger,
        campaign,
    }
}

fn agree(candidate: &str) -> CastRequest {
    CastRequest::new(AnonymousId::from(candidate), VoteDecision::Agree)
}

fn request(candidate: &str, decision: VoteDecision) -> CastRequest {
    CastRequest::new(AnonymousId::from(candidate), decision)
}

#[test]
fn first_cast_creates_sequence_zero() {
    let h = harness();
    let voter = VoterRef::from("v0");

    let record = h
        .ledger
        .cast_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();

    assert_eq!(record.sequence_number, 0);
    assert!(!record.finalized);
    assert!((record.weight - 1.0).abs() < f64::EPSILON);
    assert_eq!(record.remaining_revisions(), MAX_REVISIONS);
    h.ledger.verify_record(&record).unwrap();

    // No history rows for an original cast.
    let history = crate::storage::HistoryStore::history_for_vote(
        h.store.as_ref(),
        h.campaign.id,
        &voter,
    )
    .unwrap();
    assert!(history.is_empty());
}

#[test]
fn casting_again_routes_to_revision() {
    let h = harness();
    let voter = VoterRef::from("v0");

    h.ledger
        .cast_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();
    let revised = h
        .ledger
        .cast_vote(
            &h.campaign,
            &voter,
            request("CANDIDATE_A_002", VoteDecision::Disagree),
        )
        .unwrap();

    assert_eq!(revised.sequence_number, 1);
    assert_eq!(revised.candidate.as_str(), "CANDIDATE_A_002");
    assert_eq!(revised.decision, VoteDecision::Disagree);
    h.ledger.verify_record(&revised).unwrap();
}

#[test]
fn revision_appends_history_with_old_and_new_values() {
    let h = harness();
    let voter = VoterRef::from("v0");

    h.ledger
        .cast_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();
    h.ledger
        .revise_vote(
            &h.campaign,
            &voter,
            CastRequest {
                candidate: AnonymousId::from("CANDIDATE_A_002"),
                decision: VoteDecision::Disagree,
                weight: None,
                reason: Some("changed my mind".to_owned()),
                provenance: Provenance {
                    ip_address: Some("10.0.0.7".to_owned()),
                    session_id: Some("sess-1".to_owned()),
                },
            },
        )
        .unwrap();

    let history = crate::storage::HistoryStore::history_for_vote(
        h.store.as_ref(),
        h.campaign.id,
        &voter,
    )
    .unwrap();
    assert_eq!(history.len(), 1);
    let entry = &history[0];
    assert_eq!(entry.modification_number, 1);
    assert_eq!(entry.old_decision, VoteDecision::Agree);
    assert_eq!(entry.new_decision, VoteDecision::Disagree);
    assert_eq!(entry.old_candidate.as_str(), "CANDIDATE_A_001");
    assert_eq!(entry.new_candidate.as_str(), "CANDIDATE_A_002");
    assert_eq!(entry.reason.as_deref(), Some("changed my mind"));
    assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.7"));
}

#[test]
fn fourth_write_hits_the_ceiling() {
    let h = harness();
    let voter = VoterRef::from("v0");

    // Cast, revise, revise: three writes in total.
    h.ledger
        .cast_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();
    h.ledger
        .revise_vote(
            &h.campaign,
            &voter,
            request("CANDIDATE_A_001", VoteDecision::Disagree),
        )
        .unwrap();
    let third = h
        .ledger
        .revise_vote(
            &h.campaign,
            &voter,
            request("CANDIDATE_A_001", VoteDecision::Abstain),
        )
        .unwrap();

    assert_eq!(third.sequence_number, MAX_REVISIONS);
    assert!(third.finalized);
    assert_eq!(third.remaining_revisions(), 0);

    // The fourth attempt fails and tells the voter nothing remains.
    let err = h
        .ledger
        .revise_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::ModificationLimitExceeded { .. }));
    assert!(err.to_string().contains("0 modifications remain"));

    // Exactly two history entries, numbered 1 and 2.
    let history = crate::storage::HistoryStore::history_for_vote(
        h.store.as_ref(),
        h.campaign.id,
        &voter,
    )
    .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].modification_number, 1);
    assert_eq!(history[1].modification_number, 2);
}

#[test]
fn history_count_always_equals_sequence_number() {
    let h = harness();
    let voter = VoterRef::from("v1");

    for (step, decision) in [
        VoteDecision::Agree,
        VoteDecision::Disagree,
        VoteDecision::Abstain,
    ]
    .into_iter()
    .enumerate()
    {
        h.ledger
            .cast_vote(&h.campaign, &voter, request("CANDIDATE_A_001", decision))
            .unwrap();
        let record = h
            .ledger
            .current_vote(h.campaign.id, &voter)
            .unwrap()
            .unwrap();
        let history = crate::storage::HistoryStore::history_for_vote(
            h.store.as_ref(),
            h.campaign.id,
            &voter,
        )
        .unwrap();
        assert_eq!(record.sequence_number as usize, step);
        assert_eq!(history.len(), step);
    }
}

#[test]
fn each_write_gets_a_fresh_salt_and_hash() {
    let h = harness();
    let voter = VoterRef::from("v0");

    let first = h
        .ledger
        .cast_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();
    let second = h
        .ledger
        .revise_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();

    assert_ne!(first.salt, second.salt);
    assert_ne!(first.integrity_hash, second.integrity_hash);
}

#[test]
fn ineligible_voter_is_rejected() {
    let h = harness();
    let err = h
        .ledger
        .cast_vote(&h.campaign, &VoterRef::from("outsider"), agree("CANDIDATE_A_001"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotEligible { .. }));
}

#[test]
fn unknown_candidate_is_rejected() {
    let h = harness();
    let err = h
        .ledger
        .cast_vote(&h.campaign, &VoterRef::from("v0"), agree("CANDIDATE_B_001"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnknownCandidate { .. }));
}

#[test]
fn voting_outside_the_window_names_the_bounds() {
    let h = harness();
    h.clock.set(start_time() + Duration::days(8));

    let err = h
        .ledger
        .cast_vote(&h.campaign, &VoterRef::from("v0"), agree("CANDIDATE_A_001"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::CampaignNotActive { .. }));
    let message = err.to_string();
    assert!(message.contains("2026-03-01"));
    assert!(message.contains("2026-03-08"));
}

#[test]
fn revising_a_nonexistent_vote_is_not_found() {
    let h = harness();
    let err = h
        .ledger
        .revise_vote(&h.campaign, &VoterRef::from("v0"), agree("CANDIDATE_A_001"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::VoteNotFound { .. }));
}

#[test]
fn tampered_record_fails_verification_on_read() {
    let h = harness();
    let voter = VoterRef::from("v0");
    h.ledger
        .cast_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();

    // Flip the stored decision without updating the hash.
    h.store.with_connection(|conn| {
        conn.execute(
            "UPDATE vote_records SET decision = 'disagree' WHERE voter = 'v0'",
            [],
        )
        .unwrap();
    });

    let err = h.ledger.current_vote(h.campaign.id, &voter).unwrap_err();
    assert!(matches!(err, LedgerError::IntegrityViolation { .. }));
}

#[test]
fn tampered_record_blocks_revision() {
    let h = harness();
    let voter = VoterRef::from("v0");
    h.ledger
        .cast_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();

    h.store.with_connection(|conn| {
        conn.execute(
            "UPDATE vote_records SET weight = 99.0 WHERE voter = 'v0'",
            [],
        )
        .unwrap();
    });

    // Weight is not committed, but candidate is; tamper with that too.
    h.store.with_connection(|conn| {
        conn.execute(
            "UPDATE vote_records SET candidate = 'CANDIDATE_A_002' WHERE voter = 'v0'",
            [],
        )
        .unwrap();
    });

    let err = h
        .ledger
        .revise_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::IntegrityViolation { .. }));
}

#[test]
fn history_gap_freezes_the_record() {
    let h = harness();
    let voter = VoterRef::from("v0");

    h.ledger
        .cast_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();
    h.ledger
        .revise_vote(
            &h.campaign,
            &voter,
            request("CANDIDATE_A_001", VoteDecision::Disagree),
        )
        .unwrap();

    // Erase the audit row out from under the record.
    h.store.with_connection(|conn| {
        conn.execute("DELETE FROM vote_modification_history", []).unwrap();
    });

    let err = h
        .ledger
        .revise_vote(
            &h.campaign,
            &voter,
            request("CANDIDATE_A_001", VoteDecision::Abstain),
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::HistoryAnomaly { .. }));

    // The record is frozen with the anomaly marker, not healed.
    let record = h
        .ledger
        .current_vote(h.campaign.id, &voter)
        .unwrap()
        .unwrap();
    assert!(record.finalized);
    assert!(record.anomaly.is_some());
    assert_eq!(record.sequence_number, 1);

    // And it stays refused.
    let err = h
        .ledger
        .revise_vote(
            &h.campaign,
            &voter,
            request("CANDIDATE_A_001", VoteDecision::Abstain),
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::HistoryAnomaly { .. }));
}

#[test]
fn stale_sequence_update_is_a_conflict() {
    let h = harness();
    let voter = VoterRef::from("v0");

    let first = h
        .ledger
        .cast_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();
    h.ledger
        .revise_vote(
            &h.campaign,
            &voter,
            request("CANDIDATE_A_001", VoteDecision::Disagree),
        )
        .unwrap();

    // A writer that still believes the sequence is 0 loses the CAS.
    let stale = VoteRecord {
        sequence_number: 1,
        ..first
    };
    let entry = VoteModificationHistoryEntry::new(
        stale.campaign_id,
        voter.clone(),
        1,
        VoteDecision::Agree,
        VoteDecision::Abstain,
        stale.candidate.clone(),
        stale.candidate.clone(),
        None,
        h.clock.now(),
        Provenance::default(),
        crate::crypto::GENESIS_PREV_HASH,
    );
    let err = h.store.update_vote(&stale, 0, &entry).unwrap_err();
    assert!(matches!(err, StorageError::SequenceConflict { expected: 0 }));

    // The losing write left no history row behind.
    let history = crate::storage::HistoryStore::history_for_vote(
        h.store.as_ref(),
        h.campaign.id,
        &voter,
    )
    .unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn finalized_votes_reject_further_writes() {
    let h = harness();
    let voter = VoterRef::from("v0");
    h.ledger
        .cast_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap();

    let finalized = h.ledger.finalize_campaign(h.campaign.id).unwrap();
    assert_eq!(finalized, 1);

    let err = h
        .ledger
        .revise_vote(&h.campaign, &voter, agree("CANDIDATE_A_001"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::CampaignNotActive { .. }));
}
