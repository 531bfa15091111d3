//! Property tests: revision ceiling, history completeness, tally
//! determinism.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use urna_core::campaign::{Campaign, CampaignOrigin, CampaignType, VotingWindow};
use urna_core::clock::ManualClock;
use urna_core::crypto::IntegrityCodec;
use urna_core::ids::{AnonymousId, EmployeeRef, VoterRef};
use urna_core::ledger::{CastRequest, LedgerError, VoteDecision, VoteLedger, VoteRecord};
use urna_core::registry::Candidate;
use urna_core::storage::{
    CampaignStore, CandidateStore, HistoryStore, SqliteStore, VoteStore,
};
use urna_core::tally::TallyEngine;

fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn decision_strategy() -> impl Strategy<Value = VoteDecision> {
    prop_oneof![
        Just(VoteDecision::Agree),
        Just(VoteDecision::Disagree),
        Just(VoteDecision::Abstain),
    ]
}

/// Builds an active single-candidate campaign over an in-memory store.
fn active_campaign(store: &SqliteStore, voters: usize) -> Campaign {
    let window = VotingWindow::new(start_time(), start_time() + Duration::days(7)).unwrap();
    let mut campaign = Campaign::new(
        "Review",
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
    store
        .insert_candidate(&Candidate {
            campaign_id: campaign.id,
            anonymous_id: AnonymousId::from("CANDIDATE_A_001"),
            real_employee: EmployeeRef::from("emp-1"),
            minted_at: start_time(),
        })
        .unwrap();
    let snapshot: HashSet<VoterRef> = (0..voters).map(|i| VoterRef::new(format!("v{i}"))).collect();
    campaign.activate(snapshot, 1).unwrap();
    store.update_campaign(&campaign).unwrap();
    campaign
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// However many times a voter tries to write, the sequence number
    /// never exceeds 2, at most 3 writes succeed, and the history row
    /// count always equals the final sequence number.
    #[test]
    fn ceiling_and_history_hold_for_any_write_pattern(
        decisions in prop::collection::vec(decision_strategy(), 1..8)
    ) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let campaign = active_campaign(&store, 3);
        let clock = Arc::new(ManualClock::new(start_time() + Duration::hours(1)));
        let ledger = VoteLedger::new(store.clone(), Arc::new(IntegrityCodec::sha256()), clock);
        let voter = VoterRef::from("v0");

        let mut successes = 0u32;
        for decision in decisions {
            let request = CastRequest::new(AnonymousId::from("CANDIDATE_A_001"), decision);
            match ledger.cast_vote(&campaign, &voter, request) {
                Ok(record) => {
                    successes += 1;
                    prop_assert!(record.sequence_number <= 2);
                    ledger.verify_record(&record).unwrap();
                }
                Err(LedgerError::ModificationLimitExceeded { .. }) => {
                    prop_assert!(successes >= 3);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
        }
        prop_assert!(successes <= 3);

        let record = store.vote(campaign.id, &voter).unwrap().unwrap();
        let history = store.history_for_vote(campaign.id, &voter).unwrap();
        prop_assert_eq!(record.sequence_number as usize, history.len());
        prop_assert_eq!(record.sequence_number + 1, successes);
    }

    /// Tallying a fixed record set twice produces identical results.
    #[test]
    fn tally_is_deterministic_over_random_votes(
        decisions in prop::collection::vec(decision_strategy(), 0..20)
    ) {
        let window = VotingWindow::new(start_time(), start_time() + Duration::days(7)).unwrap();
        let mut campaign = Campaign::new(
            "Review",
            CampaignType::PromotionRequest,
            EmployeeRef::from("emp-1"),
            "a",
            "b",
            window,
            0.6,
            CampaignOrigin::Manual,
            start_time(),
        )
        .unwrap();
        let snapshot: HashSet<VoterRef> = (0..20).map(|i| VoterRef::new(format!("v{i}"))).collect();
        campaign.activate(snapshot, 1).unwrap();
        campaign.close().unwrap();

        let votes: Vec<VoteRecord> = decisions
            .iter()
            .enumerate()
            .map(|(i, decision)| VoteRecord {
                campaign_id: campaign.id,
                voter: VoterRef::new(format!("v{i}")),
                candidate: AnonymousId::from("CANDIDATE_A_001"),
                decision: *decision,
                weight: 1.0,
                sequence_number: 0,
                salt: [0u8; 16],
                integrity_hash: [0u8; 32],
                finalized: true,
                anomaly: None,
                cast_at: start_time(),
                updated_at: start_time(),
            })
            .collect();

        let engine = TallyEngine::new(0.5);
        let first = engine.tally(&campaign, &votes).unwrap();
        let second = engine.tally(&campaign, &votes).unwrap();
        prop_assert_eq!(first, second);
    }

    /// A commitment verifies for the fields it was computed over and
    /// fails for any altered decision.
    #[test]
    fn commitments_bind_the_decision(
        voter in "[a-z0-9]{1,16}",
        candidate in "CANDIDATE_[ABC]_[0-9]{3}",
        decision in decision_strategy(),
    ) {
        let codec = IntegrityCodec::sha256();
        let store = SqliteStore::in_memory().unwrap();
        let campaign = active_campaign(&store, 1);
        let salt = IntegrityCodec::generate_salt();

        let voter = VoterRef::new(voter);
        let candidate = AnonymousId::new(candidate);
        let record = VoteRecord {
            campaign_id: campaign.id,
            voter,
            candidate,
            decision,
            weight: 1.0,
            sequence_number: 0,
            salt,
            integrity_hash: [0u8; 32],
            finalized: false,
            anomaly: None,
            cast_at: start_time(),
            updated_at: start_time(),
        };
        let commitment = codec.commit(&record.commitment_input());
        prop_assert!(codec.verify(&record.commitment_input(), &commitment).is_ok());

        for other in [VoteDecision::Agree, VoteDecision::Disagree, VoteDecision::Abstain] {
            if other != decision {
                let mut tampered = record.clone();
                tampered.decision = other;
                prop_assert!(
                    codec.verify(&tampered.commitment_input(), &commitment).is_err()
                );
            }
        }
    }
}
