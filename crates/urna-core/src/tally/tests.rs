//! Tests for tally computation.

use std::collections::HashSet;

use chrono::{Duration, TimeZone, Utc};

use super::*;
use crate::campaign::{CampaignOrigin, CampaignType, VotingWindow};
use crate::ids::{EmployeeRef, VoterRef};

fn closed_campaign(eligible: usize, pass_percentage: f64) -> Campaign {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let window = VotingWindow::new(now, now + Duration::days(7)).unwrap();
    let mut campaign = Campaign::new(
        "Review",
        CampaignType::PromotionRequest,
        EmployeeRef::from("emp-1"),
        "Engineer II",
        "Engineer III",
        window,
        pass_percentage,
        CampaignOrigin::Manual,
        now,
    )
    .unwrap();
    let voters: HashSet<VoterRef> = (0..eligible)
        .map(|i| VoterRef::new(format!("v{i}")))
        .collect();
    campaign.activate(voters, 1).unwrap();
    campaign.close().unwrap();
    campaign
}

fn vote(campaign: &Campaign, voter: &str, candidate: &str, decision: VoteDecision) -> VoteRecord {
    VoteRecord {
        campaign_id: campaign.id,
        voter: VoterRef::from(voter),
        candidate: candidate.into(),
        decision,
        weight: 1.0,
        sequence_number: 0,
        salt: [0u8; 16],
        integrity_hash: [0u8; 32],
        finalized: true,
        anomaly: None,
        cast_at: campaign.created_at,
        updated_at: campaign.created_at,
    }
}

#[test]
fn quorum_met_and_threshold_met_passes() {
    // 10 eligible, 6 cast: 4 agree, 1 disagree, 1 abstain.
    // participation 0.6 >= 0.5; agree ratio 4/5 = 0.8 >= 0.6.
    let campaign = closed_campaign(10, 0.6);
    let votes: Vec<VoteRecord> = [
        ("v0", VoteDecision::Agree),
        ("v1", VoteDecision::Agree),
        ("v2", VoteDecision::Agree),
        ("v3", VoteDecision::Agree),
        ("v4", VoteDecision::Disagree),
        ("v5", VoteDecision::Abstain),
    ]
    .into_iter()
    .map(|(v, d)| vote(&campaign, v, "CANDIDATE_A_001", d))
    .collect();

    let result = TallyEngine::new(0.5).tally(&campaign, &votes).unwrap();
    assert_eq!(result.outcome, TallyOutcome::Passed);
    assert_eq!(result.total_cast, 6);
    assert_eq!(result.total_eligible_voters, 10);
    assert!((result.participation_rate - 0.6).abs() < f64::EPSILON);
    assert_eq!(
        result.leading_candidate.as_ref().map(|c| c.as_str()),
        Some("CANDIDATE_A_001")
    );
}

#[test]
fn below_quorum_is_no_quorum_regardless_of_ratio() {
    // Only 3 of 10 cast, all agreeing: 0.3 < 0.5 floor.
    let campaign = closed_campaign(10, 0.6);
    let votes: Vec<VoteRecord> = ["v0", "v1", "v2"]
        .into_iter()
        .map(|v| vote(&campaign, v, "CANDIDATE_A_001", VoteDecision::Agree))
        .collect();

    let result = TallyEngine::new(0.5).tally(&campaign, &votes).unwrap();
    assert_eq!(result.outcome, TallyOutcome::NoQuorum);
}

#[test]
fn abstain_counts_toward_participation_only() {
    // 5 of 10 cast: quorum met at 0.5. One agree, one disagree, three
    // abstain: ratio is 1/2, not 1/5.
    let campaign = closed_campaign(10, 0.5);
    let votes: Vec<VoteRecord> = [
        ("v0", VoteDecision::Agree),
        ("v1", VoteDecision::Disagree),
        ("v2", VoteDecision::Abstain),
        ("v3", VoteDecision::Abstain),
        ("v4", VoteDecision::Abstain),
    ]
    .into_iter()
    .map(|(v, d)| vote(&campaign, v, "CANDIDATE_A_001", d))
    .collect();

    let result = TallyEngine::new(0.5).tally(&campaign, &votes).unwrap();
    assert_eq!(result.outcome, TallyOutcome::Passed);
    let tally = &result.candidates[0];
    assert_eq!(tally.approval_ratio(), Some(0.5));
    assert!((tally.abstain - 3.0).abs() < f64::EPSILON);
}

#[test]
fn tally_on_active_campaign_is_refused() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let window = VotingWindow::new(now, now + Duration::days(7)).unwrap();
    let mut campaign = Campaign::new(
        "Review",
        CampaignType::PromotionRequest,
        EmployeeRef::from("emp-1"),
        "a",
        "b",
        window,
        0.6,
        CampaignOrigin::Manual,
        now,
    )
    .unwrap();
    campaign
        .activate([VoterRef::from("v0")].into_iter().collect(), 1)
        .unwrap();

    let err = TallyEngine::new(0.5).tally(&campaign, &[]).unwrap_err();
    assert!(matches!(err, TallyError::CampaignStillActive { .. }));
}

#[test]
fn tied_lead_fails() {
    let campaign = closed_campaign(4, 0.5);
    let votes = vec![
        vote(&campaign, "v0", "CANDIDATE_A_001", VoteDecision::Agree),
        vote(&campaign, "v1", "CANDIDATE_A_002", VoteDecision::Agree),
    ];

    let result = TallyEngine::new(0.5).tally(&campaign, &votes).unwrap();
    assert_eq!(result.leading_candidate, None);
    assert_eq!(result.outcome, TallyOutcome::Failed);
}

#[test]
fn sole_leader_among_many_is_measured() {
    let campaign = closed_campaign(4, 0.5);
    let votes = vec![
        vote(&campaign, "v0", "CANDIDATE_A_001", VoteDecision::Agree),
        vote(&campaign, "v1", "CANDIDATE_A_001", VoteDecision::Agree),
        vote(&campaign, "v2", "CANDIDATE_A_002", VoteDecision::Agree),
        vote(&campaign, "v3", "CANDIDATE_A_002", VoteDecision::Disagree),
    ];

    let result = TallyEngine::new(0.5).tally(&campaign, &votes).unwrap();
    assert_eq!(
        result.leading_candidate.as_ref().map(|c| c.as_str()),
        Some("CANDIDATE_A_001")
    );
    // Leader's own ratio is 2/2 = 1.0.
    assert_eq!(result.outcome, TallyOutcome::Passed);
}

#[test]
fn weighted_votes_shift_the_ratio() {
    let campaign = closed_campaign(4, 0.75);
    let mut heavy = vote(&campaign, "v0", "CANDIDATE_A_001", VoteDecision::Agree);
    heavy.weight = 3.0;
    let votes = vec![
        heavy,
        vote(&campaign, "v1", "CANDIDATE_A_001", VoteDecision::Disagree),
    ];

    let result = TallyEngine::new(0.5).tally(&campaign, &votes).unwrap();
    // 3.0 / 4.0 = 0.75 meets the threshold exactly.
    assert_eq!(result.outcome, TallyOutcome::Passed);
}

#[test]
fn all_abstain_fails_rather_than_passes() {
    let campaign = closed_campaign(2, 0.5);
    let votes = vec![
        vote(&campaign, "v0", "CANDIDATE_A_001", VoteDecision::Abstain),
        vote(&campaign, "v1", "CANDIDATE_A_001", VoteDecision::Abstain),
    ];

    let result = TallyEngine::new(0.5).tally(&campaign, &votes).unwrap();
    assert_eq!(result.outcome, TallyOutcome::Failed);
}

#[test]
fn tally_is_deterministic() {
    let campaign = closed_campaign(10, 0.6);
    let votes: Vec<VoteRecord> = (0..7)
        .map(|i| {
            let decision = match i % 3 {
                0 => VoteDecision::Agree,
                1 => VoteDecision::Disagree,
                _ => VoteDecision::Abstain,
            };
            vote(&campaign, &format!("v{i}"), "CANDIDATE_A_001", decision)
        })
        .collect();

    let engine = TallyEngine::new(0.5);
    let first = engine.tally(&campaign, &votes).unwrap();
    let second = engine.tally(&campaign, &votes).unwrap();
    assert_eq!(first, second);
}
