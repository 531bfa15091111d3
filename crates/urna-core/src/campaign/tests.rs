//! Tests for the campaign state machine.

use std::collections::HashSet;

use chrono::{Duration, TimeZone, Utc};

use super::*;

fn base_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn draft_campaign(campaign_type: CampaignType) -> Campaign {
    let now = base_time();
    let window = VotingWindow::new(now, now + Duration::days(7)).unwrap();
    Campaign::new(
        "Quarterly review",
        campaign_type,
        EmployeeRef::from("emp-42"),
        "Engineer II",
        "Engineer III",
        window,
        0.6,
        CampaignOrigin::Manual,
        now,
    )
    .unwrap()
}

fn snapshot(voters: &[&str]) -> HashSet<VoterRef> {
    voters.iter().map(|v| VoterRef::from(*v)).collect()
}

#[test]
fn window_rejects_inverted_bounds() {
    let now = base_time();
    let err = VotingWindow::new(now, now).unwrap_err();
    assert!(matches!(err, CampaignError::InvalidWindow { .. }));
    assert!(VotingWindow::new(now + Duration::days(1), now).is_err());
}

#[test]
fn window_contains_is_half_open() {
    let now = base_time();
    let window = VotingWindow::new(now, now + Duration::days(1)).unwrap();
    assert!(window.contains(now));
    assert!(window.contains(now + Duration::hours(23)));
    assert!(!window.contains(now + Duration::days(1)));
    assert!(window.has_expired(now + Duration::days(1)));
    assert!(!window.has_expired(now + Duration::hours(23)));
}

#[test]
fn pass_percentage_must_be_in_range() {
    let now = base_time();
    let window = VotingWindow::new(now, now + Duration::days(1)).unwrap();
    for bad in [0.0, -0.1, 1.01] {
        let err = Campaign::new(
            "t",
            CampaignType::PromotionRequest,
            EmployeeRef::from("e"),
            "a",
            "b",
            window,
            bad,
            CampaignOrigin::Manual,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, CampaignError::InvalidPassPercentage { .. }));
    }
}

#[test]
fn activate_requires_voters_and_candidates() {
    let mut campaign = draft_campaign(CampaignType::PromotionRequest);

    let err = campaign.activate(HashSet::new(), 1).unwrap_err();
    assert!(matches!(
        err,
        CampaignError::NoEligibleVotersOrCandidates { candidates: 1, .. }
    ));

    let err = campaign.activate(snapshot(&["v1"]), 0).unwrap_err();
    assert!(matches!(
        err,
        CampaignError::NoEligibleVotersOrCandidates { candidates: 0, .. }
    ));

    campaign.activate(snapshot(&["v1", "v2"]), 1).unwrap();
    assert_eq!(campaign.status, CampaignStatus::Active);
    assert_eq!(campaign.eligible_voters.len(), 2);
}

#[test]
fn activate_twice_is_rejected() {
    let mut campaign = draft_campaign(CampaignType::PromotionRequest);
    campaign.activate(snapshot(&["v1"]), 1).unwrap();
    let err = campaign.activate(snapshot(&["v1"]), 1).unwrap_err();
    assert!(matches!(
        err,
        CampaignError::InvalidTransition {
            from: CampaignStatus::Active,
            to: CampaignStatus::Active,
        }
    ));
}

#[test]
fn close_only_from_active() {
    let mut campaign = draft_campaign(CampaignType::PromotionRequest);
    assert!(campaign.close().is_err());

    campaign.activate(snapshot(&["v1"]), 1).unwrap();
    campaign.close().unwrap();
    assert_eq!(campaign.status, CampaignStatus::Closed);

    // Closed is terminal.
    assert!(campaign.close().is_err());
    assert!(campaign
        .cancel(0, &CancelAuthority::Standard)
        .is_err());
}

#[test]
fn draft_cancellation_is_unconditional() {
    let mut campaign = draft_campaign(CampaignType::DisciplinaryDemotion);
    campaign.cancel(0, &CancelAuthority::Standard).unwrap();
    assert_eq!(campaign.status, CampaignStatus::Cancelled);
}

#[test]
fn active_cancellation_blocked_after_votes() {
    let mut campaign = draft_campaign(CampaignType::PromotionRequest);
    campaign.activate(snapshot(&["v1"]), 1).unwrap();

    let err = campaign.cancel(3, &CancelAuthority::Standard).unwrap_err();
    assert!(matches!(
        err,
        CampaignError::CancellationAfterVotes { votes_cast: 3, .. }
    ));

    campaign.cancel(0, &CancelAuthority::Standard).unwrap();
    assert_eq!(campaign.status, CampaignStatus::Cancelled);
}

#[test]
fn active_disciplinary_cancellation_needs_override() {
    let mut campaign = draft_campaign(CampaignType::DisciplinaryDemotion);
    campaign.activate(snapshot(&["v1"]), 1).unwrap();

    let err = campaign.cancel(0, &CancelAuthority::Standard).unwrap_err();
    assert!(matches!(err, CampaignError::CancellationRequiresOverride { .. }));

    campaign
        .cancel(
            5,
            &CancelAuthority::PrivilegedOverride {
                actor: "hr-director".to_owned(),
            },
        )
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Cancelled);
}

#[test]
fn bucket_letters_are_stable() {
    assert_eq!(CampaignType::PromotionRequest.bucket_letter(), 'A');
    assert_eq!(CampaignType::DisciplinaryDemotion.bucket_letter(), 'B');
    assert_eq!(CampaignType::ProbationConversion.bucket_letter(), 'C');
}

#[test]
fn status_string_roundtrip() {
    for status in [
        CampaignStatus::Draft,
        CampaignStatus::Active,
        CampaignStatus::Closed,
        CampaignStatus::Cancelled,
    ] {
        assert_eq!(CampaignStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(CampaignStatus::parse("unknown"), None);
}

#[test]
fn type_string_roundtrip() {
    for ty in [
        CampaignType::ProbationConversion,
        CampaignType::PromotionRequest,
        CampaignType::DisciplinaryDemotion,
    ] {
        assert_eq!(CampaignType::parse(ty.as_str()), Some(ty));
    }
}
