//! Tests for candidate minting.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use super::*;
use crate::campaign::{CampaignOrigin, CampaignType, VotingWindow};
use crate::ids::VoterRef;
use crate::storage::SqliteStore;

fn setup(campaign_type: CampaignType) -> (Arc<SqliteStore>, Campaign) {
    let store = Arc::new(SqliteStore::in_memory().expect("open in-memory store"));
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let window = VotingWindow::new(now, now + Duration::days(7)).unwrap();
    let campaign = Campaign::new(
        "Review",
        campaign_type,
        EmployeeRef::from("emp-1"),
        "Engineer II",
        "Engineer III",
        window,
        0.6,
        CampaignOrigin::Manual,
        now,
    )
    .unwrap();
    crate::storage::CampaignStore::insert_campaign(store.as_ref(), &campaign).unwrap();
    (store, campaign)
}

#[test]
fn minted_ids_use_bucket_letter_and_padded_sequence() {
    let (store, campaign) = setup(CampaignType::PromotionRequest);
    let registry = AnonymizationRegistry::new(store);
    let now = campaign.created_at;

    let first = registry
        .mint(&campaign, &EmployeeRef::from("emp-1"), now)
        .unwrap();
    let second = registry
        .mint(&campaign, &EmployeeRef::from("emp-2"), now)
        .unwrap();

    assert_eq!(first.anonymous_id.as_str(), "CANDIDATE_A_001");
    assert_eq!(second.anonymous_id.as_str(), "CANDIDATE_A_002");
}

#[test]
fn disciplinary_campaigns_use_bucket_b() {
    let (store, campaign) = setup(CampaignType::DisciplinaryDemotion);
    let registry = AnonymizationRegistry::new(store);

    let candidate = registry
        .mint(&campaign, &EmployeeRef::from("emp-9"), campaign.created_at)
        .unwrap();
    assert_eq!(candidate.anonymous_id.as_str(), "CANDIDATE_B_001");
}

#[test]
fn reminting_same_employee_is_rejected() {
    let (store, campaign) = setup(CampaignType::PromotionRequest);
    let registry = AnonymizationRegistry::new(store);
    let employee = EmployeeRef::from("emp-7");

    let first = registry.mint(&campaign, &employee, campaign.created_at).unwrap();
    let err = registry
        .mint(&campaign, &employee, campaign.created_at)
        .unwrap_err();
    match err {
        RegistryError::DuplicateCandidate { existing, .. } => {
            assert_eq!(existing, first.anonymous_id);
        }
        other => panic!("expected DuplicateCandidate, got {other:?}"),
    }
}

#[test]
fn minting_after_activation_is_rejected() {
    let (store, mut campaign) = setup(CampaignType::PromotionRequest);
    let registry = AnonymizationRegistry::new(store.clone());

    registry
        .mint(&campaign, &EmployeeRef::from("emp-1"), campaign.created_at)
        .unwrap();
    let voters: HashSet<VoterRef> = [VoterRef::from("v1")].into_iter().collect();
    campaign.activate(voters, 1).unwrap();

    let err = registry
        .mint(&campaign, &EmployeeRef::from("emp-2"), campaign.created_at)
        .unwrap_err();
    assert!(matches!(err, RegistryError::CampaignNotDraft { .. }));
}

#[test]
fn resolve_real_returns_the_minted_employee() {
    let (store, campaign) = setup(CampaignType::PromotionRequest);
    let registry = AnonymizationRegistry::new(store);
    let employee = EmployeeRef::from("emp-3");

    let candidate = registry.mint(&campaign, &employee, campaign.created_at).unwrap();
    let resolved = registry
        .resolve_real(campaign.id, &candidate.anonymous_id)
        .unwrap();
    assert_eq!(resolved, Some(employee));

    let missing = registry
        .resolve_real(campaign.id, &crate::ids::AnonymousId::from("CANDIDATE_A_999"))
        .unwrap();
    assert_eq!(missing, None);
}
