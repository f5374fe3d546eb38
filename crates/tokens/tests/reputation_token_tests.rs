//! Tests for the reputation token
//!
//! These cover the membership lifecycle, award/slash gating, and the derived
//! inactivity status.

use std::sync::Arc;

use coop_core::utils::{timestamp_secs, SECS_PER_MONTH};
use coop_core::{label_key, Address, Amount, MemoryStorage, Storage};
use coop_ledger::roles::labels;
use coop_ledger::{EventKind, EventLog, RoleRegistry};
use coop_tokens::{reasons, MemberStatus, ReputationToken, TokenError};

struct Env {
    sc: ReputationToken,
    events: Arc<EventLog>,
    manager: Address,
    awarder: Address,
    slasher: Address,
}

async fn setup() -> Env {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let events = Arc::new(EventLog::new(storage.clone()).await.unwrap());
    let admin = Address::new("admin");
    let roles = Arc::new(
        RoleRegistry::new(storage.clone(), events.clone(), admin.clone())
            .await
            .unwrap(),
    );

    let manager = Address::new("member-manager");
    let awarder = Address::new("awarder");
    let slasher = Address::new("slasher");
    roles
        .grant_role(&admin, &manager, labels::MEMBER_MANAGER)
        .await
        .unwrap();
    roles
        .grant_role(&admin, &awarder, labels::GOVERNANCE_AWARD)
        .await
        .unwrap();
    roles
        .grant_role(&admin, &slasher, labels::GOVERNANCE_SLASH)
        .await
        .unwrap();

    let sc = ReputationToken::new(storage, roles, events.clone())
        .await
        .unwrap();
    Env {
        sc,
        events,
        manager,
        awarder,
        slasher,
    }
}

#[tokio::test]
async fn test_add_member_is_idempotent() {
    let env = setup().await;
    let alice = Address::new("alice");

    env.sc.add_member(&env.manager, &alice).await.unwrap();
    env.sc.add_member(&env.manager, &alice).await.unwrap();

    let now = timestamp_secs();
    assert_eq!(env.sc.status_of_at(now, &alice).await, MemberStatus::Active);

    // Only one MemberAdded event was emitted
    let added = env
        .events
        .all_events()
        .await
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::MemberAdded { .. }))
        .count();
    assert_eq!(added, 1);
}

#[tokio::test]
async fn test_remove_member_revokes_but_keeps_balance() {
    let env = setup().await;
    let alice = Address::new("alice");
    env.sc.add_member(&env.manager, &alice).await.unwrap();
    env.sc
        .award(
            &env.awarder,
            &alice,
            Amount::from_whole(10),
            label_key(reasons::PURCHASE_REWARD),
            "a1".into(),
        )
        .await
        .unwrap();

    env.sc.remove_member(&env.manager, &alice).await.unwrap();

    let now = timestamp_secs();
    assert_eq!(env.sc.status_of_at(now, &alice).await, MemberStatus::Revoked);
    assert_eq!(env.sc.balance_of(&alice).await, Amount::from_whole(10));
    assert!(!env.sc.is_active_member(&alice).await);

    // Awards to a revoked member fail
    let result = env
        .sc
        .award(
            &env.awarder,
            &alice,
            Amount::from_whole(1),
            label_key(reasons::PURCHASE_REWARD),
            "a2".into(),
        )
        .await;
    assert!(matches!(result, Err(TokenError::NotMember(_))));
}

#[tokio::test]
async fn test_award_to_unknown_address_credits_without_membership() {
    let env = setup().await;
    let bob = Address::new("bob");

    env.sc
        .award(
            &env.awarder,
            &bob,
            Amount::from_whole(7),
            label_key(reasons::PURCHASE_REWARD),
            "a1".into(),
        )
        .await
        .unwrap();

    let now = timestamp_secs();
    assert_eq!(env.sc.balance_of(&bob).await, Amount::from_whole(7));
    assert_eq!(env.sc.status_of_at(now, &bob).await, MemberStatus::NotMember);
    assert!(!env.sc.is_active_member(&bob).await);

    // Joining later activates the record and keeps the earned balance
    env.sc.add_member(&env.manager, &bob).await.unwrap();
    assert_eq!(env.sc.balance_of(&bob).await, Amount::from_whole(7));
    assert!(env.sc.is_active_member(&bob).await);
}

#[tokio::test]
async fn test_award_requires_role_and_updates_activity() {
    let env = setup().await;
    let alice = Address::new("alice");
    env.sc.add_member(&env.manager, &alice).await.unwrap();

    let result = env
        .sc
        .award(
            &env.manager,
            &alice,
            Amount::from_whole(5),
            label_key(reasons::PURCHASE_REWARD),
            "a".into(),
        )
        .await;
    assert!(matches!(result, Err(TokenError::Ledger(_))));

    let t0 = 5_000_000;
    env.sc
        .apply_award_at(t0, &env.awarder, &alice, Amount::from_whole(5))
        .await
        .unwrap();
    assert_eq!(
        env.sc.time_since_last_activity_at(t0 + 100, &alice).await.unwrap(),
        100
    );
}

#[tokio::test]
async fn test_slash_clamps_at_zero() {
    let env = setup().await;
    let alice = Address::new("alice");
    env.sc.add_member(&env.manager, &alice).await.unwrap();
    env.sc
        .award(
            &env.awarder,
            &alice,
            Amount::from_whole(7),
            label_key(reasons::PURCHASE_REWARD),
            "a".into(),
        )
        .await
        .unwrap();

    let slashed = env
        .sc
        .slash(
            &env.slasher,
            &alice,
            Amount::from_whole(100),
            label_key(reasons::GOVERNANCE_SLASH),
            "s".into(),
        )
        .await
        .unwrap();
    assert_eq!(slashed, Amount::from_whole(7));
    assert_eq!(env.sc.balance_of(&alice).await, Amount::ZERO);
}

#[tokio::test]
async fn test_inactivity_is_derived_on_read() {
    let env = setup().await;
    let alice = Address::new("alice");
    env.sc.add_member(&env.manager, &alice).await.unwrap();

    let t0 = timestamp_secs();
    env.sc
        .apply_award_at(t0, &env.awarder, &alice, Amount::from_whole(3))
        .await
        .unwrap();

    // Just under the threshold: still active
    let just_under = t0 + 12 * SECS_PER_MONTH - 1;
    assert_eq!(
        env.sc.status_of_at(just_under, &alice).await,
        MemberStatus::Active
    );
    assert!(env.sc.is_active_member_at(just_under, &alice).await);

    // At the threshold: inactive, no stored transition took place
    let at_threshold = t0 + 12 * SECS_PER_MONTH;
    assert_eq!(
        env.sc.status_of_at(at_threshold, &alice).await,
        MemberStatus::Inactive
    );
    assert!(!env.sc.is_active_member_at(at_threshold, &alice).await);

    // Activity brings the member back without governance action
    env.sc
        .apply_award_at(at_threshold, &env.awarder, &alice, Amount::from_whole(1))
        .await
        .unwrap();
    assert_eq!(
        env.sc.status_of_at(at_threshold + 1, &alice).await,
        MemberStatus::Active
    );
}

#[tokio::test]
async fn test_active_member_requires_nonzero_balance() {
    let env = setup().await;
    let alice = Address::new("alice");
    env.sc.add_member(&env.manager, &alice).await.unwrap();

    // Active status but zero balance
    assert!(!env.sc.is_active_member(&alice).await);
}
