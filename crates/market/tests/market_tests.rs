//! Tests for the registry, policy resolution, and the payment router
//!
//! Covers verification gating, three-tier policy precedence, and the
//! all-or-nothing settlement of a purchase.

use std::sync::Arc;

use coop_core::{label_key, Address, Amount, MemoryStorage, Storage};
use coop_ledger::roles::labels;
use coop_ledger::{EventKind, EventLog, RoleRegistry};
use coop_market::{
    MarketError, PaymentRouter, PolicyScope, RewardPolicy, RewardPolicyEngine, StoreRegistry,
};
use coop_tokens::{ReputationToken, SpendingToken, TokenError};

struct Env {
    registry: Arc<StoreRegistry>,
    policy: Arc<RewardPolicyEngine>,
    router: PaymentRouter,
    uc: Arc<SpendingToken>,
    sc: Arc<ReputationToken>,
    roles: Arc<RoleRegistry>,
    events: Arc<EventLog>,
    admin: Address,
    manager: Address,
    treasurer: Address,
    router_authority: Address,
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

    let manager = Address::new("registry-manager");
    let treasurer = Address::new("treasurer");
    let router_authority = Address::new("payment-router");
    for (addr, label) in [
        (&manager, labels::REGISTRY_MANAGER),
        (&treasurer, labels::TREASURER_MINT),
        (&router_authority, labels::GOVERNANCE_AWARD),
        (&admin, labels::MEMBER_MANAGER),
    ] {
        roles.grant_role(&admin, addr, label).await.unwrap();
    }

    let uc = Arc::new(
        SpendingToken::new(storage.clone(), roles.clone(), events.clone())
            .await
            .unwrap(),
    );
    let sc = Arc::new(
        ReputationToken::new(storage.clone(), roles.clone(), events.clone())
            .await
            .unwrap(),
    );
    let registry = Arc::new(
        StoreRegistry::new(storage.clone(), roles.clone(), events.clone())
            .await
            .unwrap(),
    );
    let policy = Arc::new(
        RewardPolicyEngine::new(storage, roles.clone(), events.clone(), registry.clone())
            .await
            .unwrap(),
    );
    let router = PaymentRouter::new(
        registry.clone(),
        policy.clone(),
        uc.clone(),
        sc.clone(),
        events.clone(),
        router_authority.clone(),
    );

    Env {
        registry,
        policy,
        router,
        uc,
        sc,
        roles,
        events,
        admin,
        manager,
        treasurer,
        router_authority,
    }
}

fn active_policy(bps: u16, fixed: u64, min: u64, max: u64) -> RewardPolicy {
    RewardPolicy {
        percentage_bps: bps,
        fixed_amount: Amount::from_whole(fixed),
        min_purchase: Amount::from_whole(min),
        max_reward_per_tx: Amount::from_whole(max),
        is_active: true,
    }
}

/// Verify a grocery store and fund the buyer as a member
async fn onboard(env: &Env, store: &Address, buyer: &Address) {
    env.registry
        .verify_store(
            &env.manager,
            store,
            label_key("FOOD_BEVERAGE"),
            label_key("store:corner-grocery"),
        )
        .await
        .unwrap();
    env.sc.add_member(&env.admin, buyer).await.unwrap();
    env.uc
        .mint_unlimited(&env.treasurer, buyer, Amount::from_whole(10_000), "fund".into())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_verify_store_rejects_double_verification() {
    let env = setup().await;
    let store = Address::new("store-1");

    env.registry
        .verify_store(&env.manager, &store, label_key("RETAIL"), label_key("store:one"))
        .await
        .unwrap();
    assert!(env.registry.is_verified(&store).await);

    let result = env
        .registry
        .verify_store(&env.manager, &store, label_key("RETAIL"), label_key("store:one"))
        .await;
    assert!(matches!(result, Err(MarketError::AlreadyVerified(_))));

    // After unverification the owner can be re-verified
    env.registry.unverify_store(&env.manager, &store).await.unwrap();
    assert!(!env.registry.is_verified(&store).await);
    env.registry
        .verify_store(&env.manager, &store, label_key("RETAIL"), label_key("store:one"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_store_policy_wins_even_when_global_pays_more() {
    let env = setup().await;
    let store = Address::new("store-1");
    let buyer = Address::new("buyer");
    onboard(&env, &store, &buyer).await;

    // Global: 1% + 5 fixed, min 1, max 100. Store override: 2% + 0, max 50.
    env.policy
        .set_policy(&env.manager, PolicyScope::Global, active_policy(100, 5, 1, 100))
        .await
        .unwrap();
    env.policy
        .set_policy(
            &env.manager,
            PolicyScope::Store(label_key("store:corner-grocery")),
            active_policy(200, 0, 0, 50),
        )
        .await
        .unwrap();

    // min(1000 * 2% + 0, 50) = 20, not the global-derived 15
    let reward = env
        .policy
        .calculate_reward(&store, Amount::from_whole(1000))
        .await;
    assert_eq!(reward, Amount::from_whole(20));
}

#[tokio::test]
async fn test_category_policy_beats_global_and_yields_to_store() {
    let env = setup().await;
    let store = Address::new("store-1");
    let buyer = Address::new("buyer");
    onboard(&env, &store, &buyer).await;

    env.policy
        .set_policy(&env.manager, PolicyScope::Global, active_policy(100, 0, 0, 0))
        .await
        .unwrap();
    env.policy
        .set_policy(
            &env.manager,
            PolicyScope::Category(label_key("FOOD_BEVERAGE")),
            active_policy(300, 0, 0, 0),
        )
        .await
        .unwrap();

    let (scope, _) = env.policy.resolve_policy(&store).await;
    assert_eq!(scope, PolicyScope::Category(label_key("FOOD_BEVERAGE")));
    assert_eq!(
        env.policy.calculate_reward(&store, Amount::from_whole(100)).await,
        Amount::from_whole(3)
    );

    env.policy
        .set_policy(
            &env.manager,
            PolicyScope::Store(label_key("store:corner-grocery")),
            active_policy(50, 0, 0, 0),
        )
        .await
        .unwrap();
    let (scope, _) = env.policy.resolve_policy(&store).await;
    assert_eq!(scope, PolicyScope::Store(label_key("store:corner-grocery")));
}

#[tokio::test]
async fn test_unverified_store_falls_back_past_store_policy() {
    let env = setup().await;
    let store = Address::new("store-1");
    let buyer = Address::new("buyer");
    onboard(&env, &store, &buyer).await;

    env.policy
        .set_policy(&env.manager, PolicyScope::Global, active_policy(100, 0, 0, 0))
        .await
        .unwrap();
    env.policy
        .set_policy(
            &env.manager,
            PolicyScope::Store(label_key("store:corner-grocery")),
            active_policy(500, 0, 0, 0),
        )
        .await
        .unwrap();

    env.registry.unverify_store(&env.manager, &store).await.unwrap();
    let (scope, _) = env.policy.resolve_policy(&store).await;
    assert_eq!(scope, PolicyScope::Global);
}

#[tokio::test]
async fn test_pay_store_requires_verification() {
    let env = setup().await;
    let result = env
        .router
        .pay_store(
            &Address::new("buyer"),
            &Address::new("nobody"),
            Amount::from_whole(10),
            "p1".into(),
        )
        .await;
    assert!(matches!(result, Err(MarketError::StoreNotVerified(_))));
}

#[tokio::test]
async fn test_pay_store_settles_transfer_and_reward() {
    let env = setup().await;
    let store = Address::new("store-1");
    let buyer = Address::new("buyer");
    onboard(&env, &store, &buyer).await;
    env.policy
        .set_policy(&env.manager, PolicyScope::Global, active_policy(100, 5, 1, 100))
        .await
        .unwrap();

    let event = env
        .router
        .pay_store(&buyer, &store, Amount::from_whole(1000), "purchase-1".into())
        .await
        .unwrap();

    assert_eq!(env.uc.balance_of(&buyer).await, Amount::from_whole(9000));
    assert_eq!(env.uc.balance_of(&store).await, Amount::from_whole(1000));
    assert_eq!(env.sc.balance_of(&buyer).await, Amount::from_whole(15));
    assert!(matches!(
        event.kind,
        EventKind::PurchaseSettled { reward, .. } if reward == Amount::from_whole(15)
    ));
}

#[tokio::test]
async fn test_pay_store_rewards_a_funded_nonmember_buyer() {
    let env = setup().await;
    let store = Address::new("store-1");
    let buyer = Address::new("walk-in");
    env.registry
        .verify_store(
            &env.manager,
            &store,
            label_key("FOOD_BEVERAGE"),
            label_key("store:corner-grocery"),
        )
        .await
        .unwrap();
    // Funded but never added as a member
    env.uc
        .mint_unlimited(&env.treasurer, &buyer, Amount::from_whole(1000), "fund".into())
        .await
        .unwrap();
    env.policy
        .set_policy(&env.manager, PolicyScope::Global, active_policy(200, 0, 0, 0))
        .await
        .unwrap();

    env.router
        .pay_store(&buyer, &store, Amount::from_whole(1000), "purchase-1".into())
        .await
        .unwrap();

    assert_eq!(env.uc.balance_of(&store).await, Amount::from_whole(1000));
    assert_eq!(env.sc.balance_of(&buyer).await, Amount::from_whole(20));
    // The reward alone does not make them an active member
    assert!(!env.sc.is_active_member(&buyer).await);
}

#[tokio::test]
async fn test_pay_store_zero_reward_is_success() {
    let env = setup().await;
    let store = Address::new("store-1");
    let buyer = Address::new("buyer");
    onboard(&env, &store, &buyer).await;
    // Global policy stays inactive: reward is zero, settlement still succeeds

    env.router
        .pay_store(&buyer, &store, Amount::from_whole(100), "purchase-1".into())
        .await
        .unwrap();
    assert_eq!(env.uc.balance_of(&store).await, Amount::from_whole(100));
    assert_eq!(env.sc.balance_of(&buyer).await, Amount::ZERO);
}

#[tokio::test]
async fn test_pay_store_is_all_or_nothing_when_reward_fails() {
    let env = setup().await;
    let store = Address::new("store-1");
    let buyer = Address::new("buyer");
    onboard(&env, &store, &buyer).await;
    env.policy
        .set_policy(&env.manager, PolicyScope::Global, active_policy(100, 5, 1, 100))
        .await
        .unwrap();

    // Force the reward leg to fail by revoking the router's award capability
    env.roles
        .revoke_role(&env.admin, &env.router_authority, labels::GOVERNANCE_AWARD)
        .await
        .unwrap();

    let buyer_before = env.uc.balance_of(&buyer).await;
    let store_before = env.uc.balance_of(&store).await;
    let settled_before = env
        .events
        .all_events()
        .await
        .iter()
        .filter(|e| matches!(e.kind, EventKind::PurchaseSettled { .. }))
        .count();

    let result = env
        .router
        .pay_store(&buyer, &store, Amount::from_whole(1000), "purchase-1".into())
        .await;
    assert!(matches!(
        result,
        Err(MarketError::Token(TokenError::Ledger(_)))
    ));

    // Balances unchanged, no combined event emitted
    assert_eq!(env.uc.balance_of(&buyer).await, buyer_before);
    assert_eq!(env.uc.balance_of(&store).await, store_before);
    let settled_after = env
        .events
        .all_events()
        .await
        .iter()
        .filter(|e| matches!(e.kind, EventKind::PurchaseSettled { .. }))
        .count();
    assert_eq!(settled_after, settled_before);
}

#[tokio::test]
async fn test_pay_store_propagates_insufficient_balance() {
    let env = setup().await;
    let store = Address::new("store-1");
    let buyer = Address::new("pauper");
    env.registry
        .verify_store(&env.manager, &store, label_key("RETAIL"), label_key("store:x"))
        .await
        .unwrap();

    let result = env
        .router
        .pay_store(&buyer, &store, Amount::from_whole(10), "p".into())
        .await;
    assert!(matches!(
        result,
        Err(MarketError::Token(TokenError::InsufficientBalance { .. }))
    ));
}
