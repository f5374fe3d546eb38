//! Tests for the decay monitor and the slash-batch approval workflow

use std::sync::Arc;

use coop_core::utils::SECS_PER_MONTH;
use coop_core::{Address, Amount, MemoryStorage, Storage};
use coop_governance::{
    DecayConfig, DecayMonitor, DecayPolicy, GovernanceError, ProposalStatus, ProposalStore,
};
use coop_ledger::roles::labels;
use coop_ledger::{EventLog, RoleRegistry};
use coop_tokens::ReputationToken;

struct Env {
    sc: Arc<ReputationToken>,
    storage: Arc<dyn Storage>,
    admin: Address,
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

    let awarder = Address::new("awarder");
    let slasher = Address::new("slasher");
    for (addr, label) in [
        (&admin, labels::MEMBER_MANAGER),
        (&awarder, labels::GOVERNANCE_AWARD),
        (&slasher, labels::GOVERNANCE_SLASH),
    ] {
        roles.grant_role(&admin, addr, label).await.unwrap();
    }

    let sc = Arc::new(
        ReputationToken::new(storage.clone(), roles, events)
            .await
            .unwrap(),
    );
    Env {
        sc,
        storage,
        admin,
        awarder,
        slasher,
    }
}

/// Member with a balance whose last activity was `months` months before `now`
async fn seed_member(env: &Env, name: &str, balance: u64, months_ago: u64, now: u64) -> Address {
    let address = Address::new(name);
    env.sc.add_member(&env.admin, &address).await.unwrap();
    env.sc
        .apply_award_at(
            now - months_ago * SECS_PER_MONTH,
            &env.awarder,
            &address,
            Amount::from_whole(balance),
        )
        .await
        .unwrap();
    address
}

#[tokio::test]
async fn test_scan_only_flags_members_past_threshold() {
    let env = setup().await;
    let now = 100 * SECS_PER_MONTH;
    let dormant = seed_member(&env, "dormant", 40, 13, now).await;
    let _recent = seed_member(&env, "recent", 40, 3, now).await;

    let monitor = DecayMonitor::new(env.sc.clone(), DecayConfig::default());
    let entries = monitor.scan_at(now).await;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].member, dormant);
    assert_eq!(entries[0].months_inactive, 13);
    // Gradual at 10%/month, one month over threshold: 40 * 10% = 4
    assert_eq!(entries[0].decay, Amount::from_whole(4));
}

#[tokio::test]
async fn test_full_workflow_scan_propose_approve_execute() {
    let env = setup().await;
    let now = 100 * SECS_PER_MONTH;
    let dormant = seed_member(&env, "dormant", 40, 13, now).await;

    let monitor = DecayMonitor::new(env.sc.clone(), DecayConfig::default());
    let entries = monitor.scan_at(now).await;

    let approvers: Vec<Address> = ["ann", "ben", "cal", "dee", "eva"]
        .iter()
        .map(|n| Address::new(*n))
        .collect();
    let store = ProposalStore::new(env.storage.clone()).await.unwrap();
    let proposal = store.create(entries, approvers.clone(), 3).await.unwrap();
    assert_eq!(proposal.status, ProposalStatus::Pending);

    // Execution before approval is rejected
    let result = store.execute(&proposal.id, &env.slasher, &env.sc).await;
    assert!(matches!(
        result,
        Err(GovernanceError::InvalidProposalState(_))
    ));

    assert_eq!(
        store.approve(&proposal.id, &approvers[0]).await.unwrap(),
        ProposalStatus::Pending
    );
    assert_eq!(
        store.approve(&proposal.id, &approvers[1]).await.unwrap(),
        ProposalStatus::Pending
    );
    assert_eq!(
        store.approve(&proposal.id, &approvers[2]).await.unwrap(),
        ProposalStatus::Approved
    );

    let total = store
        .execute(&proposal.id, &env.slasher, &env.sc)
        .await
        .unwrap();
    assert_eq!(total, Amount::from_whole(4));
    assert_eq!(env.sc.balance_of(&dormant).await, Amount::from_whole(36));
    assert_eq!(
        store.get(&proposal.id).await.unwrap().status,
        ProposalStatus::Executed
    );
}

#[tokio::test]
async fn test_duplicate_and_ineligible_approvals_rejected() {
    let env = setup().await;
    let now = 100 * SECS_PER_MONTH;
    seed_member(&env, "dormant", 40, 13, now).await;

    let monitor = DecayMonitor::new(env.sc.clone(), DecayConfig::default());
    let entries = monitor.scan_at(now).await;
    let approvers = vec![Address::new("ann"), Address::new("ben")];
    let store = ProposalStore::new(env.storage.clone()).await.unwrap();
    let proposal = store.create(entries, approvers.clone(), 2).await.unwrap();

    store.approve(&proposal.id, &approvers[0]).await.unwrap();
    assert!(matches!(
        store.approve(&proposal.id, &approvers[0]).await,
        Err(GovernanceError::InvalidApproval(_))
    ));
    assert!(matches!(
        store.approve(&proposal.id, &Address::new("mallory")).await,
        Err(GovernanceError::InvalidApproval(_))
    ));
}

#[tokio::test]
async fn test_unexecuted_proposal_survives_restart() {
    let env = setup().await;
    let now = 100 * SECS_PER_MONTH;
    seed_member(&env, "dormant", 40, 13, now).await;

    let monitor = DecayMonitor::new(env.sc.clone(), DecayConfig::default());
    let entries = monitor.scan_at(now).await;
    let approvers = vec![Address::new("ann"), Address::new("ben")];

    let id = {
        let store = ProposalStore::new(env.storage.clone()).await.unwrap();
        store.create(entries, approvers, 2).await.unwrap().id
    };

    // A fresh store sees the pending proposal; nothing timed it out
    let store = ProposalStore::new(env.storage.clone()).await.unwrap();
    let pending = store.pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
}

#[tokio::test]
async fn test_execute_skips_failing_member_and_continues() {
    let env = setup().await;
    let now = 100 * SECS_PER_MONTH;
    let dormant_a = seed_member(&env, "dormant-a", 40, 13, now).await;
    let dormant_b = seed_member(&env, "dormant-b", 40, 13, now).await;

    let monitor = DecayMonitor::new(env.sc.clone(), DecayConfig::default());
    let mut entries = monitor.scan_at(now).await;
    assert_eq!(entries.len(), 2);

    // Corrupt one entry so its slash fails (zero amount is rejected)
    entries
        .iter_mut()
        .find(|e| e.member == dormant_a)
        .unwrap()
        .decay = Amount::ZERO;

    let approvers = vec![Address::new("ann")];
    let store = ProposalStore::new(env.storage.clone()).await.unwrap();
    let proposal = store.create(entries, approvers.clone(), 1).await.unwrap();
    store.approve(&proposal.id, &approvers[0]).await.unwrap();

    let total = store
        .execute(&proposal.id, &env.slasher, &env.sc)
        .await
        .unwrap();
    // The good member was still slashed
    assert_eq!(total, Amount::from_whole(4));
    assert_eq!(env.sc.balance_of(&dormant_b).await, Amount::from_whole(36));
    assert_eq!(env.sc.balance_of(&dormant_a).await, Amount::from_whole(40));
}
