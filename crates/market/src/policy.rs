//! Reward policy engine
//!
//! Resolves the applicable reward formula for a store by checking the
//! store-specific override, then the category override, then the global
//! default. The precedence is structural: a store policy wins even when the
//! category or global policy would pay more. The per-transaction cap is
//! applied after the percentage-plus-fixed computation, never before.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use coop_core::{Address, Amount, Hash, JsonStorage, Storage};
use coop_ledger::roles::labels;
use coop_ledger::{EventKind, EventLog, RoleRegistry};

use crate::registry::StoreRegistry;
use crate::{MarketError, MarketResult};

/// Storage path for the policy table
const POLICIES_PATH: &str = "market/policies";

/// The scope a reward policy applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyScope {
    /// The always-present default
    Global,
    /// All stores in one category
    Category(Hash),
    /// One specific store, by store key
    Store(Hash),
}

impl PolicyScope {
    /// Stable label for events and persistence keys
    pub fn label(&self) -> String {
        match self {
            PolicyScope::Global => "global".to_string(),
            PolicyScope::Category(key) => format!("category:{}", key.to_hex()),
            PolicyScope::Store(key) => format!("store:{}", key.to_hex()),
        }
    }
}

/// A reward formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPolicy {
    /// Percentage of the purchase amount, in basis points (0..=10000)
    pub percentage_bps: u16,
    /// Flat amount added on top of the percentage
    pub fixed_amount: Amount,
    /// Purchases below this amount generate no reward
    pub min_purchase: Amount,
    /// Cap per transaction; zero means unlimited
    pub max_reward_per_tx: Amount,
    /// Inactive policies resolve but pay nothing
    pub is_active: bool,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            percentage_bps: 0,
            fixed_amount: Amount::ZERO,
            min_purchase: Amount::ZERO,
            max_reward_per_tx: Amount::ZERO,
            is_active: false,
        }
    }
}

impl RewardPolicy {
    /// Compute the reward for a purchase under this policy
    ///
    /// Percentage and fixed parts are computed first; the cap clamps last.
    pub fn reward_for(&self, purchase_amount: Amount) -> Amount {
        if !self.is_active || purchase_amount < self.min_purchase {
            return Amount::ZERO;
        }
        let reward = purchase_amount
            .mul_bps(self.percentage_bps)
            .saturating_add(self.fixed_amount);
        if self.max_reward_per_tx.is_zero() {
            reward
        } else {
            reward.min(self.max_reward_per_tx)
        }
    }
}

/// Persisted policy table; category and store maps are keyed by hex digest
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyTable {
    global: RewardPolicy,
    category: HashMap<String, RewardPolicy>,
    store: HashMap<String, RewardPolicy>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            global: RewardPolicy::default(),
            category: HashMap::new(),
            store: HashMap::new(),
        }
    }
}

/// The reward policy engine
pub struct RewardPolicyEngine {
    roles: Arc<RoleRegistry>,
    events: Arc<EventLog>,
    storage: Arc<dyn Storage>,
    registry: Arc<StoreRegistry>,
    policies: RwLock<PolicyTable>,
}

impl RewardPolicyEngine {
    /// Create the engine, loading the persisted policy table
    ///
    /// Exactly one global policy exists at all times; if none is stored the
    /// inactive default is installed.
    pub async fn new(
        storage: Arc<dyn Storage>,
        roles: Arc<RoleRegistry>,
        events: Arc<EventLog>,
        registry: Arc<StoreRegistry>,
    ) -> MarketResult<Self> {
        let policies = match storage.get_json::<PolicyTable>(POLICIES_PATH).await {
            Ok(table) => table,
            Err(_) => {
                let table = PolicyTable::default();
                storage.put_json(POLICIES_PATH, &table).await?;
                table
            }
        };

        Ok(Self {
            roles,
            events,
            storage,
            registry,
            policies: RwLock::new(policies),
        })
    }

    async fn persist(&self) -> MarketResult<()> {
        let table = self.policies.read().await;
        self.storage.put_json(POLICIES_PATH, &*table).await?;
        Ok(())
    }

    /// Create or replace the policy for a scope
    pub async fn set_policy(
        &self,
        caller: &Address,
        scope: PolicyScope,
        policy: RewardPolicy,
    ) -> MarketResult<()> {
        self.roles.require(caller, labels::REGISTRY_MANAGER).await?;
        if policy.percentage_bps > 10_000 {
            return Err(MarketError::Validation(format!(
                "percentage {} bps exceeds 100%",
                policy.percentage_bps
            )));
        }

        {
            let mut table = self.policies.write().await;
            match &scope {
                PolicyScope::Global => table.global = policy,
                PolicyScope::Category(key) => {
                    table.category.insert(key.to_hex(), policy);
                }
                PolicyScope::Store(key) => {
                    table.store.insert(key.to_hex(), policy);
                }
            }
        }
        self.persist().await?;

        self.events
            .append(
                EventKind::PolicySet {
                    scope: scope.label(),
                },
                format!("policy-set-{}", scope.label()),
            )
            .await?;
        info!("Reward policy set for scope {}", scope.label());
        Ok(())
    }

    /// Remove an override; clearing Global resets it to the inactive default
    pub async fn clear_policy(&self, caller: &Address, scope: PolicyScope) -> MarketResult<()> {
        self.roles.require(caller, labels::REGISTRY_MANAGER).await?;

        {
            let mut table = self.policies.write().await;
            match &scope {
                PolicyScope::Global => table.global = RewardPolicy::default(),
                PolicyScope::Category(key) => {
                    table.category.remove(&key.to_hex());
                }
                PolicyScope::Store(key) => {
                    table.store.remove(&key.to_hex());
                }
            }
        }
        self.persist().await?;
        info!("Reward policy cleared for scope {}", scope.label());
        Ok(())
    }

    /// Resolve the applicable policy for a store owner
    ///
    /// Store-scoped overrides apply only while the store is verified; an
    /// unverified store falls back to its category, then global.
    pub async fn resolve_policy(&self, store_owner: &Address) -> (PolicyScope, RewardPolicy) {
        let table = self.policies.read().await;
        if let Some(store) = self.registry.get_store_info(store_owner).await {
            if store.verified {
                if let Some(policy) = table.store.get(&store.store_key.to_hex()) {
                    if policy.is_active {
                        return (PolicyScope::Store(store.store_key), policy.clone());
                    }
                }
            }
            if let Some(policy) = table.category.get(&store.category_key.to_hex()) {
                if policy.is_active {
                    return (PolicyScope::Category(store.category_key), policy.clone());
                }
            }
        }
        (PolicyScope::Global, table.global.clone())
    }

    /// Compute the bounded reward for a purchase at a store
    pub async fn calculate_reward(&self, store_owner: &Address, purchase_amount: Amount) -> Amount {
        let (scope, policy) = self.resolve_policy(store_owner).await;
        let reward = policy.reward_for(purchase_amount);
        debug!(
            "Reward for {} purchase at {}: {} (scope {})",
            purchase_amount,
            store_owner,
            reward,
            scope.label()
        );
        reward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(bps: u16, fixed: u64, min: u64, max: u64, active: bool) -> RewardPolicy {
        RewardPolicy {
            percentage_bps: bps,
            fixed_amount: Amount::from_whole(fixed),
            min_purchase: Amount::from_whole(min),
            max_reward_per_tx: Amount::from_whole(max),
            is_active: active,
        }
    }

    #[test]
    fn test_reward_formula_percentage_plus_fixed() {
        // 1% + 5 fixed on a 1000 purchase = 15
        let p = policy(100, 5, 1, 0, true);
        assert_eq!(
            p.reward_for(Amount::from_whole(1000)),
            Amount::from_whole(15)
        );
    }

    #[test]
    fn test_cap_clamps_after_fixed_is_added() {
        // 2% of 10000 = 200, plus 50 fixed = 250, capped to 100
        let p = policy(200, 50, 0, 100, true);
        assert_eq!(
            p.reward_for(Amount::from_whole(10_000)),
            Amount::from_whole(100)
        );
    }

    #[test]
    fn test_zero_cap_means_unlimited() {
        let p = policy(10_000, 0, 0, 0, true);
        assert_eq!(
            p.reward_for(Amount::from_whole(123_456)),
            Amount::from_whole(123_456)
        );
    }

    #[test]
    fn test_below_min_purchase_pays_nothing() {
        let p = policy(100, 5, 10, 0, true);
        assert_eq!(p.reward_for(Amount::from_whole(9)), Amount::ZERO);
        assert_ne!(p.reward_for(Amount::from_whole(10)), Amount::ZERO);
    }

    #[test]
    fn test_inactive_policy_pays_nothing() {
        let p = policy(100, 5, 0, 0, false);
        assert_eq!(p.reward_for(Amount::from_whole(1000)), Amount::ZERO);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            /// The cap is never exceeded when nonzero, for any purchase size
            #[test]
            fn prop_cap_never_exceeded(
                purchase in 0u128..u128::MAX,
                bps in 0u16..=10_000,
                fixed in 0u64..1_000_000,
                cap in 1u64..1_000_000,
            ) {
                let p = RewardPolicy {
                    percentage_bps: bps,
                    fixed_amount: Amount::from_whole(fixed),
                    min_purchase: Amount::ZERO,
                    max_reward_per_tx: Amount::from_whole(cap),
                    is_active: true,
                };
                prop_assert!(p.reward_for(Amount(purchase)) <= Amount::from_whole(cap));
            }
        }
    }
}
