//! Payment router
//!
//! The only entry point that couples a spending-token transfer from buyer to
//! store with a reputation reward to the buyer. The two legs are atomic: if
//! the reward leg fails for any reason other than the reward being zero, the
//! transfer is reverted and no event is emitted.

use std::sync::Arc;

use tracing::{info, warn};

use coop_core::utils::timestamp_secs;
use coop_core::{Address, Amount};
use coop_ledger::{EventKind, EventLog, LedgerEvent};
use coop_tokens::{ReputationToken, SpendingToken};

use crate::policy::RewardPolicyEngine;
use crate::registry::StoreRegistry;
use crate::{MarketError, MarketResult};

/// The payment router
pub struct PaymentRouter {
    registry: Arc<StoreRegistry>,
    policy: Arc<RewardPolicyEngine>,
    uc: Arc<SpendingToken>,
    sc: Arc<ReputationToken>,
    events: Arc<EventLog>,
    /// The address the router acts as when awarding rewards; it must hold
    /// the governance-award role
    reward_authority: Address,
}

impl PaymentRouter {
    /// Create the router
    pub fn new(
        registry: Arc<StoreRegistry>,
        policy: Arc<RewardPolicyEngine>,
        uc: Arc<SpendingToken>,
        sc: Arc<ReputationToken>,
        events: Arc<EventLog>,
        reward_authority: Address,
    ) -> Self {
        Self {
            registry,
            policy,
            uc,
            sc,
            events,
            reward_authority,
        }
    }

    /// Pay a verified store and mint the buyer's purchase reward
    pub async fn pay_store(
        &self,
        buyer: &Address,
        store_owner: &Address,
        amount: Amount,
        reference: String,
    ) -> MarketResult<LedgerEvent> {
        self.pay_store_at(timestamp_secs(), buyer, store_owner, amount, reference)
            .await
    }

    /// Pay a store with an explicit wall-clock reading
    pub async fn pay_store_at(
        &self,
        now: u64,
        buyer: &Address,
        store_owner: &Address,
        amount: Amount,
        reference: String,
    ) -> MarketResult<LedgerEvent> {
        if !self.registry.is_verified(store_owner).await {
            return Err(MarketError::StoreNotVerified(store_owner.clone()));
        }

        // Leg 1: move the spending tokens; failure modes propagate unchanged
        let receipt = self.uc.apply_transfer(buyer, store_owner, amount).await?;

        // Leg 2: mint the reward, reverting the transfer on failure
        let reward = self.policy.calculate_reward(store_owner, amount).await;
        if !reward.is_zero() {
            if let Err(e) = self
                .sc
                .apply_award_at(now, &self.reward_authority, buyer, reward)
                .await
            {
                warn!(
                    "Reward award failed for purchase {} by {}; reverting transfer: {}",
                    reference, buyer, e
                );
                self.uc.revert_transfer(&receipt).await?;
                return Err(e.into());
            }
        }

        let event = self
            .events
            .append_at(
                now,
                EventKind::PurchaseSettled {
                    buyer: buyer.clone(),
                    store_owner: store_owner.clone(),
                    amount,
                    reward,
                },
                reference,
            )
            .await
            .map_err(MarketError::Ledger)?;

        info!(
            "Purchase settled: {} paid {} to {}, reward {}",
            buyer, amount, store_owner, reward
        );
        Ok(event)
    }
}
