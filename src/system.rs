//! Wiring for the full engine
//!
//! `CoopSystem` builds every component over one storage backend and grants
//! the internal service addresses the roles they need. The admin address
//! passed at construction holds `ROLE_ADMIN` and can delegate from there.

use std::sync::Arc;

use tracing::info;

use coop_core::{Address, Storage};
use coop_governance::{DecayConfig, DecayMonitor, ProposalStore};
use coop_ledger::{labels, EventLog, RoleRegistry};
use coop_market::{PaymentRouter, RewardPolicyEngine, StoreRegistry};
use coop_recon::{OnrampStore, ReconConfig, ReconciliationService};
use coop_tokens::{ReputationToken, SpendingToken};

/// Address the payment router awards rewards from
const ROUTER_AUTHORITY: &str = "system:payment-router";

/// The assembled engine
pub struct CoopSystem {
    /// Role grants gating every privileged operation
    pub roles: Arc<RoleRegistry>,
    /// The append-only event log
    pub events: Arc<EventLog>,
    /// The spending token
    pub uc: Arc<SpendingToken>,
    /// The reputation token
    pub sc: Arc<ReputationToken>,
    /// Verified-store registry
    pub registry: Arc<StoreRegistry>,
    /// Reward policy resolution
    pub policy: Arc<RewardPolicyEngine>,
    /// Purchase settlement
    pub router: Arc<PaymentRouter>,
    /// Inactivity decay scanning
    pub decay: Arc<DecayMonitor>,
    /// Slash-batch proposals
    pub proposals: Arc<ProposalStore>,
    /// Off-ledger records
    pub offledger: Arc<OnrampStore>,
    /// Ledger versus off-ledger reconciliation
    pub recon: Arc<ReconciliationService>,
}

impl CoopSystem {
    /// Bring the engine up over a storage backend
    ///
    /// Idempotent: reloading over the same backend restores all persisted
    /// state. The router authority's award grant is re-applied on every
    /// start.
    pub async fn new(
        storage: Arc<dyn Storage>,
        admin: Address,
        decay_config: DecayConfig,
        recon_config: ReconConfig,
    ) -> anyhow::Result<Self> {
        let events = Arc::new(EventLog::new(storage.clone()).await?);
        let roles = Arc::new(RoleRegistry::new(storage.clone(), events.clone(), admin.clone()).await?);

        let uc = Arc::new(SpendingToken::new(storage.clone(), roles.clone(), events.clone()).await?);
        let sc =
            Arc::new(ReputationToken::new(storage.clone(), roles.clone(), events.clone()).await?);

        let registry =
            Arc::new(StoreRegistry::new(storage.clone(), roles.clone(), events.clone()).await?);
        let policy = Arc::new(
            RewardPolicyEngine::new(
                storage.clone(),
                roles.clone(),
                events.clone(),
                registry.clone(),
            )
            .await?,
        );

        let router_authority = Address::new(ROUTER_AUTHORITY);
        if !roles
            .has_role(&router_authority, &coop_ledger::role_id(labels::GOVERNANCE_AWARD))
            .await
        {
            roles
                .grant_role(&admin, &router_authority, labels::GOVERNANCE_AWARD)
                .await?;
        }
        let router = Arc::new(PaymentRouter::new(
            registry.clone(),
            policy.clone(),
            uc.clone(),
            sc.clone(),
            events.clone(),
            router_authority,
        ));

        let decay = Arc::new(DecayMonitor::new(sc.clone(), decay_config));
        let proposals = Arc::new(ProposalStore::new(storage.clone()).await?);

        let offledger = Arc::new(OnrampStore::new(storage.clone()).await?);
        let recon = Arc::new(ReconciliationService::new(
            events.clone(),
            offledger.clone(),
            storage,
            recon_config,
        ));

        info!("Engine assembled, admin {}", admin);
        Ok(Self {
            roles,
            events,
            uc,
            sc,
            registry,
            policy,
            router,
            decay,
            proposals,
            offledger,
            recon,
        })
    }
}
