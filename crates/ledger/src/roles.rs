//! Capability registry
//!
//! Privileged operations are gated by an explicit capability check at the top
//! of each operation, backed by a plain mapping from address to the set of
//! granted role identifiers. Role identifiers are content-addressed digests
//! of stable labels, so they can be referenced before the role is first
//! granted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use coop_core::{label_key, Address, Hash, JsonStorage, Storage};

use crate::events::{EventKind, EventLog};
use crate::{LedgerError, LedgerResult};

/// A content-addressed role identifier
pub type RoleId = Hash;

/// Derive a role identifier from its stable label
pub fn role_id(label: &str) -> RoleId {
    label_key(label)
}

/// Role labels for every privileged operation
pub mod labels {
    /// May grant and revoke all other roles
    pub const ADMIN: &str = "ROLE_ADMIN";
    /// Unlimited spending-token minting against treasury reserves
    pub const TREASURER_MINT: &str = "TREASURER_MINT";
    /// Rate-limited spending-token minting for onramp integrations
    pub const ONRAMP_MINT: &str = "ONRAMP_MINT";
    /// May pause and unpause the spending token
    pub const PAUSER: &str = "PAUSER";
    /// May add and remove cooperative members
    pub const MEMBER_MANAGER: &str = "MEMBER_MANAGER";
    /// May award reputation tokens
    pub const GOVERNANCE_AWARD: &str = "GOVERNANCE_AWARD";
    /// May slash reputation tokens
    pub const GOVERNANCE_SLASH: &str = "GOVERNANCE_SLASH";
    /// May verify/unverify stores and set reward policies
    pub const REGISTRY_MANAGER: &str = "REGISTRY_MANAGER";
}

/// Storage path for the grant table
const ROLES_PATH: &str = "ledger/roles";

/// Persisted form of the grant table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GrantTable {
    grants: HashMap<Address, HashSet<RoleId>>,
}

/// The capability registry gating every privileged operation
pub struct RoleRegistry {
    storage: Arc<dyn Storage>,
    events: Arc<EventLog>,
    grants: RwLock<GrantTable>,
}

impl RoleRegistry {
    /// Create a registry, bootstrapping the admin address with the admin role
    ///
    /// Existing grants are loaded from storage; the bootstrap admin is merged
    /// in so a restarted node always keeps an operational admin.
    pub async fn new(
        storage: Arc<dyn Storage>,
        events: Arc<EventLog>,
        admin: Address,
    ) -> LedgerResult<Self> {
        let mut table = match storage.get_json::<GrantTable>(ROLES_PATH).await {
            Ok(table) => table,
            Err(_) => GrantTable::default(),
        };

        table
            .grants
            .entry(admin.clone())
            .or_default()
            .insert(role_id(labels::ADMIN));

        let registry = Self {
            storage,
            events,
            grants: RwLock::new(table),
        };
        registry.persist().await?;

        info!("Role registry initialized, admin: {}", admin);
        Ok(registry)
    }

    async fn persist(&self) -> LedgerResult<()> {
        let table = self.grants.read().await;
        self.storage.put_json(ROLES_PATH, &*table).await?;
        Ok(())
    }

    /// Whether an address holds a role
    pub async fn has_role(&self, address: &Address, role: &RoleId) -> bool {
        let table = self.grants.read().await;
        table
            .grants
            .get(address)
            .map(|set| set.contains(role))
            .unwrap_or(false)
    }

    /// Require that the caller holds the role named by `label`
    pub async fn require(&self, caller: &Address, label: &str) -> LedgerResult<()> {
        if self.has_role(caller, &role_id(label)).await {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                caller: caller.clone(),
                role: label.to_string(),
            })
        }
    }

    /// Grant a role to an address; caller must hold the admin role
    pub async fn grant_role(
        &self,
        caller: &Address,
        address: &Address,
        label: &str,
    ) -> LedgerResult<()> {
        self.require(caller, labels::ADMIN).await?;
        if address.is_null() {
            return Err(LedgerError::Validation(
                "Cannot grant a role to the null address".to_string(),
            ));
        }

        let newly_granted = {
            let mut table = self.grants.write().await;
            table
                .grants
                .entry(address.clone())
                .or_default()
                .insert(role_id(label))
        };
        self.persist().await?;

        if newly_granted {
            self.events
                .append(
                    EventKind::RoleGranted {
                        address: address.clone(),
                        role: label.to_string(),
                    },
                    format!("role-grant-{}-{}", label, address),
                )
                .await?;
            info!("Granted role {} to {}", label, address);
        }
        Ok(())
    }

    /// Revoke a role from an address; caller must hold the admin role
    pub async fn revoke_role(
        &self,
        caller: &Address,
        address: &Address,
        label: &str,
    ) -> LedgerResult<()> {
        self.require(caller, labels::ADMIN).await?;

        let removed = {
            let mut table = self.grants.write().await;
            table
                .grants
                .get_mut(address)
                .map(|set| set.remove(&role_id(label)))
                .unwrap_or(false)
        };
        self.persist().await?;

        if removed {
            self.events
                .append(
                    EventKind::RoleRevoked {
                        address: address.clone(),
                        role: label.to_string(),
                    },
                    format!("role-revoke-{}-{}", label, address),
                )
                .await?;
            info!("Revoked role {} from {}", label, address);
        }
        Ok(())
    }
}
