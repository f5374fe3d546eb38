//! Store registry
//!
//! Authoritative list of verified sellers. Each store is tagged with a
//! content-addressed category key and a unique store key derived from a
//! stable per-store identifier. Entries are created and unverified by the
//! registry manager and immutable otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use coop_core::{Address, Hash, JsonStorage, Storage};
use coop_ledger::roles::labels;
use coop_ledger::{EventKind, EventLog, RoleRegistry};

use crate::{MarketError, MarketResult};

/// Storage path prefix for store entries
const STORES_PATH: &str = "market/stores/";

/// A registered store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    /// The seller's ledger address
    pub owner: Address,
    /// Content-addressed category key
    pub category_key: Hash,
    /// Content-addressed digest of the stable store identifier
    pub store_key: Hash,
    /// Whether the store may currently participate
    pub verified: bool,
}

/// The store registry
pub struct StoreRegistry {
    roles: Arc<RoleRegistry>,
    events: Arc<EventLog>,
    storage: Arc<dyn Storage>,
    stores: RwLock<HashMap<Address, Store>>,
}

impl StoreRegistry {
    /// Create the registry, loading persisted entries
    pub async fn new(
        storage: Arc<dyn Storage>,
        roles: Arc<RoleRegistry>,
        events: Arc<EventLog>,
    ) -> MarketResult<Self> {
        let mut stores = HashMap::new();
        for key in storage.list(STORES_PATH).await? {
            let store: Store = storage.get_json(&key).await?;
            stores.insert(store.owner.clone(), store);
        }
        info!("Store registry loaded: {} stores", stores.len());

        Ok(Self {
            roles,
            events,
            storage,
            stores: RwLock::new(stores),
        })
    }

    async fn persist_store(&self, store: &Store) -> MarketResult<()> {
        self.storage
            .put_json(&format!("{}{}", STORES_PATH, store.owner), store)
            .await?;
        Ok(())
    }

    /// Verify a store for an owner
    ///
    /// A previously unverified entry may be re-verified; an owner with a
    /// currently verified entry cannot register a second one.
    pub async fn verify_store(
        &self,
        caller: &Address,
        owner: &Address,
        category_key: Hash,
        store_key: Hash,
    ) -> MarketResult<()> {
        self.roles.require(caller, labels::REGISTRY_MANAGER).await?;
        if owner.is_null() {
            return Err(MarketError::Validation("null owner address".to_string()));
        }

        {
            let mut stores = self.stores.write().await;
            if stores.get(owner).map(|s| s.verified).unwrap_or(false) {
                return Err(MarketError::AlreadyVerified(owner.clone()));
            }
            let store = Store {
                owner: owner.clone(),
                category_key: category_key.clone(),
                store_key,
                verified: true,
            };
            self.persist_store(&store).await?;
            stores.insert(owner.clone(), store);
        }

        self.events
            .append(
                EventKind::StoreVerified {
                    owner: owner.clone(),
                    category: category_key,
                },
                format!("store-verify-{}", owner),
            )
            .await?;
        info!("Store verified: {}", owner);
        Ok(())
    }

    /// Unverify a store; policy resolution then falls back to category/global
    pub async fn unverify_store(&self, caller: &Address, owner: &Address) -> MarketResult<()> {
        self.roles.require(caller, labels::REGISTRY_MANAGER).await?;

        let changed = {
            let mut stores = self.stores.write().await;
            match stores.get_mut(owner) {
                Some(store) if store.verified => {
                    store.verified = false;
                    let store = store.clone();
                    self.persist_store(&store).await?;
                    true
                }
                _ => false,
            }
        };

        if changed {
            self.events
                .append(
                    EventKind::StoreUnverified {
                        owner: owner.clone(),
                    },
                    format!("store-unverify-{}", owner),
                )
                .await?;
            info!("Store unverified: {}", owner);
        }
        Ok(())
    }

    /// Whether an owner currently has a verified store
    pub async fn is_verified(&self, owner: &Address) -> bool {
        let stores = self.stores.read().await;
        stores.get(owner).map(|s| s.verified).unwrap_or(false)
    }

    /// The store entry for an owner, verified or not
    pub async fn get_store_info(&self, owner: &Address) -> Option<Store> {
        let stores = self.stores.read().await;
        stores.get(owner).cloned()
    }
}
