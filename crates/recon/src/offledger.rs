//! Off-ledger transaction records
//!
//! Onramp rows are created when a fiat payment intent opens and move to
//! Completed only after the corresponding on-ledger mint is observed. Rows
//! are append/update only and never deleted, for audit. The Pending to
//! Completed transition is conditional so two overlapping intake jobs cannot
//! double-process the same row.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use coop_core::utils::timestamp_secs;
use coop_core::{Address, Amount, JsonStorage, Storage};

use crate::{ReconError, ReconResult};

/// Storage path prefixes
const ONRAMP_PATH: &str = "recon/onramp/";
const PURCHASES_PATH: &str = "recon/purchases/";

/// Lifecycle of an onramp transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnrampStatus {
    /// Fiat payment intent opened; no mint observed yet
    Pending,
    /// A confirmed on-ledger mint was observed
    Completed,
    /// The fiat payment failed
    Failed,
}

/// One fiat-to-token onramp record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnrampTransaction {
    /// Unique row identifier
    pub id: String,
    /// The purchasing user
    pub user_id: String,
    /// Fiat amount, in minor units (cents)
    pub amount_fiat: u64,
    /// Token amount expected to be minted
    pub amount_token: Amount,
    /// Card-payment processor that took the fiat payment
    pub processor: String,
    /// Current status
    pub status: OnrampStatus,
    /// Reference of the observed mint event, once completed
    pub mint_event_ref: Option<String>,
    /// When the intent was opened, in seconds
    pub created_at: u64,
    /// When the row moved to Completed
    pub completed_at: Option<u64>,
    /// When the row moved to Failed
    pub failed_at: Option<u64>,
}

/// A locally recorded purchase, mirroring a PurchaseSettled ledger event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRecord {
    /// Correlation reference shared with the ledger event
    pub reference: String,
    /// The buyer
    pub buyer: Address,
    /// The store owner
    pub store_owner: Address,
    /// Purchase amount
    pub amount: Amount,
    /// Reward minted for the purchase
    pub reward: Amount,
    /// When the row was recorded, in seconds
    pub recorded_at: u64,
}

/// The off-ledger record store
pub struct OnrampStore {
    storage: Arc<dyn Storage>,
    onramp: RwLock<HashMap<String, OnrampTransaction>>,
    purchases: RwLock<HashMap<String, PurchaseRecord>>,
}

impl OnrampStore {
    /// Create the store, loading persisted rows
    pub async fn new(storage: Arc<dyn Storage>) -> ReconResult<Self> {
        let mut onramp = HashMap::new();
        for key in storage.list(ONRAMP_PATH).await? {
            let row: OnrampTransaction = storage.get_json(&key).await?;
            onramp.insert(row.id.clone(), row);
        }
        let mut purchases = HashMap::new();
        for key in storage.list(PURCHASES_PATH).await? {
            let row: PurchaseRecord = storage.get_json(&key).await?;
            purchases.insert(row.reference.clone(), row);
        }
        info!(
            "Off-ledger store loaded: {} onramp rows, {} purchases",
            onramp.len(),
            purchases.len()
        );

        Ok(Self {
            storage,
            onramp: RwLock::new(onramp),
            purchases: RwLock::new(purchases),
        })
    }

    async fn persist_onramp(&self, row: &OnrampTransaction) -> ReconResult<()> {
        self.storage
            .put_json(&format!("{}{}", ONRAMP_PATH, row.id), row)
            .await?;
        Ok(())
    }

    /// Record a new onramp intent; returns the row id
    pub async fn record_onramp_transaction(
        &self,
        user_id: &str,
        amount_fiat: u64,
        amount_token: Amount,
        processor: &str,
    ) -> ReconResult<String> {
        let row = OnrampTransaction {
            id: format!("onramp-{}", uuid::Uuid::new_v4()),
            user_id: user_id.to_string(),
            amount_fiat,
            amount_token,
            processor: processor.to_string(),
            status: OnrampStatus::Pending,
            mint_event_ref: None,
            created_at: timestamp_secs(),
            completed_at: None,
            failed_at: None,
        };
        self.persist_onramp(&row).await?;

        let id = row.id.clone();
        let mut onramp = self.onramp.write().await;
        onramp.insert(id.clone(), row);
        info!("Recorded onramp intent {} for user {}", id, user_id);
        Ok(id)
    }

    /// Current status of an onramp row, for collaborator polling
    pub async fn get_onramp_status(&self, id: &str) -> ReconResult<OnrampStatus> {
        let onramp = self.onramp.read().await;
        onramp
            .get(id)
            .map(|row| row.status)
            .ok_or_else(|| ReconError::TransactionNotFound(id.to_string()))
    }

    /// Conditionally move a row from Pending to Completed
    ///
    /// At-most-once: if the row already left Pending, the update is rejected
    /// with `StateConflict` and nothing is written.
    pub async fn mark_completed(&self, id: &str, mint_event_ref: &str) -> ReconResult<()> {
        self.mark_completed_at(timestamp_secs(), id, mint_event_ref).await
    }

    /// Conditional completion with an explicit wall-clock reading
    pub async fn mark_completed_at(
        &self,
        now: u64,
        id: &str,
        mint_event_ref: &str,
    ) -> ReconResult<()> {
        let updated = {
            let mut onramp = self.onramp.write().await;
            let row = onramp
                .get_mut(id)
                .ok_or_else(|| ReconError::TransactionNotFound(id.to_string()))?;
            if row.status != OnrampStatus::Pending {
                return Err(ReconError::StateConflict(format!(
                    "row {} is {:?}, not Pending",
                    id, row.status
                )));
            }
            row.status = OnrampStatus::Completed;
            row.mint_event_ref = Some(mint_event_ref.to_string());
            row.completed_at = Some(now);
            row.clone()
        };
        self.persist_onramp(&updated).await?;
        info!("Onramp row {} completed against {}", id, mint_event_ref);
        Ok(())
    }

    /// Conditionally move a row from Pending to Failed
    pub async fn mark_failed(&self, id: &str) -> ReconResult<()> {
        let updated = {
            let mut onramp = self.onramp.write().await;
            let row = onramp
                .get_mut(id)
                .ok_or_else(|| ReconError::TransactionNotFound(id.to_string()))?;
            if row.status != OnrampStatus::Pending {
                return Err(ReconError::StateConflict(format!(
                    "row {} is {:?}, not Pending",
                    id, row.status
                )));
            }
            row.status = OnrampStatus::Failed;
            row.failed_at = Some(timestamp_secs());
            row.clone()
        };
        self.persist_onramp(&updated).await?;
        Ok(())
    }

    /// Record a locally observed purchase
    pub async fn record_purchase(&self, record: PurchaseRecord) -> ReconResult<()> {
        self.storage
            .put_json(&format!("{}{}", PURCHASES_PATH, record.reference), &record)
            .await?;
        let mut purchases = self.purchases.write().await;
        purchases.insert(record.reference.clone(), record);
        Ok(())
    }

    /// Snapshot of all onramp rows
    pub async fn onramp_rows(&self) -> Vec<OnrampTransaction> {
        let onramp = self.onramp.read().await;
        let mut rows: Vec<_> = onramp.values().cloned().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }

    /// Snapshot of all purchase rows
    pub async fn purchase_rows(&self) -> Vec<PurchaseRecord> {
        let purchases = self.purchases.read().await;
        let mut rows: Vec<_> = purchases.values().cloned().collect();
        rows.sort_by(|a, b| a.reference.cmp(&b.reference));
        rows
    }
}
