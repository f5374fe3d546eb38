//! Append-only ledger event log
//!
//! Every state transition appends exactly one event carrying a caller-chosen
//! correlation reference. Reconciliation correlates these references against
//! the off-ledger transaction records; they are never reused across events.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use coop_core::utils::timestamp_secs;
use coop_core::{Address, Amount, Hash, JsonStorage, Storage};

use crate::LedgerResult;

/// Storage path prefix for events
const EVENTS_PATH: &str = "ledger/events/";

/// The payload of a ledger event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Spending tokens minted
    Minted {
        to: Address,
        amount: Amount,
        minter: Address,
        rate_limited: bool,
    },
    /// Spending tokens moved between accounts
    Transferred {
        from: Address,
        to: Address,
        amount: Amount,
        fee: Amount,
    },
    /// Spending tokens burned
    Burned { holder: Address, amount: Amount },
    /// Reputation tokens awarded
    Awarded {
        to: Address,
        amount: Amount,
        reason: Hash,
    },
    /// Reputation tokens slashed
    Slashed {
        target: Address,
        amount: Amount,
        reason: Hash,
    },
    /// A purchase settled by the payment router: transfer plus reward
    PurchaseSettled {
        buyer: Address,
        store_owner: Address,
        amount: Amount,
        reward: Amount,
    },
    /// Membership added
    MemberAdded { address: Address },
    /// Membership revoked
    MemberRemoved { address: Address },
    /// Store verified in the registry
    StoreVerified { owner: Address, category: Hash },
    /// Store unverified
    StoreUnverified { owner: Address },
    /// Reward policy created or replaced
    PolicySet { scope: String },
    /// Role granted
    RoleGranted { address: Address, role: String },
    /// Role revoked
    RoleRevoked { address: Address, role: String },
}

/// One entry in the ledger's total order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the global sequence
    pub seq: u64,
    /// Wall-clock time the event was appended, in seconds
    pub timestamp: u64,
    /// Correlation reference chosen by the caller
    pub reference: String,
    /// The event payload
    pub kind: EventKind,
}

/// The append-only event log
pub struct EventLog {
    storage: Arc<dyn Storage>,
    events: RwLock<Vec<LedgerEvent>>,
}

impl EventLog {
    /// Create an event log, loading any persisted events
    pub async fn new(storage: Arc<dyn Storage>) -> LedgerResult<Self> {
        let mut events = Vec::new();
        let keys = storage.list(EVENTS_PATH).await?;
        for key in keys {
            match storage.get_json::<LedgerEvent>(&key).await {
                Ok(event) => events.push(event),
                Err(e) => error!("Failed to load event {}: {}", key, e),
            }
        }
        events.sort_by_key(|e| e.seq);
        info!("Loaded {} ledger events", events.len());

        Ok(Self {
            storage,
            events: RwLock::new(events),
        })
    }

    /// Append an event at the current wall-clock time
    pub async fn append(&self, kind: EventKind, reference: String) -> LedgerResult<LedgerEvent> {
        self.append_at(timestamp_secs(), kind, reference).await
    }

    /// Append an event with an explicit timestamp
    ///
    /// The ledger substrate stamps events with the wall clock read at the
    /// moment of the call; deterministic replays and tests supply it here.
    pub async fn append_at(
        &self,
        now: u64,
        kind: EventKind,
        reference: String,
    ) -> LedgerResult<LedgerEvent> {
        let mut events = self.events.write().await;
        let seq = events.len() as u64;
        let event = LedgerEvent {
            seq,
            timestamp: now,
            reference,
            kind,
        };

        self.storage
            .put_json(&format!("{}{:012}", EVENTS_PATH, seq), &event)
            .await?;
        events.push(event.clone());

        debug!("Appended event seq={} ref={}", event.seq, event.reference);
        Ok(event)
    }

    /// All events with `start <= timestamp < end`, in sequence order
    pub async fn events_in_window(&self, start: u64, end: u64) -> LedgerResult<Vec<LedgerEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp < end)
            .cloned()
            .collect())
    }

    /// A snapshot of the full log
    pub async fn all_events(&self) -> Vec<LedgerEvent> {
        self.events.read().await.clone()
    }

    /// Current length of the log
    pub async fn len(&self) -> u64 {
        self.events.read().await.len() as u64
    }

    /// Whether the log is empty
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}
