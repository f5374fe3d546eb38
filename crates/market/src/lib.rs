//! Marketplace layer: store registry, reward policy, payment routing
//!
//! The registry decides which sellers may participate, the policy engine
//! decides how much reputation a purchase generates, and the router is the
//! single entry point that couples the spending-token transfer with the
//! reputation award.

use thiserror::Error;

use coop_core::{Address, StorageError};
use coop_ledger::LedgerError;
use coop_tokens::TokenError;

pub mod policy;
pub mod registry;
pub mod router;

pub use policy::{PolicyScope, RewardPolicy, RewardPolicyEngine};
pub use registry::{Store, StoreRegistry};
pub use router::PaymentRouter;

/// Error types for marketplace operations
#[derive(Error, Debug)]
pub enum MarketError {
    /// Store is not verified in the registry
    #[error("Store not verified: {0}")]
    StoreNotVerified(Address),

    /// Owner already has a verified store entry
    #[error("Already verified: {0}")]
    AlreadyVerified(Address),

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Token-layer failure, propagated unchanged through the router
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Substrate failure, including failed role checks
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Error with storage
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for marketplace operations
pub type MarketResult<T> = Result<T, MarketError>;
