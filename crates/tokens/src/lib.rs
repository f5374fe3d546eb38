//! Token ledgers for the cooperative
//!
//! Two linked assets: the stable-value spending token (UC) used for payments,
//! and the reputation token (SC) representing active membership and voting
//! weight. Both live in the ledger substrate and are mutated only through the
//! operations defined here.

use thiserror::Error;

use coop_core::{Address, Amount, StorageError};
use coop_ledger::LedgerError;

pub mod reputation;
pub mod spending;

pub use reputation::{MemberRecord, MemberStatus, ReputationToken};
pub use spending::{MinterConfig, SpendingToken, TransferReceipt};

/// Well-known reason codes for reputation awards and slashes
pub mod reasons {
    /// Reward generated by a purchase at a verified store
    pub const PURCHASE_REWARD: &str = "PURCHASE_REWARD";
    /// Governance-approved inactivity decay
    pub const INACTIVITY_DECAY: &str = "INACTIVITY_DECAY";
    /// Punitive governance slash
    pub const GOVERNANCE_SLASH: &str = "GOVERNANCE_SLASH";
}

/// Error types for token operations
#[derive(Error, Debug)]
pub enum TokenError {
    /// Substrate failure, including failed role checks; propagated unchanged
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Mint or transfer target is the null address
    #[error("Invalid target: null address")]
    InvalidTarget,

    /// Zero or otherwise malformed amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Expected business condition, surfaced to the caller
    #[error("Insufficient balance: have {available}, need {needed}")]
    InsufficientBalance { available: Amount, needed: Amount },

    /// Rolling daily mint limit would be exceeded
    #[error("Rate limit exceeded: {remaining} remaining in the current window")]
    RateLimitExceeded { remaining: Amount },

    /// Onramp minter has no configured daily limit
    #[error("Limit not configured for minter {0}")]
    LimitNotConfigured(Address),

    /// Operational halt; retry after unpause
    #[error("Contract paused")]
    ContractPaused,

    /// Address has no membership record or membership was revoked
    #[error("Not a member: {0}")]
    NotMember(Address),

    /// Balance arithmetic would overflow
    #[error("Amount overflow")]
    Overflow,

    /// Error with storage
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for token operations
pub type TokenResult<T> = Result<T, TokenError>;
