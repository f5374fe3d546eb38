//! Ledger substrate boundary
//!
//! The underlying ledger provides a single global total order for all
//! state-mutating operations; every operation either fully applies or fully
//! reverts. This crate holds the two pieces every component shares: the
//! capability registry that gates privileged operations, and the append-only
//! event log that reconciliation and audit read from.

use thiserror::Error;

use coop_core::{Address, StorageError};

pub mod events;
pub mod roles;

pub use events::{EventKind, EventLog, LedgerEvent};
pub use roles::{labels, role_id, RoleId, RoleRegistry};

/// Error types for ledger substrate operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Caller does not hold the required capability
    #[error("Unauthorized: {caller} does not hold role {role}")]
    Unauthorized { caller: Address, role: String },

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error with storage
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for ledger substrate operations
pub type LedgerResult<T> = Result<T, LedgerError>;
