//! Off-ledger bookkeeping and reconciliation
//!
//! The off-ledger store records onramp transactions and purchase rows as they
//! happen; the reconciliation service periodically diffs those records
//! against ledger events and produces a mismatch report. Mismatches are data,
//! never errors: only an I/O failure while building a report aborts the run.

use thiserror::Error;

use coop_core::StorageError;
use coop_ledger::LedgerError;

pub mod offledger;
pub mod report;
pub mod service;

pub use offledger::{OnrampStatus, OnrampStore, OnrampTransaction, PurchaseRecord};
pub use report::{Mismatch, MismatchKind, ReconciliationReport};
pub use service::{LedgerView, ReconConfig, ReconciliationService};

/// Error types for reconciliation operations
#[derive(Error, Debug)]
pub enum ReconError {
    /// Row does not exist
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Conditional update lost: the row left Pending before this writer
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Ledger events could not be read; the run aborts and is retried
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Substrate error while reading events
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Error with storage
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;
