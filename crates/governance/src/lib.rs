//! Governance workflows for the cooperative
//!
//! Inactivity decay is computed by an off-ledger monitor that proposes a
//! batch of slashes; the batch only executes after a configurable number of
//! approvers sign off. Privileged administrative operations are not executed
//! directly; their call payloads are encoded here and handed to an external
//! multi-party execution mechanism.

use thiserror::Error;

use coop_core::StorageError;
use coop_tokens::TokenError;

pub mod calldata;
pub mod decay;
pub mod proposals;

pub use calldata::{decode, encode, PrivilegedCall};
pub use decay::{DecayConfig, DecayEntry, DecayMonitor, DecayPolicy};
pub use proposals::{ProposalStatus, ProposalStore, SlashBatchProposal};

/// Error types for governance operations
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// Proposal does not exist
    #[error("Proposal not found: {0}")]
    ProposalNotFound(String),

    /// Proposal is not in the required lifecycle state
    #[error("Invalid proposal state: {0}")]
    InvalidProposalState(String),

    /// Approver is not in the eligible set, or already approved
    #[error("Invalid approval: {0}")]
    InvalidApproval(String),

    /// Malformed proposal parameters
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    /// Serialization error while encoding a privileged call
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Token-layer failure during batch execution
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Error with storage
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;
