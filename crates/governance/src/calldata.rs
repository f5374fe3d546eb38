//! Privileged-call payload encoding
//!
//! Administrative flows never execute privileged operations from the
//! application backend. They encode the call here and hand the payload to an
//! external multi-party execution mechanism (a threshold-signature treasury),
//! which submits it to the ledger once signed.

use serde::{Deserialize, Serialize};

use coop_core::{Address, Amount, Hash};

use crate::GovernanceResult;

/// Every privileged operation the treasury can execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PrivilegedCall {
    MintUnlimited {
        to: Address,
        amount: Amount,
    },
    SetMinterLimit {
        minter: Address,
        daily_limit: Amount,
    },
    SetTransferFee {
        fee_bps: u16,
        fee_recipient: Address,
    },
    Pause,
    Unpause,
    AddMember {
        address: Address,
    },
    RemoveMember {
        address: Address,
    },
    Award {
        to: Address,
        amount: Amount,
        reason: Hash,
    },
    Slash {
        target: Address,
        amount: Amount,
        reason: Hash,
    },
    VerifyStore {
        owner: Address,
        category_key: Hash,
        store_key: Hash,
    },
    UnverifyStore {
        owner: Address,
    },
    GrantRole {
        address: Address,
        role: String,
    },
    RevokeRole {
        address: Address,
        role: String,
    },
}

/// Encode a privileged call for external multi-party execution
pub fn encode(call: &PrivilegedCall) -> GovernanceResult<Vec<u8>> {
    Ok(serde_json::to_vec(call)?)
}

/// Decode a privileged-call payload
pub fn decode(payload: &[u8]) -> GovernanceResult<PrivilegedCall> {
    Ok(serde_json::from_slice(payload)?)
}
