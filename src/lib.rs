//! Cooperative token issuance, reward policy and reconciliation engine
//!
//! The engine is split into focused crates:
//!
//! - `coop-core`: amounts, hashing, the storage abstraction
//! - `coop-ledger`: the append-only event log and the role registry
//! - `coop-tokens`: the spending token and the reputation token
//! - `coop-market`: store registry, reward policies, the payment router
//! - `coop-governance`: inactivity decay and slash-batch proposals
//! - `coop-recon`: off-ledger records and reconciliation reports
//!
//! This crate re-exports all of them and provides [`CoopSystem`], a wiring
//! helper that brings the full engine up over one storage backend.

pub use coop_core as core;
pub use coop_governance as governance;
pub use coop_ledger as ledger;
pub use coop_market as market;
pub use coop_recon as recon;
pub use coop_tokens as tokens;

mod system;

pub use coop_core::init_tracing;
pub use system::CoopSystem;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
