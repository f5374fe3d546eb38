//! Core primitives for the cooperative token engine
//!
//! This crate provides the shared building blocks used across the ledger,
//! token, and reconciliation crates: content-addressed hashing, account
//! addresses, fixed-point amounts, async storage, and timestamp utilities.

pub mod amount;
pub mod crypto;
pub mod storage;
pub mod utils;

// Re-export key components
pub use amount::Amount;
pub use crypto::{label_key, sha256, Address, Hash};
pub use storage::{FileStorage, JsonStorage, MemoryStorage, Storage, StorageError, StorageResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the cooperative engine
pub fn init_tracing() {
    use tracing_subscriber::FmtSubscriber;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();

    // Ignore the error if a subscriber was already installed (tests)
    let _ = tracing::subscriber::set_global_default(subscriber);
}
