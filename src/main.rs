//! Engine entry point
//!
//! Brings the full engine up over file storage and runs the scheduled
//! reconciliation loop until interrupted.

use std::env;
use std::sync::Arc;

use tracing::info;

use coop::core::{Address, FileStorage, Storage};
use coop::governance::DecayConfig;
use coop::recon::ReconConfig;
use coop::CoopSystem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    coop::init_tracing();

    let data_dir = env::var("COOP_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let admin = Address::new(env::var("COOP_ADMIN").unwrap_or_else(|_| "admin".to_string()));

    info!("Starting coop engine v{} (data: {})", coop::VERSION, data_dir);

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(data_dir).await?);
    let system = CoopSystem::new(
        storage,
        admin,
        DecayConfig::default(),
        ReconConfig::default(),
    )
    .await?;

    let recon = system.recon.clone();
    let handle = tokio::spawn(async move { recon.run_scheduled().await });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.abort();
    Ok(())
}
