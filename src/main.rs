//! Collection run entry point
//!
//! Loads configuration, opens the listing store, and runs one collection +
//! reconciliation pass for every configured region. Exits non-zero when any
//! region run failed.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use land_collector_lib::application::ListingCollector;
use land_collector_lib::infrastructure::parsing::RecordProcessor;
use land_collector_lib::infrastructure::{
    ConfigManager, LandApiClient, SqliteListingStore, StaticCredential,
};
use land_collector_lib::domain::stats::ParseStats;
use land_collector_lib::infrastructure::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let config = config_manager.initialize_or_load().await?;
    init_logging(&config.logging)?;

    if config.collector.regions.is_empty() {
        anyhow::bail!(
            "no regions configured; add region codes to {:?}",
            config_manager.config_path
        );
    }

    let store = Arc::new(SqliteListingStore::connect(&config.collector.database_path).await?);
    let credentials = Arc::new(
        StaticCredential::from_env().context("credential setup failed")?,
    );
    let api = LandApiClient::new(config.api.clone())?;
    let processor = RecordProcessor::new(Arc::new(ParseStats::new()));

    let collector = ListingCollector::new(
        api,
        credentials,
        processor,
        store,
        config.collector.clone(),
    );

    info!(
        "🚀 land-collector starting: {} region(s), grace period {} days",
        config.collector.regions.len(),
        config.collector.grace_period_days
    );

    let reports = collector.run().await;
    let failures = reports.iter().filter(|r| r.is_err()).count();
    for report in reports.iter().flatten() {
        info!("📊 {}", report.summary());
    }

    if failures > 0 {
        error!("{failures} region run(s) failed");
        std::process::exit(1);
    }
    Ok(())
}
