use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod scheduler;
mod settings;

use common::database::{DatabaseConfig, init_pool};
use rides::{ExpirySweeper, PgStore, RideService};
use scheduler::ExpiryScheduler;
use settings::SweeperSettings;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting ride expiry sweeper");

    let settings = SweeperSettings::load()?;

    // Initialize database connection
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    let store = PgStore::new(pool);
    store.migrate().await?;

    let scheduler = ExpiryScheduler::new(ExpirySweeper::new(RideService::from_store(store)));

    if settings.run_on_start {
        scheduler.run_once().await;
    }

    // Start the sweep scheduler
    let mut jobs = scheduler.start(&settings.schedule).await?;

    info!("Ride expiry sweeper started successfully");

    // Keep the service running
    tokio::signal::ctrl_c().await?;
    info!("Shutting down ride expiry sweeper");
    jobs.shutdown().await?;

    Ok(())
}
