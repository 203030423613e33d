use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod error;
mod middleware;
mod models;
mod routes;
mod settings;
mod state;

use common::database::{DatabaseConfig, health_check, init_pool};
use rides::{PgStore, RideService};
use tokio::net::TcpListener;

use crate::{middleware::AuthConfig, settings::ApiSettings, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting ride API service");

    let settings = ApiSettings::load()?;
    let auth = AuthConfig::from_env().map_err(anyhow::Error::msg)?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let store = PgStore::new(pool.clone());
    store.migrate().await?;

    let app_state = AppState {
        rides: RideService::from_store(store),
        auth,
        db_pool: Some(pool),
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state, settings.request_timeout());

    let listener = TcpListener::bind(&settings.bind_address).await?;
    info!("API service listening on {}", settings.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
