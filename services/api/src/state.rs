//! Application state shared across handlers

use rides::RideService;
use sqlx::PgPool;

use crate::middleware::AuthConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub rides: RideService,
    pub auth: AuthConfig,
    /// Probed by the health endpoint when present
    pub db_pool: Option<PgPool>,
}
