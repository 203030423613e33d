//! HTTP service settings

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Settings read from `API_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Socket address to listen on (API_BIND_ADDRESS)
    pub bind_address: String,
    /// Upper bound on handling one request (API_REQUEST_TIMEOUT_SECS)
    pub request_timeout_secs: u64,
}

impl ApiSettings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("bind_address", "0.0.0.0:3001")?
            .set_default("request_timeout_secs", 15_i64)?
            .add_source(Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
