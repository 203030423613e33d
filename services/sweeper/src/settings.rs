//! Sweeper settings

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Settings read from `SWEEPER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperSettings {
    /// Six-field cron expression, seconds first (SWEEPER_SCHEDULE)
    pub schedule: String,
    /// Sweep once before the first scheduled run (SWEEPER_RUN_ON_START)
    pub run_on_start: bool,
}

impl SweeperSettings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            // Hourly, on the hour
            .set_default("schedule", "0 0 * * * *")?
            .set_default("run_on_start", true)?
            .add_source(Environment::with_prefix("SWEEPER"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        unsafe {
            std::env::remove_var("SWEEPER_SCHEDULE");
            std::env::remove_var("SWEEPER_RUN_ON_START");
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let settings = SweeperSettings::load().unwrap();

        assert_eq!(settings.schedule, "0 0 * * * *");
        assert!(settings.run_on_start);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("SWEEPER_SCHEDULE", "0 */5 * * * *");
            std::env::set_var("SWEEPER_RUN_ON_START", "false");
        }

        let settings = SweeperSettings::load().unwrap();

        assert_eq!(settings.schedule, "0 */5 * * * *");
        assert!(!settings.run_on_start);
        clear_env();
    }
}
