//! Registry configuration.

use serde::Deserialize;
use std::time::Duration;

/// Connection pool settings for the Postgres registry.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long to wait for a pooled connection, in seconds.
    #[serde(default = "default_acquire_timeout_seconds")]
    pub acquire_timeout_seconds: u64,

    /// `application_name` reported to Postgres.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Whether to apply the embedded migrations on startup.
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_seconds() -> u64 {
    30
}

fn default_application_name() -> String {
    "notiteams".to_string()
}

fn default_run_migrations() -> bool {
    true
}

impl DatabaseConfig {
    /// Pool acquire timeout.
    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout_seconds(),
            application_name: default_application_name(),
            run_migrations: default_run_migrations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_config_has_correct_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(30));
        assert_eq!(config.application_name, "notiteams");
        assert!(config.run_migrations);
    }
}
