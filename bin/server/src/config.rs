//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables; nested keys
//! use `__` as separator (for example `REAPER__INTERVAL_SECONDS`).

use notiteams_connector::ConnectorConfig;
use notiteams_reaper::ReaperConfig;
use notiteams_registry::DatabaseConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Port the HTTP listener binds to.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub reaper: ReaperConfig,

    /// Bot credentials and connector service location.
    #[serde(default)]
    pub connector: ConnectorConfig,
}

fn default_port() -> u16 {
    3978
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(source: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(source.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, config::ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_source(config::Environment::default().source(Some(vars)))
    }

    #[test]
    fn only_database_url_is_required() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/notiteams")]).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/notiteams");
        assert_eq!(config.port, 3978);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.reaper.interval_seconds, 30);
        assert_eq!(config.reaper.max_age_seconds, 10);
        assert_eq!(config.connector.app_tenant_id, "botframework.com");
    }

    #[test]
    fn missing_database_url_fails() {
        assert!(load(&[("PORT", "8080")]).is_err());
    }

    #[test]
    fn nested_keys_override_defaults() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/notiteams"),
            ("PORT", "8080"),
            ("DATABASE__MAX_CONNECTIONS", "20"),
            ("REAPER__INTERVAL_SECONDS", "5"),
            ("CONNECTOR__APP_ID", "app-id"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.reaper.interval_seconds, 5);
        assert_eq!(config.connector.app_id, "app-id");
    }
}
