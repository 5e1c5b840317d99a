//! Reaper timing configuration.

use serde::Deserialize;
use std::time::Duration;

/// How often the reaper sweeps and how old an entry must be to be swept.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaperConfig {
    /// Seconds between sweeps.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Minimum entry age in seconds before its message is deleted.
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: u64,
}

fn default_interval_seconds() -> u64 {
    30
}

fn default_max_age_seconds() -> u64 {
    10
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            max_age_seconds: default_max_age_seconds(),
        }
    }
}

impl ReaperConfig {
    /// Sweep interval. Never zero.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    /// Age threshold.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReaperConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(30));
        assert_eq!(config.max_age(), Duration::from_secs(10));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: ReaperConfig = serde_json::from_str(r#"{"max_age_seconds": 60}"#).unwrap();
        assert_eq!(config.interval_seconds, 30);
        assert_eq!(config.max_age_seconds, 60);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config = ReaperConfig {
            interval_seconds: 0,
            ..ReaperConfig::default()
        };
        assert_eq!(config.interval(), Duration::from_secs(1));
    }
}
