//! Connector configuration.

use serde::Deserialize;

/// Bot credentials and channel service location.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    /// Bot application (client) id.
    #[serde(default)]
    pub app_id: String,

    /// Bot application secret.
    #[serde(default)]
    pub app_password: String,

    /// Tenant that issues the bot's access tokens.
    #[serde(default = "default_app_tenant_id")]
    pub app_tenant_id: String,

    /// Base URL of the channel's connector service.
    #[serde(default = "default_service_url")]
    pub service_url: String,
}

fn default_app_tenant_id() -> String {
    "botframework.com".to_string()
}

fn default_service_url() -> String {
    "https://smba.trafficmanager.net/amer/".to_string()
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_password: String::new(),
            app_tenant_id: default_app_tenant_id(),
            service_url: default_service_url(),
        }
    }
}

impl ConnectorConfig {
    /// Returns `true` when both the app id and secret are set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.app_password.is_empty()
    }

    /// The OAuth2 token endpoint for [`Self::app_tenant_id`].
    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.app_tenant_id
        )
    }
}
