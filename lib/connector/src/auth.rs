//! App-only access tokens for the connector service.

use crate::config::ConnectorConfig;
use async_trait::async_trait;
use notiteams_core::TransportError;
use oauth2::basic::BasicClient;
use oauth2::{AuthType, ClientId, ClientSecret, Scope, TokenResponse, TokenUrl};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Scope granting access to the Bot Connector service.
pub const BOT_FRAMEWORK_SCOPE: &str = "https://api.botframework.com/.default";

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token response carries no `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

/// A bearer token and the instant it stops being valid.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: Instant,
}

impl AccessToken {
    /// Creates a token valid for `lifetime` from now.
    #[must_use]
    pub fn new(secret: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            secret: secret.into(),
            expires_at: Instant::now() + lifetime,
        }
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Whether the token is still usable without a refresh.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplies bearer tokens for connector requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns a currently valid bearer token.
    async fn access_token(&self) -> Result<String, TransportError>;
}

/// Client-credentials token source with an in-memory cache.
///
/// Concurrent callers share one refresh: the cache lock is held while a new
/// token is fetched.
pub struct ClientCredentials {
    client_id: String,
    client_secret: String,
    token_url: TokenUrl,
    http: reqwest::Client,
    cached: Mutex<Option<AccessToken>>,
}

impl ClientCredentials {
    /// Creates a token source for the configured bot credentials.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Authentication`] if the token endpoint URL
    /// is invalid or the HTTP client cannot be built.
    pub fn new(config: &ConnectorConfig) -> Result<Self, TransportError> {
        let token_url = TokenUrl::new(config.token_url()).map_err(|e| {
            TransportError::Authentication {
                details: format!("invalid token URL: {e}"),
            }
        })?;

        // The token endpoint must not be allowed to redirect credentials.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Authentication {
                details: format!("HTTP client error: {e}"),
            })?;

        Ok(Self {
            client_id: config.app_id.clone(),
            client_secret: config.app_password.clone(),
            token_url,
            http,
            cached: Mutex::new(None),
        })
    }

    async fn fetch(&self) -> Result<AccessToken, TransportError> {
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(self.token_url.clone());

        let response = client
            .exchange_client_credentials()
            .add_scope(Scope::new(BOT_FRAMEWORK_SCOPE.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| TransportError::Authentication {
                details: format!("token request failed: {e}"),
            })?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_LIFETIME);
        debug!(expires_in_seconds = lifetime.as_secs(), "obtained connector access token");
        Ok(AccessToken::new(
            response.access_token().secret().clone(),
            lifetime,
        ))
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn access_token(&self) -> Result<String, TransportError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.secret().to_string());
        }

        let token = self.fetch().await?;
        let secret = token.secret().to_string();
        *cached = Some(token);
        Ok(secret)
    }
}
