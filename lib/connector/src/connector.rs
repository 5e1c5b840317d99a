//! The Bot Connector message transport.

use crate::auth::{ClientCredentials, TokenSource};
use crate::config::ConnectorConfig;
use crate::wire::{
    ConversationParameters, ConversationResourceResponse, MessageActivity, ResourceResponse,
};
use async_trait::async_trait;
use notiteams_core::{DeleteOutcome, MessageTransport, TransportError};
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends and deletes messages through the Bot Connector REST API.
pub struct BotConnector {
    app_id: String,
    service_url: Url,
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

impl BotConnector {
    /// Creates a connector authenticating with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the service or token URL is invalid.
    pub fn new(config: &ConnectorConfig) -> Result<Self, TransportError> {
        let tokens = Arc::new(ClientCredentials::new(config)?);
        Self::with_token_source(config, tokens)
    }

    /// Creates a connector that takes bearer tokens from `tokens`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service URL is invalid.
    pub fn with_token_source(
        config: &ConnectorConfig,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, TransportError> {
        let service_url = Url::parse(&config.service_url).map_err(|e| TransportError::Request {
            details: format!("invalid service URL '{}': {e}", config.service_url),
        })?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(request_error)?;

        Ok(Self {
            app_id: config.app_id.clone(),
            service_url,
            http,
            tokens,
        })
    }

    /// Joins `segments` onto the service URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.service_url.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Request {
                details: format!("service URL cannot be a base: {}", self.service_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn request_error(e: reqwest::Error) -> TransportError {
    TransportError::Request {
        details: e.to_string(),
    }
}

/// Maps the status of a delete to its outcome. `None` means rejected.
fn delete_outcome(status: StatusCode) -> Option<DeleteOutcome> {
    if status.is_success() {
        Some(DeleteOutcome::Deleted)
    } else if status == StatusCode::NOT_FOUND {
        Some(DeleteOutcome::AlreadyGone)
    } else {
        None
    }
}

async fn rejected(response: reqwest::Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TransportError::Rejected { status, body }
}

#[async_trait]
impl MessageTransport for BotConnector {
    #[instrument(skip(self))]
    async fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<DeleteOutcome, TransportError> {
        let url = self.endpoint(&["v3", "conversations", conversation_id, "activities", message_id])?;
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .delete(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(request_error)?;

        match delete_outcome(response.status()) {
            Some(outcome) => {
                debug!(?outcome, "delete answered");
                Ok(outcome)
            }
            None => {
                let err = rejected(response).await;
                warn!(error = %err, "delete rejected");
                Err(err)
            }
        }
    }

    #[instrument(skip(self, content))]
    async fn send_private_message(
        &self,
        tenant_id: &str,
        platform_user_id: &str,
        content: &str,
    ) -> Result<String, TransportError> {
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(self.endpoint(&["v3", "conversations"])?)
            .bearer_auth(&token)
            .json(&ConversationParameters::personal(
                &self.app_id,
                platform_user_id,
                tenant_id,
            ))
            .send()
            .await
            .map_err(request_error)?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        let conversation: ConversationResourceResponse =
            response.json().await.map_err(request_error)?;
        debug!(conversation_id = %conversation.id, "opened personal conversation");

        let response = self
            .http
            .post(self.endpoint(&["v3", "conversations", &conversation.id, "activities"])?)
            .bearer_auth(&token)
            .json(&MessageActivity::markdown(content))
            .send()
            .await
            .map_err(request_error)?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        let sent: ResourceResponse = response.json().await.map_err(request_error)?;

        sent.id
            .filter(|id| !id.is_empty())
            .ok_or(TransportError::MissingMessageId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Json, Path, State};
    use axum::http::HeaderMap;
    use axum::routing::{delete, post};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    struct StaticToken;

    #[async_trait]
    impl TokenSource for StaticToken {
        async fn access_token(&self) -> Result<String, TransportError> {
            Ok("test-token".to_string())
        }
    }

    struct FailingToken;

    #[async_trait]
    impl TokenSource for FailingToken {
        async fn access_token(&self) -> Result<String, TransportError> {
            Err(TransportError::Authentication {
                details: "no credentials".to_string(),
            })
        }
    }

    /// Requests seen by the fake connector service.
    #[derive(Default)]
    struct Seen {
        deletes: Vec<(String, String, Option<String>)>,
        conversations: Vec<Value>,
        activities: Vec<(String, Value)>,
    }

    type Shared = Arc<Mutex<Seen>>;

    async fn delete_activity(
        State(seen): State<Shared>,
        Path((conversation_id, activity_id)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> (StatusCode, &'static str) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let status = match activity_id.as_str() {
            "gone" => StatusCode::NOT_FOUND,
            "fail" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        };
        seen.lock()
            .unwrap()
            .deletes
            .push((conversation_id, activity_id, auth));
        (status, "boom")
    }

    async fn create_conversation(
        State(seen): State<Shared>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        seen.lock().unwrap().conversations.push(body);
        Json(json!({"id": "a:personal"}))
    }

    async fn send_activity(
        State(seen): State<Shared>,
        Path(conversation_id): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        seen.lock().unwrap().activities.push((conversation_id, body));
        Json(json!({"id": "activity-1"}))
    }

    async fn fake_service() -> (String, Shared) {
        let seen = Shared::default();
        let router = Router::new()
            .route(
                "/amer/v3/conversations/{conversation_id}/activities/{activity_id}",
                delete(delete_activity),
            )
            .route("/amer/v3/conversations", post(create_conversation))
            .route(
                "/amer/v3/conversations/{conversation_id}/activities",
                post(send_activity),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        (format!("http://{addr}/amer/"), seen)
    }

    fn connector(service_url: &str, tokens: Arc<dyn TokenSource>) -> BotConnector {
        let config = ConnectorConfig {
            app_id: "bot-app".to_string(),
            service_url: service_url.to_string(),
            ..ConnectorConfig::default()
        };
        BotConnector::with_token_source(&config, tokens).unwrap()
    }

    #[test]
    fn status_mapping() {
        assert_eq!(delete_outcome(StatusCode::OK), Some(DeleteOutcome::Deleted));
        assert_eq!(delete_outcome(StatusCode::NO_CONTENT), Some(DeleteOutcome::Deleted));
        assert_eq!(delete_outcome(StatusCode::NOT_FOUND), Some(DeleteOutcome::AlreadyGone));
        assert_eq!(delete_outcome(StatusCode::FORBIDDEN), None);
        assert_eq!(delete_outcome(StatusCode::BAD_GATEWAY), None);
    }

    #[test]
    fn endpoint_encodes_segments() {
        let connector = connector("https://smba.trafficmanager.net/amer/", Arc::new(StaticToken));
        let url = connector
            .endpoint(&["v3", "conversations", "19:a b@thread.v2", "activities", "1/2"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://smba.trafficmanager.net/amer/v3/conversations/19:a%20b@thread.v2/activities/1%2F2"
        );
    }

    #[test]
    fn invalid_service_url_is_rejected() {
        let config = ConnectorConfig {
            service_url: "not a url".to_string(),
            ..ConnectorConfig::default()
        };
        assert!(BotConnector::with_token_source(&config, Arc::new(StaticToken)).is_err());
    }

    #[tokio::test]
    async fn delete_sends_bearer_token() {
        let (url, seen) = fake_service().await;
        let connector = connector(&url, Arc::new(StaticToken));

        let outcome = connector
            .delete_message("19:chat@thread.v2", "1700000000000")
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.deletes,
            vec![(
                "19:chat@thread.v2".to_string(),
                "1700000000000".to_string(),
                Some("Bearer test-token".to_string()),
            )]
        );
    }

    #[tokio::test]
    async fn delete_of_missing_message_is_already_gone() {
        let (url, _seen) = fake_service().await;
        let connector = connector(&url, Arc::new(StaticToken));

        let outcome = connector.delete_message("c1", "gone").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn delete_server_error_is_rejected() {
        let (url, _seen) = fake_service().await;
        let connector = connector(&url, Arc::new(StaticToken));

        let err = connector.delete_message("c1", "fail").await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Rejected {
                status: 500,
                body: "boom".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn token_failure_stops_the_request() {
        let (url, seen) = fake_service().await;
        let connector = connector(&url, Arc::new(FailingToken));

        let err = connector.delete_message("c1", "m1").await.unwrap_err();
        assert!(matches!(err, TransportError::Authentication { .. }));
        assert!(seen.lock().unwrap().deletes.is_empty());
    }

    #[tokio::test]
    async fn private_message_opens_conversation_then_posts() {
        let (url, seen) = fake_service().await;
        let connector = connector(&url, Arc::new(StaticToken));

        let id = connector
            .send_private_message("tenant-1", "29:user", "hello")
            .await
            .unwrap();
        assert_eq!(id, "activity-1");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.conversations.len(), 1);
        assert_eq!(seen.conversations[0]["bot"]["id"], "bot-app");
        assert_eq!(seen.conversations[0]["members"][0]["id"], "29:user");
        assert_eq!(seen.conversations[0]["tenantId"], "tenant-1");
        assert_eq!(seen.conversations[0]["isGroup"], false);

        assert_eq!(seen.activities.len(), 1);
        assert_eq!(seen.activities[0].0, "a:personal");
        assert_eq!(seen.activities[0].1["text"], "hello");
    }
}
