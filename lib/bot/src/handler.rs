//! Activity handling.

use crate::activity::Activity;
use crate::describe::{describe_conversation, token_message};
use crate::error::BotError;
use notiteams_core::{
    ConversationKey, ConversationToken, DeletionEntryId, DirectoryLookup, MessageTransport, Result,
    TokenRequest,
};
use notiteams_registry::{IdentityRecorder, RecordSummary, Registry, RegistryError};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Identity mappings remembered by the dedup cache unless configured
/// otherwise.
pub const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

/// A token that was issued and delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: ConversationToken,
    /// Id of the private message carrying the token.
    pub message_id: String,
}

/// What handling one activity did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub identities: RecordSummary,
    pub issued: Option<IssuedToken>,
}

/// Routes inbound activities to the registry and the transport.
pub struct BotHandler {
    registry: Arc<dyn Registry>,
    recorder: IdentityRecorder,
    transport: Arc<dyn MessageTransport>,
    directory: Arc<dyn DirectoryLookup>,
}

fn registry_error(report: impl std::fmt::Display) -> BotError {
    BotError::Registry {
        details: report.to_string(),
    }
}

fn serialization_error(e: serde_json::Error) -> BotError {
    BotError::Serialization {
        details: e.to_string(),
    }
}

impl BotHandler {
    #[must_use]
    pub fn new(
        registry: Arc<dyn Registry>,
        transport: Arc<dyn MessageTransport>,
        directory: Arc<dyn DirectoryLookup>,
        dedup_capacity: usize,
    ) -> Self {
        Self {
            recorder: IdentityRecorder::new(Arc::clone(&registry), dedup_capacity),
            registry,
            transport,
            directory,
        }
    }

    /// Handles one activity: records the identities it mentions, then
    /// issues a token if it asks for one.
    ///
    /// # Errors
    ///
    /// Returns an error if token issuance or delivery fails. Identity
    /// write failures are only counted.
    #[instrument(skip_all, fields(kind = %activity.kind))]
    pub async fn on_activity(&self, activity: &Activity) -> Result<TurnOutcome, BotError> {
        let identities = self.recorder.record_all(&activity.identities()).await;

        let issued = if activity.is_token_request() {
            self.request_token(activity).await?
        } else {
            None
        };

        Ok(TurnOutcome { identities, issued })
    }

    /// Issues the token for the activity's conversation and requester and
    /// sends it to the requester privately.
    ///
    /// Returns `None` without side effects when the activity lacks the
    /// tenant, the conversation, or a requester with a directory id.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Registry`] if the token cannot be issued and
    /// [`BotError::Delivery`] if it cannot be sent.
    pub async fn request_token(&self, activity: &Activity) -> Result<Option<IssuedToken>, BotError> {
        let Some(tenant_id) = activity.tenant_id() else {
            warn!("token request without channel data");
            return Ok(None);
        };
        let Some(conversation_id) = activity.base_conversation_id() else {
            warn!("token request without conversation");
            return Ok(None);
        };
        let Some(requester) = activity.from.as_ref() else {
            warn!("token request without requester");
            return Ok(None);
        };
        let Some(requester_id) = requester.aad_object_id.as_deref() else {
            warn!(platform_user_id = %requester.id, "token requester has no directory id");
            return Ok(None);
        };

        let request = TokenRequest::new(
            ConversationKey::new(tenant_id, conversation_id, requester_id),
            serde_json::to_string(&activity.conversation_reference())
                .map_err(serialization_error)?,
            serde_json::to_string(activity).map_err(serialization_error)?,
        );
        let token = self
            .registry
            .get_or_create_token(&request)
            .await
            .map_err(registry_error)?;

        let description =
            describe_conversation(activity, requester_id, self.directory.as_ref()).await;
        let message_id = self
            .transport
            .send_private_message(tenant_id, &requester.id, &token_message(&description, &token))
            .await
            .map_err(BotError::Delivery)?;

        info!(key = %request.key, %message_id, "token delivered");
        Ok(Some(IssuedToken { token, message_id }))
    }

    /// Sends `content` privately to the user with the given directory id.
    ///
    /// Returns `None` if the user has never been seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or the send fails.
    pub async fn notify(&self, external_id: &str, content: &str) -> Result<Option<String>, BotError> {
        let Some(identity) = self
            .registry
            .find_identity(external_id)
            .await
            .map_err(registry_error)?
        else {
            return Ok(None);
        };

        let message_id = self
            .transport
            .send_private_message(&identity.tenant_id, &identity.platform_user_id, content)
            .await
            .map_err(BotError::Delivery)?;
        Ok(Some(message_id))
    }

    /// Queues a sent message for deletion by the reaper.
    pub async fn schedule_deletion(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<DeletionEntryId, RegistryError> {
        self.registry
            .schedule_deletion(conversation_id, message_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use notiteams_core::{DeleteOutcome, DirectoryError, DirectoryMember, TransportError};
    use notiteams_registry::InMemoryRegistry;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<(String, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageTransport for RecordingTransport {
        async fn delete_message(
            &self,
            _conversation_id: &str,
            _message_id: &str,
        ) -> std::result::Result<DeleteOutcome, TransportError> {
            Ok(DeleteOutcome::Deleted)
        }

        async fn send_private_message(
            &self,
            tenant_id: &str,
            platform_user_id: &str,
            content: &str,
        ) -> std::result::Result<String, TransportError> {
            if self.fail {
                return Err(TransportError::Rejected {
                    status: 403,
                    body: "blocked".to_string(),
                });
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push((
                tenant_id.to_string(),
                platform_user_id.to_string(),
                content.to_string(),
            ));
            Ok(format!("msg-{}", sent.len()))
        }
    }

    struct EmptyDirectory;

    #[async_trait]
    impl DirectoryLookup for EmptyDirectory {
        async fn chat_members(
            &self,
            _chat_id: &str,
        ) -> std::result::Result<Vec<DirectoryMember>, DirectoryError> {
            Ok(Vec::new())
        }

        async fn team_name(
            &self,
            _team_id: &str,
        ) -> std::result::Result<Option<String>, DirectoryError> {
            Ok(None)
        }
    }

    fn handler(
        registry: &Arc<InMemoryRegistry>,
        transport: &Arc<RecordingTransport>,
    ) -> BotHandler {
        BotHandler::new(
            registry.clone(),
            transport.clone(),
            Arc::new(EmptyDirectory),
            DEFAULT_DEDUP_CAPACITY,
        )
    }

    fn token_request() -> Activity {
        serde_json::from_value(json!({
            "type": "message",
            "id": "1700000000001",
            "from": {"id": "29:alice", "name": "Alice", "aadObjectId": "aad-alice"},
            "recipient": {"id": "28:bot"},
            "conversation": {
                "id": "19:chat@thread.v2;messageid=1700000000001",
                "conversationType": "groupChat",
                "name": "Ops"
            },
            "channelData": {"tenant": {"id": "t1"}},
            "value": {"action": "requestToken"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn token_request_issues_and_delivers() {
        let registry = Arc::new(InMemoryRegistry::new());
        let transport = Arc::new(RecordingTransport::default());
        let handler = handler(&registry, &transport);

        let outcome = handler.on_activity(&token_request()).await.unwrap();
        let issued = outcome.issued.unwrap();
        assert_eq!(issued.message_id, "msg-1");
        assert_eq!(outcome.identities.written, 1);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "t1");
        assert_eq!(sent[0].1, "29:alice");
        assert_eq!(
            sent[0].2,
            format!(
                "Hi there, the token to publish to group chat named 'Ops' is:\n`{}`\n",
                issued.token
            )
        );

        let reference = registry
            .resolve_token(issued.token.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reference.key.conversation_id, "19:chat@thread.v2");
        assert_eq!(reference.key.requester_id, "aad-alice");
    }

    #[tokio::test]
    async fn repeated_request_resends_the_same_token() {
        let registry = Arc::new(InMemoryRegistry::new());
        let transport = Arc::new(RecordingTransport::default());
        let handler = handler(&registry, &transport);

        let first = handler.on_activity(&token_request()).await.unwrap();
        let second = handler.on_activity(&token_request()).await.unwrap();

        assert_eq!(first.issued.unwrap().token, second.issued.unwrap().token);
        assert_eq!(second.identities.skipped, 1);
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn plain_message_only_records_identities() {
        let registry = Arc::new(InMemoryRegistry::new());
        let transport = Arc::new(RecordingTransport::default());
        let handler = handler(&registry, &transport);

        let mut activity = token_request();
        activity.text = Some("hello".to_string());
        let outcome = handler.on_activity(&activity).await.unwrap();

        assert!(outcome.issued.is_none());
        assert!(transport.sent().is_empty());
        assert!(registry.find_identity("aad-alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn request_without_tenant_is_ignored() {
        let registry = Arc::new(InMemoryRegistry::new());
        let transport = Arc::new(RecordingTransport::default());
        let handler = handler(&registry, &transport);

        let mut activity = token_request();
        activity.channel_data = None;
        assert!(handler.request_token(&activity).await.unwrap().is_none());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn registry_failure_is_an_error() {
        let registry = Arc::new(InMemoryRegistry::new());
        let transport = Arc::new(RecordingTransport::default());
        let handler = handler(&registry, &transport);
        registry.shutdown().await;

        let err = handler.request_token(&token_request()).await.unwrap_err();
        assert!(err.to_string().contains("registry operation failed"));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_an_error() {
        let registry = Arc::new(InMemoryRegistry::new());
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..RecordingTransport::default()
        });
        let handler = handler(&registry, &transport);

        let err = handler.request_token(&token_request()).await.unwrap_err();
        assert!(err.to_string().contains("token delivery failed"));
    }

    #[tokio::test]
    async fn notify_uses_recorded_identity() {
        let registry = Arc::new(InMemoryRegistry::new());
        let transport = Arc::new(RecordingTransport::default());
        let handler = handler(&registry, &transport);

        assert!(handler.notify("aad-alice", "hi").await.unwrap().is_none());

        let mut activity = token_request();
        activity.value = None;
        handler.on_activity(&activity).await.unwrap();

        let id = handler.notify("aad-alice", "hi").await.unwrap();
        assert_eq!(id.as_deref(), Some("msg-1"));
        assert_eq!(transport.sent()[0].1, "29:alice");
    }

    #[tokio::test]
    async fn schedule_deletion_queues_entry() {
        let registry = Arc::new(InMemoryRegistry::new());
        let transport = Arc::new(RecordingTransport::default());
        let handler = handler(&registry, &transport);

        handler.schedule_deletion("c1", "m1").await.unwrap();
        assert_eq!(registry.pending_deletions(), 1);
    }
}
