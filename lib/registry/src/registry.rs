//! The registry contract shared by the Postgres and in-memory stores.

use crate::error::RegistryError;
use async_trait::async_trait;
use notiteams_core::{
    ConversationReference, ConversationToken, DeletionEntry, DeletionEntryId, IdentityMapping,
    Result, TokenRequest,
};
use std::time::Duration;

/// Persistent store of identity mappings, conversation references, tokens
/// and deferred deletion entries.
///
/// Connectivity and invariant failures are returned to the caller and never
/// retried inside the registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Inserts or merges an identity mapping keyed by its external id.
    ///
    /// Tenant and platform id are always overwritten; the stored name is
    /// kept when the incoming one is absent.
    async fn upsert_identity(&self, mapping: &IdentityMapping) -> Result<(), RegistryError>;

    /// Looks up an identity mapping by external id.
    async fn find_identity(
        &self,
        external_id: &str,
    ) -> Result<Option<IdentityMapping>, RegistryError>;

    /// Returns the token for a conversation triple, creating the reference
    /// and the token as needed.
    ///
    /// Idempotent: repeated calls for the same triple return the same token.
    async fn get_or_create_token(
        &self,
        request: &TokenRequest,
    ) -> Result<ConversationToken, RegistryError>;

    /// Finds the conversation reference a token was issued for.
    async fn resolve_token(
        &self,
        token: &str,
    ) -> Result<Option<ConversationReference>, RegistryError>;

    /// Queues a sent message for deletion. The store assigns the timestamp.
    async fn schedule_deletion(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<DeletionEntryId, RegistryError>;

    /// Lists deletion entries strictly older than `max_age`, oldest first.
    ///
    /// Nothing is removed: the caller deletes each entry with
    /// [`Registry::delete_entry`] once the message is confirmed gone.
    async fn sweep_expired(&self, max_age: Duration) -> Result<Vec<DeletionEntry>, RegistryError>;

    /// Removes one deletion entry.
    async fn delete_entry(&self, id: DeletionEntryId) -> Result<(), RegistryError>;

    /// Issues a trivial read to prove the store is reachable.
    async fn health_check(&self) -> bool;

    /// Releases the store's resources. Later calls fail with a
    /// connectivity error.
    async fn shutdown(&self);
}
