//! In-memory registry.
//!
//! Mirrors the Postgres registry's semantics without a database, for tests
//! and local runs. State lives behind one mutex, which makes each operation
//! atomic; the clock can be advanced to age deletion entries.

use crate::error::RegistryError;
use crate::registry::Registry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notiteams_core::{
    ConversationReference, ConversationReferenceId, ConversationToken, ConversationTokenId,
    DEFAULT_TOKEN_DESCRIPTION, DeletionEntry, DeletionEntryId, IdentityMapping, IssuanceState,
    Result, TokenRecord, TokenRequest,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    identities: HashMap<String, IdentityMapping>,
    references: Vec<ConversationReference>,
    tokens: Vec<TokenRecord>,
    deletions: Vec<DeletionEntry>,
    clock_offset: chrono::Duration,
    closed: bool,
}

impl State {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.clock_offset
    }

    fn ensure_open(&self, operation: &'static str) -> std::result::Result<(), RegistryError> {
        if self.closed {
            return Err(RegistryError::Connectivity {
                operation,
                details: "registry has been shut down".to_string(),
            });
        }
        Ok(())
    }

    /// Earliest token per reference, ties broken by insertion order.
    fn earliest_token(&self, reference_id: ConversationReferenceId) -> Option<&TokenRecord> {
        self.tokens
            .iter()
            .filter(|t| t.reference_id == reference_id)
            .min_by_key(|t| t.created_at)
    }

    fn issuance_state(&self, request: &TokenRequest) -> IssuanceState {
        let lookup = self
            .references
            .iter()
            .find(|r| r.key == request.key)
            .map(|r| (r.id, self.earliest_token(r.id).map(|t| t.token.clone())));
        IssuanceState::from_lookup(lookup)
    }
}

/// Registry that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the registry's clock forward.
    pub fn advance_clock(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        self.lock().clock_offset += by;
    }

    /// Number of deletion entries currently queued.
    #[must_use]
    pub fn pending_deletions(&self) -> usize {
        self.lock().deletions.len()
    }

    /// Number of token rows attached to the reference for `request`.
    #[must_use]
    pub fn token_count(&self, request: &TokenRequest) -> usize {
        let state = self.lock();
        state
            .references
            .iter()
            .find(|r| r.key == request.key)
            .map_or(0, |r| {
                state
                    .tokens
                    .iter()
                    .filter(|t| t.reference_id == r.id)
                    .count()
            })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn upsert_identity(&self, mapping: &IdentityMapping) -> Result<(), RegistryError> {
        let mut state = self.lock();
        state.ensure_open("upsert_identity")?;

        let merged = match state.identities.remove(&mapping.external_id) {
            Some(stored) => stored.merged_with(mapping.clone()),
            None => mapping.clone(),
        };
        state.identities.insert(merged.external_id.clone(), merged);
        Ok(())
    }

    async fn find_identity(
        &self,
        external_id: &str,
    ) -> Result<Option<IdentityMapping>, RegistryError> {
        let state = self.lock();
        state.ensure_open("find_identity")?;
        Ok(state.identities.get(external_id).cloned())
    }

    async fn get_or_create_token(
        &self,
        request: &TokenRequest,
    ) -> Result<ConversationToken, RegistryError> {
        let mut state = self.lock();
        state.ensure_open("get_or_create_token")?;
        let now = state.now();

        let reference_id = match state.issuance_state(request) {
            IssuanceState::HasToken { token, .. } => return Ok(token),
            IssuanceState::ReferenceNoToken { reference_id } => reference_id,
            IssuanceState::NoReference => {
                let reference = ConversationReference {
                    id: ConversationReferenceId::new(),
                    key: request.key.clone(),
                    serialized_reference: request.serialized_reference.clone(),
                    serialized_activity: request.serialized_activity.clone(),
                    created_at: now,
                };
                let id = reference.id;
                state.references.push(reference);
                id
            }
        };

        let token = ConversationToken::generate();
        state.tokens.push(TokenRecord {
            id: ConversationTokenId::new(),
            reference_id,
            token: token.clone(),
            created_at: now,
            description: DEFAULT_TOKEN_DESCRIPTION.to_string(),
        });
        Ok(token)
    }

    async fn resolve_token(
        &self,
        token: &str,
    ) -> Result<Option<ConversationReference>, RegistryError> {
        let state = self.lock();
        state.ensure_open("resolve_token")?;

        Ok(state
            .tokens
            .iter()
            .find(|t| t.token.as_str() == token)
            .and_then(|t| state.references.iter().find(|r| r.id == t.reference_id))
            .cloned())
    }

    async fn schedule_deletion(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<DeletionEntryId, RegistryError> {
        let mut state = self.lock();
        state.ensure_open("schedule_deletion")?;

        let entry = DeletionEntry {
            id: DeletionEntryId::new(),
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            created_at: state.now(),
        };
        let id = entry.id;
        state.deletions.push(entry);
        Ok(id)
    }

    async fn sweep_expired(&self, max_age: Duration) -> Result<Vec<DeletionEntry>, RegistryError> {
        let state = self.lock();
        state.ensure_open("sweep_expired")?;

        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let now = state.now();
        let mut expired: Vec<DeletionEntry> = state
            .deletions
            .iter()
            .filter(|e| e.is_expired(now, max_age))
            .cloned()
            .collect();
        expired.sort_by_key(|e| e.created_at);
        Ok(expired)
    }

    async fn delete_entry(&self, id: DeletionEntryId) -> Result<(), RegistryError> {
        let mut state = self.lock();
        state.ensure_open("delete_entry")?;
        state.deletions.retain(|e| e.id != id);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        !self.lock().closed
    }

    async fn shutdown(&self) {
        self.lock().closed = true;
    }
}
