//! Conversation references, tokens, and the token issuance states.

use crate::id::{ConversationReferenceId, ConversationTokenId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Description attached to the token created on first request.
pub const DEFAULT_TOKEN_DESCRIPTION: &str = "default initial token for this conversation";

/// The (tenant, conversation, requester) triple that identifies a
/// conversation reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    /// Tenant id.
    pub tenant_id: String,
    /// Platform id of the conversation.
    pub conversation_id: String,
    /// Directory id of the user who asked for the token.
    pub requester_id: String,
}

impl ConversationKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        conversation_id: impl Into<String>,
        requester_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            conversation_id: conversation_id.into(),
            requester_id: requester_id.into(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.tenant_id, self.conversation_id, self.requester_id
        )
    }
}

/// A request for the token of a conversation.
///
/// The serialized payloads are stored verbatim when the reference is first
/// created and are only ever read back by the message transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Identifying triple.
    pub key: ConversationKey,
    /// Serialized conversation reference context.
    pub serialized_reference: String,
    /// Serialized originating activity.
    pub serialized_activity: String,
}

impl TokenRequest {
    /// Creates a new token request.
    #[must_use]
    pub fn new(
        key: ConversationKey,
        serialized_reference: impl Into<String>,
        serialized_activity: impl Into<String>,
    ) -> Self {
        Self {
            key,
            serialized_reference: serialized_reference.into(),
            serialized_activity: serialized_activity.into(),
        }
    }
}

/// A durable record of a conversation, sufficient to resume it for
/// outbound messaging. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationReference {
    /// Row id.
    pub id: ConversationReferenceId,
    /// Identifying triple.
    pub key: ConversationKey,
    /// Serialized conversation reference context.
    pub serialized_reference: String,
    /// Serialized originating activity.
    pub serialized_activity: String,
    /// When the reference was created.
    pub created_at: DateTime<Utc>,
}

/// Opaque credential bound to a conversation reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationToken(String);

impl ConversationToken {
    /// Generates a fresh random token value.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for ConversationToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConversationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A token row attached to a conversation reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Row id.
    pub id: ConversationTokenId,
    /// Owning reference.
    pub reference_id: ConversationReferenceId,
    /// The token value.
    pub token: ConversationToken,
    /// When the token was created.
    pub created_at: DateTime<Utc>,
    /// Free-text description.
    pub description: String,
}

/// Where a conversation triple stands in the token issuance protocol.
///
/// `HasToken` is terminal: every later request for the triple resolves to
/// the earliest-created token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceState {
    /// No reference row exists for the triple.
    NoReference,
    /// A reference exists but no token has been attached yet.
    ReferenceNoToken {
        /// The existing reference.
        reference_id: ConversationReferenceId,
    },
    /// A token exists.
    HasToken {
        /// The owning reference.
        reference_id: ConversationReferenceId,
        /// The earliest token attached to the reference.
        token: ConversationToken,
    },
}

impl IssuanceState {
    /// Builds the state from a reference lookup joined with its earliest
    /// token.
    #[must_use]
    pub fn from_lookup(lookup: Option<(ConversationReferenceId, Option<ConversationToken>)>) -> Self {
        match lookup {
            None => Self::NoReference,
            Some((reference_id, None)) => Self::ReferenceNoToken { reference_id },
            Some((reference_id, Some(token))) => Self::HasToken {
                reference_id,
                token,
            },
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoReference => "no_reference",
            Self::ReferenceNoToken { .. } => "reference_no_token",
            Self::HasToken { .. } => "has_token",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_distinct_and_non_empty() {
        let a = ConversationToken::generate();
        let b = ConversationToken::generate();
        assert!(!a.as_str().is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn issuance_state_from_lookup() {
        let reference_id = ConversationReferenceId::new();
        assert_eq!(IssuanceState::from_lookup(None), IssuanceState::NoReference);
        assert_eq!(
            IssuanceState::from_lookup(Some((reference_id, None))),
            IssuanceState::ReferenceNoToken { reference_id }
        );

        let token = ConversationToken::from("abc".to_string());
        let state = IssuanceState::from_lookup(Some((reference_id, Some(token.clone()))));
        assert_eq!(state.as_str(), "has_token");
        assert_eq!(
            state,
            IssuanceState::HasToken {
                reference_id,
                token
            }
        );
    }

    #[test]
    fn key_display_joins_triple() {
        let key = ConversationKey::new("t1", "c1", "u1");
        assert_eq!(key.to_string(), "t1/c1/u1");
    }
}
