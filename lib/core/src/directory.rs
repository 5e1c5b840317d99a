//! Read-only directory lookup contract.
//!
//! Used by the conversational layer to describe a conversation to the user.
//! The registry does not depend on it.

use async_trait::async_trait;
use std::fmt;

/// A member of a chat as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMember {
    /// External directory id, when known.
    pub external_id: Option<String>,
    /// Display name, when known.
    pub display_name: Option<String>,
}

/// Errors from directory lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The lookup failed.
    LookupFailed { details: String },
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LookupFailed { details } => write!(f, "directory lookup failed: {details}"),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Directory queries used to enrich display text.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Lists the members of a chat.
    async fn chat_members(&self, chat_id: &str) -> Result<Vec<DirectoryMember>, DirectoryError>;

    /// Returns the display name of a team.
    async fn team_name(&self, team_id: &str) -> Result<Option<String>, DirectoryError>;
}
