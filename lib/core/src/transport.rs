//! Message transport collaborator contract.
//!
//! The registry never talks to the chat platform itself. Outbound sends and
//! deletes go through this trait, so the reaper can be exercised without a
//! live channel.

use async_trait::async_trait;
use std::fmt;

/// Result of asking the transport to delete a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The message was deleted.
    Deleted,
    /// The platform reported the message as not found.
    AlreadyGone,
}

/// Errors from message transport operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not obtain credentials for the platform.
    Authentication { details: String },
    /// The request did not complete.
    Request { details: String },
    /// The platform answered with a non-success status.
    Rejected { status: u16, body: String },
    /// A send succeeded but the platform did not return a message id.
    MissingMessageId,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication { details } => {
                write!(f, "transport authentication failed: {details}")
            }
            Self::Request { details } => write!(f, "transport request failed: {details}"),
            Self::Rejected { status, body } => {
                write!(f, "transport rejected request with status {status}: {body}")
            }
            Self::MissingMessageId => write!(f, "transport response carried no message id"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Outbound messaging operations the core depends on.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deletes a previously sent message.
    async fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<DeleteOutcome, TransportError>;

    /// Opens a 1:1 conversation with a user and posts `content` to it.
    ///
    /// Returns the platform id of the posted message.
    async fn send_private_message(
        &self,
        tenant_id: &str,
        platform_user_id: &str,
        content: &str,
    ) -> Result<String, TransportError>;
}
