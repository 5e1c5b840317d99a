//! Error types for the bot crate.

use notiteams_core::TransportError;
use std::fmt;

/// Errors from handling an activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    /// A registry operation failed.
    Registry { details: String },
    /// Sending the token to the requester failed.
    Delivery(TransportError),
    /// The activity could not be serialized for storage.
    Serialization { details: String },
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry { details } => write!(f, "registry operation failed: {details}"),
            Self::Delivery(err) => write!(f, "token delivery failed: {err}"),
            Self::Serialization { details } => {
                write!(f, "activity serialization failed: {details}")
            }
        }
    }
}

impl std::error::Error for BotError {}
