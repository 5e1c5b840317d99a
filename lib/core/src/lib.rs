//! Core domain types for notiteams.
//!
//! This crate provides the records kept by the registry, their surrogate
//! ids, and the contracts of the external collaborators (message transport
//! and directory lookup).

pub mod conversation;
pub mod deletion;
pub mod directory;
pub mod error;
pub mod id;
pub mod identity;
pub mod transport;

pub use conversation::{
    ConversationKey, ConversationReference, ConversationToken, DEFAULT_TOKEN_DESCRIPTION,
    IssuanceState, TokenRecord, TokenRequest,
};
pub use deletion::DeletionEntry;
pub use directory::{DirectoryError, DirectoryLookup, DirectoryMember};
pub use error::Result;
pub use id::{ConversationReferenceId, ConversationTokenId, DeletionEntryId, ParseIdError};
pub use identity::IdentityMapping;
pub use transport::{DeleteOutcome, MessageTransport, TransportError};
