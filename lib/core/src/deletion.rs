//! Deferred deletion entries.

use crate::id::DeletionEntryId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A previously sent message queued for removal after a grace period.
///
/// Entries are append-only: they are inserted, and removed once the
/// transport confirms the message is gone. They are never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionEntry {
    /// Row id.
    pub id: DeletionEntryId,
    /// Conversation the message was posted in.
    pub conversation_id: String,
    /// Platform id of the message.
    pub message_id: String,
    /// When the entry was scheduled.
    pub created_at: DateTime<Utc>,
}

impl DeletionEntry {
    /// Returns whether the entry is strictly older than `max_age` at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.created_at < now - max_age
    }
}
