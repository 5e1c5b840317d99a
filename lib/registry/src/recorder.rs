//! Dedup-gated identity writes.

use crate::dedup::LeastRecentlySeen;
use crate::error::RegistryError;
use crate::registry::Registry;
use notiteams_core::{IdentityMapping, Result};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Outcome of recording one identity mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The mapping was upserted.
    Written,
    /// The exact mapping was seen recently; no write was issued.
    Skipped,
}

/// Totals for a batch of identity mappings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordSummary {
    /// Mappings upserted.
    pub written: usize,
    /// Mappings suppressed by the dedup cache.
    pub skipped: usize,
    /// Mappings whose upsert failed.
    pub failed: usize,
}

/// Writes identity mappings through a dedup cache.
///
/// Inbound events repeat the same identities constantly; the cache keeps
/// those repeats away from the database. Because the upsert is idempotent,
/// a cache miss only ever costs one redundant write.
pub struct IdentityRecorder {
    registry: Arc<dyn Registry>,
    seen: LeastRecentlySeen<IdentityMapping>,
}

impl IdentityRecorder {
    /// Creates a recorder with a dedup cache of `capacity` mappings.
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>, capacity: usize) -> Self {
        Self {
            registry,
            seen: LeastRecentlySeen::new(capacity),
        }
    }

    /// Upserts `mapping` unless it was recorded recently.
    ///
    /// A failed upsert is forgotten by the cache so the next sighting
    /// retries it.
    #[instrument(skip(self, mapping), fields(external_id = %mapping.external_id))]
    pub async fn record(&self, mapping: &IdentityMapping) -> Result<RecordOutcome, RegistryError> {
        if self.seen.look_and_remember(mapping) {
            debug!("identity already saved");
            return Ok(RecordOutcome::Skipped);
        }

        if let Err(report) = self.registry.upsert_identity(mapping).await {
            self.seen.forget(mapping);
            return Err(report);
        }
        Ok(RecordOutcome::Written)
    }

    /// Records every mapping, isolating failures.
    ///
    /// A failed upsert is logged and counted; the remaining mappings are
    /// still recorded.
    pub async fn record_all<'a, I>(&self, mappings: I) -> RecordSummary
    where
        I: IntoIterator<Item = &'a IdentityMapping>,
    {
        let mut summary = RecordSummary::default();
        for mapping in mappings {
            match self.record(mapping).await {
                Ok(RecordOutcome::Written) => summary.written += 1,
                Ok(RecordOutcome::Skipped) => summary.skipped += 1,
                Err(report) => {
                    warn!(
                        external_id = %mapping.external_id,
                        error = %report,
                        "failed to save identity"
                    );
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
