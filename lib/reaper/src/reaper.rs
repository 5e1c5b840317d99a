//! The deferred deletion reaper.

use crate::config::ReaperConfig;
use crate::error::ReaperError;
use notiteams_core::{DeleteOutcome, DeletionEntry, MessageTransport, Result};
use notiteams_registry::{Registry, RegistryError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries past the age threshold.
    pub examined: usize,
    /// Entries whose message is gone and whose row was removed.
    pub deleted: usize,
    /// Entries left in place for the next cycle.
    pub failed: usize,
}

/// Periodically deletes queued messages once they are old enough.
///
/// Failures are isolated per entry: a failed delete is logged, the entry
/// stays queued, and the cycle moves on. There is no backoff and no retry
/// ceiling; an entry is retried every cycle until its delete succeeds or
/// the transport reports the message as already gone.
pub struct Reaper {
    registry: Arc<dyn Registry>,
    transport: Arc<dyn MessageTransport>,
    config: ReaperConfig,
    running: Arc<AtomicBool>,
}

impl Reaper {
    #[must_use]
    pub fn new(
        registry: Arc<dyn Registry>,
        transport: Arc<dyn MessageTransport>,
        config: ReaperConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    /// Runs one sweep.
    ///
    /// # Errors
    ///
    /// Returns the registry error if the expired entries cannot be listed.
    /// Per-entry failures are counted in the report, never returned.
    pub async fn run_cycle(&self) -> Result<CycleReport, RegistryError> {
        let entries = self.registry.sweep_expired(self.config.max_age()).await?;

        let mut report = CycleReport {
            examined: entries.len(),
            ..CycleReport::default()
        };
        for entry in &entries {
            if self.reap(entry).await {
                report.deleted += 1;
            } else {
                report.failed += 1;
            }
        }

        debug!(
            examined = report.examined,
            deleted = report.deleted,
            failed = report.failed,
            "deletion sweep finished"
        );
        Ok(report)
    }

    /// Deletes one entry's message, then the entry. Returns whether both
    /// steps succeeded.
    async fn reap(&self, entry: &DeletionEntry) -> bool {
        let outcome = match self
            .transport
            .delete_message(&entry.conversation_id, &entry.message_id)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    entry_id = %entry.id,
                    conversation_id = %entry.conversation_id,
                    message_id = %entry.message_id,
                    error = %e,
                    "failed to delete message, keeping entry"
                );
                return false;
            }
        };

        if let Err(report) = self.registry.delete_entry(entry.id).await {
            warn!(
                entry_id = %entry.id,
                error = %report,
                "message deleted but entry could not be removed"
            );
            return false;
        }

        match outcome {
            DeleteOutcome::Deleted => info!(entry_id = %entry.id, "deleted message"),
            DeleteOutcome::AlreadyGone => {
                info!(entry_id = %entry.id, "message already gone, entry removed");
            }
        }
        true
    }

    /// Spawns the background task.
    ///
    /// The first sweep runs immediately, then one per interval. Ticks missed
    /// while a sweep is running are delayed rather than bunched up.
    ///
    /// # Errors
    ///
    /// Returns [`ReaperError::AlreadyRunning`] if a task started by this
    /// reaper has not been stopped yet.
    pub fn start(self: &Arc<Self>) -> Result<ReaperHandle, ReaperError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(ReaperError::AlreadyRunning.into());
        }

        let cancel = CancellationToken::new();
        let reaper = Arc::clone(self);
        let token = cancel.clone();
        let task = tokio::spawn(async move { reaper.run(token).await });

        Ok(ReaperHandle {
            cancel,
            task,
            running: Arc::clone(&self.running),
        })
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_seconds = self.config.interval().as_secs(),
            max_age_seconds = self.config.max_age_seconds,
            "reaper started"
        );

        loop {
            // Cancellation is only observed between sweeps.
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(report) = self.run_cycle().await {
                error!(error = %report, "deletion sweep failed");
            }
        }

        info!("reaper stopped");
    }
}

/// Handle to a running reaper task.
#[derive(Debug)]
pub struct ReaperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl ReaperHandle {
    /// Returns `true` once the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals the task to stop and waits for it to exit.
    ///
    /// A sweep in progress is allowed to finish first.
    ///
    /// # Errors
    ///
    /// Returns [`ReaperError::TaskFailed`] if the task panicked.
    pub async fn stop(self) -> Result<(), ReaperError> {
        self.cancel.cancel();
        let joined = self.task.await;
        self.running.store(false, Ordering::Release);

        joined.map_err(|e| ReaperError::TaskFailed {
            details: e.to_string(),
        })?;
        Ok(())
    }
}
