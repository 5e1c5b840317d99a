//! Error types for the reaper crate.

use std::fmt;

/// Errors from starting or stopping the reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaperError {
    /// `start` was called while a reaper task is still running.
    AlreadyRunning,
    /// The background task panicked or was aborted.
    TaskFailed { details: String },
}

impl fmt::Display for ReaperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "reaper is already running"),
            Self::TaskFailed { details } => write!(f, "reaper task failed: {details}"),
        }
    }
}

impl std::error::Error for ReaperError {}
