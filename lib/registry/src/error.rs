//! Error types for the registry crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `Connectivity`: the pool or the database connection failed
//! - `Query`: the statement reached the database and failed there
//! - `InvariantViolation`: a row that must exist after a write is absent

use std::fmt;

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Could not reach the database. Fatal to the in-flight operation.
    Connectivity {
        /// Operation that was running.
        operation: &'static str,
        /// Error details.
        details: String,
    },
    /// The database rejected the statement.
    Query {
        /// Operation that was running.
        operation: &'static str,
        /// Error details, as reported by the driver.
        details: String,
    },
    /// A row expected to exist after creation is missing.
    InvariantViolation {
        /// What was missing.
        details: String,
    },
}

impl RegistryError {
    /// Classifies a driver error raised while running `operation`.
    #[must_use]
    pub fn from_sqlx(operation: &'static str, error: &sqlx::Error) -> Self {
        let details = error.to_string();
        match error {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => Self::Connectivity { operation, details },
            _ => Self::Query { operation, details },
        }
    }

    /// Returns whether this is a connectivity failure.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity { operation, details } => {
                write!(f, "registry unreachable during {operation}: {details}")
            }
            Self::Query { operation, details } => {
                write!(f, "registry query failed during {operation}: {details}")
            }
            Self::InvariantViolation { details } => {
                write!(f, "registry invariant violated: {details}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}
