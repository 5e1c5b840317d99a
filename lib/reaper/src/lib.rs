//! Deferred deletion reaper for notiteams.
//!
//! Outbound messages that should not linger are queued in the registry with
//! [`Registry::schedule_deletion`](notiteams_registry::Registry::schedule_deletion).
//! The [`Reaper`] sweeps entries past the age threshold on a fixed interval
//! and deletes each message through the [`MessageTransport`](notiteams_core::MessageTransport).
//! An entry is removed from the registry only after its delete is confirmed.

pub mod config;
pub mod error;
pub mod reaper;

pub use config::ReaperConfig;
pub use error::ReaperError;
pub use reaper::{CycleReport, Reaper, ReaperHandle};
