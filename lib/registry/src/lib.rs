//! Persistent registry for notiteams.
//!
//! This crate provides:
//!
//! - **Registry**: identity mappings, conversation references, tokens and
//!   deferred deletion entries, backed by Postgres ([`PgRegistry`]) or by
//!   process memory ([`InMemoryRegistry`])
//! - **Dedup cache**: a bounded recency-ordered set ([`LeastRecentlySeen`])
//! - **Identity recorder**: identity upserts gated by the dedup cache

pub mod config;
pub mod dedup;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod recorder;
pub mod registry;

pub use config::DatabaseConfig;
pub use dedup::LeastRecentlySeen;
pub use error::RegistryError;
pub use memory::InMemoryRegistry;
pub use postgres::{MIGRATOR, PgRegistry};
pub use recorder::{IdentityRecorder, RecordOutcome, RecordSummary};
pub use registry::Registry;
