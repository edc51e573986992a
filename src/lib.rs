//! Funnel-aware deduplication of applicant datasets.
//!
//! Records sharing the configured key columns are collapsed to the one that
//! reached the highest-priority funnel stage, and every removal is explained
//! in an audit log.

pub mod audit;
pub mod dataset;
pub mod deduplicator;
pub mod error;
pub mod loader;
pub mod logging;
pub mod models;
pub mod report;

pub use audit::{AuditEntry, AuditLog, RemovalReason};
pub use dataset::{Dataset, Value};
pub use deduplicator::{deduplicate, DedupOutcome, DedupStats, Deduplicator};
pub use error::{ConfigurationError, DatasetError, LoadError};
pub use models::{Config, DedupConfig, FlagState, Stage};
