// SQLite summary store
// Per-file partial counters, the rebuilt summary table and per-file line stats

mod db;
mod error;
mod queries;
mod records;
mod schema;

// Public API
pub use db::SummaryStore;
pub use error::{Error, Result};
pub use records::{FileStatsRecord, PartialMetricRecord};
pub use schema::SCHEMA_VERSION;
