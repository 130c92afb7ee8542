pub mod file_stats;
pub mod metrics;
