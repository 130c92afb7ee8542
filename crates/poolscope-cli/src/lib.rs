// Two batch commands over one runtime:
//
// - `shred` streams collector snapshot files into three date-partitioned
//   gzip JSONL datasets (transactions, snapshots, authorizations)
// - `aggregate-trace` classifies node trace logs and rebuilds a SQLite
//   summary of daily metric counts
//
// Both keep going past a broken input file. The exit code tells the caller
// whether anything was skipped: 0 clean, 2 some files failed, 1 fatal.

mod args;
mod commands;
mod handlers;
mod logging;
pub mod presentation;

pub use args::{Cli, Commands, LogLevel, OutputFormat};
pub use commands::{RunStatus, run};
