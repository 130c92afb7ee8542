//! Testing infrastructure for poolscope integration tests.
//!
//! - `TestWorld`: isolated input/output directories plus CLI execution
//! - `fixtures`: builders for snapshot documents and trace logs
//! - `output`: readers for the gzip JSONL part files the shredder writes

pub mod fixtures;
pub mod output;
pub mod world;

pub use fixtures::{SnapshotDoc, TraceLog, TxFixture};
pub use world::{CliResult, TestWorld};
