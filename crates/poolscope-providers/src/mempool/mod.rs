//! Mempool snapshot decomposition.
//!
//! The collector appends one record per poll:
//! `{"timestamp", "pending_count", "queued_count", "snapshot": {"pending": {sender: {nonce: tx}}, "queued": {...}}}`
//! or `{"timestamp", "error"}` when the poll failed.

mod mapper;
mod schema;
mod shredder;

pub use shredder::{DEFAULT_LARGE_DOCUMENT_WARN_BYTES, MempoolShredder, ShredOptions};

use crate::Result;
use crate::traits::RecordSink;
use poolscope_types::ShredStats;
use std::path::Path;

/// Shred one snapshot file with default options
pub fn shred_snapshot_file<S: RecordSink>(path: &Path, sink: &mut S) -> Result<ShredStats> {
    MempoolShredder::default().shred_file(path, sink)
}
