use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Per-file counters of the snapshot shredder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShredStats {
    pub documents: u64,
    pub snapshots: u64,
    pub transactions: u64,
    pub authorizations: u64,
    pub eip7702_transactions: u64,
    pub malformed_documents: u64,
    pub malformed_records: u64,
    pub partition_mismatches: u64,
    pub bytes_read: u64,
}

impl ShredStats {
    /// Documents that parsed far enough to produce a snapshot record
    pub fn parsed_documents(&self) -> u64 {
        self.documents.saturating_sub(self.malformed_documents)
    }

    /// Nothing usable came out of the file and something went wrong
    pub fn is_unusable(&self) -> bool {
        self.snapshots == 0 && self.malformed_documents > 0
    }
}

impl AddAssign<&ShredStats> for ShredStats {
    fn add_assign(&mut self, other: &ShredStats) {
        self.documents += other.documents;
        self.snapshots += other.snapshots;
        self.transactions += other.transactions;
        self.authorizations += other.authorizations;
        self.eip7702_transactions += other.eip7702_transactions;
        self.malformed_documents += other.malformed_documents;
        self.malformed_records += other.malformed_records;
        self.partition_mismatches += other.partition_mismatches;
        self.bytes_read += other.bytes_read;
    }
}

/// Per-file line accounting of the trace classifier.
///
/// Every physical line lands in exactly one of `classified` (head line of a
/// matched entry), `continuation` (merged into an entry) or `unclassified`.
/// `malformed` and `unknown_date` are sub-tallies, not extra buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTally {
    pub total_lines: u64,
    pub classified: u64,
    pub continuation: u64,
    pub unclassified: u64,
    /// Entries downgraded to unclassified because of corrupt fields
    pub malformed: u64,
    /// Classified entries whose date could not be resolved
    pub unknown_date: u64,
}

impl LineTally {
    pub fn is_balanced(&self) -> bool {
        self.total_lines == self.classified + self.continuation + self.unclassified
    }
}

impl AddAssign<&LineTally> for LineTally {
    fn add_assign(&mut self, other: &LineTally) {
        self.total_lines += other.total_lines;
        self.classified += other.classified;
        self.continuation += other.continuation;
        self.unclassified += other.unclassified;
        self.malformed += other.malformed;
        self.unknown_date += other.unknown_date;
    }
}
