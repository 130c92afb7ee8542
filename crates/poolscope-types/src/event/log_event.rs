use super::Category;
use crate::DateBucket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One classified occurrence from a trace log.
///
/// `timestamp` is `None` when the line carried a valid time of day but its
/// date could not be resolved (no year available, impossible month/day).
/// Such events aggregate under the `unknown-date` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: Option<DateTime<Utc>>,
    /// Timestamp text exactly as it appeared in the line prefix
    pub raw_timestamp: String,
    pub category: Category,
    pub metric_name: String,
    /// Number of occurrences this event stands for (batch removals report >1)
    pub count: u64,
    pub matched_fields: BTreeMap<String, String>,
    /// 1-based line number of the entry's first physical line
    pub line_number: u64,
    /// Name of the matcher that classified the entry
    pub matcher: String,
}

impl LogEvent {
    pub fn date_bucket(&self) -> DateBucket {
        DateBucket::from(self.timestamp.map(|ts| ts.date_naive()))
    }
}
