use poolscope_types::{LineTally, MetricCounter};

/// Partial counter contributed by one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialMetricRecord {
    pub source_file: String,
    pub counter: MetricCounter,
}

/// Line accounting row of one trace file.
///
/// `status` is `ok` or `failed`; failed files carry the error text and an
/// all-zero tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatsRecord {
    pub source_file: String,
    pub tally: LineTally,
    pub status: String,
    pub error: Option<String>,
}
