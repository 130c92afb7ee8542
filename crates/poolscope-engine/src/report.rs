use poolscope_types::{LineTally, MetricCounter, ShredStats};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Ok => "ok",
            FileStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShredFileReport {
    pub path: String,
    pub status: FileStatus,
    pub stats: ShredStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Integrity findings of the audit pass (0 when the stream is consistent)
    #[serde(default)]
    pub audit_findings: usize,
}

impl ShredFileReport {
    pub fn ok(path: impl Into<String>, stats: ShredStats, audit_findings: usize) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Ok,
            stats,
            error: None,
            audit_findings,
        }
    }

    pub fn failed(path: impl Into<String>, stats: ShredStats, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Failed,
            stats,
            error: Some(error.into()),
            audit_findings: 0,
        }
    }
}

/// Result of a shred run, files in input order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShredReport {
    pub files: Vec<ShredFileReport>,
}

impl ShredReport {
    /// Counters summed over files that completed
    pub fn totals(&self) -> ShredStats {
        let mut totals = ShredStats::default();
        for file in self.files.iter().filter(|f| f.status == FileStatus::Ok) {
            totals += &file.stats;
        }
        totals
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &ShredFileReport> {
        self.files.iter().filter(|f| f.status == FileStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed_files().next().is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFileReport {
    pub path: String,
    pub status: FileStatus,
    pub tally: LineTally,
    /// Classified events (sum of event counts)
    pub events: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TraceFileReport {
    pub fn ok(path: impl Into<String>, tally: LineTally, events: u64) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Ok,
            tally,
            events,
            error: None,
        }
    }

    pub fn failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Failed,
            tally: LineTally::default(),
            events: 0,
            error: Some(error.into()),
        }
    }
}

/// Result of an aggregate-trace run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateReport {
    pub files: Vec<TraceFileReport>,
    /// Summary rows, ordered by `(date, category, metric_name)`
    pub rows: Vec<MetricCounter>,
}

impl AggregateReport {
    pub fn totals(&self) -> LineTally {
        let mut totals = LineTally::default();
        for file in self.files.iter().filter(|f| f.status == FileStatus::Ok) {
            totals += &file.tally;
        }
        totals
    }

    pub fn total_events(&self) -> u64 {
        self.rows.iter().map(|r| r.total_count).sum()
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &TraceFileReport> {
        self.files.iter().filter(|f| f.status == FileStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed_files().next().is_some()
    }
}
