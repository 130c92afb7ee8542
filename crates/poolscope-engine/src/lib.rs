// Engine - folds provider output into run results
// Sits between the providers (records, events) and the runtime services

pub mod aggregate;
pub mod audit;
pub mod report;

pub use aggregate::MetricAccumulator;
pub use audit::{AuditFinding, ShredAudit};
pub use report::{
    AggregateReport, FileStatus, ShredFileReport, ShredReport, TraceFileReport,
};

use poolscope_types::{LogEvent, MetricCounter};

// Façade API

/// Fold a batch of events into summary rows
pub fn aggregate_events<'a, I>(events: I) -> Vec<MetricCounter>
where
    I: IntoIterator<Item = &'a LogEvent>,
{
    events
        .into_iter()
        .collect::<MetricAccumulator>()
        .counters()
}
