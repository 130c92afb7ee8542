use poolscope_engine::{MetricAccumulator, ShredAudit, aggregate_events};
use poolscope_providers::{ClassifierOptions, RecordSink, TraceClassifier, shred_snapshot_file};
use poolscope_types::{AuthorizationRecord, SnapshotRecord, TransactionRecord};
use std::io;
use std::path::Path;

const SNAPSHOTS: &str = "../poolscope-providers/tests/samples/2025-05-04.log";
const TRACE: &str = "../poolscope-providers/tests/samples/geth-2025-05-04.log";

struct AuditSink(ShredAudit);

impl RecordSink for AuditSink {
    fn transaction(&mut self, record: &TransactionRecord) -> io::Result<()> {
        self.0.transaction(record);
        Ok(())
    }

    fn authorization(&mut self, record: &AuthorizationRecord) -> io::Result<()> {
        self.0.authorization(record);
        Ok(())
    }

    fn snapshot(&mut self, record: &SnapshotRecord) -> io::Result<()> {
        self.0.snapshot(record);
        Ok(())
    }
}

#[test]
fn test_shredded_sample_passes_audit() {
    let mut sink = AuditSink(ShredAudit::new());
    shred_snapshot_file(Path::new(SNAPSHOTS), &mut sink).unwrap();

    assert_eq!(sink.0.checked_snapshots(), 3);
    assert_eq!(sink.0.checked_transactions(), 2);
    assert!(sink.0.finish().is_empty());
}

#[test]
fn test_trace_sample_summary_rows() {
    let mut events = Vec::new();
    TraceClassifier::new(ClassifierOptions::default())
        .classify_file(Path::new(TRACE), |e| events.push(e))
        .unwrap();

    let rows = aggregate_events(&events)
        .iter()
        .map(|r| format!("{} {} {} {}", r.date, r.category, r.metric_name, r.total_count))
        .collect::<Vec<_>>()
        .join("\n");

    insta::assert_snapshot!(rows, @r"
    2025-05-04 invalidation already_known 2
    2025-05-04 invalidation nonce_low 1
    2025-05-04 invalidation underpriced 1
    2025-05-04 removal stale 3
    ");
}

#[test]
fn test_per_file_accumulators_reduce_to_single_pass() {
    let classifier = TraceClassifier::new(ClassifierOptions::default());
    let mut single = MetricAccumulator::new();
    let mut parts = Vec::new();

    for _ in 0..3 {
        let mut part = MetricAccumulator::new();
        classifier
            .classify_file(Path::new(TRACE), |e| {
                single.record(&e);
                part.record(&e);
            })
            .unwrap();
        parts.push(part);
    }

    let reduced: MetricAccumulator = parts.into_iter().rev().collect();
    assert_eq!(reduced, single);
    assert_eq!(reduced.total(), 3 * 7);
}
