use poolscope_providers::{ClassifierOptions, TraceClassifier};
use poolscope_types::{Category, LogEvent};
use std::path::Path;

const SAMPLE: &str = "tests/samples/geth-2025-05-04.log";

fn classify_sample() -> (poolscope_types::LineTally, Vec<LogEvent>) {
    let mut events = Vec::new();
    let tally = TraceClassifier::new(ClassifierOptions::default())
        .classify_file(Path::new(SAMPLE), |event| events.push(event))
        .expect("sample trace should classify");
    (tally, events)
}

#[test]
fn test_sample_line_accounting() {
    let (tally, _) = classify_sample();

    assert_eq!(tally.total_lines, 9);
    assert_eq!(tally.classified, 5);
    assert_eq!(tally.continuation, 2);
    assert_eq!(tally.unclassified, 2);
    assert_eq!(tally.malformed, 0);
    assert_eq!(tally.unknown_date, 0);
    assert!(tally.is_balanced());
}

#[test]
fn test_sample_events() {
    let (_, events) = classify_sample();

    let summary = events
        .iter()
        .map(|e| {
            format!(
                "{} {} {} {} x{}",
                e.line_number,
                e.date_bucket(),
                e.category,
                e.metric_name,
                e.count
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    insta::assert_snapshot!(summary, @r"
    2 2025-05-04 invalidation already_known x1
    3 2025-05-04 invalidation already_known x1
    4 2025-05-04 invalidation nonce_low x1
    5 2025-05-04 removal stale x3
    8 2025-05-04 invalidation underpriced x1
    ");

    assert_eq!(events[2].category, Category::Invalidation);
    assert_eq!(
        events[2].matched_fields.get("err").map(String::as_str),
        Some("nonce too low: next nonce 5, tx nonce 3")
    );
}
