//! Schema versioning of the summary store.

use poolscope_index::{SCHEMA_VERSION, SummaryStore};
use poolscope_types::{Category, DateBucket, LineTally, MetricCounter};
use rusqlite::Connection;
use std::path::Path;
use tempfile::TempDir;

fn user_version(path: &Path) -> i32 {
    let conn = Connection::open(path).unwrap();
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap()
}

fn row(count: u64) -> MetricCounter {
    MetricCounter {
        date: DateBucket::Unknown,
        category: Category::Removal,
        metric_name: "stale".to_string(),
        total_count: count,
    }
}

#[test]
fn test_outdated_store_is_recreated_on_open() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("summary.db");

    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE trace_metrics_summary (date TEXT, metric TEXT, count INTEGER);
            INSERT INTO trace_metrics_summary VALUES ('2025-05-04', 'underpriced', 3);
            PRAGMA user_version = 99;
            "#,
        )
        .unwrap();
    }

    let store = SummaryStore::open(&path).unwrap();
    assert!(store.summary().unwrap().is_empty());
    assert_eq!(user_version(&path), SCHEMA_VERSION);
}

#[test]
fn test_create_discards_previous_run() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("summary.db");

    {
        let mut store = SummaryStore::create(&path).unwrap();
        store
            .record_file("a.log", &LineTally::default(), &[row(2)])
            .unwrap();
        store.rebuild_summary().unwrap();
        assert_eq!(store.summary().unwrap(), vec![row(2)]);
    }

    {
        let store = SummaryStore::open(&path).unwrap();
        assert_eq!(store.summary().unwrap(), vec![row(2)]);
    }

    let store = SummaryStore::create(&path).unwrap();
    assert!(store.summary().unwrap().is_empty());
    assert!(store.file_stats().unwrap().is_empty());
}
