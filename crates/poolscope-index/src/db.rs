use poolscope_types::{LineTally, MetricCounter};
use rusqlite::Connection;
use std::path::Path;

use crate::queries::{file_stats, metrics};
use crate::records::{FileStatsRecord, PartialMetricRecord};
use crate::{Result, schema};

/// SQLite store for aggregated trace metrics.
///
/// Written only from the coordinating thread; per-file results are committed
/// one transaction per file and the summary is rebuilt once at the end.
pub struct SummaryStore {
    conn: Connection,
}

impl SummaryStore {
    /// Open `path` for a fresh run: any previous content is discarded.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::reset(&conn)?;
        Ok(Self { conn })
    }

    /// Open an existing store for reading; migrates (drops) on schema mismatch
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Store the outcome of one successfully classified file
    pub fn record_file(
        &mut self,
        source_file: &str,
        tally: &LineTally,
        counters: &[MetricCounter],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        metrics::replace_for_file(&tx, source_file, counters)?;
        file_stats::insert_or_update(
            &tx,
            &FileStatsRecord {
                source_file: source_file.to_string(),
                tally: tally.clone(),
                status: "ok".to_string(),
                error: None,
            },
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Record a file that could not be processed; it contributes no counters
    pub fn record_failure(&mut self, source_file: &str, error: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        metrics::replace_for_file(&tx, source_file, &[])?;
        file_stats::insert_or_update(
            &tx,
            &FileStatsRecord {
                source_file: source_file.to_string(),
                tally: LineTally::default(),
                status: "failed".to_string(),
                error: Some(error.to_string()),
            },
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Rebuild `trace_metrics_summary`; returns the number of summary rows
    pub fn rebuild_summary(&self) -> Result<usize> {
        let rows = metrics::rebuild_summary(&self.conn)?;
        log::debug!("summary rebuilt with {} rows", rows);
        Ok(rows)
    }

    pub fn summary(&self) -> Result<Vec<MetricCounter>> {
        metrics::summary(&self.conn)
    }

    pub fn metrics_for_file(&self, source_file: &str) -> Result<Vec<PartialMetricRecord>> {
        metrics::for_file(&self.conn, source_file)
    }

    pub fn file_stats(&self) -> Result<Vec<FileStatsRecord>> {
        file_stats::get_all(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use poolscope_types::{Category, DateBucket};

    fn counter(day: Option<u32>, category: Category, name: &str, count: u64) -> MetricCounter {
        MetricCounter {
            date: DateBucket::from(day.map(|d| NaiveDate::from_ymd_opt(2025, 5, d).unwrap())),
            category,
            metric_name: name.to_string(),
            total_count: count,
        }
    }

    fn tally(total: u64) -> LineTally {
        LineTally {
            total_lines: total,
            classified: total,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_store() {
        let store = SummaryStore::open_in_memory().unwrap();
        assert_eq!(store.rebuild_summary().unwrap(), 0);
        assert!(store.summary().unwrap().is_empty());
        assert!(store.file_stats().unwrap().is_empty());
    }

    #[test]
    fn test_summary_sums_partials_across_files() {
        let mut store = SummaryStore::open_in_memory().unwrap();
        store
            .record_file(
                "a.log",
                &tally(3),
                &[
                    counter(Some(4), Category::Invalidation, "underpriced", 2),
                    counter(None, Category::Removal, "stale", 1),
                ],
            )
            .unwrap();
        store
            .record_file(
                "b.log",
                &tally(1),
                &[counter(Some(4), Category::Invalidation, "underpriced", 5)],
            )
            .unwrap();

        assert_eq!(store.rebuild_summary().unwrap(), 2);
        let rows = store.summary().unwrap();
        assert_eq!(
            rows,
            vec![
                counter(Some(4), Category::Invalidation, "underpriced", 7),
                counter(None, Category::Removal, "stale", 1),
            ]
        );
        assert_eq!(store.metrics_for_file("b.log").unwrap().len(), 1);
    }

    #[test]
    fn test_recording_a_file_twice_replaces_its_partials() {
        let mut store = SummaryStore::open_in_memory().unwrap();
        let counters = [counter(Some(4), Category::Addition, "executable", 4)];
        store.record_file("a.log", &tally(4), &counters).unwrap();
        store.record_file("a.log", &tally(4), &counters).unwrap();
        store.rebuild_summary().unwrap();

        assert_eq!(store.summary().unwrap()[0].total_count, 4);
        assert_eq!(store.file_stats().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_file_is_recorded_without_counters() {
        let mut store = SummaryStore::open_in_memory().unwrap();
        store
            .record_failure("broken.log.gz", "corrupt gzip stream")
            .unwrap();

        let stats = store.file_stats().unwrap();
        assert_eq!(stats[0].status, "failed");
        assert_eq!(stats[0].error.as_deref(), Some("corrupt gzip stream"));
        assert_eq!(stats[0].tally, LineTally::default());
        assert!(store.metrics_for_file("broken.log.gz").unwrap().is_empty());
    }

    #[test]
    fn test_count_beyond_i64_is_rejected_without_partial_rows() {
        let mut store = SummaryStore::open_in_memory().unwrap();
        let err = store
            .record_file(
                "huge.log",
                &tally(2),
                &[
                    counter(Some(4), Category::Addition, "executable", 1),
                    counter(Some(4), Category::Removal, "stale", u64::MAX),
                ],
            )
            .unwrap_err();

        assert!(matches!(err, crate::Error::OutOfRange(_)));
        assert!(store.metrics_for_file("huge.log").unwrap().is_empty());
        assert!(store.file_stats().unwrap().is_empty());
    }
}
