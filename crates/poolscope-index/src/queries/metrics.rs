use poolscope_types::{Category, DateBucket, MetricCounter};
use rusqlite::{Connection, params};

use crate::records::PartialMetricRecord;
use crate::{Error, Result};

/// Replace the partial counters of `source_file`
pub fn replace_for_file(
    conn: &Connection,
    source_file: &str,
    counters: &[MetricCounter],
) -> Result<()> {
    conn.execute(
        "DELETE FROM trace_metrics WHERE source_file = ?1",
        [source_file],
    )?;

    let mut stmt = conn.prepare(
        r#"
        INSERT INTO trace_metrics (date, metric_category, metric_name, count, source_file)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(source_file, date, metric_category, metric_name) DO UPDATE SET
            count = count + ?4
        "#,
    )?;
    for counter in counters.iter().filter(|c| c.total_count > 0) {
        let count = i64::try_from(counter.total_count).map_err(|_| {
            Error::OutOfRange(format!(
                "{} {} {} count {}",
                counter.date, counter.category, counter.metric_name, counter.total_count
            ))
        })?;
        stmt.execute(params![
            counter.date.to_string(),
            counter.category.as_str(),
            &counter.metric_name,
            count,
            source_file,
        ])?;
    }

    Ok(())
}

/// Recompute the summary table from the partial counters
pub fn rebuild_summary(conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM trace_metrics_summary", [])?;
    let rows = conn.execute(
        r#"
        INSERT INTO trace_metrics_summary (date, metric_category, metric_name, total_count)
        SELECT date, metric_category, metric_name, SUM(count)
        FROM trace_metrics
        GROUP BY date, metric_category, metric_name
        HAVING SUM(count) > 0
        "#,
        [],
    )?;
    Ok(rows)
}

/// Summary rows ordered by `(date, category, metric_name)`
pub fn summary(conn: &Connection) -> Result<Vec<MetricCounter>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT date, metric_category, metric_name, total_count
        FROM trace_metrics_summary
        "#,
    )?;

    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rows = raw
        .into_iter()
        .map(|(date, category, name, count)| to_counter(&date, &category, name, count))
        .collect::<Result<Vec<_>>>()?;
    rows.sort_by_key(|row| row.key());
    Ok(rows)
}

pub fn for_file(conn: &Connection, source_file: &str) -> Result<Vec<PartialMetricRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT date, metric_category, metric_name, count
        FROM trace_metrics
        WHERE source_file = ?1
        "#,
    )?;

    let raw = stmt
        .query_map([source_file], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut records = raw
        .into_iter()
        .map(|(date, category, name, count)| {
            Ok(PartialMetricRecord {
                source_file: source_file.to_string(),
                counter: to_counter(&date, &category, name, count)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    records.sort_by_key(|r| r.counter.key());
    Ok(records)
}

fn to_counter(date: &str, category: &str, metric_name: String, count: i64) -> Result<MetricCounter> {
    let date: DateBucket = date
        .parse()
        .map_err(|e| Error::Corrupt(format!("date '{}': {}", date, e)))?;
    let category: Category = category.parse().map_err(Error::Corrupt)?;
    let total_count =
        u64::try_from(count).map_err(|_| Error::Corrupt(format!("negative count {}", count)))?;

    Ok(MetricCounter {
        date,
        category,
        metric_name,
        total_count,
    })
}
