use rusqlite::Connection;

use crate::Result;

// Schema version (increment when changing table definitions)
pub const SCHEMA_VERSION: i32 = 1;

// trace_metrics holds one partial counter per (source file, key); the
// summary table is derived from it and never written row by row.

pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version != SCHEMA_VERSION {
        if current_version != 0 {
            log::info!(
                "summary store schema v{} found, recreating as v{}",
                current_version,
                SCHEMA_VERSION
            );
        }
        drop_all_tables(conn)?;
    }

    create_tables(conn)?;
    conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;

    Ok(())
}

/// Drop and recreate every table
pub fn reset(conn: &Connection) -> Result<()> {
    drop_all_tables(conn)?;
    create_tables(conn)?;
    conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS trace_metrics (
            date TEXT NOT NULL,
            metric_category TEXT NOT NULL,
            metric_name TEXT NOT NULL,
            count INTEGER NOT NULL,
            source_file TEXT NOT NULL,
            PRIMARY KEY (source_file, date, metric_category, metric_name)
        );

        CREATE TABLE IF NOT EXISTS trace_metrics_summary (
            date TEXT NOT NULL,
            metric_category TEXT NOT NULL,
            metric_name TEXT NOT NULL,
            total_count INTEGER NOT NULL,
            PRIMARY KEY (date, metric_category, metric_name)
        );

        CREATE TABLE IF NOT EXISTS trace_file_stats (
            source_file TEXT PRIMARY KEY,
            total_lines INTEGER NOT NULL,
            classified INTEGER NOT NULL,
            continuation INTEGER NOT NULL,
            unclassified INTEGER NOT NULL,
            malformed INTEGER NOT NULL,
            unknown_date INTEGER NOT NULL,
            status TEXT NOT NULL,
            error TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_trace_metrics_key
            ON trace_metrics(date, metric_category, metric_name);
        CREATE INDEX IF NOT EXISTS idx_summary_category
            ON trace_metrics_summary(metric_category, metric_name);
        "#,
    )?;
    Ok(())
}

fn drop_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS trace_metrics_summary;
        DROP TABLE IF EXISTS trace_metrics;
        DROP TABLE IF EXISTS trace_file_stats;
        "#,
    )?;
    Ok(())
}
