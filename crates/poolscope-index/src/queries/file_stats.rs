use poolscope_types::LineTally;
use rusqlite::{Connection, params};

use crate::Result;
use crate::records::FileStatsRecord;

pub fn insert_or_update(conn: &Connection, record: &FileStatsRecord) -> Result<()> {
    let t = &record.tally;
    conn.execute(
        r#"
        INSERT INTO trace_file_stats (source_file, total_lines, classified, continuation,
                                      unclassified, malformed, unknown_date, status, error)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(source_file) DO UPDATE SET
            total_lines = ?2,
            classified = ?3,
            continuation = ?4,
            unclassified = ?5,
            malformed = ?6,
            unknown_date = ?7,
            status = ?8,
            error = ?9
        "#,
        params![
            &record.source_file,
            t.total_lines as i64,
            t.classified as i64,
            t.continuation as i64,
            t.unclassified as i64,
            t.malformed as i64,
            t.unknown_date as i64,
            &record.status,
            &record.error,
        ],
    )?;

    Ok(())
}

pub fn get_all(conn: &Connection) -> Result<Vec<FileStatsRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT source_file, total_lines, classified, continuation, unclassified,
               malformed, unknown_date, status, error
        FROM trace_file_stats
        ORDER BY source_file
        "#,
    )?;

    let records = stmt
        .query_map([], |row| {
            Ok(FileStatsRecord {
                source_file: row.get(0)?,
                tally: LineTally {
                    total_lines: row.get::<_, i64>(1)? as u64,
                    classified: row.get::<_, i64>(2)? as u64,
                    continuation: row.get::<_, i64>(3)? as u64,
                    unclassified: row.get::<_, i64>(4)? as u64,
                    malformed: row.get::<_, i64>(5)? as u64,
                    unknown_date: row.get::<_, i64>(6)? as u64,
                },
                status: row.get(7)?,
                error: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}
