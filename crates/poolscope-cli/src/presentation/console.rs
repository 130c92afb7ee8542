use crate::args::OutputFormat;
use anyhow::Result;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use poolscope_engine::{AggregateReport, FileStatus, ShredReport};
use serde::Serialize;
use std::io::Write;

/// Renders run reports to stdout as plain text, JSON or CSV
pub struct ConsoleRenderer {
    format: OutputFormat,
    color: bool,
}

#[derive(Serialize)]
struct ShredCsvRow<'a> {
    path: &'a str,
    status: &'a str,
    documents: u64,
    snapshots: u64,
    transactions: u64,
    authorizations: u64,
    malformed_documents: u64,
    malformed_records: u64,
    audit_findings: usize,
    error: &'a str,
}

#[derive(Serialize)]
struct SummaryCsvRow<'a> {
    date: String,
    category: &'a str,
    metric_name: &'a str,
    total_count: u64,
}

impl ConsoleRenderer {
    pub fn new(format: OutputFormat, color: bool) -> Self {
        Self { format, color }
    }

    /// Colors only when stdout is a terminal
    pub fn for_stdout(format: OutputFormat) -> Self {
        Self::new(format, std::io::stdout().is_terminal())
    }

    pub fn render_shred(&self, report: &ShredReport) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.write_shred(report, &mut out)?;
        out.flush()?;
        Ok(())
    }

    pub fn render_aggregate(&self, report: &AggregateReport) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.write_aggregate(report, &mut out)?;
        out.flush()?;
        Ok(())
    }

    pub fn write_shred<W: Write>(&self, report: &ShredReport, out: &mut W) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, report)?;
                writeln!(out)?;
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(out);
                for file in &report.files {
                    writer.serialize(ShredCsvRow {
                        path: &file.path,
                        status: file.status.as_str(),
                        documents: file.stats.documents,
                        snapshots: file.stats.snapshots,
                        transactions: file.stats.transactions,
                        authorizations: file.stats.authorizations,
                        malformed_documents: file.stats.malformed_documents,
                        malformed_records: file.stats.malformed_records,
                        audit_findings: file.audit_findings,
                        error: file.error.as_deref().unwrap_or(""),
                    })?;
                }
                writer.flush()?;
            }
            OutputFormat::Plain => {
                for file in &report.files {
                    let s = &file.stats;
                    match &file.error {
                        Some(error) => writeln!(
                            out,
                            "{} {}: {}",
                            self.status(file.status),
                            file.path,
                            error
                        )?,
                        None => writeln!(
                            out,
                            "{} {}: {} snapshots, {} transactions, {} authorizations",
                            self.status(file.status),
                            file.path,
                            s.snapshots,
                            s.transactions,
                            s.authorizations
                        )?,
                    }
                }

                let totals = report.totals();
                let failed = report.failed_files().count();
                writeln!(out)?;
                writeln!(
                    out,
                    "{} {} files, {} failed",
                    self.heading("Shredded"),
                    report.files.len(),
                    failed
                )?;
                writeln!(
                    out,
                    "  snapshots: {}  transactions: {} ({} eip-7702)  authorizations: {}",
                    totals.snapshots,
                    totals.transactions,
                    totals.eip7702_transactions,
                    totals.authorizations
                )?;
                if totals.malformed_documents > 0 || totals.malformed_records > 0 {
                    writeln!(
                        out,
                        "  malformed: {} documents, {} records",
                        totals.malformed_documents, totals.malformed_records
                    )?;
                }
            }
        }
        Ok(())
    }

    pub fn write_aggregate<W: Write>(&self, report: &AggregateReport, out: &mut W) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, report)?;
                writeln!(out)?;
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(out);
                for row in &report.rows {
                    writer.serialize(SummaryCsvRow {
                        date: row.date.to_string(),
                        category: row.category.as_str(),
                        metric_name: &row.metric_name,
                        total_count: row.total_count,
                    })?;
                }
                writer.flush()?;
            }
            OutputFormat::Plain => {
                for file in report.failed_files() {
                    writeln!(
                        out,
                        "{} {}: {}",
                        self.status(file.status),
                        file.path,
                        file.error.as_deref().unwrap_or("")
                    )?;
                }

                let width = report
                    .rows
                    .iter()
                    .map(|r| r.category.as_str().len() + 1 + r.metric_name.len())
                    .max()
                    .unwrap_or(0);
                for row in &report.rows {
                    let metric = format!("{}/{}", row.category, row.metric_name);
                    writeln!(
                        out,
                        "{}  {:<width$}  {:>8}",
                        row.date,
                        metric,
                        row.total_count,
                        width = width
                    )?;
                }

                let totals = report.totals();
                if !report.rows.is_empty() {
                    writeln!(out)?;
                }
                writeln!(
                    out,
                    "{} {} files, {} lines: {} classified, {} continuation, {} unclassified",
                    self.heading("Aggregated"),
                    report.files.len(),
                    totals.total_lines,
                    totals.classified,
                    totals.continuation,
                    totals.unclassified
                )?;
                writeln!(
                    out,
                    "  events: {}  summary rows: {}",
                    report.total_events(),
                    report.rows.len()
                )?;
                if totals.unknown_date > 0 {
                    writeln!(
                        out,
                        "  {} events without a resolvable date (unknown-date)",
                        totals.unknown_date
                    )?;
                }
            }
        }
        Ok(())
    }

    fn status(&self, status: FileStatus) -> String {
        let label = format!("[{}]", status);
        if !self.color {
            return label;
        }
        match status {
            FileStatus::Ok => label.green().to_string(),
            FileStatus::Failed => label.red().bold().to_string(),
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }
}
