use super::run_parallel;
use crate::config::Config;
use crate::discovery::discover_files;
use anyhow::{Context, Result};
use poolscope_engine::{AggregateReport, MetricAccumulator, TraceFileReport};
use poolscope_index::SummaryStore;
use poolscope_providers::{ClassifierOptions, MatcherDefinition, TraceClassifier};
use poolscope_types::LineTally;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AggregateRequest {
    pub log_dir: PathBuf,
    pub store_path: PathBuf,
    /// Empty prefix selects every file
    pub file_prefix: String,
    pub default_year: Option<i32>,
    pub lossy_utf8: bool,
    pub max_entry_lines: usize,
    pub matchers: Vec<MatcherDefinition>,
    pub jobs: usize,
}

impl AggregateRequest {
    pub fn new(log_dir: PathBuf, store_path: PathBuf, config: &Config) -> Self {
        Self {
            log_dir,
            store_path,
            file_prefix: config.trace.file_prefix.clone(),
            default_year: config.trace.default_year,
            lossy_utf8: config.trace.lossy_utf8,
            max_entry_lines: config.trace.max_entry_lines,
            matchers: config.trace.matchers.clone(),
            jobs: config.jobs,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AggregateProgress {
    Discovered {
        files: usize,
    },
    FileCompleted {
        path: PathBuf,
        tally: LineTally,
        events: u64,
    },
    FileFailed {
        path: PathBuf,
        error: String,
    },
    SummaryRebuilt {
        rows: usize,
    },
}

struct FileOutcome {
    path: PathBuf,
    result: std::result::Result<(LineTally, MetricAccumulator), String>,
}

/// Classifies every trace file of a directory and folds the events into the
/// summary store
pub struct AggregateService {
    request: AggregateRequest,
}

impl AggregateService {
    pub fn new(request: AggregateRequest) -> Self {
        Self { request }
    }

    pub fn run<F>(&self, mut on_progress: F) -> Result<AggregateReport>
    where
        F: FnMut(AggregateProgress),
    {
        let request = &self.request;
        let classifier = TraceClassifier::with_definitions(
            &request.matchers,
            ClassifierOptions {
                default_year: request.default_year,
                max_entry_lines: request.max_entry_lines,
                lossy_utf8: request.lossy_utf8,
            },
        )
        .context("Invalid trace matcher configuration")?;

        let prefix = Some(request.file_prefix.as_str()).filter(|p| !p.is_empty());
        let files = discover_files(&request.log_dir, prefix)?;
        on_progress(AggregateProgress::Discovered { files: files.len() });

        let mut store = SummaryStore::create(&request.store_path).with_context(|| {
            format!(
                "Failed to create summary store: {}",
                request.store_path.display()
            )
        })?;

        let outcomes = run_parallel(&files, request.jobs, |path| FileOutcome {
            path: path.clone(),
            result: classify_one(&classifier, path),
        })?;

        // Coordinating thread only: store writes and the reduction, in input order
        let mut total = MetricAccumulator::new();
        let mut report = AggregateReport::default();
        for outcome in outcomes {
            let source_file = source_name(&outcome.path);
            match outcome.result {
                Ok((tally, acc)) => {
                    store
                        .record_file(&source_file, &tally, &acc.counters())
                        .with_context(|| format!("Failed to record {}", source_file))?;
                    total.merge(&acc);
                    on_progress(AggregateProgress::FileCompleted {
                        path: outcome.path.clone(),
                        tally: tally.clone(),
                        events: acc.total(),
                    });
                    report.files.push(TraceFileReport::ok(
                        outcome.path.display().to_string(),
                        tally,
                        acc.total(),
                    ));
                }
                Err(error) => {
                    store
                        .record_failure(&source_file, &error)
                        .with_context(|| format!("Failed to record {}", source_file))?;
                    on_progress(AggregateProgress::FileFailed {
                        path: outcome.path.clone(),
                        error: error.clone(),
                    });
                    report.files.push(TraceFileReport::failed(
                        outcome.path.display().to_string(),
                        error,
                    ));
                }
            }
        }

        let rows = store
            .rebuild_summary()
            .context("Failed to rebuild trace_metrics_summary")?;
        on_progress(AggregateProgress::SummaryRebuilt { rows });

        report.rows = total.counters();
        Ok(report)
    }
}

fn classify_one(
    classifier: &TraceClassifier,
    path: &Path,
) -> std::result::Result<(LineTally, MetricAccumulator), String> {
    log::info!("classifying {}", path.display());
    let mut acc = MetricAccumulator::new();
    match classifier.classify_file(path, |event| acc.record(&event)) {
        Ok(tally) => {
            if !tally.is_balanced() {
                log::warn!("{}: line accounting does not balance: {:?}", path.display(), tally);
            }
            log::info!(
                "{}: {} lines, {} classified, {} unclassified",
                path.display(),
                tally.total_lines,
                tally.classified,
                tally.unclassified
            );
            Ok((tally, acc))
        }
        Err(e) => {
            log::error!("{}: {}", path.display(), e);
            Err(e.to_string())
        }
    }
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
