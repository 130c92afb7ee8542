use crate::commands::RunStatus;
use crate::presentation::ConsoleRenderer;
use anyhow::Result;
use poolscope_runtime::{AggregateProgress, AggregateRequest, AggregateService, Config};
use std::path::PathBuf;

pub fn handle(
    config: &Config,
    log_dir: PathBuf,
    summary_store: PathBuf,
    renderer: &ConsoleRenderer,
) -> Result<RunStatus> {
    let request = AggregateRequest::new(log_dir, summary_store, config);
    if request.default_year.is_none() {
        log::debug!("no default year; MM-DD stamps need a dated file name");
    }

    let report = AggregateService::new(request).run(|progress| match progress {
        AggregateProgress::Discovered { files } => {
            log::info!("found {} trace logs", files);
        }
        AggregateProgress::FileCompleted {
            path,
            tally,
            events,
        } => {
            log::debug!(
                "{}: {} events from {} lines",
                path.display(),
                events,
                tally.total_lines
            );
        }
        AggregateProgress::FileFailed { path, error } => {
            log::warn!("skipped {}: {}", path.display(), error);
        }
        AggregateProgress::SummaryRebuilt { rows } => {
            log::info!("trace_metrics_summary rebuilt with {} rows", rows);
        }
    })?;

    renderer.render_aggregate(&report)?;

    Ok(if report.has_failures() {
        RunStatus::FilesFailed
    } else {
        RunStatus::Success
    })
}
