use crate::commands::RunStatus;
use crate::presentation::ConsoleRenderer;
use anyhow::Result;
use poolscope_runtime::{Config, ShredProgress, ShredRequest, ShredService, StreamDirs};
use std::path::PathBuf;

pub fn handle(
    config: &Config,
    input_dir: PathBuf,
    transactions_out_dir: PathBuf,
    snapshots_out_dir: PathBuf,
    authorizations_dir: Option<PathBuf>,
    renderer: &ConsoleRenderer,
) -> Result<RunStatus> {
    let dirs = StreamDirs::new(transactions_out_dir, snapshots_out_dir, authorizations_dir);
    let request = ShredRequest::new(input_dir, dirs, config);
    log::debug!(
        "shred: jobs={} compression_level={}",
        request.jobs,
        request.compression_level
    );

    let report = ShredService::new(request).run(report_progress)?;
    renderer.render_shred(&report)?;

    Ok(if report.has_failures() {
        RunStatus::FilesFailed
    } else {
        RunStatus::Success
    })
}

fn report_progress(progress: ShredProgress) {
    match progress {
        ShredProgress::Discovered { files } => {
            log::info!("found {} snapshot files", files);
        }
        ShredProgress::FileCompleted { path, stats, parts } => {
            log::debug!(
                "{}: done ({} documents, {} part files)",
                path.display(),
                stats.documents,
                parts
            );
        }
        ShredProgress::FileFailed { path, error } => {
            log::warn!("skipped {}: {}", path.display(), error);
        }
        ShredProgress::AuditFindings { path, findings } => {
            log::warn!(
                "{}: {} integrity findings in the shredded records",
                path.display(),
                findings.len()
            );
        }
        ShredProgress::Completed { files, failed } => {
            log::info!("shredded {} files ({} failed)", files - failed, failed);
        }
    }
}
