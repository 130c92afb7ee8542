use super::run_parallel;
use crate::config::Config;
use crate::discovery::discover_files;
use crate::storage::{PartitionedSink, StreamDirs, part_file_name};
use anyhow::{Context, Result};
use poolscope_engine::{AuditFinding, ShredAudit, ShredFileReport, ShredReport};
use poolscope_providers::{MempoolShredder, RecordSink, ShredOptions};
use poolscope_types::{AuthorizationRecord, ShredStats, SnapshotRecord, TransactionRecord};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ShredRequest {
    pub input_dir: PathBuf,
    pub dirs: StreamDirs,
    pub jobs: usize,
    pub compression_level: u32,
    pub large_document_warn_bytes: u64,
}

impl ShredRequest {
    pub fn new(input_dir: PathBuf, dirs: StreamDirs, config: &Config) -> Self {
        Self {
            input_dir,
            dirs,
            jobs: config.jobs,
            compression_level: config.shred.compression_level,
            large_document_warn_bytes: config.shred.large_document_warn_bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ShredProgress {
    Discovered {
        files: usize,
    },
    FileCompleted {
        path: PathBuf,
        stats: ShredStats,
        parts: usize,
    },
    FileFailed {
        path: PathBuf,
        error: String,
    },
    AuditFindings {
        path: PathBuf,
        findings: Vec<AuditFinding>,
    },
    Completed {
        files: usize,
        failed: usize,
    },
}

struct FileOutcome {
    path: PathBuf,
    report: ShredFileReport,
    findings: Vec<AuditFinding>,
    parts: usize,
}

/// Feeds every record to the part-file sink and to the integrity audit
struct AuditedSink {
    inner: PartitionedSink,
    audit: ShredAudit,
}

impl RecordSink for AuditedSink {
    fn transaction(&mut self, record: &TransactionRecord) -> io::Result<()> {
        self.audit.transaction(record);
        self.inner.transaction(record)
    }

    fn authorization(&mut self, record: &AuthorizationRecord) -> io::Result<()> {
        self.audit.authorization(record);
        self.inner.authorization(record)
    }

    fn snapshot(&mut self, record: &SnapshotRecord) -> io::Result<()> {
        self.audit.snapshot(record);
        self.inner.snapshot(record)
    }
}

/// Shreds every file of an input directory into partitioned part files
pub struct ShredService {
    request: ShredRequest,
}

impl ShredService {
    pub fn new(request: ShredRequest) -> Self {
        Self { request }
    }

    pub fn run<F>(&self, mut on_progress: F) -> Result<ShredReport>
    where
        F: FnMut(ShredProgress),
    {
        let files = discover_files(&self.request.input_dir, None)?;
        self.request
            .dirs
            .create_all()
            .context("Failed to create output directories")?;
        on_progress(ShredProgress::Discovered { files: files.len() });

        let work = claim_part_names(files);
        let outcomes = run_parallel(&work, self.request.jobs, |(path, clash)| match clash {
            Some(other) => {
                let error = format!(
                    "part file name collides with {}; file skipped",
                    other.display()
                );
                log::error!("{}: {}", path.display(), error);
                FileOutcome {
                    path: path.clone(),
                    report: ShredFileReport::failed(
                        path.display().to_string(),
                        ShredStats::default(),
                        error,
                    ),
                    findings: Vec::new(),
                    parts: 0,
                }
            }
            None => self.shred_one(path),
        })?;

        let mut report = ShredReport::default();
        for outcome in outcomes {
            if !outcome.findings.is_empty() {
                on_progress(ShredProgress::AuditFindings {
                    path: outcome.path.clone(),
                    findings: outcome.findings,
                });
            }
            match &outcome.report.error {
                Some(error) => on_progress(ShredProgress::FileFailed {
                    path: outcome.path,
                    error: error.clone(),
                }),
                None => on_progress(ShredProgress::FileCompleted {
                    path: outcome.path,
                    stats: outcome.report.stats.clone(),
                    parts: outcome.parts,
                }),
            }
            report.files.push(outcome.report);
        }

        on_progress(ShredProgress::Completed {
            files: report.files.len(),
            failed: report.failed_files().count(),
        });
        Ok(report)
    }

    fn shred_one(&self, path: &Path) -> FileOutcome {
        log::info!("shredding {}", path.display());
        let shredder = MempoolShredder::new(ShredOptions {
            large_document_warn_bytes: self.request.large_document_warn_bytes,
        });
        let mut sink = AuditedSink {
            inner: PartitionedSink::new(&self.request.dirs, path, self.request.compression_level),
            audit: ShredAudit::new(),
        };

        let result = shredder.shred_file(path, &mut sink);
        let AuditedSink { inner, audit } = sink;
        let name = path.display().to_string();

        let failed = |stats: ShredStats, error: String| {
            log::error!("{}: {}", path.display(), error);
            FileOutcome {
                path: path.to_path_buf(),
                report: ShredFileReport::failed(name.clone(), stats, error),
                findings: Vec::new(),
                parts: 0,
            }
        };

        let stats = match result {
            Ok(stats) if stats.is_unusable() => {
                inner.abort();
                let error = format!(
                    "no parsable documents ({} malformed)",
                    stats.malformed_documents
                );
                return failed(stats, error);
            }
            Ok(stats) => stats,
            Err(e) => {
                inner.abort();
                return failed(ShredStats::default(), e.to_string());
            }
        };

        let parts = match inner.finish() {
            Ok(parts) => parts,
            Err(e) => return failed(stats, format!("Failed to finish part files: {}", e)),
        };

        let findings = audit.finish();
        for finding in &findings {
            log::warn!("{}: {}", path.display(), finding);
        }
        log::info!(
            "{}: {} snapshots, {} transactions, {} authorizations ({} malformed documents, {} malformed records)",
            path.display(),
            stats.snapshots,
            stats.transactions,
            stats.authorizations,
            stats.malformed_documents,
            stats.malformed_records
        );

        FileOutcome {
            path: path.to_path_buf(),
            report: ShredFileReport::ok(name, stats, findings.len()),
            findings,
            parts: parts.len(),
        }
    }
}

/// Pair each file with the earlier file whose part name it would overwrite
fn claim_part_names(files: Vec<PathBuf>) -> Vec<(PathBuf, Option<PathBuf>)> {
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    files
        .into_iter()
        .map(|path| {
            let clash = match claimed.get(&part_file_name(&path)) {
                Some(other) => Some(other.clone()),
                None => {
                    claimed.insert(part_file_name(&path), path.clone());
                    None
                }
            };
            (path, clash)
        })
        .collect()
}
