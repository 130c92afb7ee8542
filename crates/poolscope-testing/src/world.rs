//! TestWorld pattern for declarative integration test setup.
//!
//! Every world owns a temp directory laid out as:
//!
//! ```text
//! <tmp>/input/                 snapshot files to shred
//! <tmp>/logs/                  trace logs to aggregate
//! <tmp>/out/transactions/      shred outputs
//! <tmp>/out/snapshots/
//! <tmp>/out/authorizations/
//! <tmp>/summary.db             summary store
//! <tmp>/config.toml            only when written by the test
//! ```

use anyhow::Result;
use assert_cmd::Command;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::fixtures::{SnapshotDoc, TraceLog, snapshot_file};

/// Declarative test environment builder.
///
/// # Example
/// ```no_run
/// use poolscope_testing::{SnapshotDoc, TestWorld};
///
/// let world = TestWorld::new()
///     .with_snapshots("2025-05-04.log", &[SnapshotDoc::at("2025-05-04T00:00:10Z")]);
///
/// let result = world.shred(&[]).unwrap();
/// assert!(result.success());
/// ```
pub struct TestWorld {
    temp_dir: TempDir,
    env_vars: HashMap<String, String>,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    /// Create a new isolated test environment.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for dir in ["input", "logs"] {
            std::fs::create_dir_all(temp_dir.path().join(dir)).expect("Failed to create dir");
        }

        let mut env_vars = HashMap::new();
        // Points at a file that does not exist unless the test writes one,
        // so a developer's own config never leaks into a run.
        env_vars.insert(
            "POOLSCOPE_CONFIG".to_string(),
            temp_dir.path().join("config.toml").display().to_string(),
        );

        Self { temp_dir, env_vars }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root().join("input")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root().join("logs")
    }

    pub fn tx_dir(&self) -> PathBuf {
        self.root().join("out").join("transactions")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.root().join("out").join("snapshots")
    }

    pub fn auth_dir(&self) -> PathBuf {
        self.root().join("out").join("authorizations")
    }

    pub fn store_path(&self) -> PathBuf {
        self.root().join("summary.db")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("config.toml")
    }

    /// Set an environment variable for CLI execution.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Write a plain snapshot file under `input/`.
    pub fn with_snapshots(self, name: &str, docs: &[SnapshotDoc]) -> Self {
        self.write_input(name, snapshot_file(docs).as_bytes())
            .expect("Failed to write snapshot file");
        self
    }

    /// Write a gzip-compressed snapshot file under `input/`.
    pub fn with_gz_snapshots(self, name: &str, docs: &[SnapshotDoc]) -> Self {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(snapshot_file(docs).as_bytes())
            .expect("Failed to compress snapshot file");
        let bytes = encoder.finish().expect("Failed to finish gzip stream");
        self.write_input(name, &bytes)
            .expect("Failed to write snapshot file");
        self
    }

    /// Write a trace log under `logs/`.
    pub fn with_trace(self, name: &str, log: &TraceLog) -> Self {
        std::fs::write(self.log_dir().join(name), log.build()).expect("Failed to write trace log");
        self
    }

    /// Write `config.toml`; it is picked up through `POOLSCOPE_CONFIG`.
    pub fn with_config(self, toml: &str) -> Self {
        std::fs::write(self.config_path(), toml).expect("Failed to write config");
        self
    }

    pub fn write_input(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.input_dir().join(name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Configure a CLI command with this test environment's settings.
    pub fn configure_command<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        cmd.current_dir(self.root()).env_remove("RUST_LOG");
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        cmd
    }

    /// Execute the poolscope binary with `args` and capture the result.
    #[allow(deprecated)]
    pub fn run(&self, args: &[&str]) -> Result<CliResult> {
        let mut cmd = Command::cargo_bin("poolscope")
            .map_err(|e| anyhow::anyhow!("Failed to find poolscope binary: {}", e))?;
        self.configure_command(&mut cmd);
        cmd.args(args);

        let output = cmd.output()?;
        Ok(CliResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// `poolscope shred input/ out/transactions out/snapshots <extra>`
    pub fn shred(&self, extra: &[&str]) -> Result<CliResult> {
        let input = self.input_dir().display().to_string();
        let tx = self.tx_dir().display().to_string();
        let snap = self.snapshot_dir().display().to_string();
        let mut args = vec!["shred", input.as_str(), tx.as_str(), snap.as_str()];
        args.extend_from_slice(extra);
        self.run(&args)
    }

    /// `poolscope aggregate-trace logs/ summary.db <extra>`
    pub fn aggregate(&self, extra: &[&str]) -> Result<CliResult> {
        let logs = self.log_dir().display().to_string();
        let store = self.store_path().display().to_string();
        let mut args = vec!["aggregate-trace", logs.as_str(), store.as_str()];
        args.extend_from_slice(extra);
        self.run(&args)
    }
}

/// Result of a CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CliResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Parse stdout as JSON (for `--format json`).
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }
}
