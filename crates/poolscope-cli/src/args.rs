use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "poolscope")]
#[command(about = "Shred mempool snapshots and aggregate node trace logs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: $POOLSCOPE_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "plain", global = true)]
    pub format: OutputFormat,

    /// Ignored when RUST_LOG is set
    #[arg(long, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decompose snapshot files into partitioned transaction, snapshot and
    /// authorization datasets
    Shred {
        /// Directory of snapshot files (plain or .gz)
        input_dir: PathBuf,

        /// Output root of the transactions dataset
        transactions_out_dir: PathBuf,

        /// Output root of the snapshots dataset
        snapshots_out_dir: PathBuf,

        /// Output root of the authorizations dataset
        /// [default: <transactions_out_dir>/../authorizations]
        #[arg(long)]
        authorizations_dir: Option<PathBuf>,

        /// Files processed in parallel
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        jobs: Option<u16>,
    },

    /// Classify trace logs and rebuild the daily metrics summary store
    #[command(name = "aggregate-trace")]
    AggregateTrace {
        /// Directory of trace log files
        log_dir: PathBuf,

        /// SQLite summary store, recreated on every run
        summary_store: PathBuf,

        /// Year for MM-DD timestamps when the file name carries no date
        #[arg(long)]
        year: Option<i32>,

        /// Only aggregate files whose name starts with this [default: geth]
        #[arg(long)]
        prefix: Option<String>,

        /// Files processed in parallel
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        jobs: Option<u16>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Json,
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

impl LogLevel {
    pub fn filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "poolscope",
            "aggregate-trace",
            "logs",
            "summary.db",
            "--format",
            "csv",
            "--year",
            "2025",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Csv);
        match cli.command {
            Commands::AggregateTrace { year, prefix, .. } => {
                assert_eq!(year, Some(2025));
                assert_eq!(prefix, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_zero_jobs_is_rejected() {
        let result = Cli::try_parse_from(["poolscope", "shred", "in", "tx", "snap", "--jobs", "0"]);
        assert!(result.is_err());
    }
}
