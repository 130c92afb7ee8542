use super::args::{Cli, Commands};
use super::handlers;
use super::logging;
use crate::presentation::ConsoleRenderer;
use anyhow::{Context, Result};
use poolscope_runtime::Config;

/// How a run ended when nothing fatal happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// At least one input file was skipped
    FilesFailed,
}

pub fn run(cli: Cli) -> Result<RunStatus> {
    logging::init(cli.log_level);

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let renderer = ConsoleRenderer::for_stdout(cli.format);

    match cli.command {
        Commands::Shred {
            input_dir,
            transactions_out_dir,
            snapshots_out_dir,
            authorizations_dir,
            jobs,
        } => {
            if let Some(jobs) = jobs {
                config.jobs = jobs as usize;
            }
            handlers::shred::handle(
                &config,
                input_dir,
                transactions_out_dir,
                snapshots_out_dir,
                authorizations_dir,
                &renderer,
            )
        }

        Commands::AggregateTrace {
            log_dir,
            summary_store,
            year,
            prefix,
            jobs,
        } => {
            if let Some(jobs) = jobs {
                config.jobs = jobs as usize;
            }
            if year.is_some() {
                config.trace.default_year = year;
            }
            if let Some(prefix) = prefix {
                config.trace.file_prefix = prefix;
            }
            handlers::aggregate::handle(&config, log_dir, summary_store, &renderer)
        }
    }
}
