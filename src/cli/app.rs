//! Main CLI application structure

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{config_cmd, dispatch_cmd, id_cmd, plan_cmd};
use crate::logging;

#[derive(Parser)]
#[command(name = "safeout")]
#[command(author, version, about = "Dependency-ordered dispatch of agent safe outputs")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dispatch a batch through the staged handlers
    Dispatch(dispatch_cmd::DispatchArgs),

    /// Show the dispatch order of a batch without running handlers
    Plan {
        /// Batch file (JSON array, {"items": [...]}, or JSONL)
        batch: std::path::PathBuf,
    },

    /// Show how handler configuration is partitioned
    Config {
        /// Handler config file (.json or .toml)
        file: std::path::PathBuf,

        /// Project handler config file
        #[arg(long)]
        project_config: Option<std::path::PathBuf>,
    },

    /// Generate and check temporary IDs
    #[command(subcommand)]
    Id(id_cmd::IdCommands),
}

/// Main entry point for the CLI
///
/// Returns a failure exit code when a dispatched batch did not fully
/// succeed; errors are reserved for unusable input.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let output = Output::new(cli.format);

    match cli.command {
        Commands::Dispatch(args) => {
            let success = dispatch_cmd::run(args, &output)?;
            if !success {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Plan { batch } => plan_cmd::run(&batch, &output)?,
        Commands::Config {
            file,
            project_config,
        } => config_cmd::run(&file, project_config.as_deref(), &output)?,
        Commands::Id(cmd) => id_cmd::run(cmd, &output)?,
    }

    Ok(ExitCode::SUCCESS)
}
