//! Dispatch command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::output::Output;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::domain::Message;
use crate::handler::{MessageOutcome, StagedHandlerFactory, DEFAULT_STAGED_REPO};
use crate::storage::{load_config_file, read_batch, IdMapFile};

#[derive(Args)]
pub struct DispatchArgs {
    /// Batch file (JSON array, {"items": [...]}, or JSONL)
    pub batch: PathBuf,

    /// Handler config file (.json or .toml)
    #[arg(long, env = "SAFEOUT_HANDLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project handler config file (.json or .toml)
    #[arg(long, env = "SAFEOUT_PROJECT_HANDLER_CONFIG")]
    pub project_config: Option<PathBuf>,

    /// Temporary ID map resolved by an earlier run
    #[arg(long, env = "SAFEOUT_TEMPORARY_ID_MAP")]
    pub seed: Option<PathBuf>,

    /// Write the resulting temporary ID map to this file
    #[arg(long)]
    pub id_map_out: Option<PathBuf>,

    /// Repository staged entities are created in
    #[arg(long, default_value = DEFAULT_STAGED_REPO)]
    pub repo: String,

    /// First number handed out to staged entities
    #[arg(long, default_value = "1")]
    pub first_number: u64,
}

/// Runs the batch; returns whether every message succeeded
pub fn run(args: DispatchArgs, output: &Output) -> Result<bool> {
    let messages = read_batch(&args.batch)?;
    let primary = args.config.as_deref().map(load_config_file).transpose()?;
    let project = args.project_config.as_deref().map(load_config_file).transpose()?;
    let seed = args
        .seed
        .as_ref()
        .map(|path| IdMapFile::new(path).read())
        .transpose()?;

    let factory = StagedHandlerFactory::new(&args.repo).with_first_number(args.first_number);
    let dispatcher = Dispatcher::prepare(primary.as_ref(), project.as_ref(), &factory, seed)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let outcome = runtime.block_on(dispatcher.run(&messages));

    if let Some(path) = &args.id_map_out {
        IdMapFile::new(path).write(&outcome.temporary_id_map)?;
    }

    if output.is_json() {
        output.data(&outcome);
    } else {
        print_text(&messages, &outcome, output);
    }

    Ok(outcome.success)
}

fn print_text(messages: &[Message], outcome: &DispatchOutcome, output: &Output) {
    for (index, (message, result)) in messages.iter().zip(&outcome.results).enumerate() {
        let detail = match result.outcome() {
            MessageOutcome::Succeeded => result
                .entity()
                .map(|entity| entity.to_string())
                .unwrap_or_default(),
            _ => result.error.clone().unwrap_or_default(),
        };
        output.row(&[
            &index.to_string(),
            message.type_tag(),
            result.outcome().as_str(),
            &detail,
        ]);
    }

    if !outcome.temporary_id_map.is_empty() {
        output.blank();
        output.line("Temporary IDs:");
        for (id, entity) in &outcome.temporary_id_map {
            output.line(&format!("  {} -> {}", id, entity));
        }
    }

    let (ok, failed, deferred) = outcome.counts();
    output.blank();
    output.line(&format!(
        "{} succeeded, {} failed, {} deferred",
        ok, failed, deferred
    ));
}
