//! Temporary ID commands

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Subcommand;

use super::output::Output;
use crate::domain::TemporaryId;

#[derive(Subcommand)]
pub enum IdCommands {
    /// Generate a new temporary ID
    New {
        /// Text mixed into the hash (e.g., the message title)
        #[arg(long, default_value = "")]
        seed: String,
    },

    /// Normalize a value and report whether it is a temporary ID
    Check {
        /// Value to check (e.g., "#AW_0123456789AB")
        value: String,
    },
}

pub fn run(cmd: IdCommands, output: &Output) -> Result<()> {
    match cmd {
        IdCommands::New { seed } => {
            let id = TemporaryId::generate(&seed, Utc::now());
            if output.is_json() {
                output.data(&serde_json::json!({ "temporary_id": id }));
            } else {
                output.line(&id.to_string());
            }
            Ok(())
        }
        IdCommands::Check { value } => match TemporaryId::normalize(&value) {
            Some(id) => {
                if output.is_json() {
                    output.data(&serde_json::json!({ "valid": true, "temporary_id": id }));
                } else {
                    output.line(&id.to_string());
                }
                Ok(())
            }
            None => {
                if output.is_json() {
                    output.data(&serde_json::json!({ "valid": false, "value": value }));
                }
                bail!("'{}' is not a temporary ID (expected aw_ followed by 12 hex digits)", value)
            }
        },
    }
}
