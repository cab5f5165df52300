//! # Command-Line Interface
//!
//! User-facing commands around the dispatcher.
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `dispatch` | Run a batch through the staged handlers |
//! | `plan` | Show providers, dependencies, and dispatch order |
//! | `config` | Show the regular/project configuration split |
//! | `id new`, `id check` | Generate and normalize temporary IDs |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! `--verbose` (or `-v`) turns on debug tracing on stderr:
//! ```bash
//! safeout --verbose dispatch batch.json --config handlers.json
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod config_cmd;
mod dispatch_cmd;
mod id_cmd;
mod output;
mod plan_cmd;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
