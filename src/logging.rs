//! Diagnostic tracing for the dispatcher and CLI.
//!
//! Engine diagnostics (duplicate providers, cycles, handler failures) are
//! emitted through `tracing` and written to stderr. Command output on stdout
//! is unaffected by the log level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` if set. Otherwise defaults to `warn`, or `debug` for
/// this crate when `verbose` is true. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=safeout=debug safeout dispatch batch.json --config handlers.json
/// ```
pub fn init(verbose: bool) {
    let default = if verbose { "warn,safeout=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (as in tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
