//! Stderr logging for the CLI. Report text goes to stdout, so diagnostics never mix with it.

use anyhow::{anyhow, Result};
use std::io;
use tracing_subscriber::EnvFilter;

/// Map a `-v` count to a default filter directive.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity count when set.
pub fn init(verbosity: u8) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_for(verbosity)))
        .map_err(|e| anyhow!("invalid log filter: {}", e))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("logging already initialised: {}", e))
}
