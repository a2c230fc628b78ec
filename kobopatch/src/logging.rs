//! Logger setup
//!
//! `apply` writes its trace to the log file named in the configuration,
//! truncating it first. Other commands log warnings to stderr. `RUST_LOG`
//! overrides the default filter in both cases.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

/// Default filter for the log file
fn file_filter(verbose: u8) -> &'static str {
    if verbose > 0 { "trace" } else { "debug" }
}

/// Default filter for stderr
fn stderr_filter(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    }
}

/// Send log records to `path`, truncating it
pub fn init_file(path: &Path, verbose: u8) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Could not open and truncate log file {}", path.display()))?;

    Builder::from_env(Env::default().default_filter_or(file_filter(verbose)))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("Could not initialize logging")
}

/// Send log records to stderr
pub fn init_stderr(verbose: u8, quiet: bool) -> Result<()> {
    Builder::from_env(Env::default().default_filter_or(stderr_filter(verbose, quiet)))
        .target(Target::Stderr)
        .try_init()
        .context("Could not initialize logging")
}
