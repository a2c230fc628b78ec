//! Root CLI structure for kobopatch

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default configuration file, looked up in the current directory
pub const DEFAULT_CONFIG: &str = "kobopatch.yaml";

#[derive(Parser)]
#[command(name = "kobopatch")]
#[command(about = "Patches binaries inside Kobo firmware updates", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute (defaults to `apply`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG, env = "KOBOPATCH_CONFIG")]
    pub config: PathBuf,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Patch the firmware update and write the new KoboRoot.tgz
    Apply,

    /// Parse and validate every configured patch file without touching the firmware
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
