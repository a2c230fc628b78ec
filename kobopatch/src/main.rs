//! Main entry point for the kobopatch CLI

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};

use kobopatch::cli::{Cli, Commands};
use kobopatch::{commands, logging};

fn main() -> ExitCode {
    let cli = Cli::parse();
    // `check` logs to stderr; print the fatal line there only once
    let logs_to_stderr = matches!(cli.command, Some(Commands::Check));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !logs_to_stderr {
                log::error!("Fatal: {e:#}");
            }
            eprintln!("Fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Apply);

    if !cli.quiet && !matches!(command, Commands::Completions { .. }) {
        println!("kobopatch {}\n", env!("CARGO_PKG_VERSION"));
    }

    match command {
        Commands::Apply => commands::apply::execute(&cli.config, cli.verbose, cli.quiet),
        Commands::Check => {
            logging::init_stderr(cli.verbose, cli.quiet)?;
            commands::check::execute(&cli.config, cli.quiet)
        }
        Commands::Completions { shell } => {
            print_completions(shell, &mut Cli::command());
            Ok(())
        }
    }
}

fn print_completions<G: Generator>(generator: G, cmd: &mut clap::Command) {
    generate(
        generator,
        cmd,
        cmd.get_name().to_string(),
        &mut io::stdout(),
    );
}
