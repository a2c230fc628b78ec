//! `apply`: patch the firmware update and write a new payload

use std::path::Path;

use anyhow::{Context, Result};
use kobo_firmware::{FirmwareRewriter, INNER_PAYLOAD_NAME, RewriteEvent, RewriteSummary};
use kobo_patch::PatchStatus;

use crate::config::Config;
use crate::logging;

/// Render a progress event as a console line
pub fn progress_line(event: &RewriteEvent<'_>) -> String {
    match event {
        RewriteEvent::Patching { entry, .. } => format!("Patching {entry}"),
        RewriteEvent::Patch(p) => match p.status {
            PatchStatus::Applying => {
                format!("  [{}/{}] Applying patch `{}`", p.index, p.total, p.name)
            }
            PatchStatus::Skipping => {
                format!("  [{}/{}] Skipping disabled patch `{}`", p.index, p.total, p.name)
            }
        },
    }
}

/// Build a rewriter for every configured target
pub fn rewriter_for(config: &Config) -> FirmwareRewriter {
    let mut rewriter = FirmwareRewriter::new();
    for (target, patch_file) in &config.patches {
        rewriter.add_target(target, patch_file);
    }
    rewriter
}

/// Run the full pipeline for the configuration at `config_path`
pub fn execute(config_path: &Path, verbose: u8, quiet: bool) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("Could not load {}", config_path.display()))?;

    logging::init_file(&config.log, verbose)?;
    let dir = std::env::current_dir().unwrap_or_default();
    log::debug!(
        "kobopatch {}\n\ndir:{}\ncfg: {config:#?}",
        env!("CARGO_PKG_VERSION"),
        dir.display()
    );

    let summary = rewriter_for(&config)
        .rewrite_with(&config.input, &config.output, |event| {
            if !quiet {
                println!("{}", progress_line(event));
            }
        })
        .with_context(|| format!("Could not patch {}", config.input.display()))?;

    report(&summary, &config.output, quiet);
    Ok(())
}

fn report(summary: &RewriteSummary, output: &Path, quiet: bool) {
    if quiet {
        return;
    }
    for target in &summary.missing {
        println!("Warning: {target} was not found in {INNER_PAYLOAD_NAME}");
    }
    println!(
        "\nSuccessfully saved patched {INNER_PAYLOAD_NAME} to {}",
        output.display()
    );
}
