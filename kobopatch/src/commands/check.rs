//! `check`: parse and validate every configured patch file

use std::path::Path;

use anyhow::{Context, Result, bail};
use kobo_patch::PatchFile;

use crate::config::Config;

/// Validate all patch files referenced by the configuration at `config_path`
///
/// Every file is checked before failing, so one run lists all broken files.
pub fn execute(config_path: &Path, quiet: bool) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("Could not load {}", config_path.display()))?;
    log::debug!("checking {} patch file(s)", config.patches.len());

    let mut failures = 0usize;
    for (target, patch_file) in &config.patches {
        match PatchFile::load(patch_file) {
            Ok(patches) => {
                if !quiet {
                    println!(
                        "{target}: {} ({}/{} patches enabled)",
                        patch_file.display(),
                        patches.enabled_count(),
                        patches.len()
                    );
                }
            }
            Err(e) => {
                failures += 1;
                log::debug!("{}: {e}", patch_file.display());
                eprintln!("{target}: {}: {e}", patch_file.display());
            }
        }
    }

    if failures > 0 {
        bail!(
            "{failures} of {} patch file(s) are invalid",
            config.patches.len()
        );
    }
    if !quiet {
        println!("\nAll patch files are valid");
    }
    Ok(())
}
