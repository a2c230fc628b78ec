//! Run configuration (`kobopatch.yaml`)
//!
//! ```yaml
//! version: 4.38.23038
//! in: src/kobo-update-4.38.23038.zip
//! out: out/KoboRoot.tgz
//! log: out/log.txt
//! useNewPatchFormat: true
//! patches:
//!   usr/local/Kobo/libnickel.so.1.0.0: src/libnickel.so.1.0.0.yaml
//!   usr/local/Kobo/nickel: src/nickel.yaml
//! ```
//!
//! Relative paths are taken relative to the directory of the configuration
//! file.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("could not read {}: {source}", path.display())]
    Read {
        /// Configuration path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid
    #[error("could not parse {}: {source}", path.display())]
    Parse {
        /// Configuration path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// A required field is empty or missing
    #[error("`{0}` is required (version, in, out, and log are required)")]
    MissingField(&'static str),

    /// The configuration asks for the legacy patch format
    #[error("only the new patch format is supported (set `useNewPatchFormat: true`)")]
    LegacyPatchFormat,
}

/// Parsed `kobopatch.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    /// Firmware version the patches are written for
    pub version: String,
    /// Firmware update archive to read
    #[serde(rename = "in")]
    pub input: PathBuf,
    /// Patched `KoboRoot.tgz` to write
    #[serde(rename = "out")]
    pub output: PathBuf,
    /// Log file, truncated on every run
    pub log: PathBuf,
    /// Must be `true`
    pub use_new_patch_format: bool,
    /// Payload entry name to patch file path
    pub patches: BTreeMap<String, PathBuf>,
}

impl Config {
    /// Read a configuration file and resolve its paths
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            serde_yaml_ng::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    /// Check required fields and the patch format flag
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("version", self.version.is_empty()),
            ("in", self.input.as_os_str().is_empty()),
            ("out", self.output.as_os_str().is_empty()),
            ("log", self.log.as_os_str().is_empty()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(ConfigError::MissingField(field));
        }
        if !self.use_new_patch_format {
            return Err(ConfigError::LegacyPatchFormat);
        }
        Ok(())
    }

    /// Make relative paths relative to `dir`
    pub fn resolve_paths(&mut self, dir: &Path) {
        for path in [&mut self.input, &mut self.output, &mut self.log]
            .into_iter()
            .chain(self.patches.values_mut())
        {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }
}
