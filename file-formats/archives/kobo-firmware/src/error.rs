//! Error types for firmware archive rewriting

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for firmware operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for firmware operations
#[derive(Error, Debug)]
pub enum Error {
    /// The firmware update archive could not be opened
    #[error("could not open input file {}: {source}", path.display())]
    OpenArchive {
        /// Path of the update archive
        path: PathBuf,
        /// Zip error
        #[source]
        source: zip::result::ZipError,
    },

    /// The update archive has no inner payload
    #[error("could not open {name}: no such file in zip")]
    InnerPayloadMissing {
        /// Name of the payload entry
        name: String,
    },

    /// The inner payload entry could not be opened
    #[error("could not open {name}: {source}")]
    OpenInnerPayload {
        /// Name of the payload entry
        name: String,
        /// Zip error
        #[source]
        source: zip::result::ZipError,
    },

    /// The inner payload could not be decompressed or read as tar
    #[error("could not read entry from {name}: {source}")]
    ReadPayload {
        /// Name of the payload entry
        name: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A configured target is not a regular file
    #[error("could not patch {entry}: not a regular file ({entry_type})")]
    NotRegularFile {
        /// Entry name
        entry: String,
        /// Entry type, for diagnostics
        entry_type: String,
    },

    /// The patch file for an entry could not be read, parsed or validated
    #[error("could not read and parse patch file {}: {source}", patch_file.display())]
    LoadPatchFile {
        /// Patch file path
        patch_file: PathBuf,
        /// Underlying error
        #[source]
        source: kobo_patch::Error,
    },

    /// The patch file could not be applied to an entry
    #[error("could not apply patch file {} to {entry}: {source}", patch_file.display())]
    ApplyPatchFile {
        /// Entry name
        entry: String,
        /// Patch file path
        patch_file: PathBuf,
        /// Underlying error
        #[source]
        source: kobo_patch::Error,
    },

    /// A patched entry could not be written to the new payload
    #[error("could not write {entry} to patched payload: {source}")]
    WriteEntry {
        /// Entry name
        entry: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Fewer bytes were written for an entry than its header declares
    #[error("could not write whole file {entry}: wrote {written} of {expected} bytes")]
    ShortWrite {
        /// Entry name
        entry: String,
        /// Bytes written
        written: u64,
        /// Bytes expected
        expected: u64,
    },

    /// The tar or gzip stream of the new payload could not be finished
    #[error("could not finish writing patched payload: {source}")]
    Finalize {
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The new payload could not be saved
    #[error("could not write patched payload to {}: {source}", path.display())]
    WriteOutput {
        /// Output path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Check if this error comes from a patch file rather than the archives
    pub fn is_patch_error(&self) -> bool {
        matches!(self, Self::LoadPatchFile { .. } | Self::ApplyPatchFile { .. })
    }
}
