//! Error types for patch files and patch application

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for patch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for loading and applying patch files
#[derive(Error, Debug)]
pub enum Error {
    /// The patch file could not be read from disk
    #[error("error reading patch file {}: {source}", path.display())]
    ReadPatchFile {
        /// Path of the patch file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The patch file is not valid YAML or does not match the patch file schema
    #[error("error parsing patch file: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// A hex shorthand string could not be decoded
    #[error("error parsing patch file: error expanding shorthand hex `{hex}`: {source}")]
    InvalidHex {
        /// The offending hex string, as written
        hex: String,
        /// Decoder error
        #[source]
        source: hex::FromHexError,
    },

    /// A required field of an instruction was not given
    #[error("missing `{field}` in {instruction} of patch `{patch}`")]
    MissingField {
        /// Patch name
        patch: String,
        /// Instruction name
        instruction: &'static str,
        /// Field name
        field: &'static str,
    },

    /// Two fields that describe the same value were both given
    #[error("only one of `{first}` and `{second}` may be given in {instruction} of patch `{patch}`")]
    ConflictingFields {
        /// Patch name
        patch: String,
        /// Instruction name
        instruction: &'static str,
        /// First field name
        first: &'static str,
        /// Second field name
        second: &'static str,
    },

    /// The patch file violates a structural rule
    #[error("invalid patch file: {0}")]
    Validation(#[from] ValidationError),

    /// A search pattern was empty
    #[error("{operation}: empty search pattern")]
    EmptyPattern {
        /// Surface operation
        operation: &'static str,
    },

    /// A search pattern does not occur in the binary
    #[error("{operation}: could not find `{pattern}`")]
    PatternNotFound {
        /// Surface operation
        operation: &'static str,
        /// Pattern rendered as hex
        pattern: String,
    },

    /// An address range falls outside of the binary
    #[error("{operation}: address {address:#x} (+{len}) is out of bounds for a {size} byte binary")]
    OutOfBounds {
        /// Surface operation
        operation: &'static str,
        /// Effective start address
        address: i64,
        /// Length of the accessed range
        len: usize,
        /// Size of the binary
        size: usize,
    },

    /// The bytes at an address are not the expected ones
    #[error("{operation}: could not find specified bytes at {address:#x}: expected {expected}, found {found} (wrong firmware version?)")]
    Mismatch {
        /// Surface operation
        operation: &'static str,
        /// Effective address
        address: i64,
        /// Expected bytes, hex encoded
        expected: String,
        /// Actual bytes, hex encoded
        found: String,
    },

    /// The replacement does not fit the region being replaced
    #[error("{operation}: replacement is {replace} bytes but the original is {find} bytes")]
    LengthMismatch {
        /// Surface operation
        operation: &'static str,
        /// Length of the find value
        find: usize,
        /// Length of the replace value
        replace: usize,
    },

    /// An instruction failed while applying a patch
    #[error("could not apply patch `{patch}`: {instruction}: {source}")]
    Instruction {
        /// Patch name
        patch: String,
        /// Rendered instruction
        instruction: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },
}

/// Violations of the patch file rules, checked before anything is applied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A list item without any instruction
    #[error("empty instruction in patch `{patch}`")]
    EmptyInstruction {
        /// Patch name
        patch: String,
    },

    /// A list item with more than one instruction
    #[error("more than one instruction per bullet in patch `{patch}` (you might be missing a -)")]
    MultipleInstructions {
        /// Patch name
        patch: String,
    },

    /// A patch without an `Enabled` instruction
    #[error("no `Enabled` option in `{patch}`")]
    MissingEnabled {
        /// Patch name
        patch: String,
    },

    /// A patch with several `Enabled` instructions
    #[error("more than one `Enabled` option in `{patch}`")]
    DuplicateEnabled {
        /// Patch name
        patch: String,
    },

    /// A patch with several `Description` instructions
    #[error("more than one `Description` option in `{patch}` (use comments to describe individual lines)")]
    DuplicateDescription {
        /// Patch name
        patch: String,
    },

    /// A patch with several `PatchGroup` instructions
    #[error("more than one `PatchGroup` option in `{patch}`")]
    DuplicatePatchGroup {
        /// Patch name
        patch: String,
    },

    /// Two enabled patches in the same group
    #[error("more than one patch enabled in PatchGroup `{group}` (`{first}` and `{second}`)")]
    PatchGroupConflict {
        /// Group name
        group: String,
        /// The patch that claimed the group first
        first: String,
        /// The conflicting patch
        second: String,
    },

    /// A byte patch located through a string search
    #[error("use FindBaseAddressHex for hex replacements because FindBaseAddressString will lose control characters (patch `{patch}`)")]
    StringBaseForBytes {
        /// Patch name
        patch: String,
    },
}

impl Error {
    /// Wrap an error with the patch and instruction it happened in
    pub(crate) fn in_instruction(self, patch: &str, instruction: impl Into<String>) -> Self {
        Self::Instruction {
            patch: patch.to_string(),
            instruction: instruction.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error means the binary does not look like the patch expects
    ///
    /// This is the usual outcome of applying a patch file written for a
    /// different firmware version.
    pub fn is_firmware_mismatch(&self) -> bool {
        match self {
            Self::PatternNotFound { .. } | Self::Mismatch { .. } => true,
            Self::Instruction { source, .. } => source.is_firmware_mismatch(),
            _ => false,
        }
    }
}
