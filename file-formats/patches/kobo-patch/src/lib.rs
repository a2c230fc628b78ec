//! # kobo_patch - declarative binary patches
//!
//! Patch files describe byte-level changes to closed-source device binaries
//! as named lists of find/verify/replace instructions. Every replacement
//! checks the bytes it is about to overwrite, so applying a patch file to the
//! wrong firmware version fails instead of silently corrupting the binary.
//!
//! ## Examples
//!
//! ```
//! use kobo_patch::{PatchFile, Patcher};
//!
//! # fn main() -> Result<(), kobo_patch::Error> {
//! let patch_file = PatchFile::from_yaml_str(
//!     r"
//! Enable feature:
//!   - Enabled: yes
//!   - FindBaseAddressHex: AA BB
//!   - ReplaceInt: {Offset: 2, Find: 0x01, Replace: 0x02}
//! ",
//! )?;
//!
//! let mut patcher = Patcher::new(vec![0x00, 0xAA, 0xBB, 0x01]);
//! let summary = patch_file.apply_to(&mut patcher)?;
//!
//! assert_eq!(summary.applied, ["Enable feature"]);
//! assert_eq!(patcher.bytes(), &[0x00, 0xAA, 0xBB, 0x02]);
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod apply;
pub mod error;
pub mod instruction;
pub mod patch_file;
pub mod patcher;
mod shorthand;
mod validate;

pub use apply::{ApplySummary, PatchEvent, PatchStatus};
pub use error::{Error, Result, ValidationError};
pub use instruction::{
    FindReplaceString, Instruction, ReplaceBytes, ReplaceFloat, ReplaceInt, ReplaceString,
};
pub use patch_file::{Patch, PatchFile};
pub use patcher::{PatchSurface, Patcher};
pub use shorthand::expand_hex;
