//! # kobo_firmware - firmware update rewriting
//!
//! Kobo firmware updates are zip archives with a gzip-compressed tar payload,
//! `KoboRoot.tgz`, that the device extracts over its root filesystem. This
//! crate takes such an update, patches selected binaries inside the payload
//! with [`kobo_patch`] patch files and writes a new `KoboRoot.tgz` containing
//! only the patched binaries.
//!
//! ## Examples
//!
//! ```no_run
//! use kobo_firmware::{FirmwareRewriter, RewriteEvent};
//!
//! # fn main() -> Result<(), kobo_firmware::Error> {
//! let mut rewriter = FirmwareRewriter::new();
//! rewriter.add_target("usr/local/Kobo/nickel", "src/nickel.yaml");
//!
//! rewriter.rewrite_with("kobo-update.zip", "out/KoboRoot.tgz", |event| {
//!     if let RewriteEvent::Patching { entry, .. } = event {
//!         println!("Patching {entry}");
//!     }
//! })?;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod entry;
pub mod error;
pub mod payload;
pub mod rewrite;

pub use error::{Error, Result};
pub use payload::PayloadWriter;
pub use rewrite::{FirmwareRewriter, RewriteEvent, RewriteSummary};

/// Name of the payload entry inside a firmware update archive
pub const INNER_PAYLOAD_NAME: &str = "KoboRoot.tgz";
