//! Binary patch surface
//!
//! A [`PatchSurface`] owns the bytes of one binary and a base address register.
//! Every replacement reads the bytes at `base + offset` first and only writes
//! when they match what the patch expects, so a patch written for another
//! firmware version fails instead of corrupting the binary.
//!
//! [`Patcher`] is the in-memory implementation used when rewriting firmware.

use std::ops::Range;

use memchr::memmem;

use crate::shorthand::render_hex;
use crate::{Error, Result};

/// Primitive operations the patch engine drives
pub trait PatchSurface {
    /// Restore the base address register to its default
    fn reset_base_address(&mut self);

    /// Set the base address register to a literal value
    fn set_base_address(&mut self, address: i32);

    /// Point the base address at the first occurrence of `pattern`
    fn find_base_address(&mut self, pattern: &[u8]) -> Result<()>;

    /// Point the base address at the first occurrence of `text`
    fn find_base_address_string(&mut self, text: &str) -> Result<()>;

    /// Verify `find` at `base + offset` and overwrite it with `replace`
    fn replace_bytes(&mut self, offset: i32, find: &[u8], replace: &[u8]) -> Result<()>;

    /// Verify the string `find` at `base + offset` and overwrite it with `replace`
    fn replace_string(&mut self, offset: i32, find: &str, replace: &str) -> Result<()>;

    /// Verify the byte `find` at `base + offset` and overwrite it with `replace`
    fn replace_int(&mut self, offset: i32, find: u8, replace: u8) -> Result<()>;

    /// Verify the float `find` at `base + offset` and overwrite it with `replace`
    fn replace_float(&mut self, offset: i32, find: f64, replace: f64) -> Result<()>;
}

/// In-memory patch surface over an owned buffer
///
/// # Examples
///
/// ```
/// use kobo_patch::{PatchSurface, Patcher};
///
/// let mut patcher = Patcher::new(vec![0x00, 0xAA, 0xBB, 0x01]);
/// patcher.find_base_address(&[0xAA, 0xBB])?;
/// patcher.replace_int(2, 0x01, 0x02)?;
/// assert_eq!(patcher.bytes(), &[0x00, 0xAA, 0xBB, 0x02]);
/// # Ok::<(), kobo_patch::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patcher {
    buf: Vec<u8>,
    base: i32,
}

impl Patcher {
    /// Value of the base address register after a reset
    pub const DEFAULT_BASE_ADDRESS: i32 = 0;

    /// Wrap a binary
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            buf,
            base: Self::DEFAULT_BASE_ADDRESS,
        }
    }

    /// Current value of the base address register
    pub fn base_address(&self) -> i32 {
        self.base
    }

    /// Current contents of the binary
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the patcher and return the binary
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn find(&mut self, operation: &'static str, pattern: &[u8]) -> Result<()> {
        if pattern.is_empty() {
            return Err(Error::EmptyPattern { operation });
        }

        let pos = memmem::find(&self.buf, pattern).ok_or_else(|| Error::PatternNotFound {
            operation,
            pattern: render_hex(pattern),
        })?;
        self.base = i32::try_from(pos).map_err(|_| Error::OutOfBounds {
            operation,
            address: pos as i64,
            len: pattern.len(),
            size: self.buf.len(),
        })?;

        log::trace!("{operation}: base address is now {:#x}", self.base);
        Ok(())
    }

    fn range(&self, operation: &'static str, offset: i32, len: usize) -> Result<Range<usize>> {
        let address = i64::from(self.base) + i64::from(offset);
        let out_of_bounds = || Error::OutOfBounds {
            operation,
            address,
            len,
            size: self.buf.len(),
        };

        let start = usize::try_from(address).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.buf.len() {
            return Err(out_of_bounds());
        }
        Ok(start..end)
    }

    fn replace(
        &mut self,
        operation: &'static str,
        offset: i32,
        find: &[u8],
        replace: &[u8],
    ) -> Result<()> {
        if find.len() != replace.len() {
            return Err(Error::LengthMismatch {
                operation,
                find: find.len(),
                replace: replace.len(),
            });
        }

        let range = self.range(operation, offset, find.len())?;
        let current = &self.buf[range.clone()];
        if current != find {
            return Err(Error::Mismatch {
                operation,
                address: range.start as i64,
                expected: render_hex(find),
                found: render_hex(current),
            });
        }

        log::trace!(
            "{operation}: {:#x}: {} -> {}",
            range.start,
            render_hex(find),
            render_hex(replace)
        );
        self.buf[range].copy_from_slice(replace);
        Ok(())
    }
}

impl PatchSurface for Patcher {
    fn reset_base_address(&mut self) {
        self.base = Self::DEFAULT_BASE_ADDRESS;
    }

    fn set_base_address(&mut self, address: i32) {
        self.base = address;
    }

    fn find_base_address(&mut self, pattern: &[u8]) -> Result<()> {
        self.find("FindBaseAddress", pattern)
    }

    fn find_base_address_string(&mut self, text: &str) -> Result<()> {
        self.find("FindBaseAddressString", text.as_bytes())
    }

    fn replace_bytes(&mut self, offset: i32, find: &[u8], replace: &[u8]) -> Result<()> {
        self.replace("ReplaceBytes", offset, find, replace)
    }

    fn replace_string(&mut self, offset: i32, find: &str, replace: &str) -> Result<()> {
        let find = find.as_bytes();
        let replace = replace.as_bytes();
        if replace.len() > find.len() {
            return Err(Error::LengthMismatch {
                operation: "ReplaceString",
                find: find.len(),
                replace: replace.len(),
            });
        }

        // Shorter replacements are NUL terminated in place
        let mut padded = replace.to_vec();
        padded.resize(find.len(), 0);
        self.replace("ReplaceString", offset, find, &padded)
    }

    fn replace_int(&mut self, offset: i32, find: u8, replace: u8) -> Result<()> {
        self.replace("ReplaceInt", offset, &[find], &[replace])
    }

    fn replace_float(&mut self, offset: i32, find: f64, replace: f64) -> Result<()> {
        self.replace(
            "ReplaceFloat",
            offset,
            &find.to_le_bytes(),
            &replace.to_le_bytes(),
        )
    }
}
