//! Patch application
//!
//! Patches are applied one after another in name order. Each enabled patch
//! starts with a fresh base address and runs its instructions in authored
//! order. The first failing instruction stops the whole file; bytes written by
//! earlier instructions are not rolled back.

use crate::{Instruction, PatchFile, PatchSurface, Result};

/// What happens to a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    /// The patch is enabled and about to be applied
    Applying,
    /// The patch is disabled and will not touch the binary
    Skipping,
}

/// Progress notification for one patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchEvent<'a> {
    /// 1-based position of the patch
    pub index: usize,
    /// Number of patches in the file
    pub total: usize,
    /// Patch name
    pub name: &'a str,
    /// Whether the patch is applied or skipped
    pub status: PatchStatus,
}

/// Outcome of applying a patch file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Names of the applied patches, in order
    pub applied: Vec<String>,
    /// Names of the disabled patches, in order
    pub skipped: Vec<String>,
}

impl PatchFile {
    /// Apply all enabled patches to a surface
    pub fn apply_to<S: PatchSurface + ?Sized>(&self, surface: &mut S) -> Result<ApplySummary> {
        self.apply_to_with(surface, |_| {})
    }

    /// Apply all enabled patches, reporting progress for every patch
    ///
    /// The file is validated again first; an invalid file never touches the
    /// surface.
    pub fn apply_to_with<S, F>(&self, surface: &mut S, mut on_event: F) -> Result<ApplySummary>
    where
        S: PatchSurface + ?Sized,
        F: FnMut(&PatchEvent<'_>),
    {
        log::debug!("validating patch file");
        self.validate()?;

        let total = self.len();
        let mut summary = ApplySummary::default();

        for (i, (name, patch)) in self.iter().enumerate() {
            let index = i + 1;
            let enabled = patch.is_enabled();
            log::debug!("[{index}/{total}] patch `{name}`: enabled={enabled}");

            if !enabled {
                on_event(&PatchEvent {
                    index,
                    total,
                    name,
                    status: PatchStatus::Skipping,
                });
                summary.skipped.push(name.to_string());
                continue;
            }

            on_event(&PatchEvent {
                index,
                total,
                name,
                status: PatchStatus::Applying,
            });

            surface.reset_base_address();
            for instruction in patch.instructions() {
                log::debug!("  {instruction}");
                execute(surface, instruction).map_err(|e| {
                    log::debug!("could not apply patch `{name}`: {e}");
                    e.in_instruction(name, instruction.to_string())
                })?;
            }
            summary.applied.push(name.to_string());
        }

        Ok(summary)
    }
}

fn execute<S: PatchSurface + ?Sized>(surface: &mut S, instruction: &Instruction) -> Result<()> {
    match instruction {
        Instruction::Enabled(_) | Instruction::Description(_) | Instruction::PatchGroup(_) => {
            Ok(())
        }
        Instruction::BaseAddress(address) => {
            surface.set_base_address(*address);
            Ok(())
        }
        Instruction::FindBaseAddressHex(pattern) => surface.find_base_address(pattern),
        Instruction::FindBaseAddressString(text) => surface.find_base_address_string(text),
        Instruction::ReplaceBytes(r) => surface.replace_bytes(r.offset, &r.find, &r.replace),
        Instruction::ReplaceFloat(r) => surface.replace_float(r.offset, r.find, r.replace),
        Instruction::ReplaceInt(r) => surface.replace_int(r.offset, r.find, r.replace),
        Instruction::ReplaceString(r) => surface.replace_string(r.offset, &r.find, &r.replace),
        Instruction::FindReplaceString(r) => {
            surface.find_base_address_string(&r.find)?;
            surface.replace_string(0, &r.find, &r.replace)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Patch, Patcher, ReplaceInt, ReplaceString};
    use pretty_assertions::assert_eq;

    /// Surface that records calls and never fails
    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl PatchSurface for Recorder {
        fn reset_base_address(&mut self) {
            self.calls.push("reset".into());
        }
        fn set_base_address(&mut self, address: i32) {
            self.calls.push(format!("base {address}"));
        }
        fn find_base_address(&mut self, pattern: &[u8]) -> Result<()> {
            self.calls.push(format!("find {pattern:?}"));
            Ok(())
        }
        fn find_base_address_string(&mut self, text: &str) -> Result<()> {
            self.calls.push(format!("find {text:?}"));
            Ok(())
        }
        fn replace_bytes(&mut self, offset: i32, _: &[u8], _: &[u8]) -> Result<()> {
            self.calls.push(format!("bytes {offset}"));
            Ok(())
        }
        fn replace_string(&mut self, offset: i32, _: &str, _: &str) -> Result<()> {
            self.calls.push(format!("string {offset}"));
            Ok(())
        }
        fn replace_int(&mut self, offset: i32, _: u8, _: u8) -> Result<()> {
            self.calls.push(format!("int {offset}"));
            Ok(())
        }
        fn replace_float(&mut self, offset: i32, _: f64, _: f64) -> Result<()> {
            self.calls.push(format!("float {offset}"));
            Ok(())
        }
    }

    fn replace_int(offset: i32, find: u8, replace: u8) -> Instruction {
        Instruction::ReplaceInt(ReplaceInt {
            offset,
            find,
            replace,
        })
    }

    #[test]
    fn test_disabled_patch_never_touches_surface() {
        let mut pf = PatchFile::new();
        pf.insert(
            "off",
            Patch::new(vec![
                Instruction::Enabled(false),
                Instruction::BaseAddress(4),
                replace_int(0, 1, 2),
            ]),
        );

        let mut recorder = Recorder::default();
        let mut events = Vec::new();
        let summary = pf
            .apply_to_with(&mut recorder, |e| events.push((e.index, e.total, e.status)))
            .unwrap();

        assert!(recorder.calls.is_empty());
        assert_eq!(events, [(1, 1, PatchStatus::Skipping)]);
        assert_eq!(summary.skipped, ["off"]);
        assert!(summary.applied.is_empty());
    }

    #[test]
    fn test_instruction_dispatch_order() {
        let mut pf = PatchFile::new();
        pf.insert(
            "b",
            Patch::new(vec![
                Instruction::Description("ignored".into()),
                Instruction::Enabled(true),
                Instruction::FindReplaceString(crate::FindReplaceString {
                    find: "abc".into(),
                    replace: "xyz".into(),
                }),
            ]),
        );
        pf.insert(
            "a",
            Patch::new(vec![
                Instruction::Enabled(true),
                Instruction::BaseAddress(8),
                replace_int(1, 0, 1),
                Instruction::FindBaseAddressHex(vec![0xAA]),
                Instruction::ReplaceString(ReplaceString {
                    offset: 2,
                    find: "a".into(),
                    replace: "b".into(),
                }),
            ]),
        );

        let mut recorder = Recorder::default();
        let summary = pf.apply_to(&mut recorder).unwrap();
        assert_eq!(
            recorder.calls,
            [
                "reset",
                "base 8",
                "int 1",
                "find [170]",
                "string 2",
                "reset",
                "find \"abc\"",
                "string 0",
            ]
        );
        assert_eq!(summary.applied, ["a", "b"]);
    }

    #[test]
    fn test_invalid_file_is_not_applied() {
        let mut pf = PatchFile::new();
        pf.insert("p", Patch::new(vec![replace_int(0, 1, 2)]));

        let mut recorder = Recorder::default();
        let err = pf.apply_to(&mut recorder).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn test_failure_stops_whole_file() {
        let mut pf = PatchFile::new();
        pf.insert(
            "a",
            Patch::new(vec![
                Instruction::Enabled(true),
                replace_int(0, 0x00, 0x10),
                Instruction::FindBaseAddressHex(vec![0xEE]),
                replace_int(1, 0x01, 0x11),
            ]),
        );
        pf.insert(
            "b",
            Patch::new(vec![Instruction::Enabled(true), replace_int(2, 0x02, 0x12)]),
        );

        let mut patcher = Patcher::new(vec![0x00, 0x01, 0x02]);
        let err = pf.apply_to(&mut patcher).unwrap_err();
        match &err {
            Error::Instruction {
                patch, instruction, ..
            } => {
                assert_eq!(patch, "a");
                assert_eq!(instruction, "FindBaseAddressHex(ee)");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_firmware_mismatch());

        // The first write stays, nothing after the failure runs
        assert_eq!(patcher.bytes(), &[0x10, 0x01, 0x02]);
    }

    #[test]
    fn test_reapplying_fails_at_same_guard() {
        let mut pf = PatchFile::new();
        pf.insert(
            "p",
            Patch::new(vec![Instruction::Enabled(true), replace_int(1, 0x01, 0x02)]),
        );

        let mut patcher = Patcher::new(vec![0x00, 0x01]);
        pf.apply_to(&mut patcher).unwrap();
        let once = patcher.bytes().to_vec();

        let err = pf.apply_to(&mut patcher).unwrap_err();
        assert!(err.is_firmware_mismatch());
        assert_eq!(patcher.bytes(), once.as_slice());
    }
}
