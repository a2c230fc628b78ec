//! Patch file validation
//!
//! Rules checked per patch, in application order:
//!
//! - exactly one `Enabled`
//! - at most one `Description` and one `PatchGroup`
//! - at most one enabled patch per `PatchGroup` across the file
//! - a patch whose only replacements are `ReplaceBytes` must not locate its
//!   base address with `FindBaseAddressString`
//!
//! The one-key-per-item rule is enforced while converting raw items, since a
//! typed [`Instruction`] always holds exactly one variant. Loading converts and
//! checks one patch at a time, so the reported violation is always the first
//! one in name order.

use std::collections::HashMap;

use crate::{Instruction, Patch, PatchFile, ValidationError};

#[derive(Debug, Default)]
struct PatchCounts<'a> {
    enabled: usize,
    is_enabled: bool,
    descriptions: usize,
    groups: usize,
    group: Option<&'a str>,
    byte_replacements: usize,
    other_replacements: usize,
    string_searches: usize,
}

impl<'a> PatchCounts<'a> {
    fn tally(instructions: &'a [Instruction]) -> Self {
        let mut counts = Self::default();
        for instruction in instructions {
            match instruction {
                Instruction::Enabled(v) => {
                    counts.enabled += 1;
                    counts.is_enabled = *v;
                }
                Instruction::Description(_) => counts.descriptions += 1,
                Instruction::PatchGroup(g) => {
                    counts.groups += 1;
                    counts.group = Some(g.as_str());
                }
                Instruction::FindBaseAddressString(_) => counts.string_searches += 1,
                Instruction::ReplaceBytes(_) => counts.byte_replacements += 1,
                Instruction::ReplaceString(_)
                | Instruction::ReplaceInt(_)
                | Instruction::ReplaceFloat(_)
                | Instruction::FindReplaceString(_) => counts.other_replacements += 1,
                Instruction::BaseAddress(_) | Instruction::FindBaseAddressHex(_) => {}
            }
        }
        counts
    }
}

/// Checks patches one by one, remembering the enabled patch of each group
#[derive(Debug, Default)]
pub(crate) struct PatchValidator {
    enabled_groups: HashMap<String, String>,
}

impl PatchValidator {
    /// Check the next patch in name order
    pub(crate) fn check(&mut self, name: &str, patch: &Patch) -> Result<(), ValidationError> {
        let counts = PatchCounts::tally(patch.instructions());
        log::trace!("patch `{name}`: {counts:?}");
        let patch_name = || name.to_string();

        match counts.enabled {
            0 => {
                return Err(ValidationError::MissingEnabled {
                    patch: patch_name(),
                });
            }
            1 => {}
            _ => {
                return Err(ValidationError::DuplicateEnabled {
                    patch: patch_name(),
                });
            }
        }
        if counts.descriptions > 1 {
            return Err(ValidationError::DuplicateDescription {
                patch: patch_name(),
            });
        }
        if counts.groups > 1 {
            return Err(ValidationError::DuplicatePatchGroup {
                patch: patch_name(),
            });
        }

        if let Some(group) = counts.group.filter(|g| !g.is_empty())
            && counts.is_enabled
        {
            if let Some(first) = self.enabled_groups.get(group) {
                return Err(ValidationError::PatchGroupConflict {
                    group: group.to_string(),
                    first: first.clone(),
                    second: patch_name(),
                });
            }
            self.enabled_groups.insert(group.to_string(), patch_name());
        }

        if counts.other_replacements == 0
            && counts.byte_replacements > 0
            && counts.string_searches > 0
        {
            return Err(ValidationError::StringBaseForBytes {
                patch: patch_name(),
            });
        }
        Ok(())
    }
}

impl PatchFile {
    /// Check the patch file rules, stopping at the first violation
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut validator = PatchValidator::default();
        for (name, patch) in &self.patches {
            validator.check(name, patch)?;
        }
        log::trace!("enabled patch groups: {:?}", validator.enabled_groups);
        Ok(())
    }
}
