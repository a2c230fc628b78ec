//! Patch files
//!
//! A patch file maps patch names to ordered instruction lists:
//!
//! ```yaml
//! Remove ads:
//!   - Enabled: yes
//!   - Description: Hides the recommendations row
//!   - FindBaseAddressHex: 00 48 2D E9 10 B0
//!   - ReplaceBytes:
//!       Offset: 4
//!       FindH: 10 B0
//!       ReplaceH: 00 00
//! ```
//!
//! Patches are kept sorted by name, which is also the order they are validated
//! and applied in.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::instruction::{Instruction, RawInstruction};
use crate::validate::PatchValidator;
use crate::Result;

/// An ordered list of instructions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    instructions: Vec<Instruction>,
}

impl Patch {
    /// Create a patch from instructions
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Instructions in authored order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Whether the patch has an `Enabled: true` instruction
    pub fn is_enabled(&self) -> bool {
        self.instructions
            .iter()
            .any(|i| matches!(i, Instruction::Enabled(true)))
    }

    /// Text of the first `Description` instruction
    pub fn description(&self) -> Option<&str> {
        self.instructions.iter().find_map(|i| match i {
            Instruction::Description(d) => Some(d.as_str()),
            _ => None,
        })
    }

    /// Name of the first `PatchGroup` instruction
    pub fn patch_group(&self) -> Option<&str> {
        self.instructions.iter().find_map(|i| match i {
            Instruction::PatchGroup(g) => Some(g.as_str()),
            _ => None,
        })
    }
}

/// A set of named patches for one binary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchFile {
    pub(crate) patches: BTreeMap<String, Patch>,
}

impl PatchFile {
    /// Create an empty patch file
    pub fn new() -> Self {
        Self::default()
    }

    /// Read, parse and validate a patch file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading patch file {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| crate::Error::ReadPatchFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate a patch file
    ///
    /// Patches are converted and validated one at a time in name order, hex
    /// shorthand included, so the error returned belongs to the first invalid
    /// patch. Nothing is returned unless the whole file is valid.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        log::debug!("parsing patch file");
        let raw: RawPatchFile = serde_yaml_ng::from_str(yaml)?;

        log::debug!("expanding shorthand hex values and validating patches");
        let mut validator = PatchValidator::default();
        let mut patches = BTreeMap::new();
        for (name, items) in raw.0 {
            let instructions = items
                .into_iter()
                .map(|item| item.into_instruction(&name))
                .collect::<Result<Vec<_>>>()?;
            let patch = Patch::new(instructions);
            validator.check(&name, &patch)?;
            patches.insert(name, patch);
        }

        Ok(Self { patches })
    }

    /// Add or replace a patch
    pub fn insert(&mut self, name: impl Into<String>, patch: Patch) -> Option<Patch> {
        self.patches.insert(name.into(), patch)
    }

    /// Look up a patch by name
    pub fn get(&self, name: &str) -> Option<&Patch> {
        self.patches.get(name)
    }

    /// Patches in application order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Patch)> {
        self.patches.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// Number of patches, enabled or not
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether the file has no patches
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Number of enabled patches
    pub fn enabled_count(&self) -> usize {
        self.patches.values().filter(|p| p.is_enabled()).count()
    }
}

/// Top-level mapping of a patch file, rejecting duplicate patch names
struct RawPatchFile(BTreeMap<String, Vec<RawInstruction>>);

impl<'de> Deserialize<'de> for RawPatchFile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PatchesVisitor;

        impl<'de> Visitor<'de> for PatchesVisitor {
            type Value = RawPatchFile;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of patch names to instruction lists")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(RawPatchFile(BTreeMap::new()))
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut patches = BTreeMap::new();
                while let Some((name, items)) = map.next_entry::<String, Vec<RawInstruction>>()? {
                    if patches.contains_key(&name) {
                        return Err(de::Error::custom(format!("duplicate patch `{name}`")));
                    }
                    patches.insert(name, items);
                }
                Ok(RawPatchFile(patches))
            }
        }

        deserializer.deserialize_map(PatchesVisitor)
    }
}
