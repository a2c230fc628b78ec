//! Patch instructions
//!
//! In a patch file every list item is a single-key mapping whose key names the
//! instruction. Items are first read into [`RawInstruction`], which mirrors the
//! file layout, and then converted to the [`Instruction`] sum type once hex
//! shorthand has been expanded and the item is known to hold exactly one key.

use std::fmt;

use serde::{Deserialize, Deserializer, de};

use crate::shorthand::{expand_hex, render_hex};
use crate::{Error, Result, ValidationError};

/// Verify and replace a string at `base + offset`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceString {
    /// Offset from the base address
    pub offset: i32,
    /// Expected string
    pub find: String,
    /// Replacement, NUL padded when shorter than `find`
    pub replace: String,
}

/// Verify and replace a single byte at `base + offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceInt {
    /// Offset from the base address
    pub offset: i32,
    /// Expected byte
    pub find: u8,
    /// Replacement byte
    pub replace: u8,
}

/// Verify and replace a little-endian `f64` at `base + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaceFloat {
    /// Offset from the base address
    pub offset: i32,
    /// Expected value
    pub find: f64,
    /// Replacement value
    pub replace: f64,
}

/// Verify and replace raw bytes at `base + offset`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceBytes {
    /// Offset from the base address
    pub offset: i32,
    /// Expected bytes
    pub find: Vec<u8>,
    /// Replacement bytes
    pub replace: Vec<u8>,
}

/// Locate a string and replace it where it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindReplaceString {
    /// String to search for
    pub find: String,
    /// Replacement
    pub replace: String,
}

/// A single patch instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Whether the patch is applied
    Enabled(bool),
    /// Free-form documentation
    Description(String),
    /// Mutual-exclusion group of the patch
    PatchGroup(String),
    /// Set the base address literally
    BaseAddress(i32),
    /// Set the base address to the first occurrence of a byte pattern
    FindBaseAddressHex(Vec<u8>),
    /// Set the base address to the first occurrence of a string
    FindBaseAddressString(String),
    /// See [`ReplaceString`]
    ReplaceString(ReplaceString),
    /// See [`ReplaceInt`]
    ReplaceInt(ReplaceInt),
    /// See [`ReplaceFloat`]
    ReplaceFloat(ReplaceFloat),
    /// See [`ReplaceBytes`]
    ReplaceBytes(ReplaceBytes),
    /// See [`FindReplaceString`]
    FindReplaceString(FindReplaceString),
}

impl Instruction {
    /// Key of the instruction in a patch file
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enabled(_) => "Enabled",
            Self::Description(_) => "Description",
            Self::PatchGroup(_) => "PatchGroup",
            Self::BaseAddress(_) => "BaseAddress",
            Self::FindBaseAddressHex(_) => "FindBaseAddressHex",
            Self::FindBaseAddressString(_) => "FindBaseAddressString",
            Self::ReplaceString(_) => "ReplaceString",
            Self::ReplaceInt(_) => "ReplaceInt",
            Self::ReplaceFloat(_) => "ReplaceFloat",
            Self::ReplaceBytes(_) => "ReplaceBytes",
            Self::FindReplaceString(_) => "FindReplaceString",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            Self::Enabled(v) => write!(f, "{name}({v})"),
            Self::Description(v) | Self::PatchGroup(v) | Self::FindBaseAddressString(v) => {
                write!(f, "{name}({v:?})")
            }
            Self::BaseAddress(v) => write!(f, "{name}({v:#x})"),
            Self::FindBaseAddressHex(v) => write!(f, "{name}({})", render_hex(v)),
            Self::ReplaceString(r) => {
                write!(f, "{name}({}, {:?}, {:?})", r.offset, r.find, r.replace)
            }
            Self::ReplaceInt(r) => {
                write!(f, "{name}({}, {:#04x}, {:#04x})", r.offset, r.find, r.replace)
            }
            Self::ReplaceFloat(r) => write!(f, "{name}({}, {}, {})", r.offset, r.find, r.replace),
            Self::ReplaceBytes(r) => write!(
                f,
                "{name}({}, {}, {})",
                r.offset,
                render_hex(&r.find),
                render_hex(&r.replace)
            ),
            Self::FindReplaceString(r) => write!(f, "{name}({:?}, {:?})", r.find, r.replace),
        }
    }
}

/// A patch file list item exactly as written
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub(crate) struct RawInstruction {
    #[serde(default, deserialize_with = "yaml11_bool")]
    enabled: Option<bool>,
    description: Option<String>,
    patch_group: Option<String>,
    base_address: Option<i32>,
    find_base_address_hex: Option<String>,
    find_base_address_string: Option<String>,
    replace_string: Option<RawReplaceString>,
    replace_int: Option<RawReplaceInt>,
    replace_float: Option<RawReplaceFloat>,
    replace_bytes: Option<RawReplaceBytes>,
    find_replace_string: Option<RawFindReplaceString>,
}

/// Accept the YAML 1.1 spellings (`yes`, `no`, `on`, `off`) patch files are written with
fn yaml11_bool<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(b)) => Ok(Some(b)),
        Some(Flag::Text(text)) => match text.to_ascii_lowercase().as_str() {
            "yes" | "y" | "on" | "true" => Ok(Some(true)),
            "no" | "n" | "off" | "false" => Ok(Some(false)),
            _ => Err(de::Error::invalid_value(
                de::Unexpected::Str(&text),
                &"a boolean (true/false, yes/no, on/off)",
            )),
        },
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
struct RawReplaceString {
    offset: i32,
    find: String,
    replace: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
struct RawReplaceInt {
    offset: i32,
    find: u8,
    replace: u8,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
struct RawReplaceFloat {
    offset: i32,
    find: f64,
    replace: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
struct RawReplaceBytes {
    offset: i32,
    find_h: Option<String>,
    replace_h: Option<String>,
    find: Option<Vec<u8>>,
    replace: Option<Vec<u8>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
struct RawFindReplaceString {
    find: String,
    replace: String,
}

impl RawReplaceBytes {
    fn into_instruction(self, patch: &str) -> Result<ReplaceBytes> {
        let find = bytes_field(patch, "Find", "FindH", self.find, self.find_h)?;
        let replace = bytes_field(patch, "Replace", "ReplaceH", self.replace, self.replace_h)?;
        Ok(ReplaceBytes {
            offset: self.offset,
            find,
            replace,
        })
    }
}

/// Resolve a byte field given either literally or as hex shorthand
fn bytes_field(
    patch: &str,
    field: &'static str,
    hex_field: &'static str,
    literal: Option<Vec<u8>>,
    hex: Option<String>,
) -> Result<Vec<u8>> {
    match (literal, hex) {
        (Some(bytes), None) => Ok(bytes),
        (None, Some(hex)) => expand_hex(&hex),
        (Some(_), Some(_)) => Err(Error::ConflictingFields {
            patch: patch.to_string(),
            instruction: "ReplaceBytes",
            first: field,
            second: hex_field,
        }),
        (None, None) => Err(Error::MissingField {
            patch: patch.to_string(),
            instruction: "ReplaceBytes",
            field,
        }),
    }
}

impl RawInstruction {
    /// Convert to a typed instruction, expanding hex shorthand
    pub(crate) fn into_instruction(self, patch: &str) -> Result<Instruction> {
        let mut found = Vec::with_capacity(1);

        if let Some(v) = self.enabled {
            found.push(Instruction::Enabled(v));
        }
        if let Some(v) = self.description {
            found.push(Instruction::Description(v));
        }
        if let Some(v) = self.patch_group {
            found.push(Instruction::PatchGroup(v));
        }
        if let Some(v) = self.base_address {
            found.push(Instruction::BaseAddress(v));
        }
        if let Some(v) = self.find_base_address_hex {
            found.push(Instruction::FindBaseAddressHex(expand_hex(&v)?));
        }
        if let Some(v) = self.find_base_address_string {
            found.push(Instruction::FindBaseAddressString(v));
        }
        if let Some(r) = self.replace_string {
            found.push(Instruction::ReplaceString(ReplaceString {
                offset: r.offset,
                find: r.find,
                replace: r.replace,
            }));
        }
        if let Some(r) = self.replace_int {
            found.push(Instruction::ReplaceInt(ReplaceInt {
                offset: r.offset,
                find: r.find,
                replace: r.replace,
            }));
        }
        if let Some(r) = self.replace_float {
            found.push(Instruction::ReplaceFloat(ReplaceFloat {
                offset: r.offset,
                find: r.find,
                replace: r.replace,
            }));
        }
        if let Some(r) = self.replace_bytes {
            found.push(Instruction::ReplaceBytes(r.into_instruction(patch)?));
        }
        if let Some(r) = self.find_replace_string {
            found.push(Instruction::FindReplaceString(FindReplaceString {
                find: r.find,
                replace: r.replace,
            }));
        }

        log::trace!("patch `{patch}`: {} instruction(s) in item", found.len());
        let mut found = found.into_iter();
        match (found.next(), found.next()) {
            (Some(instruction), None) => Ok(instruction),
            (None, _) => Err(ValidationError::EmptyInstruction {
                patch: patch.to_string(),
            }
            .into()),
            (Some(_), Some(_)) => Err(ValidationError::MultipleInstructions {
                patch: patch.to_string(),
            }
            .into()),
        }
    }
}
