//! Hex shorthand expansion
//!
//! Patch files may spell byte strings as hex text (`"DE AD BE EF"`) instead of
//! YAML integer lists. Whitespace is ignored so bytes can be grouped freely.

use crate::{Error, Result};

/// Decode a whitespace-tolerant hex string into raw bytes
///
/// # Examples
///
/// ```
/// use kobo_patch::expand_hex;
///
/// assert_eq!(expand_hex("DE AD be ef").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
/// assert!(expand_hex("zz").is_err());
/// ```
pub fn expand_hex(hex: &str) -> Result<Vec<u8>> {
    let compact: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&compact).map_err(|source| Error::InvalidHex {
        hex: hex.to_string(),
        source,
    })?;
    log::trace!("decoded hex `{hex}` to {bytes:?}");
    Ok(bytes)
}

/// Render bytes as lowercase hex for messages
pub(crate) fn render_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
