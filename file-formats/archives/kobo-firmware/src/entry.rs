//! Inner payload entries
//!
//! Entries in firmware payloads are usually stored as `./usr/local/...`, while
//! configurations name them without the leading `./`. Both forms refer to the
//! same file.

use std::io::{self, Read};

use tar::{EntryType, Header};

/// Strip an optional leading `./` from an entry name
///
/// # Examples
///
/// ```
/// use kobo_firmware::entry::normalize_name;
///
/// assert_eq!(normalize_name("./usr/local/Kobo/nickel"), "usr/local/Kobo/nickel");
/// assert_eq!(normalize_name("usr/local/Kobo/nickel"), "usr/local/Kobo/nickel");
/// ```
pub fn normalize_name(name: &str) -> &str {
    name.strip_prefix("./").unwrap_or(name)
}

/// Human readable name of a tar entry type
pub fn describe_entry_type(entry_type: EntryType) -> String {
    match entry_type {
        EntryType::Regular => "regular file".to_string(),
        EntryType::Link => "hard link".to_string(),
        EntryType::Symlink => "symlink".to_string(),
        EntryType::Char => "character device".to_string(),
        EntryType::Block => "block device".to_string(),
        EntryType::Directory => "directory".to_string(),
        EntryType::Fifo => "fifo".to_string(),
        other => format!("type flag {:?}", other.as_byte() as char),
    }
}

/// PAX records that are recomputed for a patched entry
const RECOMPUTED_PAX_KEYS: [&str; 2] = ["size", "mtime"];

/// PAX records of a source entry worth carrying over to its patched copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaxRecords(Vec<(String, Vec<u8>)>);

impl PaxRecords {
    /// Collect records, dropping the ones describing size and modification time
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .filter(|(k, _)| !RECOMPUTED_PAX_KEYS.contains(&k.as_str()))
                .collect(),
        )
    }

    /// Whether any record was kept
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a record sets the entry path
    pub fn has_path(&self) -> bool {
        self.0.iter().any(|(k, _)| k == "path")
    }

    /// Records as borrowed pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Read the PAX records attached to an entry
pub fn read_pax_records<R: Read>(entry: &mut tar::Entry<'_, R>) -> io::Result<PaxRecords> {
    let Some(extensions) = entry.pax_extensions()? else {
        return Ok(PaxRecords::default());
    };

    let mut pairs = Vec::new();
    for extension in extensions {
        let extension = extension?;
        let key = extension
            .key()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        pairs.push((key.to_string(), extension.value_bytes().to_vec()));
    }
    Ok(PaxRecords::from_pairs(pairs))
}

/// Header for the patched copy of an entry
///
/// Type flag, name, mode, ownership and header format are kept from the
/// source; the size is taken from the patched contents and the modification
/// time is `mtime`.
pub fn patched_header(source: &Header, size: u64, mtime: u64) -> Header {
    let mut header = source.clone();
    header.set_size(size);
    header.set_mtime(mtime);
    header.set_cksum();
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("./a/b"), "a/b");
        assert_eq!(normalize_name("a/b"), "a/b");
        assert_eq!(normalize_name("././a"), "./a");
        assert_eq!(normalize_name("."), ".");
    }

    #[test]
    fn test_pax_records_drop_recomputed_keys() {
        let records = PaxRecords::from_pairs([
            ("size", b"10".to_vec()),
            ("mtime", b"1.5".to_vec()),
            ("path", b"./long/name".to_vec()),
            ("SCHILY.xattr.user.k", b"v".to_vec()),
        ]);
        let keys: Vec<_> = records.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["path", "SCHILY.xattr.user.k"]);
        assert!(records.has_path());
        assert!(PaxRecords::default().is_empty());
    }

    #[test]
    fn test_patched_header_keeps_metadata() {
        let mut source = Header::new_ustar();
        source.set_path("usr/bin/app").unwrap();
        source.set_entry_type(EntryType::Regular);
        source.set_mode(0o755);
        source.set_uid(1000);
        source.set_gid(100);
        source.set_username("root").unwrap();
        source.set_groupname("wheel").unwrap();
        source.set_size(3);
        source.set_mtime(1);
        source.set_cksum();

        let header = patched_header(&source, 5, 1_700_000_000);
        assert_eq!(header.size().unwrap(), 5);
        assert_eq!(header.mtime().unwrap(), 1_700_000_000);
        assert_eq!(header.mode().unwrap(), 0o755);
        assert_eq!(header.uid().unwrap(), 1000);
        assert_eq!(header.gid().unwrap(), 100);
        assert_eq!(header.username().unwrap(), Some("root"));
        assert_eq!(header.groupname().unwrap(), Some("wheel"));
        assert_eq!(header.path_bytes().as_ref(), b"usr/bin/app");
        assert!(header.as_ustar().is_some());
        assert_eq!(header.entry_type(), EntryType::Regular);
    }

    #[test]
    fn test_describe_entry_type() {
        assert_eq!(describe_entry_type(EntryType::Symlink), "symlink");
        assert_eq!(describe_entry_type(EntryType::Directory), "directory");
    }
}
