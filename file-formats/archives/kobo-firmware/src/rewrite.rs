//! Firmware payload rewriting
//!
//! A firmware update is a zip archive carrying a `KoboRoot.tgz` payload that
//! the device unpacks over its root filesystem. Rewriting streams the payload,
//! applies a patch file to every configured target and emits a new payload
//! holding only the patched entries. Everything else is dropped, so the
//! device keeps its own copies of untouched files.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use kobo_patch::{PatchEvent, PatchFile, Patcher};
use tar::{Archive, Entry, EntryType};
use zip::ZipArchive;

use crate::entry::{describe_entry_type, normalize_name, patched_header, read_pax_records};
use crate::payload::PayloadWriter;
use crate::{Error, INNER_PAYLOAD_NAME, Result};

/// Progress notification while rewriting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteEvent<'a> {
    /// A configured target was found and is about to be patched
    Patching {
        /// Entry name as stored in the payload
        entry: &'a str,
        /// Patch file applied to it
        patch_file: &'a Path,
    },
    /// Progress of the patch file applied to the current entry
    Patch(PatchEvent<'a>),
}

/// Outcome of a rewrite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Names of the patched entries, in payload order
    pub patched: Vec<String>,
    /// Number of entries left out of the new payload
    pub dropped: usize,
    /// Configured targets that do not appear in the payload
    pub missing: Vec<String>,
}

/// Rewrites firmware update archives
///
/// # Examples
///
/// ```no_run
/// use kobo_firmware::FirmwareRewriter;
///
/// let mut rewriter = FirmwareRewriter::new();
/// rewriter.add_target("usr/local/Kobo/libnickel.so.1.0.0", "src/libnickel.so.1.0.0.yaml");
/// let summary = rewriter.rewrite("kobo-update-4.38.zip", "out/KoboRoot.tgz")?;
/// println!("patched {} file(s)", summary.patched.len());
/// # Ok::<(), kobo_firmware::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct FirmwareRewriter {
    targets: BTreeMap<String, PathBuf>,
}

impl FirmwareRewriter {
    /// Create a rewriter without targets
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch the payload entry `target` with the patch file at `patch_file`
    ///
    /// A leading `./` on `target` is ignored.
    pub fn add_target(&mut self, target: impl AsRef<str>, patch_file: impl Into<PathBuf>) {
        self.targets
            .insert(normalize_name(target.as_ref()).to_string(), patch_file.into());
    }

    /// Configured targets and their patch files
    pub fn targets(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.targets.iter().map(|(t, p)| (t.as_str(), p.as_path()))
    }

    /// Rewrite `input` and save the new payload to `output`
    pub fn rewrite<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<RewriteSummary> {
        self.rewrite_with(input, output, |_| {})
    }

    /// Rewrite `input` and save the new payload to `output`, reporting progress
    ///
    /// `output` is only replaced once the whole payload has been built.
    pub fn rewrite_with<P, Q, F>(
        &self,
        input: P,
        output: Q,
        mut on_event: F,
    ) -> Result<RewriteSummary>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        F: FnMut(&RewriteEvent<'_>),
    {
        let input = input.as_ref();
        let output = output.as_ref();

        log::debug!("opening zip {}", input.display());
        let file = File::open(input).map_err(|e| Error::OpenArchive {
            path: input.to_path_buf(),
            source: e.into(),
        })?;
        let mut zip = ZipArchive::new(file).map_err(|source| Error::OpenArchive {
            path: input.to_path_buf(),
            source,
        })?;

        log::debug!("searching for {INNER_PAYLOAD_NAME}");
        let found = zip
            .file_names()
            .inspect(|name| log::debug!("  file: {name}"))
            .any(|name| name == INNER_PAYLOAD_NAME);
        if !found {
            return Err(Error::InnerPayloadMissing {
                name: INNER_PAYLOAD_NAME.to_string(),
            });
        }

        let payload = zip
            .by_name(INNER_PAYLOAD_NAME)
            .map_err(|source| Error::OpenInnerPayload {
                name: INNER_PAYLOAD_NAME.to_string(),
                source,
            })?;

        let mut writer = PayloadWriter::new();
        let summary = self.rewrite_entries(payload, &mut writer, &mut on_event)?;

        log::debug!("removing old output {}", output.display());
        if let Err(e) = fs::remove_file(output)
            && e.kind() != io::ErrorKind::NotFound
        {
            log::warn!("could not remove old output {}: {e}", output.display());
        }

        let bytes = writer.finish()?;
        log::debug!("writing {} byte payload to {}", bytes.len(), output.display());
        save(output, &bytes)?;

        log::info!(
            "patched {} file(s), dropped {} other entries",
            summary.patched.len(),
            summary.dropped
        );
        Ok(summary)
    }

    /// Stream a compressed payload, writing patched targets to `writer`
    pub fn rewrite_entries<R, F>(
        &self,
        payload: R,
        writer: &mut PayloadWriter,
        mut on_event: F,
    ) -> Result<RewriteSummary>
    where
        R: Read,
        F: FnMut(&RewriteEvent<'_>),
    {
        let read_err = |source| Error::ReadPayload {
            name: INNER_PAYLOAD_NAME.to_string(),
            source,
        };

        let mut archive = Archive::new(MultiGzDecoder::new(payload));
        let mut summary = RewriteSummary::default();
        let mut seen = BTreeSet::new();

        for entry in archive.entries().map_err(read_err)? {
            let mut entry = entry.map_err(read_err)?;
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            log::debug!(
                "  entry: {name} - size:{}, mode:{:o}",
                entry.header().size().unwrap_or(0),
                entry.header().mode().unwrap_or(0)
            );

            let Some((target, patch_file)) = self.targets.get_key_value(normalize_name(&name))
            else {
                log::trace!("    entry does not need patching");
                summary.dropped += 1;
                continue;
            };
            seen.insert(target.as_str());

            on_event(&RewriteEvent::Patching {
                entry: &name,
                patch_file,
            });
            let entry_type = entry.header().entry_type();
            if entry_type != EntryType::Regular {
                return Err(Error::NotRegularFile {
                    entry: name,
                    entry_type: describe_entry_type(entry_type),
                });
            }

            patch_entry(&mut entry, &name, patch_file, writer, &mut on_event)?;
            summary.patched.push(name);
        }

        summary.missing = self
            .targets
            .keys()
            .filter(|t| !seen.contains(t.as_str()))
            .cloned()
            .collect();
        for target in &summary.missing {
            log::warn!("{target} is not in {INNER_PAYLOAD_NAME}");
        }

        Ok(summary)
    }
}

fn patch_entry<R, F>(
    entry: &mut Entry<'_, R>,
    name: &str,
    patch_file: &Path,
    writer: &mut PayloadWriter,
    on_event: &mut F,
) -> Result<()>
where
    R: Read,
    F: FnMut(&RewriteEvent<'_>),
{
    let read_err = |source| Error::ReadPayload {
        name: INNER_PAYLOAD_NAME.to_string(),
        source,
    };

    log::debug!("    reading entry contents");
    let pax = read_pax_records(entry).map_err(read_err)?;
    let mut contents = Vec::new();
    entry.read_to_end(&mut contents).map_err(read_err)?;

    log::debug!("    loading patch file {}", patch_file.display());
    let patches = PatchFile::load(patch_file).map_err(|source| Error::LoadPatchFile {
        patch_file: patch_file.to_path_buf(),
        source,
    })?;

    log::debug!("    applying patch file");
    let mut patcher = Patcher::new(contents);
    patches
        .apply_to_with(&mut patcher, |e| on_event(&RewriteEvent::Patch(*e)))
        .map_err(|source| Error::ApplyPatchFile {
            entry: name.to_string(),
            patch_file: patch_file.to_path_buf(),
            source,
        })?;
    let contents = patcher.into_bytes();

    let mtime = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
    let header = patched_header(entry.header(), contents.len() as u64, mtime);
    log::debug!(
        "    copying new header to output - size:{}, mode:{:o}",
        contents.len(),
        header.mode().unwrap_or(0)
    );
    writer.append(name, &header, &pax, &contents)
}

/// Replace `path` with `bytes` through a temporary file in the same directory
fn save(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source| Error::WriteOutput {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
