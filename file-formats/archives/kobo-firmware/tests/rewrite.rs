//! End-to-end tests for firmware rewriting

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use kobo_firmware::{Error, FirmwareRewriter, INNER_PAYLOAD_NAME, RewriteEvent};
use pretty_assertions::assert_eq;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const APP: &[u8] = &[0x10, 0x20, 0xAA, 0xBB, 0x00, 0x01, 0x30];

const APP_PATCH: &str = r#"
Flip flag:
  - Enabled: yes
  - FindBaseAddressHex: "AA BB"
  - ReplaceInt: {Offset: 3, Find: 0x01, Replace: 0x02}
Unused:
  - Enabled: no
  - BaseAddress: 0
  - ReplaceInt: {Offset: 0, Find: 0xFF, Replace: 0x00}
"#;

/// Header with a name written verbatim, keeping any leading `./`
fn raw_header(name: &str, entry_type: EntryType, size: u64) -> Header {
    let mut header = Header::new_ustar();
    header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
    header.set_entry_type(entry_type);
    header.set_mode(if entry_type == EntryType::Directory { 0o755 } else { 0o751 });
    header.set_uid(1000);
    header.set_gid(1001);
    header.set_username("kobo").unwrap();
    header.set_groupname("users").unwrap();
    header.set_mtime(1_000_000);
    header.set_size(size);
    header.set_cksum();
    header
}

fn build_payload() -> Vec<u8> {
    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let dir = raw_header("./bin/", EntryType::Directory, 0);
    builder.append(&dir, std::io::empty()).unwrap();

    builder
        .append_pax_extensions([("SCHILY.xattr.user.origin", b"factory".as_slice())])
        .unwrap();
    let app = raw_header("./bin/app", EntryType::Regular, APP.len() as u64);
    builder.append(&app, APP).unwrap();

    let other = raw_header("./bin/other", EntryType::Regular, 3);
    builder.append(&other, b"abc".as_slice()).unwrap();

    let mut link = raw_header("./bin/link", EntryType::Symlink, 0);
    link.set_link_name("app").unwrap();
    link.set_cksum();
    builder.append(&link, std::io::empty()).unwrap();

    builder.into_inner().unwrap().finish().unwrap()
}

fn build_update(dir: &Path, payload_name: &str) -> PathBuf {
    let path = dir.join("update.zip");
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    zip.start_file("manual.txt", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"not part of the payload").unwrap();
    zip.start_file(payload_name, SimpleFileOptions::default())
        .unwrap();
    zip.write_all(&build_payload()).unwrap();
    zip.finish().unwrap();
    path
}

fn write_patch(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("app.yaml");
    fs::write(&path, yaml).unwrap();
    path
}

struct OutputEntry {
    name: String,
    header: Header,
    pax: Vec<(String, Vec<u8>)>,
    data: Vec<u8>,
}

fn read_output(path: &Path) -> Vec<OutputEntry> {
    let mut archive = Archive::new(GzDecoder::new(File::open(path).unwrap()));
    let mut out = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = String::from_utf8(entry.path_bytes().into_owned()).unwrap();
        let pax = match entry.pax_extensions().unwrap() {
            Some(exts) => exts
                .map(|e| {
                    let e = e.unwrap();
                    (e.key().unwrap().to_string(), e.value_bytes().to_vec())
                })
                .collect(),
            None => Vec::new(),
        };
        let header = entry.header().clone();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        out.push(OutputEntry {
            name,
            header,
            pax,
            data,
        });
    }
    out
}

fn setup() -> (TempDir, PathBuf, FirmwareRewriter) {
    let dir = tempfile::tempdir().unwrap();
    let update = build_update(dir.path(), INNER_PAYLOAD_NAME);
    let patch = write_patch(dir.path(), APP_PATCH);
    let mut rewriter = FirmwareRewriter::new();
    rewriter.add_target("bin/app", patch);
    (dir, update, rewriter)
}

#[test]
fn test_rewrite_patches_only_configured_entry() {
    let (dir, update, rewriter) = setup();
    let output = dir.path().join("KoboRoot.tgz");

    let mut events = Vec::new();
    let summary = rewriter
        .rewrite_with(&update, &output, |event| match event {
            RewriteEvent::Patching { entry, .. } => events.push(format!("Patching {entry}")),
            RewriteEvent::Patch(p) => {
                events.push(format!("[{}/{}] {} {:?}", p.index, p.total, p.name, p.status));
            }
        })
        .unwrap();

    assert_eq!(
        events,
        [
            "Patching ./bin/app",
            "[1/2] Flip flag Applying",
            "[2/2] Unused Skipping",
        ]
    );
    assert_eq!(summary.patched, ["./bin/app"]);
    assert_eq!(summary.dropped, 3);
    assert!(summary.missing.is_empty());

    let entries = read_output(&output);
    assert_eq!(entries.len(), 1);
    let app = &entries[0];
    assert_eq!(app.name, "./bin/app");

    let mut expected = APP.to_vec();
    expected[5] = 0x02;
    assert_eq!(app.data, expected);

    assert_eq!(app.header.entry_type(), EntryType::Regular);
    assert_eq!(app.header.mode().unwrap(), 0o751);
    assert_eq!(app.header.uid().unwrap(), 1000);
    assert_eq!(app.header.gid().unwrap(), 1001);
    assert_eq!(app.header.username().unwrap(), Some("kobo"));
    assert_eq!(app.header.groupname().unwrap(), Some("users"));
    assert_eq!(app.header.size().unwrap(), APP.len() as u64);
    assert!(app.header.mtime().unwrap() > 1_000_000);
    assert!(app.header.as_ustar().is_some());
    assert_eq!(
        app.pax,
        [(
            "SCHILY.xattr.user.origin".to_string(),
            b"factory".to_vec()
        )]
    );
}

#[test]
fn test_missing_targets_are_reported() {
    let (dir, update, mut rewriter) = setup();
    rewriter.add_target("./usr/missing", dir.path().join("none.yaml"));
    let output = dir.path().join("KoboRoot.tgz");

    let summary = rewriter.rewrite(&update, &output).unwrap();
    assert_eq!(summary.patched, ["./bin/app"]);
    assert_eq!(summary.missing, ["usr/missing"]);
}

#[test]
fn test_non_regular_target_fails_without_output() {
    let (dir, update, mut rewriter) = setup();
    rewriter.add_target("bin/link", dir.path().join("app.yaml"));
    let output = dir.path().join("KoboRoot.tgz");

    let err = rewriter.rewrite(&update, &output).unwrap_err();
    assert!(
        matches!(err, Error::NotRegularFile { ref entry, .. } if entry == "./bin/link"),
        "{err}"
    );
    assert!(!output.exists());
}

#[test]
fn test_failed_run_keeps_previous_output() {
    let (dir, update, _) = setup();
    let output = dir.path().join("KoboRoot.tgz");
    fs::write(&output, b"previous").unwrap();

    let patch = write_patch(
        dir.path(),
        "Wrong firmware:\n  - Enabled: yes\n  - FindBaseAddressHex: \"DE AD\"\n",
    );
    let mut rewriter = FirmwareRewriter::new();
    rewriter.add_target("bin/app", patch);

    let err = rewriter.rewrite(&update, &output).unwrap_err();
    assert!(matches!(err, Error::ApplyPatchFile { .. }), "{err}");
    assert!(err.is_patch_error());
    assert_eq!(fs::read(&output).unwrap(), b"previous");
}

#[test]
fn test_invalid_patch_file() {
    let (dir, update, _) = setup();
    let patch = write_patch(dir.path(), "No enabled:\n  - BaseAddress: 1\n");
    let mut rewriter = FirmwareRewriter::new();
    rewriter.add_target("bin/app", patch);

    let err = rewriter
        .rewrite(&update, dir.path().join("KoboRoot.tgz"))
        .unwrap_err();
    assert!(matches!(err, Error::LoadPatchFile { .. }), "{err}");
}

#[test]
fn test_missing_inner_payload() {
    let dir = tempfile::tempdir().unwrap();
    let update = build_update(dir.path(), "SomethingElse.tgz");
    let err = FirmwareRewriter::new()
        .rewrite(&update, dir.path().join("out.tgz"))
        .unwrap_err();
    assert!(matches!(err, Error::InnerPayloadMissing { .. }), "{err}");
}

#[test]
fn test_unopenable_input() {
    let dir = tempfile::tempdir().unwrap();
    let not_zip = dir.path().join("update.zip");
    fs::write(&not_zip, b"plain text").unwrap();

    let err = FirmwareRewriter::new()
        .rewrite(&not_zip, dir.path().join("out.tgz"))
        .unwrap_err();
    assert!(matches!(err, Error::OpenArchive { .. }), "{err}");

    let err = FirmwareRewriter::new()
        .rewrite(dir.path().join("missing.zip"), dir.path().join("out.tgz"))
        .unwrap_err();
    assert!(matches!(err, Error::OpenArchive { .. }), "{err}");
}

#[test]
fn test_patch_file_is_reloaded_per_entry() {
    let (dir, update, _) = setup();
    let patch = write_patch(dir.path(), APP_PATCH);
    let mut rewriter = FirmwareRewriter::new();
    rewriter.add_target("bin/app", &patch);
    let output = dir.path().join("KoboRoot.tgz");

    rewriter.rewrite(&update, &output).unwrap();

    // A changed patch file is picked up by the next run with the same rewriter
    fs::write(
        &patch,
        "Other:\n  - Enabled: yes\n  - ReplaceInt: {Offset: 0, Find: 0x10, Replace: 0x11}\n",
    )
    .unwrap();
    rewriter.rewrite(&update, &output).unwrap();

    let entries = read_output(&output);
    assert_eq!(entries[0].data[0], 0x11);
    assert_eq!(entries[0].data[5], 0x01);
}
