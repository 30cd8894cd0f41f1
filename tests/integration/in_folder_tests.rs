use clap::Parser;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use finddupes::cli::Cli;
use finddupes::duplicates::{DupeFinder, ScanSummary};
use finddupes::error::ExitCode;
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &[u8]) {
    File::create(dir.join(name))
        .unwrap()
        .write_all(content)
        .unwrap();
}

fn scan_against(base: &Path, incoming: &Path) -> ScanSummary {
    DupeFinder::new()
        .scan_against(&[base.to_path_buf()], incoming)
        .unwrap()
}

fn names(summary: &ScanSummary, group: usize) -> Vec<String> {
    summary.groups[group]
        .files
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn incoming_files_match_the_base() {
    let base = tempdir().unwrap();
    let incoming = tempdir().unwrap();
    write_file(base.path(), "kept.bin", b"common payload");
    write_file(base.path(), "other.bin", b"small");
    write_file(incoming.path(), "new.bin", b"common payload");
    write_file(incoming.path(), "unique.bin", b"nothing else");

    let summary = scan_against(base.path(), incoming.path());

    // Only the size run shared across the two sets gets hashed.
    assert_eq!(summary.hash_stats.files_hashed, 2);
    assert_eq!(summary.totals.groups, 1);
    // Incoming file first, then its matches in the base.
    assert_eq!(names(&summary, 0), ["new.bin", "kept.bin"]);
}

#[test]
fn incoming_files_never_match_each_other() {
    let base = tempdir().unwrap();
    let incoming = tempdir().unwrap();
    write_file(base.path(), "unrelated.bin", b"something else entirely");
    write_file(incoming.path(), "twin1.bin", b"arrived twice");
    write_file(incoming.path(), "twin2.bin", b"arrived twice");

    let summary = scan_against(base.path(), incoming.path());

    // The twins hash as a size run but are both incoming, so they are
    // not reported against each other.
    assert_eq!(summary.hash_stats.files_hashed, 2);
    assert!(summary.groups.is_empty());
}

#[test]
fn nested_incoming_folder_leaves_the_base() {
    let base = tempdir().unwrap();
    let inbox = base.path().join("inbox");
    fs::create_dir(&inbox).unwrap();
    write_file(base.path(), "keep.bin", b"already archived");
    write_file(&inbox, "new.bin", b"already archived");

    let summary = scan_against(base.path(), &inbox);

    // new.bin must match keep.bin only, never its own base-walk copy.
    assert_eq!(summary.totals.groups, 1);
    assert_eq!(names(&summary, 0), ["new.bin", "keep.bin"]);
}

#[test]
fn in_folder_command_reports_matches() {
    let base = tempdir().unwrap();
    let incoming = tempdir().unwrap();
    write_file(base.path(), "kept.bin", b"shared bytes");
    write_file(incoming.path(), "new.bin", b"shared bytes");

    let cli = Cli::try_parse_from([
        "finddupes",
        "-q",
        "scan",
        base.path().to_str().unwrap(),
        "--in-folder",
        incoming.path().to_str().unwrap(),
        "--output",
        "json",
    ])
    .unwrap();
    assert_eq!(finddupes::run_app(cli).unwrap(), ExitCode::Success);
}
