use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use filetime::{set_file_mtime, FileTime};
use finddupes::cache::DirectoryCache;
use finddupes::cli::Cli;
use finddupes::duplicates::DupeFinder;
use finddupes::error::ExitCode;
use finddupes::sync::sync_hashes;
use tempfile::tempdir;

const STAMP: i64 = 1_600_000_000;

fn write_stamped(dir: &Path, name: &str, content: &[u8]) {
    let path = dir.join(name);
    File::create(&path).unwrap().write_all(content).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(STAMP, 0)).unwrap();
}

fn run(args: &[&str]) -> ExitCode {
    let cli = Cli::try_parse_from(args).unwrap();
    finddupes::run_app(cli).unwrap()
}

#[test]
fn hashed_tree_seeds_its_mirror() {
    let left = tempdir().unwrap();
    let right = tempdir().unwrap();
    write_stamped(left.path(), "a.bin", b"mirror me");
    write_stamped(left.path(), "b.bin", b"mirror me");

    let first = DupeFinder::new().scan(&[left.path().to_path_buf()]).unwrap();
    assert_eq!(first.hash_stats.files_hashed, 2);

    write_stamped(right.path(), "a.bin", b"mirror me");
    write_stamped(right.path(), "b.bin", b"mirror me");

    let stats = sync_hashes(left.path(), right.path(), None).unwrap();
    assert_eq!(stats.left_files, 2);
    assert_eq!(stats.right_files, 2);
    assert_eq!(stats.copied_to_right, 2);
    assert_eq!(stats.copied_to_left, 0);
    assert_eq!(stats.errors, 0);

    // The mirror now reports its duplicates without reading a byte.
    let second = DupeFinder::new().scan(&[right.path().to_path_buf()]).unwrap();
    assert_eq!(second.cache_hits, 2);
    assert_eq!(second.hash_stats.files_hashed, 0);
    assert_eq!(second.totals.groups, 1);
}

#[test]
fn digests_flow_both_ways_in_one_pass() {
    let left = tempdir().unwrap();
    let right = tempdir().unwrap();

    // Left hashes the alpha pair, right hashes the beta pair; each side
    // leaves the other name unhashed for sync to fill in.
    write_stamped(left.path(), "alpha.bin", b"alpha payload");
    write_stamped(left.path(), "alpha_copy.bin", b"alpha payload");
    write_stamped(left.path(), "beta.bin", b"beta bytes");
    write_stamped(right.path(), "alpha.bin", b"alpha payload");
    write_stamped(right.path(), "beta.bin", b"beta bytes");
    write_stamped(right.path(), "beta_copy.bin", b"beta bytes");

    let left_scan = DupeFinder::new().scan(&[left.path().to_path_buf()]).unwrap();
    assert_eq!(left_scan.hash_stats.files_hashed, 2);
    let right_scan = DupeFinder::new().scan(&[right.path().to_path_buf()]).unwrap();
    assert_eq!(right_scan.hash_stats.files_hashed, 2);

    let stats = sync_hashes(left.path(), right.path(), None).unwrap();
    assert_eq!(stats.copied_to_right, 1);
    assert_eq!(stats.copied_to_left, 1);

    let left_cache = DirectoryCache::load_for_dir(left.path()).unwrap();
    let right_cache = DirectoryCache::load_for_dir(right.path()).unwrap();
    assert_eq!(
        left_cache.lookup("beta.bin").unwrap().digest,
        right_cache.lookup("beta.bin").unwrap().digest
    );
    assert_eq!(
        right_cache.lookup("alpha.bin").unwrap().digest,
        left_cache.lookup("alpha.bin").unwrap().digest
    );
}

#[test]
fn sync_command_exits_cleanly() {
    let left = tempdir().unwrap();
    let right = tempdir().unwrap();
    write_stamped(left.path(), "a.bin", b"command payload");
    write_stamped(left.path(), "b.bin", b"command payload");
    DupeFinder::new().scan(&[left.path().to_path_buf()]).unwrap();

    write_stamped(right.path(), "a.bin", b"command payload");
    write_stamped(right.path(), "b.bin", b"command payload");

    let code = run(&[
        "finddupes",
        "-q",
        "sync",
        left.path().to_str().unwrap(),
        right.path().to_str().unwrap(),
    ]);
    assert_eq!(code, ExitCode::Success);

    let cache = DirectoryCache::load_for_dir(right.path()).unwrap();
    assert!(cache.lookup("a.bin").is_some());
    assert!(cache.lookup("b.bin").is_some());
}

#[test]
fn drifted_mirror_is_not_seeded() {
    let left = tempdir().unwrap();
    let right = tempdir().unwrap();
    write_stamped(left.path(), "a.bin", b"mirror me");
    write_stamped(left.path(), "b.bin", b"mirror me");
    DupeFinder::new().scan(&[left.path().to_path_buf()]).unwrap();

    // Same names and sizes, later stamps: the copy is refused.
    for name in ["a.bin", "b.bin"] {
        let path = right.path().join(name);
        File::create(&path).unwrap().write_all(b"mirror me").unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(STAMP + 60, 0)).unwrap();
    }

    let stats = sync_hashes(left.path(), right.path(), None).unwrap();
    assert_eq!(stats.copied_to_right, 0);
    assert!(DirectoryCache::load_for_dir(right.path()).is_none());
}
