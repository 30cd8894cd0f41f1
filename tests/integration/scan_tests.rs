use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use finddupes::cache::{update_entry, DirectoryCache, CACHE_FILE_NAME};
use finddupes::cli::Cli;
use finddupes::duplicates::{DupeFinder, FinderError};
use finddupes::error::ExitCode;
use finddupes::progress::ProgressCallback;
use finddupes::signal::CancelToken;
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &[u8]) {
    File::create(dir.join(name))
        .unwrap()
        .write_all(content)
        .unwrap();
}

fn run(args: &[&str]) -> ExitCode {
    let cli = Cli::try_parse_from(args).unwrap();
    finddupes::run_app(cli).unwrap()
}

/// Cancels the scan from the first hashing progress report. Walk-phase
/// reports are ignored so the walk completes normally.
struct CancelOnFirstHash {
    token: CancelToken,
    hashing: AtomicBool,
}

impl CancelOnFirstHash {
    fn new(token: CancelToken) -> Self {
        Self {
            token,
            hashing: AtomicBool::new(false),
        }
    }
}

impl ProgressCallback for CancelOnFirstHash {
    fn on_phase_start(&self, phase: &str, _total_files: u64, _total_bytes: u64) {
        if phase == "hashing" {
            self.hashing.store(true, Ordering::SeqCst);
        }
    }

    fn on_progress(&self, _files_done: u64, _bytes_done: u64, _path: &str) {
        if self.hashing.load(Ordering::SeqCst) {
            self.token.cancel();
        }
    }

    fn on_phase_end(&self, _phase: &str) {}
}

#[test]
fn scan_finds_duplicates_and_writes_caches() {
    let dir1 = tempdir().unwrap();
    let dir2 = tempdir().unwrap();
    write_file(dir1.path(), "a.txt", b"same payload");
    write_file(dir2.path(), "b.txt", b"same payload");

    let code = run(&[
        "finddupes",
        "-q",
        "scan",
        dir1.path().to_str().unwrap(),
        dir2.path().to_str().unwrap(),
        "--output",
        "json",
    ]);

    assert_eq!(code, ExitCode::Success);
    assert!(dir1.path().join(CACHE_FILE_NAME).exists());
    assert!(dir2.path().join(CACHE_FILE_NAME).exists());
}

#[test]
fn files_without_size_twins_are_never_hashed() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "short.txt", b"abc");
    write_file(dir.path(), "longer.txt", b"abcdef");

    let summary = DupeFinder::new()
        .scan(&[dir.path().to_path_buf()])
        .unwrap();

    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.hash_stats.files_hashed, 0);
    assert!(summary.groups.is_empty());
    // Nothing was hashed, so no cache sidecar appears either.
    assert!(!dir.path().join(CACHE_FILE_NAME).exists());
}

#[test]
fn second_scan_answers_from_the_cache() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "one.bin", b"identical twins");
    write_file(dir.path(), "two.bin", b"identical twins");
    let roots = vec![dir.path().to_path_buf()];

    let finder = DupeFinder::new().with_thread_limit(1);
    let first = finder.scan(&roots).unwrap();
    assert_eq!(first.hash_stats.files_hashed, 2);
    assert_eq!(first.cache_hits, 0);
    assert_eq!(first.totals.groups, 1);

    let second = finder.scan(&roots).unwrap();
    assert_eq!(second.hash_stats.files_hashed, 0);
    assert_eq!(second.cache_hits, 2);
    assert_eq!(second.totals.groups, 1);
}

#[test]
fn force_all_hashes_every_file() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "solo1.bin", b"abc");
    write_file(dir.path(), "solo2.bin", b"abcde");
    let roots = vec![dir.path().to_path_buf()];

    let plain = DupeFinder::new().scan(&roots).unwrap();
    assert_eq!(plain.hash_stats.files_hashed, 0);

    let forced = DupeFinder::new().with_force_all(true).scan(&roots).unwrap();
    assert_eq!(forced.hash_stats.files_hashed, 2);
    assert!(forced.groups.is_empty());
}

#[test]
fn clean_scan_prunes_ghost_cache_entries() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"pair");
    write_file(dir.path(), "b.txt", b"pair");
    let roots = vec![dir.path().to_path_buf()];

    DupeFinder::new().scan(&roots).unwrap();
    update_entry(dir.path(), "ghost.bin", 5, 99, [2u8; 16]).unwrap();

    // Without the clean flag the stale entry rides along.
    DupeFinder::new().scan(&roots).unwrap();
    let cache = DirectoryCache::load_for_dir(dir.path()).unwrap();
    assert!(cache.lookup("ghost.bin").is_some());

    let summary = DupeFinder::new()
        .with_clean_caches(true)
        .scan(&roots)
        .unwrap();
    assert_eq!(summary.totals.groups, 1);
    let cache = DirectoryCache::load_for_dir(dir.path()).unwrap();
    assert!(cache.lookup("ghost.bin").is_none());
    assert!(cache.lookup("a.txt").is_some());
}

#[test]
fn missing_root_fails_the_run() {
    let dir = tempdir().unwrap();
    let absent = dir.path().join("absent");
    let cli =
        Cli::try_parse_from(["finddupes", "-q", "scan", absent.to_str().unwrap()]).unwrap();
    assert!(finddupes::run_app(cli).is_err());
}

#[test]
fn overlapping_roots_are_rejected() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    std::fs::create_dir(&sub).unwrap();
    write_file(&sub, "x.txt", b"x");

    let err = DupeFinder::new()
        .scan(&[dir.path().to_path_buf(), sub.clone()])
        .unwrap_err();
    assert!(matches!(err, FinderError::Inventory(_)));
}

#[test]
fn interrupted_scan_keeps_a_consistent_state() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "one.bin", b"cut short twins");
    write_file(dir.path(), "two.bin", b"cut short twins");
    let roots = vec![dir.path().to_path_buf()];

    let token = CancelToken::new();
    let summary = DupeFinder::new()
        .with_thread_limit(1)
        .with_cancel_token(token.clone())
        .with_progress(Arc::new(CancelOnFirstHash::new(token)))
        .scan(&roots)
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.hash_stats.files_hashed, 1);
    // A group needs two hashed members; the second file never got there.
    assert!(summary.groups.is_empty());
    // The interrupted worker never flushed its cache.
    assert!(!dir.path().join(CACHE_FILE_NAME).exists());

    // Nothing was persisted, so a fresh run hashes both files.
    let summary = DupeFinder::new().scan(&roots).unwrap();
    assert!(!summary.interrupted);
    assert_eq!(summary.hash_stats.files_hashed, 2);
    assert_eq!(summary.totals.groups, 1);
}

#[test]
fn sort_on_size_persists_finished_files_despite_interruption() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "solo.bin", b"one lonely file");

    let token = CancelToken::new();
    let summary = DupeFinder::new()
        .with_thread_limit(1)
        .with_force_all(true)
        .with_sort_on_size(true)
        .with_cancel_token(token.clone())
        .with_progress(Arc::new(CancelOnFirstHash::new(token)))
        .scan(&[dir.path().to_path_buf()])
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.hash_stats.files_hashed, 1);

    // In sort-on-size mode the dispatcher owns the caches and flushes
    // staged entries even after a cancellation.
    let cache = DirectoryCache::load_for_dir(dir.path()).unwrap();
    assert!(cache.lookup("solo.bin").is_some());
}

#[test]
fn hash_subcommand_warms_the_cache() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "solo.bin", b"no twin anywhere");

    let code = run(&["finddupes", "-q", "hash", dir.path().to_str().unwrap()]);
    assert_eq!(code, ExitCode::Success);

    let cache = DirectoryCache::load_for_dir(dir.path()).unwrap();
    assert!(cache.lookup("solo.bin").is_some());

    // The warmed cache answers a later forced scan.
    let summary = DupeFinder::new()
        .with_force_all(true)
        .scan(&[dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(summary.hash_stats.files_hashed, 0);
    assert_eq!(summary.cache_hits, 1);
}
