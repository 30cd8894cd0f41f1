use clap::Parser;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use finddupes::cache::{DirectoryCache, CACHE_FILE_NAME};
use finddupes::cli::Cli;
use finddupes::duplicates::DupeFinder;
use finddupes::error::ExitCode;
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

#[test]
fn clean_command_prunes_dead_entries() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"cached pair");
    write_file(dir.path(), "b.txt", b"cached pair");
    DupeFinder::new().scan(&[dir.path().to_path_buf()]).unwrap();

    fs::remove_file(dir.path().join("b.txt")).unwrap();

    let code = run(&["finddupes", "-q", "clean", dir.path().to_str().unwrap()]);
    assert_eq!(code, ExitCode::Success);

    let cache = DirectoryCache::load_for_dir(dir.path()).unwrap();
    assert!(cache.lookup("a.txt").is_some());
    assert!(cache.lookup("b.txt").is_none());
}

#[test]
fn clean_command_removes_emptied_dirs() {
    let root = tempdir().unwrap();
    write_file(root.path(), "a.txt", b"keep these");
    write_file(root.path(), "b.txt", b"keep these");
    DupeFinder::new().scan(&[root.path().to_path_buf()]).unwrap();

    let junk = root.path().join("leftovers");
    fs::create_dir(&junk).unwrap();
    write_file(&junk, "Thumbs.db", b"x");

    let code = run(&[
        "finddupes",
        "-q",
        "clean",
        root.path().to_str().unwrap(),
        "--remove-empty-dirs",
    ]);
    assert_eq!(code, ExitCode::Success);

    assert!(!junk.exists());
    assert!(root.path().exists());
    // The root cache still describes the surviving pair.
    let cache = DirectoryCache::load_for_dir(root.path()).unwrap();
    assert_eq!(cache.len(), 2);
}

#[test]
fn live_caches_survive_a_clean() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"still here");
    write_file(dir.path(), "b.txt", b"still here");
    let first = DupeFinder::new().scan(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(first.hash_stats.files_hashed, 2);

    let code = run(&["finddupes", "-q", "clean", dir.path().to_str().unwrap()]);
    assert_eq!(code, ExitCode::Success);
    assert!(dir.path().join(CACHE_FILE_NAME).exists());

    let second = DupeFinder::new().scan(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(second.cache_hits, 2);
    assert_eq!(second.hash_stats.files_hashed, 0);
    assert_eq!(second.totals.groups, 1);
}
