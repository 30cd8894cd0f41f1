use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use filetime::{set_file_mtime, FileTime};
use finddupes::cache::{DirectoryCache, CACHE_FILE_NAME};
use finddupes::duplicates::DupeFinder;
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &[u8]) {
    File::create(dir.join(name))
        .unwrap()
        .write_all(content)
        .unwrap();
}

fn scan_pair(dir: &Path) -> finddupes::duplicates::ScanSummary {
    DupeFinder::new().scan(&[dir.to_path_buf()]).unwrap()
}

#[test]
fn touched_file_is_rehashed() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"same content");
    write_file(dir.path(), "b.bin", b"same content");

    let first = scan_pair(dir.path());
    assert_eq!(first.hash_stats.files_hashed, 2);

    set_file_mtime(
        dir.path().join("a.bin"),
        FileTime::from_unix_time(1_500_000_000, 0),
    )
    .unwrap();

    let second = scan_pair(dir.path());
    assert_eq!(second.hash_stats.files_hashed, 1);
    assert_eq!(second.cache_hits, 1);
    assert_eq!(second.totals.groups, 1);
}

#[test]
fn size_change_drops_a_file_from_its_group() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"same content");
    write_file(dir.path(), "b.bin", b"same content");
    write_file(dir.path(), "c.bin", b"same content");

    let first = scan_pair(dir.path());
    assert_eq!(first.groups[0].len(), 3);

    let mut f = OpenOptions::new()
        .append(true)
        .open(dir.path().join("c.bin"))
        .unwrap();
    f.write_all(b" and then some").unwrap();
    drop(f);

    let second = scan_pair(dir.path());
    assert_eq!(second.totals.groups, 1);
    assert_eq!(second.groups[0].len(), 2);
    // The grown file has no size twin left, so it is not even hashed.
    assert_eq!(second.hash_stats.files_hashed, 0);
    assert_eq!(second.cache_hits, 2);
}

#[test]
fn corrupt_version_field_discards_the_cache() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"payload payload");
    write_file(dir.path(), "b.bin", b"payload payload");
    scan_pair(dir.path());

    let cache_path = dir.path().join(CACHE_FILE_NAME);
    let mut bytes = fs::read(&cache_path).unwrap();
    bytes[0] ^= 0xFF;
    fs::write(&cache_path, &bytes).unwrap();
    assert!(DirectoryCache::load(&cache_path).is_none());

    let again = scan_pair(dir.path());
    assert_eq!(again.cache_hits, 0);
    assert_eq!(again.hash_stats.files_hashed, 2);
    assert_eq!(again.totals.groups, 1);

    // The scan rewrote a valid cache over the corrupt one.
    let healed = DirectoryCache::load(&cache_path).unwrap();
    assert_eq!(healed.len(), 2);
}

#[test]
fn out_of_range_name_offset_discards_the_cache() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"payload payload");
    write_file(dir.path(), "b.bin", b"payload payload");
    scan_pair(dir.path());

    let cache_path = dir.path().join(CACHE_FILE_NAME);
    let mut bytes = fs::read(&cache_path).unwrap();
    // First entry's name offset sits right after its size, mtime and digest.
    bytes[48..52].copy_from_slice(&u32::MAX.to_le_bytes());
    fs::write(&cache_path, &bytes).unwrap();
    assert!(DirectoryCache::load(&cache_path).is_none());

    let again = scan_pair(dir.path());
    assert_eq!(again.hash_stats.files_hashed, 2);
}

#[test]
fn truncated_cache_is_discarded() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"payload payload");
    write_file(dir.path(), "b.bin", b"payload payload");
    scan_pair(dir.path());

    let cache_path = dir.path().join(CACHE_FILE_NAME);
    let bytes = fs::read(&cache_path).unwrap();
    fs::write(&cache_path, &bytes[..bytes.len() / 2]).unwrap();

    let again = scan_pair(dir.path());
    assert_eq!(again.cache_hits, 0);
    assert_eq!(again.hash_stats.files_hashed, 2);
}

#[test]
fn cache_sidecar_is_never_inventoried() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"twin files");
    write_file(dir.path(), "b.bin", b"twin files");

    let first = scan_pair(dir.path());
    assert_eq!(first.files_scanned, 2);
    assert!(dir.path().join(CACHE_FILE_NAME).exists());

    let second = scan_pair(dir.path());
    assert_eq!(second.files_scanned, 2);
}
