#![cfg(unix)]

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use finddupes::duplicates::{DupeFinder, GroupFile, ScanSummary};
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &[u8]) {
    File::create(dir.join(name))
        .unwrap()
        .write_all(content)
        .unwrap();
}

fn scan(root: &Path) -> ScanSummary {
    DupeFinder::new().scan(&[root.to_path_buf()]).unwrap()
}

fn member<'a>(summary: &'a ScanSummary, name: &str) -> &'a GroupFile {
    summary.groups[0]
        .files
        .iter()
        .find(|f| f.path.file_name().unwrap() == name)
        .unwrap()
}

#[test]
fn fully_linked_run_is_left_unhashed() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"linked payload");
    fs::hard_link(dir.path().join("a.bin"), dir.path().join("b.bin")).unwrap();

    let summary = scan(dir.path());

    // Two names of one inode: content is equal by construction, and with
    // no cached digest to propagate there is nothing worth reporting.
    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.hash_stats.files_hashed, 0);
    assert_eq!(summary.hash_stats.link_reuses, 0);
    assert!(summary.groups.is_empty());
}

#[test]
fn linked_pair_and_twin_form_one_group() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a1.bin", b"shared bytes");
    fs::hard_link(dir.path().join("a1.bin"), dir.path().join("a2.bin")).unwrap();
    write_file(dir.path(), "c.bin", b"shared bytes");

    let summary = scan(dir.path());

    // c.bin breaks the all-linked shortcut, so all three are hashed.
    assert_eq!(summary.hash_stats.files_hashed, 3);
    assert_eq!(summary.hash_stats.link_reuses, 0);
    assert_eq!(summary.totals.groups, 1);
    assert_eq!(summary.groups[0].len(), 3);

    assert_eq!(member(&summary, "a1.bin").link_group, Some('a'));
    assert_eq!(member(&summary, "a2.bin").link_group, Some('a'));
    assert_eq!(member(&summary, "c.bin").link_group, None);
    assert_eq!(member(&summary, "a1.bin").links, 2);
    assert_eq!(member(&summary, "c.bin").links, 1);
}

#[test]
fn cached_digest_propagates_to_new_links() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "x.bin", b"kept around");

    // Warm the cache, then add a second name for the same inode.
    DupeFinder::new()
        .hash_all(&[dir.path().to_path_buf()])
        .unwrap();
    fs::hard_link(dir.path().join("x.bin"), dir.path().join("y.bin")).unwrap();

    let summary = scan(dir.path());

    assert_eq!(summary.cache_hits, 1);
    assert_eq!(summary.hash_stats.files_hashed, 0);
    assert_eq!(summary.hash_stats.link_reuses, 1);
    assert_eq!(summary.totals.groups, 1);
    assert_eq!(summary.groups[0].len(), 2);
    assert_eq!(member(&summary, "x.bin").link_group, Some('a'));
    assert_eq!(member(&summary, "y.bin").link_group, Some('a'));
    assert_eq!(member(&summary, "y.bin").links, 2);
}

#[test]
fn new_link_reuses_sibling_cache() {
    let root = tempdir().unwrap();
    let dir_a = root.path().join("a");
    let dir_b = root.path().join("b");
    fs::create_dir(&dir_a).unwrap();
    fs::create_dir(&dir_b).unwrap();
    write_file(&dir_a, "t.bin", b"twin content");
    write_file(&dir_a, "x.bin", b"twin content");

    let first = scan(root.path());
    assert_eq!(first.hash_stats.files_hashed, 2);

    fs::hard_link(dir_a.join("x.bin"), dir_b.join("link.bin")).unwrap();

    // Only the new name is unhashed; its digest comes from the sibling's
    // directory cache without the file being read.
    let second = scan(root.path());
    assert_eq!(second.cache_hits, 2);
    assert_eq!(second.hash_stats.files_hashed, 0);
    assert_eq!(second.hash_stats.cache_reuses, 1);
    assert_eq!(second.totals.groups, 1);
    assert_eq!(second.groups[0].len(), 3);

    assert_eq!(member(&second, "t.bin").link_group, None);
    assert_eq!(member(&second, "x.bin").link_group, Some('a'));
    assert_eq!(member(&second, "link.bin").link_group, Some('a'));
}

#[test]
fn two_identities_get_distinct_letters() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a1.bin", b"four of a kind");
    fs::hard_link(dir.path().join("a1.bin"), dir.path().join("a2.bin")).unwrap();
    write_file(dir.path(), "b1.bin", b"four of a kind");
    fs::hard_link(dir.path().join("b1.bin"), dir.path().join("b2.bin")).unwrap();

    let summary = scan(dir.path());

    assert_eq!(summary.hash_stats.files_hashed, 4);
    assert_eq!(summary.totals.groups, 1);
    assert_eq!(summary.groups[0].len(), 4);

    // Letters follow first-seen order over the group's members.
    assert_eq!(member(&summary, "a1.bin").link_group, Some('a'));
    assert_eq!(member(&summary, "a2.bin").link_group, Some('a'));
    assert_eq!(member(&summary, "b1.bin").link_group, Some('b'));
    assert_eq!(member(&summary, "b2.bin").link_group, Some('b'));
    assert_eq!(member(&summary, "b1.bin").links, 2);
}
