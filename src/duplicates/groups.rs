//! Duplicate group resolution over a hashed inventory.
//!
//! Two files are duplicates when they agree on both size and content
//! digest. The inventory arrives in hashing order (size descending, then
//! path), so equal-size files form contiguous runs; each run is
//! partitioned by digest and every partition with two or more members
//! becomes a [`DuplicateGroup`].
//!
//! Group members that are hard links of each other carry a shared
//! single-character tag so reports can show that removing one of them
//! would not free any space.
//!
//! # Example
//!
//! ```
//! use finddupes::duplicates::{DuplicateGroup, GroupFile};
//! use std::path::PathBuf;
//!
//! let group = DuplicateGroup {
//!     size: 1024,
//!     digest: [0xab; 16],
//!     files: vec![
//!         GroupFile { path: PathBuf::from("/a/report.pdf"), links: 1, link_group: None },
//!         GroupFile { path: PathBuf::from("/b/report.pdf"), links: 1, link_group: None },
//!     ],
//! };
//!
//! assert_eq!(group.duplicate_count(), 1);
//! assert_eq!(group.reclaimable_bytes(), 1024);
//! ```

use std::collections::HashMap;
use std::ops::Range;
use std::path::PathBuf;

use crate::inventory::{FileInventory, FileRecord};
use crate::scanner::hardlink::link_count;
use crate::scanner::{digest_hex, FileId};

/// Link-group tag used once the alphabet runs out.
pub const LINK_GROUP_OVERFLOW: char = '*';

/// One file inside a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFile {
    /// Full path as scanned.
    pub path: PathBuf,
    /// Directory-entry count of the underlying storage object.
    pub links: u64,
    /// Tag shared by group members that are hard links of each other.
    ///
    /// `None` for singly-linked files. Tags run `'a'..='z'` in the order
    /// identities are first seen within the group, then
    /// [`LINK_GROUP_OVERFLOW`] for every identity past the alphabet.
    pub link_group: Option<char>,
}

/// Files that share both size and content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Size in bytes of every member.
    pub size: i64,
    /// Digest every member hashed to.
    pub digest: [u8; 16],
    /// Members in inventory order.
    pub files: Vec<GroupFile>,
}

impl DuplicateGroup {
    /// Number of files in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files that could be removed while keeping one copy.
    #[must_use]
    pub fn duplicate_count(&self) -> u64 {
        self.files.len().saturating_sub(1) as u64
    }

    /// Bytes freed by keeping a single copy.
    ///
    /// Counts every member at face value; hard-linked members share
    /// storage, so the real figure can be lower. The per-member
    /// [`GroupFile::link_group`] tags let callers spot that case.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.duplicate_count()
            .saturating_mul(u64::try_from(self.size).unwrap_or(0))
    }

    /// Digest as a lowercase hex string.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        digest_hex(&self.digest)
    }
}

/// Accounting accumulated across a set of groups.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GroupTotals {
    /// Duplicate groups found.
    pub groups: u64,
    /// Files beyond the first copy of each group.
    pub duplicate_files: u64,
    /// Bytes held by those extra files.
    pub reclaimable_bytes: u64,
}

impl GroupTotals {
    /// Fold one group into the running totals.
    pub fn accumulate(&mut self, group: &DuplicateGroup) {
        self.groups += 1;
        self.duplicate_files += group.duplicate_count();
        self.reclaimable_bytes = self
            .reclaimable_bytes
            .saturating_add(group.reclaimable_bytes());
    }

    /// Totals over a finished group list.
    #[must_use]
    pub fn tally(groups: &[DuplicateGroup]) -> Self {
        let mut totals = Self::default();
        for group in groups {
            totals.accumulate(group);
        }
        totals
    }
}

/// Resolve duplicate groups from a hashed inventory.
///
/// The inventory must already be in hashing order. Runs of a single file
/// are skipped without inspection, records that never got a digest match
/// nothing, and resolution stops at the first non-positive size since
/// nothing comparable can follow it in a descending sort.
#[must_use]
pub fn find_duplicates(inventory: &FileInventory) -> Vec<DuplicateGroup> {
    let records = inventory.records();
    let mut groups = Vec::new();
    let mut start = 0;
    while start < records.len() {
        let size = records[start].size;
        if size <= 0 {
            break;
        }
        let mut end = start + 1;
        while end < records.len() && records[end].size == size {
            end += 1;
        }
        if end - start >= 2 {
            partition_run(inventory, start..end, &mut groups);
        }
        start = end;
    }
    groups
}

/// Resolve candidate files against a separate base inventory.
///
/// Every candidate that matches at least one base file by size and digest
/// yields one group holding the candidate first and the matching base
/// files after it. Candidates must be in hashing order; the base may be
/// in any order. Candidates never match each other.
#[must_use]
pub fn find_duplicates_against(
    base: &FileInventory,
    candidates: &FileInventory,
) -> Vec<DuplicateGroup> {
    let base_records = base.records();
    let mut by_size: HashMap<i64, Vec<usize>> = HashMap::new();
    for (index, rec) in base_records.iter().enumerate() {
        if rec.hashed && rec.size > 0 {
            by_size.entry(rec.size).or_default().push(index);
        }
    }

    let mut groups = Vec::new();
    for cand in candidates.records() {
        if cand.size <= 0 {
            break;
        }
        if !cand.hashed {
            continue;
        }
        let Some(indices) = by_size.get(&cand.size) else {
            continue;
        };
        let matched: Vec<&FileRecord> = indices
            .iter()
            .map(|&i| &base_records[i])
            .filter(|rec| rec.digest == cand.digest)
            .collect();
        if matched.is_empty() {
            continue;
        }

        let mut seen = Vec::new();
        let mut files = Vec::with_capacity(matched.len() + 1);
        files.push(annotate_member(candidates, cand, &mut seen));
        for rec in matched {
            files.push(annotate_member(base, rec, &mut seen));
        }
        groups.push(DuplicateGroup {
            size: cand.size,
            digest: cand.digest,
            files,
        });
    }
    groups
}

/// Partition one equal-size run by digest, emitting groups of two or more.
fn partition_run(inventory: &FileInventory, run: Range<usize>, groups: &mut Vec<DuplicateGroup>) {
    let records = inventory.records();
    let mut pending: Vec<usize> = run.filter(|&i| records[i].hashed).collect();
    while pending.len() > 1 {
        let pivot = records[pending[0]].digest;
        let (matched, rest): (Vec<usize>, Vec<usize>) =
            pending.into_iter().partition(|&i| records[i].digest == pivot);
        if matched.len() > 1 {
            let mut seen = Vec::new();
            let files = matched
                .iter()
                .map(|&i| annotate_member(inventory, &records[i], &mut seen))
                .collect();
            groups.push(DuplicateGroup {
                size: records[matched[0]].size,
                digest: pivot,
                files,
            });
        }
        pending = rest;
    }
}

/// Build the reportable view of one group member.
///
/// Link counts and identities are re-read from the filesystem so the tags
/// reflect the state at report time; a file that vanished since the walk
/// falls back to the values captured then.
fn annotate_member(
    inventory: &FileInventory,
    rec: &FileRecord,
    seen: &mut Vec<FileId>,
) -> GroupFile {
    let path = inventory.full_path(rec);
    let (links, id) = match std::fs::symlink_metadata(&path) {
        Ok(meta) => (link_count(&meta), FileId::from_metadata(&meta)),
        Err(_) => (rec.links, rec.file_id),
    };
    let link_group = if links > 1 {
        id.map(|id| link_letter(seen, id))
    } else {
        None
    };
    GroupFile {
        path,
        links,
        link_group,
    }
}

/// Tag for a link identity, allocating the next letter on first sight.
fn link_letter(seen: &mut Vec<FileId>, id: FileId) -> char {
    let pos = seen.iter().position(|s| *s == id).unwrap_or_else(|| {
        seen.push(id);
        seen.len() - 1
    });
    if pos < 26 {
        char::from(b'a' + pos as u8)
    } else {
        LINK_GROUP_OVERFLOW
    }
}
