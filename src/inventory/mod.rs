//! In-memory file inventory.
//!
//! A scan accumulates one [`FileInventory`] per walked root: a flat list of
//! [`FileRecord`]s plus a shared [`StringArena`] holding every directory
//! path, file name, and root-relative sub-path. Records reference strings by
//! arena offset, never by pointer, so the arena may grow freely while
//! records stay valid.
//!
//! Inventories are created empty, populated by the walker, combined or
//! trimmed with the set operations below, and dropped at the end of the
//! operation. Only the per-directory caches persist anything.

pub mod arena;
pub mod path_key;

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::cache::{self, CacheError};
use crate::scanner::hardlink::FileId;
pub use arena::{StrOffset, StringArena};
pub use path_key::{cmp_ignore_case, PathKey};

/// Mtime tolerance used when propagating hashes between inventories.
///
/// Timestamps are 100 ns ticks; copying a tree can round mtimes to the
/// receiving filesystem's granularity, so "same file" allows up to 10 ms
/// of drift.
pub const MTIME_TOLERANCE_TICKS: u64 = 100_000;

/// One physical file discovered by a walk.
///
/// `digest` is meaningful only while `hashed` is true. `links` and
/// `file_id` are transient walk-time observations used for hard-link
/// reasoning; they are never persisted.
#[derive(Debug, Clone, Copy)]
pub struct FileRecord {
    pub hashed: bool,
    pub size: i64,
    /// Opaque modification stamp in 100 ns ticks. Compared, never decoded.
    pub mtime: u64,
    pub digest: [u8; 16],
    /// Owning directory path.
    pub dir: StrOffset,
    /// File name within `dir`.
    pub name: StrOffset,
    /// Path relative to the walk root, used by cross-tree comparison.
    pub sub_path: StrOffset,
    /// Hard-link count at walk time.
    pub links: u64,
    /// Filesystem identity at walk time, if the platform exposes one.
    pub file_id: Option<FileId>,
}

/// Errors raised by inventory set operations.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// Two inventories being merged were supposed to be disjoint.
    #[error("path present in both inventories: {path}")]
    OverlappingPath { path: String },
}

/// Flat record store plus the arena its records point into.
#[derive(Debug, Default)]
pub struct FileInventory {
    arena: StringArena,
    records: Vec<FileRecord>,
}

impl FileInventory {
    /// Create an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether the inventory holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in current order.
    #[must_use]
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Intern a string, returning its offset for reuse across records.
    ///
    /// The walker interns each directory path once and shares the offset
    /// among that directory's files.
    pub fn intern(&mut self, s: &str) -> StrOffset {
        self.arena.push(s)
    }

    /// Resolve any offset previously produced by [`Self::intern`].
    #[must_use]
    pub fn str_at(&self, offset: StrOffset) -> &str {
        self.arena.get(offset)
    }

    /// Append a record built from its parts, interning `name` and
    /// `sub_path`. Returns the record's index.
    #[allow(clippy::too_many_arguments)]
    pub fn add_file(
        &mut self,
        dir: StrOffset,
        name: &str,
        sub_path: &str,
        size: i64,
        mtime: u64,
        links: u64,
        file_id: Option<FileId>,
    ) -> usize {
        let name = self.arena.push(name);
        let sub_path = self.arena.push(sub_path);
        self.records.push(FileRecord {
            hashed: false,
            size,
            mtime,
            digest: cache::NULL_DIGEST,
            dir,
            name,
            sub_path,
            links,
            file_id,
        });
        self.records.len() - 1
    }

    /// Mark a record hashed with the given digest.
    pub fn set_hashed(&mut self, index: usize, digest: [u8; 16]) {
        let rec = &mut self.records[index];
        rec.digest = digest;
        rec.hashed = true;
    }

    /// Full path of a record.
    #[must_use]
    pub fn full_path(&self, rec: &FileRecord) -> PathBuf {
        Path::new(self.arena.get(rec.dir)).join(self.arena.get(rec.name))
    }

    /// Case-insensitive key for a record's full path.
    #[must_use]
    pub fn path_key(&self, rec: &FileRecord) -> PathKey {
        PathKey::from_path(&self.full_path(rec))
    }

    /// File name of a record.
    #[must_use]
    pub fn name_of(&self, rec: &FileRecord) -> &str {
        self.arena.get(rec.name)
    }

    /// Owning directory of a record.
    #[must_use]
    pub fn dir_of(&self, rec: &FileRecord) -> &str {
        self.arena.get(rec.dir)
    }

    /// Root-relative sub-path of a record.
    #[must_use]
    pub fn sub_path_of(&self, rec: &FileRecord) -> &str {
        self.arena.get(rec.sub_path)
    }

    /// Sum of all record sizes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.size.max(0) as u64).sum()
    }

    /// Append every record of `other`, re-interning its strings.
    ///
    /// Inventories are disjoint unions by construction (distinct walk
    /// roots); finding the same path on both sides means the caller wired
    /// the operation wrong, so this fails rather than guessing.
    ///
    /// Returns the number of records appended.
    ///
    /// # Errors
    ///
    /// [`InventoryError::OverlappingPath`] on the first path present in
    /// both inventories (or twice in `other`).
    pub fn merge_from(&mut self, other: &FileInventory) -> Result<usize, InventoryError> {
        let mut seen: HashSet<PathKey> = self.records.iter().map(|r| self.path_key(r)).collect();
        // Directory strings are shared within `other`; keep them shared here.
        let mut dir_map: HashMap<u32, StrOffset> = HashMap::new();
        let mut appended = 0;

        for rec in &other.records {
            let key = other.path_key(rec);
            if !seen.insert(key) {
                return Err(InventoryError::OverlappingPath {
                    path: other.full_path(rec).display().to_string(),
                });
            }
            let dir = *dir_map
                .entry(rec.dir.as_u32())
                .or_insert_with(|| self.arena.push(other.arena.get(rec.dir)));
            let name = self.arena.push(other.arena.get(rec.name));
            let sub_path = self.arena.push(other.arena.get(rec.sub_path));
            self.records.push(FileRecord {
                dir,
                name,
                sub_path,
                ..*rec
            });
            appended += 1;
        }

        log::debug!("merged {appended} records, {} total", self.records.len());
        Ok(appended)
    }

    /// Copy digests from `hashed` onto matching records of self.
    ///
    /// A record matches when the full path compares equal ignoring case and
    /// the mtimes are within [`MTIME_TOLERANCE_TICKS`]. `hashed` is not
    /// mutated. Returns how many records received a digest.
    pub fn apply_hash_from(&mut self, hashed: &FileInventory) -> usize {
        let by_path: HashMap<PathKey, usize> = hashed
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (hashed.path_key(r), i))
            .collect();

        let mut applied = 0;
        for i in 0..self.records.len() {
            let key = self.path_key(&self.records[i]);
            if let Some(&src_idx) = by_path.get(&key) {
                let src = hashed.records[src_idx];
                if src.hashed && src.mtime.abs_diff(self.records[i].mtime) < MTIME_TOLERANCE_TICKS {
                    self.records[i].digest = src.digest;
                    self.records[i].hashed = true;
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Drop every record whose full path also appears in `other`.
    ///
    /// Arena strings of removed records are not reclaimed; the arena is
    /// append-only and inventories are short-lived.
    ///
    /// Returns the number of records removed.
    pub fn remove_set_from_set(&mut self, other: &FileInventory) -> usize {
        let exclude: HashSet<PathKey> =
            other.records.iter().map(|r| other.path_key(r)).collect();

        let arena = &self.arena;
        let records = std::mem::take(&mut self.records);
        let before = records.len();
        self.records = records
            .into_iter()
            .filter(|rec| {
                let path = Path::new(arena.get(rec.dir)).join(arena.get(rec.name));
                !exclude.contains(&PathKey::from_path(&path))
            })
            .collect();
        before - self.records.len()
    }

    /// Sort records by size descending, then full path ascending ignoring
    /// case. This is the order the scheduler and the resolver both rely on.
    pub fn sort_for_hashing(&mut self) {
        let arena = &self.arena;
        self.records.sort_by_cached_key(|rec| {
            let path = Path::new(arena.get(rec.dir)).join(arena.get(rec.name));
            let exact = path.to_string_lossy().into_owned();
            (Reverse(rec.size), PathKey::from_path(&path), exact)
        });
    }

    /// Persist one record's digest into its directory's cache right now,
    /// creating the cache file if absent.
    ///
    /// # Errors
    ///
    /// Any cache read/write failure; the inventory itself is untouched.
    pub fn update_file(&self, index: usize) -> Result<(), CacheError> {
        let rec = &self.records[index];
        cache::update_entry(
            Path::new(self.arena.get(rec.dir)),
            self.arena.get(rec.name),
            rec.size,
            rec.mtime,
            rec.digest,
        )
    }

    /// Map from root-relative sub-path to record index, for cross-tree
    /// comparison.
    #[must_use]
    pub fn sub_path_index(&self) -> HashMap<PathKey, usize> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (PathKey::new(self.arena.get(r.sub_path)), i))
            .collect()
    }
}
