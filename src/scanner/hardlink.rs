//! Hard link identity tracking.
//!
//! # Overview
//!
//! Hard links are multiple directory entries pointing to the same inode on
//! disk. They share content by construction, so hashing more than one entry
//! of a linked set wastes I/O, and a candidate set made up entirely of links
//! to one inode is not a duplicate group at all. This module assigns each
//! file a platform identity and indexes the inventory by it so the hashing
//! and reporting layers can reason about linked sets.
//!
//! # Platform Support
//!
//! - **Unix**: Uses (device, inode) pairs from file metadata
//! - **Other**: Identity unavailable; every file is treated as unique

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::PathBuf;

use crate::inventory::FileInventory;

/// Identity of a file's underlying storage object.
///
/// Two directory entries with equal `FileId`s are hard links to the same
/// data. On platforms without inode semantics no identity is assigned and
/// linked files are indistinguishable from independent ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    /// Create an identity from raw device and inode numbers.
    #[must_use]
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Read the identity of a file from its metadata.
    ///
    /// Returns `None` on platforms without inode information.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    /// Read the identity of a file from its metadata.
    ///
    /// Returns `None` on platforms without inode information.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Check if identity tracking is available on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}

/// Number of directory entries referring to this file.
///
/// Reports 1 on platforms where the count is unavailable.
#[cfg(unix)]
#[must_use]
pub fn link_count(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.nlink()
}

/// Number of directory entries referring to this file.
///
/// Reports 1 on platforms where the count is unavailable.
#[cfg(not(unix))]
#[must_use]
pub fn link_count(_metadata: &Metadata) -> u64 {
    1
}

/// Index of multiply-linked files in an inventory, keyed by identity.
///
/// Only files whose link count exceeds one are indexed; the common
/// singly-linked case costs nothing. Record indices stay valid as long as
/// the inventory is not reordered after the index is built.
#[derive(Debug, Default)]
pub struct LinkIndex {
    groups: HashMap<FileId, Vec<usize>>,
}

impl LinkIndex {
    /// Build an index over `inventory`.
    ///
    /// Linked entries whose other names fall outside the scanned roots are
    /// indexed as singletons; identity-based reuse only sees what the scan
    /// saw.
    #[must_use]
    pub fn build(inventory: &FileInventory) -> Self {
        let mut groups: HashMap<FileId, Vec<usize>> = HashMap::new();
        for (idx, record) in inventory.records().iter().enumerate() {
            if record.links > 1 {
                if let Some(id) = record.file_id {
                    groups.entry(id).or_default().push(idx);
                }
            }
        }
        log::debug!("link index: {} linked identities", groups.len());
        Self { groups }
    }

    /// Number of distinct linked identities indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Record indices sharing `id`, in inventory order.
    #[must_use]
    pub fn members(&self, id: FileId) -> Option<&[usize]> {
        self.groups.get(&id).map(Vec::as_slice)
    }

    /// Indices of the other directory entries linked to record `idx`.
    ///
    /// Empty when the record is singly linked or identity is unavailable.
    #[must_use]
    pub fn siblings_of(&self, inventory: &FileInventory, idx: usize) -> Vec<usize> {
        let Some(id) = inventory.records()[idx].file_id else {
            return Vec::new();
        };
        match self.groups.get(&id) {
            Some(members) => members.iter().copied().filter(|&m| m != idx).collect(),
            None => Vec::new(),
        }
    }

    /// Full paths of the other directory entries linked to record `idx`.
    #[must_use]
    pub fn sibling_paths(&self, inventory: &FileInventory, idx: usize) -> Vec<PathBuf> {
        self.siblings_of(inventory, idx)
            .into_iter()
            .map(|m| inventory.full_path(&inventory.records()[m]))
            .collect()
    }
}

/// Check whether every record in `records` is a link to one storage object.
///
/// Vacuously false for an empty slice and for any record without identity.
#[must_use]
pub fn all_share_identity(records: &[crate::inventory::FileRecord]) -> bool {
    let Some(first) = records.first().and_then(|r| r.file_id) else {
        return false;
    };
    records.iter().all(|r| r.file_id == Some(first))
}
