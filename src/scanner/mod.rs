//! Directory scanning and content hashing.
//!
//! This module provides functionality for:
//! - Recursive directory walking with per-directory cache reconciliation
//! - Hard link discovery and digest propagation between linked files
//! - Selective MD5 hashing scheduled across a worker pool
//! - Cache maintenance (pruning stale entries, removing empty directories)
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal, cache reconciliation, file discovery
//! - [`hardlink`]: File identity tracking and link-aware digest reuse
//! - [`hasher`]: Streaming MD5 hashing with sibling-cache lookup
//! - [`scheduler`]: Bucketed parallel hashing across a worker pool
//! - [`cleaner`]: Cache pruning and empty-directory removal

pub mod cleaner;
pub mod hardlink;
pub mod hasher;
pub mod scheduler;
pub mod walker;

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

// Re-export main types
pub use cleaner::{clean_tree, CleanStats};
pub use hardlink::{FileId, LinkIndex};
pub use hasher::{digest_hex, hash_file};
pub use scheduler::{HashScheduler, HashStats, DEFAULT_THREAD_LIMIT};
pub use walker::{WalkStats, Walker};

use crate::cache::CACHE_FILE_NAME;

/// Directory names that are never descended into.
pub const IGNORED_FOLDERS: [&str; 3] = [".", "..", "System Volume Information"];

/// File names that are never inventoried.
pub const IGNORED_FILES: [&str; 6] = [
    "desktop.ini",
    "folder.bin",
    "folder.jpg",
    "#recycle",
    "thumbs.db",
    CACHE_FILE_NAME,
];

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io { path, source },
        }
    }
}

/// Check whether `name` is one of the ignored directory names.
///
/// Matching is case-insensitive so caches written on case-preserving
/// filesystems are honored however the name comes back from `read_dir`.
#[must_use]
pub fn is_ignored_folder(name: &str) -> bool {
    IGNORED_FOLDERS.iter().any(|f| name.eq_ignore_ascii_case(f))
}

/// Check whether `name` is one of the ignored file names.
#[must_use]
pub fn is_ignored_file(name: &str) -> bool {
    IGNORED_FILES.iter().any(|f| name.eq_ignore_ascii_case(f))
}

/// Convert a timestamp to ticks: 100-nanosecond intervals since the Unix
/// epoch. Timestamps before the epoch clamp to zero.
#[must_use]
pub fn mtime_ticks(time: SystemTime) -> u64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs().saturating_mul(10_000_000) + u64::from(d.subsec_nanos()) / 100,
        Err(_) => 0,
    }
}

/// Read the modification time of `metadata` in ticks.
#[must_use]
pub fn metadata_ticks(metadata: &std::fs::Metadata) -> u64 {
    metadata.modified().map(mtime_ticks).unwrap_or(0)
}
