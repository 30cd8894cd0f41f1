//! Per-directory hash caches.
//!
//! Every directory that has had files hashed carries a small binary sidecar
//! file next to those files. The sidecar records (size, mtime, digest, name)
//! per file so later runs can skip re-reading content that has not changed.
//! An entry is trusted only when both size and mtime still match exactly;
//! anything else means the file gets re-hashed.
//!
//! Caches are advisory. A missing, stale, or invalid cache only costs
//! re-hashing; it never changes what the scan reports. Validation is
//! therefore strict and fail-closed: a cache that does not parse cleanly is
//! treated as if it were absent.

mod format;

pub use format::{update_entry, CacheEntry, CacheError, DirectoryCache};

/// Name of the cache sidecar inside each directory.
///
/// The walker ignores this name during enumeration so the cache never shows
/// up as a scanned file.
pub const CACHE_FILE_NAME: &str = "md5cache.bin";

/// Format version tag. Bumped on any layout change; mismatches reject the
/// whole file.
pub const CACHE_VERSION: u64 = 0x0000_0100;

/// Digest value of a record that has never been hashed.
pub const NULL_DIGEST: [u8; 16] = [0; 16];
