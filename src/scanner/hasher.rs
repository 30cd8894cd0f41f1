//! Streaming MD5 file hasher with link-aware cache lookup.
//!
//! # Overview
//!
//! This module computes MD5 digests of file contents using memory-efficient
//! streaming. Before reading a file, [`digest_for_file`] consults the
//! directory caches of the file's hard-link siblings: a digest recorded for
//! any other name of the same inode is the digest of this file too, so a
//! confirmed cache hit there saves the full read.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use super::{metadata_ticks, HashError};
use crate::cache::{DirectoryCache, NULL_DIGEST};

/// Read chunk size for streaming hashes.
const HASH_BUF_LEN: usize = 1024 * 1024;

/// Format a digest as a lowercase hex string.
#[must_use]
pub fn digest_hex(digest: &[u8; 16]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Compute the MD5 digest of a file's contents.
///
/// The file is read to the end in [`HASH_BUF_LEN`] chunks; once started, a
/// read runs to completion even if the surrounding scan is cancelled.
pub fn hash_file(path: &Path) -> Result<[u8; 16], HashError> {
    let mut file = File::open(path).map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; HASH_BUF_LEN];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Look up a confirmed cached digest for `path` in its directory's cache.
///
/// The entry must exist under the file's name (case-insensitively), carry a
/// non-null digest, and match the file's current size and modification time.
/// Any miss, mismatch, or unreadable cache yields `None`.
#[must_use]
pub fn cached_digest(path: &Path) -> Option<[u8; 16]> {
    let metadata = std::fs::symlink_metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    let size = i64::try_from(metadata.len()).ok()?;
    let mtime = metadata_ticks(&metadata);

    let dir = path.parent()?;
    let name = path.file_name()?.to_str()?;
    let cache = DirectoryCache::load_for_dir(dir)?;
    let entry = cache.lookup(name)?;
    if entry.matches(size, mtime) && entry.digest != NULL_DIGEST {
        Some(entry.digest)
    } else {
        None
    }
}

/// Obtain the digest for `path`, preferring a sibling's cached digest.
///
/// `siblings` holds the other directory entries hard-linked to `path`; their
/// caches are consulted in order before the file is read. Returns the digest
/// and whether it was reused from a sibling.
pub fn digest_for_file(
    path: &Path,
    siblings: &[PathBuf],
) -> Result<([u8; 16], bool), HashError> {
    for sibling in siblings {
        if let Some(digest) = cached_digest(sibling) {
            log::debug!(
                "reusing digest of {} for {}",
                sibling.display(),
                path.display()
            );
            return Ok((digest, true));
        }
    }
    hash_file(path).map(|digest| (digest, false))
}
