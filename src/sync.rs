//! Digest synchronization between two directory trees.
//!
//! Two trees holding the same content, a mirror and its source say, can
//! trade digests instead of hashing twice. A file hashed on one side
//! seeds the directory cache on the other as long as the relative path
//! matches ignoring case and size and modification stamp agree exactly.
//! Stamps are compared without tolerance here: a copied digest claims
//! the bytes are identical, so only an exact match is trusted.

use std::path::Path;

use crate::inventory::path_key::PathKey;
use crate::scanner::{ScanError, Walker};
use crate::signal::CancelToken;

/// Counters from one sync run.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncStats {
    /// Files inventoried under the left root.
    pub left_files: u64,
    /// Files inventoried under the right root.
    pub right_files: u64,
    /// Digests copied from right to left.
    pub copied_to_left: u64,
    /// Digests copied from left to right.
    pub copied_to_right: u64,
    /// Cache entries pruned while walking both sides.
    pub pruned_entries: u64,
    /// Cache writes that failed.
    pub errors: u64,
}

/// Copy known digests between two trees holding the same content.
///
/// Both trees are walked with cache pruning enabled, as stale entries
/// must not be propagated. A file participates when the same relative
/// path exists on both sides with equal size and exactly equal
/// modification stamp and exactly one side already has a digest; the
/// digest is copied to the other side and persisted into that
/// directory's cache immediately.
///
/// # Errors
///
/// Fails when either root cannot be walked at all. Per-file cache write
/// failures are logged and counted, not raised.
pub fn sync_hashes(
    left: &Path,
    right: &Path,
    cancel: Option<&CancelToken>,
) -> Result<SyncStats, ScanError> {
    let mut left_walker = Walker::new(left).with_clean_mode(true);
    let mut right_walker = Walker::new(right).with_clean_mode(true);
    if let Some(token) = cancel {
        left_walker = left_walker.with_cancel_token(token.clone());
        right_walker = right_walker.with_cancel_token(token.clone());
    }
    let (mut left_inv, left_stats) = left_walker.walk()?;
    let (mut right_inv, right_stats) = right_walker.walk()?;

    let mut stats = SyncStats {
        left_files: left_stats.files,
        right_files: right_stats.files,
        pruned_entries: left_stats.pruned_entries + right_stats.pruned_entries,
        ..Default::default()
    };

    let left_index = left_inv.sub_path_index();

    for right_idx in 0..right_inv.len() {
        if cancel.is_some_and(|t| t.is_cancelled()) {
            log::debug!("sync cancelled after {} copies", stats.copied_to_left + stats.copied_to_right);
            break;
        }

        let right_rec = right_inv.records()[right_idx];
        let key = PathKey::new(right_inv.sub_path_of(&right_rec));
        let Some(&left_idx) = left_index.get(&key) else {
            continue;
        };
        let left_rec = left_inv.records()[left_idx];
        if left_rec.size != right_rec.size || left_rec.mtime != right_rec.mtime {
            continue;
        }

        match (left_rec.hashed, right_rec.hashed) {
            (true, false) => {
                right_inv.set_hashed(right_idx, left_rec.digest);
                match right_inv.update_file(right_idx) {
                    Ok(()) => stats.copied_to_right += 1,
                    Err(e) => {
                        log::warn!(
                            "cannot persist digest for {}: {}",
                            right_inv.full_path(&right_rec).display(),
                            e
                        );
                        stats.errors += 1;
                    }
                }
            }
            (false, true) => {
                left_inv.set_hashed(left_idx, right_rec.digest);
                match left_inv.update_file(left_idx) {
                    Ok(()) => stats.copied_to_left += 1,
                    Err(e) => {
                        log::warn!(
                            "cannot persist digest for {}: {}",
                            left_inv.full_path(&left_rec).display(),
                            e
                        );
                        stats.errors += 1;
                    }
                }
            }
            // Both sides known or both unknown: nothing to share.
            _ => {}
        }
    }

    log::info!(
        "synced {} digests to {} and {} to {}",
        stats.copied_to_right,
        right.display(),
        stats.copied_to_left,
        left.display()
    );
    Ok(stats)
}
