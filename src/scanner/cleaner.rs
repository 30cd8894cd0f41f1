//! Cache maintenance: pruning stale entries and removing empty directories.
//!
//! A clean pass walks a tree without hashing anything. Every directory
//! cache is pruned of entries that no longer describe a file on disk, and
//! optionally, directories left holding nothing but ignorable junk files
//! are deleted bottom-up. The roots given on the command line are never
//! removed.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::Path;

use super::{is_ignored_file, is_ignored_folder, metadata_ticks, ScanError};
use crate::cache::{DirectoryCache, CACHE_FILE_NAME, NULL_DIGEST};
use crate::inventory::path_key::PathKey;
use crate::signal::CancelToken;

/// Counters accumulated over one clean pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct CleanStats {
    /// Directories visited.
    pub dirs: u64,
    /// Cache entries dropped.
    pub pruned_entries: u64,
    /// Cache files deleted.
    pub removed_caches: u64,
    /// Ignorable files deleted while removing directories.
    pub removed_files: u64,
    /// Directories removed.
    pub removed_dirs: u64,
    /// Paths skipped because of I/O errors.
    pub errors: u64,
}

/// Result of pruning one directory's cache.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PruneOutcome {
    pub pruned_entries: u64,
    pub removed_cache: bool,
    pub errors: u64,
}

/// Drop cache entries that no longer describe a file in `files`.
///
/// An entry survives only if a file of the same name (compared
/// case-insensitively) still exists with the recorded size and
/// modification time and the entry carries a real digest. The cache file
/// is rewritten only when entries were dropped, and deleted when none
/// survive. An unreadable cache file is deleted outright.
pub(crate) fn prune_directory_cache(
    dir: &Path,
    cache: Option<&DirectoryCache>,
    files: &[(String, Metadata)],
) -> PruneOutcome {
    let cache_path = dir.join(CACHE_FILE_NAME);
    let mut outcome = PruneOutcome::default();

    let Some(cache) = cache else {
        if cache_path.exists() {
            log::info!("removing unreadable cache {}", cache_path.display());
            if let Err(e) = std::fs::remove_file(&cache_path) {
                log::warn!("cannot remove {}: {}", cache_path.display(), e);
                outcome.errors += 1;
            } else {
                outcome.removed_cache = true;
            }
        }
        return outcome;
    };

    let by_name: HashMap<PathKey, &Metadata> = files
        .iter()
        .map(|(name, metadata)| (PathKey::new(name), metadata))
        .collect();

    let mut kept = DirectoryCache::new();
    for (name, entry) in cache.iter() {
        let live = by_name.get(&PathKey::new(name)).is_some_and(|m| {
            entry.matches(
                i64::try_from(m.len()).unwrap_or(i64::MAX),
                metadata_ticks(m),
            )
        });
        if live && entry.digest != NULL_DIGEST {
            kept.insert_or_replace(name, entry.size, entry.mtime, entry.digest);
        }
    }

    let dropped = cache.len() - kept.len();
    if dropped == 0 {
        return outcome;
    }
    outcome.pruned_entries = dropped as u64;

    if kept.is_empty() {
        log::info!("removing empty cache {}", cache_path.display());
        if let Err(e) = std::fs::remove_file(&cache_path) {
            log::warn!("cannot remove {}: {}", cache_path.display(), e);
            outcome.errors += 1;
        } else {
            outcome.removed_cache = true;
        }
    } else {
        log::debug!(
            "pruning {} of {} entries from {}",
            dropped,
            cache.len(),
            cache_path.display()
        );
        if let Err(e) = kept.save(&cache_path) {
            log::warn!("cannot rewrite {}: {}", cache_path.display(), e);
            outcome.errors += 1;
        }
    }
    outcome
}

/// Prune caches below `root` and optionally remove emptied directories.
///
/// With `remove_empty_dirs`, a directory whose only remaining children
/// are ignorable files has those files deleted and is itself removed;
/// removal cascades bottom-up, but `root` always survives.
pub fn clean_tree(
    root: &Path,
    remove_empty_dirs: bool,
    cancel: Option<&CancelToken>,
) -> Result<CleanStats, ScanError> {
    let metadata = std::fs::symlink_metadata(root).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ScanError::NotFound(root.to_path_buf())
        } else {
            ScanError::Io {
                path: root.to_path_buf(),
                source: e,
            }
        }
    })?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut stats = CleanStats::default();
    clean_dir(root, true, remove_empty_dirs, cancel, &mut stats);
    log::info!(
        "cleaned {}: {} entries pruned, {} caches removed, {} dirs removed",
        root.display(),
        stats.pruned_entries,
        stats.removed_caches,
        stats.removed_dirs
    );
    Ok(stats)
}

/// Clean one directory. Returns `true` if the directory was removed.
fn clean_dir(
    dir: &Path,
    is_root: bool,
    remove_empty_dirs: bool,
    cancel: Option<&CancelToken>,
    stats: &mut CleanStats,
) -> bool {
    if cancel.is_some_and(CancelToken::is_cancelled) {
        log::debug!("clean cancelled before {}", dir.display());
        return false;
    }
    stats.dirs += 1;

    let reader = match std::fs::read_dir(dir) {
        Ok(r) => r,
        Err(e) => {
            log::warn!("cannot enumerate {}: {}", dir.display(), e);
            stats.errors += 1;
            return false;
        }
    };

    let mut subdirs = Vec::new();
    let mut files: Vec<(String, Metadata)> = Vec::new();
    let mut ignorable: Vec<String> = Vec::new();
    let mut other_children = 0u64;

    for entry in reader {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("error reading entry in {}: {}", dir.display(), e);
                stats.errors += 1;
                other_children += 1;
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                log::warn!("cannot stat {}: {}", entry.path().display(), e);
                stats.errors += 1;
                other_children += 1;
                continue;
            }
        };

        if file_type.is_symlink() {
            other_children += 1;
        } else if file_type.is_dir() {
            if is_ignored_folder(&name) {
                other_children += 1;
            } else {
                subdirs.push(entry.path());
            }
        } else if file_type.is_file() {
            if is_ignored_file(&name) {
                ignorable.push(name);
            } else {
                match entry.metadata() {
                    Ok(m) => files.push((name, m)),
                    Err(e) => {
                        log::warn!("cannot stat {}: {}", entry.path().display(), e);
                        stats.errors += 1;
                        other_children += 1;
                    }
                }
            }
        } else {
            other_children += 1;
        }
    }

    let mut kept_subdirs = 0u64;
    for sub in &subdirs {
        if !clean_dir(sub, false, remove_empty_dirs, cancel, stats) {
            kept_subdirs += 1;
        }
    }

    if cancel.is_some_and(CancelToken::is_cancelled) {
        return false;
    }

    let cache = DirectoryCache::load_for_dir(dir);
    let outcome = prune_directory_cache(dir, cache.as_ref(), &files);
    stats.pruned_entries += outcome.pruned_entries;
    stats.errors += outcome.errors;
    if outcome.removed_cache {
        stats.removed_caches += 1;
    }

    if !remove_empty_dirs || is_root {
        return false;
    }
    if !files.is_empty() || kept_subdirs > 0 || other_children > 0 {
        return false;
    }

    // Only ignorable junk remains; delete it and the directory itself.
    for name in &ignorable {
        let path = dir.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => stats.removed_files += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                log::warn!("cannot remove {}: {}", path.display(), e);
                stats.errors += 1;
                return false;
            }
        }
    }
    match std::fs::remove_dir(dir) {
        Ok(()) => {
            log::info!("removed empty directory {}", dir.display());
            stats.removed_dirs += 1;
            true
        }
        Err(e) => {
            log::warn!("cannot remove {}: {}", dir.display(), e);
            stats.errors += 1;
            false
        }
    }
}
