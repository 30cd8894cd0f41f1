//! Recursive directory walker with per-directory cache reconciliation.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory
//! tree and collecting file metadata into a [`FileInventory`]. Each
//! directory's `md5cache.bin` is loaded once while its files are
//! inventoried; entries whose recorded size and modification time still
//! match the file on disk seed the inventory with a known digest, so only
//! changed or new files need hashing later.
//!
//! # Features
//!
//! - Depth-first traversal, subdirectories before files
//! - Symlinks are never followed or inventoried
//! - Fixed ignore lists for junk files and system directories
//! - Clean mode prunes stale cache entries while walking
//! - Unreadable directories are logged and treated as empty
//! - Graceful cancellation between directories
//!
//! # Example
//!
//! ```no_run
//! use finddupes::scanner::Walker;
//! use std::path::Path;
//!
//! let (_inventory, stats) = Walker::new(Path::new("/data/photos")).walk()?;
//! println!("{} files in {} directories", stats.files, stats.dirs);
//! # Ok::<(), finddupes::scanner::ScanError>(())
//! ```

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::hardlink::{link_count, FileId};
use super::{is_ignored_file, is_ignored_folder, metadata_ticks, ScanError};
use crate::cache::{DirectoryCache, NULL_DIGEST};
use crate::inventory::path_key::cmp_ignore_case;
use crate::inventory::FileInventory;
use crate::progress::ProgressCallback;
use crate::signal::CancelToken;

/// Counters accumulated over one walk.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkStats {
    /// Directories entered.
    pub dirs: u64,
    /// Files inventoried.
    pub files: u64,
    /// Bytes across all inventoried files.
    pub bytes: u64,
    /// Files whose digest was adopted from a directory cache.
    pub cache_hits: u64,
    /// Directories or files skipped because of I/O errors.
    pub errors: u64,
    /// Cache entries dropped in clean mode.
    pub pruned_entries: u64,
    /// Cache files deleted in clean mode.
    pub removed_caches: u64,
}

/// Directory walker that builds a [`FileInventory`].
///
/// The walk is depth-first: all subdirectories of a directory are fully
/// processed before its files are inventoried. Directory caches are read
/// during the walk and, in clean mode, rewritten without stale entries.
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Prune directory caches while walking
    clean_mode: bool,
    /// Optional token for graceful termination
    cancel: Option<CancelToken>,
    /// Optional progress callback, notified per directory
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("clean_mode", &self.clean_mode)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given root directory.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            clean_mode: false,
            cancel: None,
            progress: None,
        }
    }

    /// Enable or disable cache pruning during the walk.
    #[must_use]
    pub fn with_clean_mode(mut self, clean: bool) -> Self {
        self.clean_mode = clean;
        self
    }

    /// Set the cancellation token for graceful termination.
    ///
    /// The token is polled between directories; a cancelled walk returns
    /// whatever was inventoried up to that point.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set the progress callback, notified after each directory's files
    /// are inventoried.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Walk the tree rooted at this walker's path.
    ///
    /// Fails only when the root itself is missing or not a directory;
    /// errors below the root are logged, counted in [`WalkStats::errors`],
    /// and the affected directory is treated as empty.
    pub fn walk(&self) -> Result<(FileInventory, WalkStats), ScanError> {
        let metadata = std::fs::symlink_metadata(&self.root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::NotFound(self.root.clone())
            } else {
                ScanError::Io {
                    path: self.root.clone(),
                    source: e,
                }
            }
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }

        let mut inventory = FileInventory::new();
        let mut stats = WalkStats::default();
        self.walk_dir(&self.root, &mut inventory, &mut stats);

        log::info!(
            "walked {}: {} files in {} dirs, {} cached digests, {} errors",
            self.root.display(),
            stats.files,
            stats.dirs,
            stats.cache_hits,
            stats.errors
        );
        Ok((inventory, stats))
    }

    fn walk_dir(&self, dir: &Path, inventory: &mut FileInventory, stats: &mut WalkStats) {
        if self.is_cancelled() {
            log::debug!("walk cancelled before {}", dir.display());
            return;
        }
        stats.dirs += 1;

        let reader = match std::fs::read_dir(dir) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("cannot enumerate {}: {}", dir.display(), e);
                stats.errors += 1;
                return;
            }
        };

        let mut subdirs: Vec<(String, PathBuf)> = Vec::new();
        let mut files: Vec<(String, Metadata)> = Vec::new();

        for entry in reader {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("error reading entry in {}: {}", dir.display(), e);
                    stats.errors += 1;
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("cannot stat {}: {}", entry.path().display(), e);
                    stats.errors += 1;
                    continue;
                }
            };

            if file_type.is_symlink() {
                log::trace!("skipping symlink: {}", entry.path().display());
                continue;
            }
            if file_type.is_dir() {
                if is_ignored_folder(&name) {
                    log::trace!("ignoring directory: {}", entry.path().display());
                    continue;
                }
                subdirs.push((name, entry.path()));
            } else if file_type.is_file() {
                if is_ignored_file(&name) {
                    log::trace!("ignoring file: {}", entry.path().display());
                    continue;
                }
                match entry.metadata() {
                    Ok(m) => files.push((name, m)),
                    Err(e) => {
                        log::warn!("cannot stat {}: {}", entry.path().display(), e);
                        stats.errors += 1;
                    }
                }
            }
        }

        // Deterministic order regardless of readdir ordering.
        subdirs.sort_by(|a, b| cmp_ignore_case(&a.0, &b.0).then_with(|| a.0.cmp(&b.0)));
        files.sort_by(|a, b| cmp_ignore_case(&a.0, &b.0).then_with(|| a.0.cmp(&b.0)));

        for (_, path) in &subdirs {
            self.walk_dir(path, inventory, stats);
        }

        if self.is_cancelled() {
            log::debug!("walk cancelled before files of {}", dir.display());
            return;
        }

        let cache = DirectoryCache::load_for_dir(dir);
        let dir_text = dir.to_string_lossy();
        let dir_offset = inventory.intern(&dir_text);

        for (name, metadata) in &files {
            stats.files += 1;
            let size = i64::try_from(metadata.len()).unwrap_or(i64::MAX);
            let mtime = metadata_ticks(metadata);
            let full = dir.join(name);
            let sub_path = full
                .strip_prefix(&self.root)
                .unwrap_or(full.as_path())
                .to_string_lossy()
                .into_owned();

            let idx = inventory.add_file(
                dir_offset,
                name,
                &sub_path,
                size,
                mtime,
                link_count(metadata),
                FileId::from_metadata(metadata),
            );
            stats.bytes += metadata.len();

            if let Some(cache) = &cache {
                if let Some(entry) = cache.lookup(name) {
                    if entry.matches(size, mtime) && entry.digest != NULL_DIGEST {
                        inventory.set_hashed(idx, entry.digest);
                        stats.cache_hits += 1;
                    }
                }
            }
        }

        if let Some(progress) = &self.progress {
            progress.on_progress(stats.files, stats.bytes, &dir_text);
        }

        if self.clean_mode {
            let outcome = super::cleaner::prune_directory_cache(dir, cache.as_ref(), &files);
            stats.pruned_entries += outcome.pruned_entries;
            stats.errors += outcome.errors;
            if outcome.removed_cache {
                stats.removed_caches += 1;
            }
        }
    }
}
