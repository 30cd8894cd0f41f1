//! End-to-end duplicate discovery pipeline.
//!
//! [`DupeFinder`] drives the three phases behind every command that looks
//! for duplicates: walk the requested roots into an inventory, bring
//! content digests up to date through the per-directory caches, and
//! resolve groups from the result.
//!
//! Cancellation is polled between phases. A run cancelled while walking
//! fails with [`FinderError::Interrupted`] since the inventory is
//! incomplete; a run cancelled while hashing still resolves groups over
//! the digests that finished and flags the summary instead, because
//! files without a digest never match anything and the groups that do
//! come out are sound.
//!
//! # Example
//!
//! ```no_run
//! use finddupes::duplicates::DupeFinder;
//! use std::path::PathBuf;
//!
//! let summary = DupeFinder::new().scan(&[PathBuf::from("/data/photos")])?;
//! for group in &summary.groups {
//!     println!("{} files of {} bytes", group.len(), group.size);
//! }
//! # Ok::<(), finddupes::duplicates::FinderError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::duplicates::groups::{self, DuplicateGroup, GroupTotals};
use crate::inventory::{FileInventory, InventoryError};
use crate::progress::{NullProgress, ProgressCallback};
use crate::scanner::{HashScheduler, HashStats, ScanError, Walker, DEFAULT_THREAD_LIMIT};
use crate::signal::CancelToken;

static NULL_PROGRESS: NullProgress = NullProgress;

/// Errors from a finder run.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// Cancelled while the inventory was still being built.
    #[error("Scan interrupted by user")]
    Interrupted,

    /// A walk failed outright, typically a bad or missing root.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Two walked sets turned out to share a file.
    #[error("Overlapping scan sets: {0}")]
    Inventory(#[from] InventoryError),
}

/// What a finder run saw and produced.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Files inventoried across every root.
    pub files_scanned: u64,
    /// Combined size of those files in bytes.
    pub bytes_scanned: u64,
    /// Digests adopted from directory caches during the walk.
    pub cache_hits: u64,
    /// Directories or files skipped because of I/O errors.
    pub walk_errors: u64,
    /// Counters from the hashing phase.
    pub hash_stats: HashStats,
    /// Resolved duplicate groups.
    pub groups: Vec<DuplicateGroup>,
    /// Accounting across `groups`.
    pub totals: GroupTotals,
    /// Wall-clock spent walking.
    pub walk_duration: Duration,
    /// Wall-clock spent hashing.
    pub hash_duration: Duration,
    /// Wall-clock spent resolving groups.
    pub resolve_duration: Duration,
    /// Whether hashing was cut short, making `groups` a sound subset.
    pub interrupted: bool,
}

/// Orchestrates walking, hashing and group resolution.
///
/// Configured through builder methods, then driven by [`scan`](Self::scan),
/// [`scan_against`](Self::scan_against) or [`hash_all`](Self::hash_all).
#[derive(Clone)]
pub struct DupeFinder {
    thread_limit: u32,
    force_all: bool,
    sort_on_size: bool,
    reverse_order: bool,
    clean_caches: bool,
    cancel: Option<CancelToken>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DupeFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DupeFinder")
            .field("thread_limit", &self.thread_limit)
            .field("force_all", &self.force_all)
            .field("sort_on_size", &self.sort_on_size)
            .field("reverse_order", &self.reverse_order)
            .field("clean_caches", &self.clean_caches)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for DupeFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl DupeFinder {
    /// Create a finder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            thread_limit: DEFAULT_THREAD_LIMIT,
            force_all: false,
            sort_on_size: false,
            reverse_order: false,
            clean_caches: false,
            cancel: None,
            progress: None,
        }
    }

    /// Cap the number of hashing workers.
    #[must_use]
    pub fn with_thread_limit(mut self, limit: u32) -> Self {
        self.thread_limit = limit;
        self
    }

    /// Hash every unhashed file instead of only potential duplicates.
    #[must_use]
    pub fn with_force_all(mut self, force_all: bool) -> Self {
        self.force_all = force_all;
        self
    }

    /// Hash strictly by size, one bucket per file.
    #[must_use]
    pub fn with_sort_on_size(mut self, sort_on_size: bool) -> Self {
        self.sort_on_size = sort_on_size;
        self
    }

    /// Hash smallest buckets first.
    #[must_use]
    pub fn with_reverse_order(mut self, reverse: bool) -> Self {
        self.reverse_order = reverse;
        self
    }

    /// Prune stale directory-cache entries while walking.
    #[must_use]
    pub fn with_clean_caches(mut self, clean: bool) -> Self {
        self.clean_caches = clean;
        self
    }

    /// Set the cancellation token polled throughout the run.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set the progress callback for walk and hash reporting.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn progress_callback(&self) -> &dyn ProgressCallback {
        self.progress.as_deref().unwrap_or(&NULL_PROGRESS)
    }

    /// Scan one or more roots for duplicate files.
    ///
    /// # Errors
    ///
    /// Fails when a root cannot be walked at all, when two roots overlap,
    /// or when the run is cancelled before the inventory is complete.
    pub fn scan(&self, roots: &[PathBuf]) -> Result<ScanSummary, FinderError> {
        let progress = self.progress_callback();
        let mut summary = ScanSummary::default();

        log::info!("Scanning {} root(s) for duplicates", roots.len());
        let mut inventory = self.walk_roots(roots, progress, &mut summary)?;
        self.hash_inventory(&mut inventory, self.force_all, progress, &mut summary);

        let resolve_started = Instant::now();
        summary.groups = groups::find_duplicates(&inventory);
        summary.totals = GroupTotals::tally(&summary.groups);
        summary.resolve_duration = resolve_started.elapsed();

        log::info!(
            "Scan complete: {} groups, {} duplicate files, {} reclaimable bytes",
            summary.totals.groups,
            summary.totals.duplicate_files,
            summary.totals.reclaimable_bytes
        );
        Ok(summary)
    }

    /// Report which files under `in_folder` already exist under the roots.
    ///
    /// Both sides are walked; files under `in_folder` are excluded from
    /// the base set, then everything is hashed in one pass so size runs
    /// span the two sets. Groups hold the incoming file first and the
    /// matching base files after it. Incoming files never match each
    /// other.
    ///
    /// # Errors
    ///
    /// Same conditions as [`scan`](Self::scan).
    pub fn scan_against(
        &self,
        roots: &[PathBuf],
        in_folder: &Path,
    ) -> Result<ScanSummary, FinderError> {
        let progress = self.progress_callback();
        let mut summary = ScanSummary::default();

        log::info!(
            "Checking {} against {} base root(s)",
            in_folder.display(),
            roots.len()
        );
        let mut base = self.walk_roots(roots, progress, &mut summary)?;
        let incoming_roots = [in_folder.to_path_buf()];
        let mut incoming = self.walk_roots(&incoming_roots, progress, &mut summary)?;

        let removed = base.remove_set_from_set(&incoming);
        if removed > 0 {
            log::debug!(
                "{removed} files under {} left the base set",
                in_folder.display()
            );
        }

        // One joint hashing pass; a lone incoming file and its lone base
        // twin still form a size run of two.
        let mut joint = FileInventory::new();
        joint.merge_from(&base)?;
        joint.merge_from(&incoming)?;
        self.hash_inventory(&mut joint, self.force_all, progress, &mut summary);
        base.apply_hash_from(&joint);
        incoming.apply_hash_from(&joint);
        incoming.sort_for_hashing();

        let resolve_started = Instant::now();
        summary.groups = groups::find_duplicates_against(&base, &incoming);
        summary.totals = GroupTotals::tally(&summary.groups);
        summary.resolve_duration = resolve_started.elapsed();

        log::info!(
            "{} of the incoming files already exist in the base set",
            summary.totals.groups
        );
        Ok(summary)
    }

    /// Bring every file's digest up to date without resolving groups.
    ///
    /// # Errors
    ///
    /// Same conditions as [`scan`](Self::scan).
    pub fn hash_all(&self, roots: &[PathBuf]) -> Result<ScanSummary, FinderError> {
        let progress = self.progress_callback();
        let mut summary = ScanSummary::default();

        log::info!("Updating digests under {} root(s)", roots.len());
        let mut inventory = self.walk_roots(roots, progress, &mut summary)?;
        self.hash_inventory(&mut inventory, true, progress, &mut summary);

        log::info!(
            "Hashed {} files ({} bytes), {} digests reused",
            summary.hash_stats.files_hashed,
            summary.hash_stats.bytes_hashed,
            summary.hash_stats.cache_reuses + summary.hash_stats.link_reuses
        );
        Ok(summary)
    }

    /// Walk every root into one inventory, accumulating walk counters.
    fn walk_roots(
        &self,
        roots: &[PathBuf],
        progress: &dyn ProgressCallback,
        summary: &mut ScanSummary,
    ) -> Result<FileInventory, FinderError> {
        let started = Instant::now();
        progress.on_phase_start("walking", 0, 0);

        let mut merged = FileInventory::new();
        for root in roots {
            let mut walker = Walker::new(root).with_clean_mode(self.clean_caches);
            if let Some(token) = &self.cancel {
                walker = walker.with_cancel_token(token.clone());
            }
            if let Some(callback) = &self.progress {
                walker = walker.with_progress(callback.clone());
            }
            let (inventory, stats) = walker.walk()?;
            summary.files_scanned += stats.files;
            summary.bytes_scanned += stats.bytes;
            summary.cache_hits += stats.cache_hits;
            summary.walk_errors += stats.errors;
            merged.merge_from(&inventory)?;
        }

        progress.on_phase_end("walking");
        summary.walk_duration += started.elapsed();

        if self.is_cancelled() {
            return Err(FinderError::Interrupted);
        }
        Ok(merged)
    }

    /// Run the hashing phase over `inventory`, folding its counters into
    /// the summary. Interruption is recorded, not raised; digests that
    /// completed are already persisted in their directory caches.
    fn hash_inventory(
        &self,
        inventory: &mut FileInventory,
        force_all: bool,
        progress: &dyn ProgressCallback,
        summary: &mut ScanSummary,
    ) {
        let started = Instant::now();
        let mut scheduler = HashScheduler::new()
            .with_thread_limit(self.thread_limit)
            .with_force_all(force_all)
            .with_sort_on_size(self.sort_on_size)
            .with_reverse_order(self.reverse_order);
        if let Some(token) = &self.cancel {
            scheduler = scheduler.with_cancel_token(token.clone());
        }

        summary.hash_stats = scheduler.update_hashes(inventory, progress);
        summary.hash_duration += started.elapsed();
        if summary.hash_stats.interrupted {
            summary.interrupted = true;
            log::warn!("Hashing interrupted; reporting completed work only");
        }
    }
}
