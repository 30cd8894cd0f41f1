//! Bucketed parallel hashing across a bounded worker pool.
//!
//! # Overview
//!
//! The scheduler decides which inventoried files actually need their
//! contents read, groups them into per-directory buckets, and dispatches
//! the buckets to a worker pool, largest first. Each worker owns its
//! bucket's directory cache for the duration of the bucket, so cache
//! files are never written from two threads at once.
//!
//! # Selection
//!
//! With the inventory sorted by size descending, only files that share
//! their exact size with a neighbor can possibly be duplicates; singleton
//! sizes are skipped without any I/O. A same-size run in which every
//! member is a hard link to one storage object needs no hashing either:
//! any digest already known for one member is propagated to the rest.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::hardlink::{all_share_identity, LinkIndex};
use super::hasher::digest_for_file;
use crate::cache::{DirectoryCache, CACHE_FILE_NAME};
use crate::inventory::path_key::PathKey;
use crate::inventory::FileInventory;
use crate::progress::ProgressCallback;
use crate::signal::CancelToken;

/// Worker pool size used when the caller does not pick one.
pub const DEFAULT_THREAD_LIMIT: u32 = 4;

/// A worker persists its directory cache when at least this much time has
/// passed since the last write and entries changed in between.
const CACHE_FLUSH_INTERVAL: Duration = Duration::from_secs(3);

/// Dispatcher sleep while the pool is at capacity.
const DISPATCH_POLL: Duration = Duration::from_millis(100);

/// Counters describing one hashing pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashStats {
    /// Files whose contents were actually streamed.
    pub files_hashed: u64,
    /// Bytes streamed while hashing.
    pub bytes_hashed: u64,
    /// Digests adopted from a hard-link sibling's directory cache.
    pub cache_reuses: u64,
    /// Digests propagated across fully hard-linked same-size runs.
    pub link_reuses: u64,
    /// Buckets processed to completion.
    pub buckets: u64,
    /// Whether the pass was cut short by cancellation.
    pub interrupted: bool,
}

/// Shared progress over one hashing pass.
///
/// Totals are fixed at dispatch; the counter block is updated by workers
/// under a mutex held only for the increment.
#[derive(Debug)]
pub struct HashProgress {
    /// Files selected for hashing.
    pub total_files: u64,
    /// Bytes across all selected files.
    pub total_bytes: u64,
    /// Buckets to process.
    pub total_buckets: u64,
    started: Instant,
    counters: Mutex<Counters>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    files_done: u64,
    bytes_done: u64,
    buckets_done: u64,
}

impl HashProgress {
    fn new(total_files: u64, total_bytes: u64, total_buckets: u64) -> Self {
        Self {
            total_files,
            total_bytes,
            total_buckets,
            started: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Current (files done, bytes done, buckets done).
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64) {
        let c = self.counters.lock().unwrap();
        (c.files_done, c.bytes_done, c.buckets_done)
    }

    /// Estimated time remaining, by bytes-processed ratio.
    ///
    /// `None` until at least one byte of progress exists.
    #[must_use]
    pub fn eta(&self) -> Option<Duration> {
        let bytes_done = self.counters.lock().unwrap().bytes_done;
        if bytes_done == 0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(bytes_done);
        let elapsed = self.started.elapsed();
        Some(elapsed.mul_f64(remaining as f64 / bytes_done as f64))
    }

    fn add_file(&self, bytes: u64) -> (u64, u64) {
        let mut c = self.counters.lock().unwrap();
        c.files_done += 1;
        c.bytes_done += bytes;
        (c.files_done, c.bytes_done)
    }

    fn add_bucket(&self) {
        self.counters.lock().unwrap().buckets_done += 1;
    }
}

/// One unit of hashing work: files of a single directory, or a single
/// file in sort-on-size mode.
#[derive(Debug)]
struct Bucket {
    dir: PathBuf,
    total_bytes: u64,
    indices: Vec<usize>,
}

/// Entry staged by a worker for the dispatcher to persist.
///
/// Used in sort-on-size mode, where buckets of one file would otherwise
/// let two workers write the same directory's cache.
#[derive(Debug)]
struct StagedEntry {
    dir: PathBuf,
    name: String,
    size: i64,
    mtime: u64,
    digest: [u8; 16],
}

#[derive(Debug, Default)]
struct WorkerReport {
    /// (record index, digest, reused from sibling cache)
    results: Vec<(usize, [u8; 16], bool)>,
    staged: Vec<StagedEntry>,
    files_hashed: u64,
    bytes_hashed: u64,
    interrupted: bool,
}

struct DirCacheState {
    cache: DirectoryCache,
    path: PathBuf,
    dirty: bool,
    last_flush: Instant,
}

/// Schedules and runs the hashing phase over an inventory.
///
/// ```no_run
/// use finddupes::progress::NullProgress;
/// use finddupes::scanner::{HashScheduler, Walker};
/// use std::path::Path;
///
/// let (mut inventory, _) = Walker::new(Path::new("/data")).walk()?;
/// let stats = HashScheduler::new()
///     .with_thread_limit(8)
///     .update_hashes(&mut inventory, &NullProgress);
/// println!("hashed {} files", stats.files_hashed);
/// # Ok::<(), finddupes::scanner::ScanError>(())
/// ```
#[derive(Debug, Clone)]
pub struct HashScheduler {
    thread_limit: u32,
    force_all: bool,
    sort_on_size: bool,
    reverse_order: bool,
    cancel: Option<CancelToken>,
}

impl Default for HashScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl HashScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            thread_limit: DEFAULT_THREAD_LIMIT,
            force_all: false,
            sort_on_size: false,
            reverse_order: false,
            cancel: None,
        }
    }

    /// Cap the worker pool; the effective size never exceeds the
    /// machine's available parallelism and is at least 1.
    #[must_use]
    pub fn with_thread_limit(mut self, limit: u32) -> Self {
        self.thread_limit = limit;
        self
    }

    /// Hash every unhashed file, ignoring the size-neighbor heuristic.
    #[must_use]
    pub fn with_force_all(mut self, force_all: bool) -> Self {
        self.force_all = force_all;
        self
    }

    /// One bucket per file, processed in strict size order.
    #[must_use]
    pub fn with_sort_on_size(mut self, sort_on_size: bool) -> Self {
        self.sort_on_size = sort_on_size;
        self
    }

    /// Dispatch the smallest buckets first instead of the largest.
    #[must_use]
    pub fn with_reverse_order(mut self, reverse: bool) -> Self {
        self.reverse_order = reverse;
        self
    }

    /// Set the cancellation token polled before each bucket and file.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Fill in missing digests across `inventory`.
    ///
    /// Sorts the inventory by (size descending, path ascending), selects
    /// the files whose digest can matter for duplicate detection, and
    /// hashes them on a bounded worker pool, updating each file's
    /// directory cache as it goes. On return the inventory retains the
    /// sorted order relied on by duplicate resolution.
    pub fn update_hashes(
        &self,
        inventory: &mut FileInventory,
        progress: &dyn ProgressCallback,
    ) -> HashStats {
        let mut stats = HashStats::default();

        inventory.sort_for_hashing();
        let (selected, propagated) = self.select(inventory);
        for &(idx, digest) in &propagated {
            inventory.set_hashed(idx, digest);
        }
        stats.link_reuses = propagated.len() as u64;

        if selected.is_empty() {
            log::debug!("no files need hashing");
            stats.interrupted = self.is_cancelled();
            return stats;
        }

        let links = LinkIndex::build(inventory);
        let buckets = self.make_buckets(inventory, &selected);
        let total_bytes: u64 = buckets.iter().map(|b| b.total_bytes).sum();
        let hash_progress = HashProgress::new(
            selected.len() as u64,
            total_bytes,
            buckets.len() as u64,
        );

        log::info!(
            "hashing {} files ({} bytes) in {} buckets",
            selected.len(),
            total_bytes,
            buckets.len()
        );
        progress.on_phase_start("hashing", hash_progress.total_files, total_bytes);

        let reports = self.dispatch(inventory, &links, &buckets, &hash_progress, progress);

        for report in &reports {
            for &(idx, digest, reused) in &report.results {
                inventory.set_hashed(idx, digest);
                if reused {
                    stats.cache_reuses += 1;
                }
            }
            stats.files_hashed += report.files_hashed;
            stats.bytes_hashed += report.bytes_hashed;
            if report.interrupted {
                stats.interrupted = true;
            }
        }
        stats.buckets = reports.iter().filter(|r| !r.interrupted).count() as u64;
        stats.interrupted |= self.is_cancelled();

        progress.on_phase_end("hashing");
        log::info!(
            "hashed {} files ({} bytes), {} sibling-cache reuses, {} link propagations",
            stats.files_hashed,
            stats.bytes_hashed,
            stats.cache_reuses,
            stats.link_reuses
        );
        stats
    }

    /// Phase 1: pick the records whose digest is worth computing.
    ///
    /// Returns the selected record indices plus digest propagations for
    /// fully hard-linked runs.
    fn select(&self, inventory: &FileInventory) -> (Vec<usize>, Vec<(usize, [u8; 16])>) {
        let records = inventory.records();
        let mut selected = Vec::new();
        let mut propagated = Vec::new();

        let mut at = 0;
        while at < records.len() {
            let size = records[at].size;
            let mut end = at + 1;
            while end < records.len() && records[end].size == size {
                end += 1;
            }
            let run = &records[at..end];

            if size > 0 {
                if self.force_all {
                    selected.extend((at..end).filter(|&k| !records[k].hashed));
                } else if run.len() >= 2 {
                    if all_share_identity(run) {
                        // Hard links are identical by construction; hashing
                        // any of them would re-read the same bytes.
                        if let Some(digest) =
                            run.iter().find(|r| r.hashed).map(|r| r.digest)
                        {
                            propagated.extend(
                                (at..end).filter(|&k| !records[k].hashed).map(|k| (k, digest)),
                            );
                        }
                    } else {
                        selected.extend((at..end).filter(|&k| !records[k].hashed));
                    }
                }
            }
            at = end;
        }
        (selected, propagated)
    }

    /// Phases 2 and 3: bucket the selection and order by total bytes.
    fn make_buckets(&self, inventory: &FileInventory, selected: &[usize]) -> Vec<Bucket> {
        let records = inventory.records();
        let mut buckets: Vec<Bucket> = if self.sort_on_size {
            selected
                .iter()
                .map(|&idx| Bucket {
                    dir: PathBuf::from(inventory.dir_of(&records[idx])),
                    total_bytes: records[idx].size.max(0) as u64,
                    indices: vec![idx],
                })
                .collect()
        } else {
            let mut by_dir: HashMap<PathKey, Bucket> = HashMap::new();
            for &idx in selected {
                let dir = inventory.dir_of(&records[idx]);
                let bucket = by_dir.entry(PathKey::new(dir)).or_insert_with(|| Bucket {
                    dir: PathBuf::from(dir),
                    total_bytes: 0,
                    indices: Vec::new(),
                });
                bucket.total_bytes += records[idx].size.max(0) as u64;
                bucket.indices.push(idx);
            }
            by_dir.into_values().collect()
        };

        if self.reverse_order {
            buckets.sort_by(|a, b| {
                a.total_bytes
                    .cmp(&b.total_bytes)
                    .then_with(|| a.dir.cmp(&b.dir))
            });
        } else {
            buckets.sort_by(|a, b| {
                b.total_bytes
                    .cmp(&a.total_bytes)
                    .then_with(|| a.dir.cmp(&b.dir))
            });
        }
        buckets
    }

    /// Phase 4: run buckets on the pool, largest first.
    fn dispatch(
        &self,
        inventory: &FileInventory,
        links: &LinkIndex,
        buckets: &[Bucket],
        hash_progress: &HashProgress,
        progress: &dyn ProgressCallback,
    ) -> Vec<WorkerReport> {
        let pool_size = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
            .min(self.thread_limit as usize)
            .max(1);
        log::debug!("dispatching {} buckets on {} workers", buckets.len(), pool_size);

        let worker_owns_cache = !self.sort_on_size;
        let mut cache_states: HashMap<PathBuf, DirCacheState> = HashMap::new();
        let mut reports: Vec<WorkerReport> = Vec::new();

        std::thread::scope(|scope| {
            let mut active: Vec<std::thread::ScopedJoinHandle<'_, WorkerReport>> = Vec::new();
            let mut next = 0;

            while next < buckets.len() {
                if self.is_cancelled() {
                    log::info!("cancelled with {} buckets unclaimed", buckets.len() - next);
                    break;
                }

                let mut i = 0;
                while i < active.len() {
                    if active[i].is_finished() {
                        let report = active
                            .swap_remove(i)
                            .join()
                            .expect("hash worker panicked");
                        self.absorb_staged(&mut cache_states, &report);
                        reports.push(report);
                    } else {
                        i += 1;
                    }
                }

                if active.len() < pool_size {
                    let bucket = &buckets[next];
                    next += 1;
                    let cancel = self.cancel.clone();
                    active.push(scope.spawn(move || {
                        run_bucket(
                            bucket,
                            inventory,
                            links,
                            hash_progress,
                            progress,
                            cancel.as_ref(),
                            worker_owns_cache,
                        )
                    }));
                } else {
                    std::thread::sleep(DISPATCH_POLL);
                }
            }

            for handle in active {
                let report = handle.join().expect("hash worker panicked");
                self.absorb_staged(&mut cache_states, &report);
                reports.push(report);
            }
        });

        // Completed files persist even when the pass was interrupted.
        for state in cache_states.values_mut() {
            flush_cache(state);
        }
        reports
    }

    fn absorb_staged(&self, states: &mut HashMap<PathBuf, DirCacheState>, report: &WorkerReport) {
        for entry in &report.staged {
            let state = states.entry(entry.dir.clone()).or_insert_with(|| {
                let path = entry.dir.join(CACHE_FILE_NAME);
                DirCacheState {
                    cache: DirectoryCache::load(&path).unwrap_or_default(),
                    path,
                    dirty: false,
                    last_flush: Instant::now(),
                }
            });
            state
                .cache
                .insert_or_replace(&entry.name, entry.size, entry.mtime, entry.digest);
            state.dirty = true;
            if state.last_flush.elapsed() >= CACHE_FLUSH_INTERVAL {
                flush_cache(state);
            }
        }
    }
}

fn flush_cache(state: &mut DirCacheState) {
    if !state.dirty {
        return;
    }
    if let Err(e) = state.cache.save(&state.path) {
        log::warn!("cannot persist {}: {}", state.path.display(), e);
    }
    state.dirty = false;
    state.last_flush = Instant::now();
}

/// Hash every file of one bucket on the current thread.
fn run_bucket(
    bucket: &Bucket,
    inventory: &FileInventory,
    links: &LinkIndex,
    hash_progress: &HashProgress,
    progress: &dyn ProgressCallback,
    cancel: Option<&CancelToken>,
    owns_cache: bool,
) -> WorkerReport {
    let mut report = WorkerReport::default();
    let cache_path = bucket.dir.join(CACHE_FILE_NAME);
    let mut cache = if owns_cache {
        Some(DirectoryCache::load(&cache_path).unwrap_or_default())
    } else {
        None
    };
    let mut dirty = false;
    let mut last_flush = Instant::now();

    for &idx in &bucket.indices {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            report.interrupted = true;
            break;
        }

        let record = &inventory.records()[idx];
        let path = inventory.full_path(record);
        let siblings = links.sibling_paths(inventory, idx);

        match digest_for_file(&path, &siblings) {
            Ok((digest, reused)) => {
                report.results.push((idx, digest, reused));
                if !reused {
                    report.files_hashed += 1;
                    report.bytes_hashed += record.size.max(0) as u64;
                }

                let name = inventory.name_of(record);
                if let Some(cache) = cache.as_mut() {
                    cache.insert_or_replace(name, record.size, record.mtime, digest);
                    dirty = true;
                    if last_flush.elapsed() >= CACHE_FLUSH_INTERVAL {
                        if let Err(e) = cache.save(&cache_path) {
                            log::warn!("cannot persist {}: {}", cache_path.display(), e);
                        }
                        dirty = false;
                        last_flush = Instant::now();
                    }
                } else {
                    report.staged.push(StagedEntry {
                        dir: bucket.dir.clone(),
                        name: name.to_string(),
                        size: record.size,
                        mtime: record.mtime,
                        digest,
                    });
                }
            }
            Err(e) => {
                // Left unhashed; excluded from duplicate comparison this run.
                log::warn!("cannot hash {}: {}", path.display(), e);
            }
        }

        let (files_done, bytes_done) = hash_progress.add_file(record.size.max(0) as u64);
        progress.on_progress(files_done, bytes_done, &path.to_string_lossy());
    }

    if !report.interrupted {
        if let Some(cache) = cache.as_ref() {
            if dirty {
                if let Err(e) = cache.save(&cache_path) {
                    log::warn!("cannot persist {}: {}", cache_path.display(), e);
                }
            }
        }
        hash_progress.add_bucket();
    }
    report
}
