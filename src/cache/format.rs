//! Binary layout and load/save for one directory's cache.
//!
//! On disk:
//!
//! ```text
//! offset 0   header   { version: u64, entry_count: u64 }        16 bytes
//! offset 16  entries  entry_count x {
//!                size:        i64
//!                mtime:       u64
//!                digest:      [u8; 16]
//!                name_offset: u32
//!                reserved:    u32
//!            }                                                  40 bytes each
//! then       names    concatenated NUL-terminated UTF-8 strings
//! ```
//!
//! All integers little-endian. `name_offset` indexes into the names blob.
//!
//! Loading validates the version tag, that the declared entry region fits
//! the file, and that every name offset lands inside the blob on a valid
//! UTF-8 run. Any violation rejects the entire file; there is no partial
//! load. Saving is a single sequential overwrite with no temp-file dance; a
//! crash mid-write leaves a file the next load rejects.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{CACHE_FILE_NAME, CACHE_VERSION};
use crate::inventory::path_key::cmp_ignore_case;

const HEADER_LEN: usize = 16;
const ENTRY_LEN: usize = 40;

/// One persisted (size, mtime, digest, name) tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub size: i64,
    pub mtime: u64,
    pub digest: [u8; 16],
    /// Offset of this entry's name in the owning cache's names blob.
    name: u32,
}

impl CacheEntry {
    /// Whether this entry still describes a file with the given stat info.
    #[must_use]
    pub fn matches(&self, size: i64, mtime: u64) -> bool {
        self.size == size && self.mtime == mtime
    }
}

/// Errors from cache persistence. Corrupt files are not errors; they load
/// as absent.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading or writing the cache file failed.
    #[error("cache I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// In-memory form of one directory's cache.
#[derive(Debug, Default, Clone)]
pub struct DirectoryCache {
    entries: Vec<CacheEntry>,
    names: Vec<u8>,
}

impl DirectoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a cache file. Absent, unreadable, or invalid files all come
    /// back as `None`; invalid ones are logged, since they usually mean a
    /// crashed previous run.
    #[must_use]
    pub fn load(path: &Path) -> Option<DirectoryCache> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                log::debug!("cache {} unreadable: {err}", path.display());
                return None;
            }
        };
        let parsed = Self::parse(&bytes);
        if parsed.is_none() {
            log::warn!("cache {} is invalid, treating as absent", path.display());
        }
        parsed
    }

    /// Convenience: load the cache belonging to `dir`.
    #[must_use]
    pub fn load_for_dir(dir: &Path) -> Option<DirectoryCache> {
        Self::load(&dir.join(CACHE_FILE_NAME))
    }

    fn parse(bytes: &[u8]) -> Option<DirectoryCache> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        if read_u64(bytes, 0) != CACHE_VERSION {
            return None;
        }
        let count = usize::try_from(read_u64(bytes, 8)).ok()?;
        let names_start = HEADER_LEN.checked_add(count.checked_mul(ENTRY_LEN)?)?;
        if bytes.len() < names_start {
            return None;
        }
        let names = bytes[names_start..].to_vec();

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let at = HEADER_LEN + i * ENTRY_LEN;
            let mut digest = [0u8; 16];
            digest.copy_from_slice(&bytes[at + 16..at + 32]);
            let entry = CacheEntry {
                size: read_u64(bytes, at) as i64,
                mtime: read_u64(bytes, at + 8),
                digest,
                name: u32::from_le_bytes([
                    bytes[at + 32],
                    bytes[at + 33],
                    bytes[at + 34],
                    bytes[at + 35],
                ]),
            };
            // bytes at+36..at+40 are reserved padding
            let name_at = entry.name as usize;
            if name_at >= names.len() {
                return None;
            }
            let run = nul_run(&names, name_at);
            if std::str::from_utf8(run).is_err() {
                return None;
            }
            entries.push(entry);
        }

        Some(DirectoryCache { entries, names })
    }

    /// Write the cache as one sequential stream, replacing any existing
    /// file.
    ///
    /// # Errors
    ///
    /// [`CacheError::Io`] if the file cannot be created or written.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let io = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = fs::File::create(path).map_err(io)?;
        let mut out = BufWriter::new(file);

        out.write_all(&CACHE_VERSION.to_le_bytes()).map_err(io)?;
        out.write_all(&(self.entries.len() as u64).to_le_bytes())
            .map_err(io)?;
        for entry in &self.entries {
            out.write_all(&entry.size.to_le_bytes()).map_err(io)?;
            out.write_all(&entry.mtime.to_le_bytes()).map_err(io)?;
            out.write_all(&entry.digest).map_err(io)?;
            out.write_all(&entry.name.to_le_bytes()).map_err(io)?;
            out.write_all(&0u32.to_le_bytes()).map_err(io)?;
        }
        out.write_all(&self.names).map_err(io)?;
        out.flush().map_err(io)?;
        Ok(())
    }

    /// Name of an entry obtained from this cache.
    #[must_use]
    pub fn name_of(&self, entry: &CacheEntry) -> &str {
        let run = nul_run(&self.names, entry.name as usize);
        std::str::from_utf8(run).expect("names validated on load")
    }

    /// Find an entry by file name, ignoring case.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&CacheEntry> {
        self.entries
            .iter()
            .find(|e| cmp_ignore_case(self.name_of(e), name).is_eq())
    }

    /// Iterate entries with their names.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
        self.entries.iter().map(move |e| (self.name_of(e), e))
    }

    /// Replace the entry whose name matches ignoring case, or append a new
    /// one. The stored name keeps its original spelling on replace.
    pub fn insert_or_replace(&mut self, name: &str, size: i64, mtime: u64, digest: [u8; 16]) {
        if let Some(at) = self
            .entries
            .iter()
            .position(|e| cmp_ignore_case(self.name_of(e), name).is_eq())
        {
            let existing = self.entries[at].name;
            self.entries[at] = CacheEntry {
                size,
                mtime,
                digest,
                name: existing,
            };
            return;
        }

        debug_assert!(!name.as_bytes().contains(&0), "interior NUL in cache name");
        let at = self.names.len();
        assert!(
            at + name.len() + 1 <= u32::MAX as usize,
            "cache names blob exceeds u32 offset range"
        );
        self.names.extend_from_slice(name.as_bytes());
        self.names.push(0);
        self.entries.push(CacheEntry {
            size,
            mtime,
            digest,
            name: at as u32,
        });
    }
}

/// Point-update one file's entry in its directory's cache, creating the
/// cache if it does not exist yet.
///
/// # Errors
///
/// [`CacheError::Io`] if the rewritten cache cannot be saved.
pub fn update_entry(
    dir: &Path,
    name: &str,
    size: i64,
    mtime: u64,
    digest: [u8; 16],
) -> Result<(), CacheError> {
    let path = dir.join(CACHE_FILE_NAME);
    let mut cache = DirectoryCache::load(&path).unwrap_or_default();
    cache.insert_or_replace(name, size, mtime, digest);
    cache.save(&path)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn nul_run(blob: &[u8], at: usize) -> &[u8] {
    let run = &blob[at..];
    let end = run.iter().position(|&b| b == 0).unwrap_or(run.len());
    &run[..end]
}
