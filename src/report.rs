//! Report writers for duplicate scan results.
//!
//! Two formats over the same [`ScanSummary`]: a human-readable text
//! report for the terminal and a machine-readable JSON document for
//! scripting. Neither touches the filesystem.
//!
//! # JSON Schema
//!
//! ```json
//! {
//!   "duplicates": [
//!     {
//!       "size": 2048,
//!       "digest": "abab...",
//!       "files": [
//!         { "path": "/data/a.bin", "links": 2, "link_group": "a" },
//!         { "path": "/data/b.bin", "links": 1, "link_group": null }
//!       ]
//!     }
//!   ],
//!   "summary": {
//!     "files_scanned": 100,
//!     "bytes_scanned": 1048576,
//!     "duplicate_groups": 1,
//!     "duplicate_files": 1,
//!     "reclaimable_bytes": 2048,
//!     "interrupted": false
//!   }
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use finddupes::duplicates::ScanSummary;
//! use finddupes::report::{JsonReport, TextReport};
//!
//! let summary = ScanSummary::default();
//!
//! let mut out = Vec::new();
//! TextReport::new(&summary).write_to(&mut out).unwrap();
//!
//! let json = JsonReport::new(&summary).to_json().unwrap();
//! assert!(json.starts_with('{'));
//! ```

use std::io::Write;

use bytesize::ByteSize;
use serde::Serialize;
use yansi::{Condition, Paint};

use crate::duplicates::{DuplicateGroup, ScanSummary};

/// Human-readable text report.
///
/// One stanza per duplicate group (size, digest, member paths with
/// hard-link tags), followed by scan totals. Coloring is off unless
/// enabled with [`TextReport::with_color`]; callers decide based on
/// whether the output is a terminal.
#[derive(Debug, Clone)]
pub struct TextReport<'a> {
    summary: &'a ScanSummary,
    color: bool,
}

impl<'a> TextReport<'a> {
    /// Create an uncolored text report over a scan summary.
    #[must_use]
    pub fn new(summary: &'a ScanSummary) -> Self {
        Self {
            summary,
            color: false,
        }
    }

    /// Enable or disable ANSI coloring.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Write the report to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let paint = self.paint_condition();
        let summary = self.summary;

        for (index, group) in summary.groups.iter().enumerate() {
            write_group_stanza(writer, index, group, paint)?;
            writeln!(writer)?;
        }

        if summary.groups.is_empty() {
            writeln!(writer, "{}", "No duplicates found.".green().whenever(paint))?;
        } else {
            let headline = format!(
                "{} groups, {} duplicate files, {} reclaimable",
                summary.totals.groups,
                summary.totals.duplicate_files,
                ByteSize::b(summary.totals.reclaimable_bytes)
            );
            writeln!(writer, "{}", headline.bold().whenever(paint))?;
        }

        let mut scanned = format!(
            "Scanned {} files ({}), {} cache hits, {} hashed",
            summary.files_scanned,
            ByteSize::b(summary.bytes_scanned),
            summary.cache_hits,
            summary.hash_stats.files_hashed
        );
        if summary.hash_stats.link_reuses > 0 {
            scanned.push_str(&format!(", {} link reuses", summary.hash_stats.link_reuses));
        }
        if summary.walk_errors > 0 {
            scanned.push_str(&format!(", {} errors", summary.walk_errors));
        }
        writeln!(writer, "{scanned}")?;

        writeln!(
            writer,
            "Walk {:?}, hash {:?}, resolve {:?}",
            summary.walk_duration, summary.hash_duration, summary.resolve_duration
        )?;

        if summary.interrupted {
            writeln!(
                writer,
                "{}",
                "Scan interrupted; results cover hashed files only."
                    .yellow()
                    .whenever(paint)
            )?;
        }

        Ok(())
    }

    fn paint_condition(&self) -> Condition {
        if self.color {
            Condition::ALWAYS
        } else {
            Condition::NEVER
        }
    }
}

fn write_group_stanza<W: Write>(
    writer: &mut W,
    index: usize,
    group: &DuplicateGroup,
    paint: Condition,
) -> std::io::Result<()> {
    let header = format!(
        "Group {}: {} files of {}, digest {}",
        index + 1,
        group.len(),
        ByteSize::b(u64::try_from(group.size).unwrap_or(0)),
        group.digest_hex()
    );
    writeln!(writer, "{}", header.bold().whenever(paint))?;

    for file in &group.files {
        match file.link_group {
            Some(tag) => writeln!(
                writer,
                "  {} {}",
                tag.cyan().whenever(paint),
                file.path.display()
            )?,
            None => writeln!(writer, "    {}", file.path.display())?,
        }
    }
    Ok(())
}

/// A group member in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroupFile {
    /// Full path as scanned.
    pub path: String,
    /// Directory-entry count of the underlying storage object.
    pub links: u64,
    /// Tag shared with other members that are hard links of this file.
    pub link_group: Option<char>,
}

/// A duplicate group in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroup {
    /// Size in bytes of every member.
    pub size: i64,
    /// Digest as a lowercase hex string (32 characters).
    pub digest: String,
    /// All member files.
    pub files: Vec<JsonGroupFile>,
}

impl JsonGroup {
    /// Convert a resolved group.
    #[must_use]
    pub fn from_group(group: &DuplicateGroup) -> Self {
        Self {
            size: group.size,
            digest: group.digest_hex(),
            files: group
                .files
                .iter()
                .map(|file| JsonGroupFile {
                    path: file.path.to_string_lossy().into_owned(),
                    links: file.links,
                    link_group: file.link_group,
                })
                .collect(),
        }
    }
}

/// Scan statistics in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Files inventoried across every root.
    pub files_scanned: u64,
    /// Combined size of those files in bytes.
    pub bytes_scanned: u64,
    /// Digests adopted from directory caches during the walk.
    pub cache_hits: u64,
    /// Files hashed by reading content this run.
    pub files_hashed: u64,
    /// Bytes read while hashing.
    pub bytes_hashed: u64,
    /// Digests propagated across hard links instead of rehashing.
    pub link_reuses: u64,
    /// Directories or files skipped because of I/O errors.
    pub walk_errors: u64,
    /// Duplicate groups found.
    pub duplicate_groups: u64,
    /// Files beyond the first copy of each group.
    pub duplicate_files: u64,
    /// Bytes held by those extra files.
    pub reclaimable_bytes: u64,
    /// Walking phase duration in milliseconds.
    pub walk_duration_ms: u64,
    /// Hashing phase duration in milliseconds.
    pub hash_duration_ms: u64,
    /// Group resolution duration in milliseconds.
    pub resolve_duration_ms: u64,
    /// Whether hashing was cut short.
    pub interrupted: bool,
}

impl JsonSummary {
    /// Convert a scan summary.
    #[must_use]
    pub fn from_summary(summary: &ScanSummary) -> Self {
        Self {
            files_scanned: summary.files_scanned,
            bytes_scanned: summary.bytes_scanned,
            cache_hits: summary.cache_hits,
            files_hashed: summary.hash_stats.files_hashed,
            bytes_hashed: summary.hash_stats.bytes_hashed,
            link_reuses: summary.hash_stats.link_reuses,
            walk_errors: summary.walk_errors,
            duplicate_groups: summary.totals.groups,
            duplicate_files: summary.totals.duplicate_files,
            reclaimable_bytes: summary.totals.reclaimable_bytes,
            walk_duration_ms: summary.walk_duration.as_millis() as u64,
            hash_duration_ms: summary.hash_duration.as_millis() as u64,
            resolve_duration_ms: summary.resolve_duration.as_millis() as u64,
            interrupted: summary.interrupted,
        }
    }
}

/// Complete JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    /// All duplicate groups in resolution order.
    pub duplicates: Vec<JsonGroup>,
    /// Scan statistics.
    pub summary: JsonSummary,
}

impl JsonReport {
    /// Build the report from a scan summary.
    #[must_use]
    pub fn new(summary: &ScanSummary) -> Self {
        Self {
            duplicates: summary.groups.iter().map(JsonGroup::from_group).collect(),
            summary: JsonSummary::from_summary(summary),
        }
    }

    /// Serialize to a compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to a pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), ReportError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors from report writing.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error while writing
    #[error("I/O error while writing report: {0}")]
    Io(#[from] std::io::Error),
}
