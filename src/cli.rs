//! Command-line interface, built on the clap derive API.
//!
//! Global options (verbosity, color) apply to every subcommand; each
//! operation carries its own flags.
//!
//! # Example
//!
//! ```bash
//! # Find duplicates under two roots
//! finddupes scan ~/photos /mnt/backup/photos
//!
//! # Machine-readable output for scripting
//! finddupes scan ~/photos --output json --pretty
//!
//! # Which files in the incoming folder already exist in the archive?
//! finddupes scan ~/archive --in-folder ~/incoming
//!
//! # Warm the caches overnight, largest files first
//! finddupes hash /mnt/nas --threads 8
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::scanner::DEFAULT_THREAD_LIMIT;

/// Find duplicate files with per-directory digest caches.
///
/// Scans one or more roots, reuses cached MD5 digests wherever a file's
/// size and modification time still match, hashes only what changed, and
/// reports groups of identical files as text or JSON.
#[derive(Debug, Parser)]
#[command(name = "finddupes")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available operations.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find duplicate files under one or more roots
    Scan(ScanArgs),
    /// Hash every file under the roots to warm the caches
    Hash(HashArgs),
    /// Share cached digests between two copies of a tree
    Sync(SyncArgs),
    /// Drop cache entries for vanished files, optionally removing
    /// emptied directories
    Clean(CleanArgs),
}

/// Arguments for the scan operation.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directories to scan
    #[arg(value_name = "ROOT", required = true)]
    pub roots: Vec<PathBuf>,

    /// Report only files in this folder that duplicate a file under the
    /// scanned roots
    #[arg(long, value_name = "DIR")]
    pub in_folder: Option<PathBuf>,

    /// Number of hashing threads
    #[arg(short, long, value_name = "N", default_value_t = DEFAULT_THREAD_LIMIT)]
    pub threads: u32,

    /// Hash every file, even ones without a same-size neighbor
    #[arg(long)]
    pub force_all: bool,

    /// Hash strictly in size order, one file per bucket
    #[arg(long)]
    pub sort_on_size: bool,

    /// Hash smallest buckets first
    #[arg(long)]
    pub reverse: bool,

    /// Drop cache entries for files that no longer exist
    #[arg(long)]
    pub clean: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the hash operation.
#[derive(Debug, Args)]
pub struct HashArgs {
    /// Directories to hash
    #[arg(value_name = "ROOT", required = true)]
    pub roots: Vec<PathBuf>,

    /// Number of hashing threads
    #[arg(short, long, value_name = "N", default_value_t = DEFAULT_THREAD_LIMIT)]
    pub threads: u32,

    /// Hash strictly in size order, one file per bucket
    #[arg(long)]
    pub sort_on_size: bool,

    /// Hash smallest buckets first
    #[arg(long)]
    pub reverse: bool,
}

/// Arguments for the sync operation.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// First tree
    #[arg(value_name = "LEFT")]
    pub left: PathBuf,

    /// Second tree
    #[arg(value_name = "RIGHT")]
    pub right: PathBuf,
}

/// Arguments for the clean operation.
#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Directories to clean
    #[arg(value_name = "ROOT", required = true)]
    pub roots: Vec<PathBuf>,

    /// Delete directories left holding only ignorable files
    #[arg(long)]
    pub remove_empty_dirs: bool,
}

/// Report format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
