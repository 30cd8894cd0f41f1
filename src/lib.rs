//! finddupes - duplicate file discovery with per-directory hash caches.
//!
//! Directory trees are walked into a [`inventory::FileInventory`],
//! brought up to date against each directory's `md5cache.bin` sidecar,
//! hashed in parallel where the cache cannot answer, and grouped by
//! size plus MD5 digest. The library exposes the building blocks; the
//! `finddupes` binary wires them to a CLI via [`run_app`].

use std::io::IsTerminal;
use std::sync::Arc;

pub mod cache;
pub mod cli;
pub mod duplicates;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod signal;
pub mod sync;

use cli::{CleanArgs, Cli, Commands, HashArgs, OutputFormat, ScanArgs, SyncArgs};
use duplicates::{DupeFinder, ScanSummary};
use error::ExitCode;
use progress::Progress;
use report::{JsonReport, TextReport};
use signal::CancelToken;

/// Run the requested operation and report how the process should exit.
///
/// Installs the Ctrl+C handler, dispatches on the subcommand, and maps
/// an interrupted run to [`ExitCode::Interrupted`]. Logging must already
/// be initialized.
///
/// # Errors
///
/// Returns an error when the operation fails outright: a root that
/// cannot be walked, overlapping scan sets, or a report that cannot be
/// written. Per-file problems never surface here; they are logged and
/// counted in the run's statistics.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let Cli {
        quiet,
        no_color,
        command,
        ..
    } = cli;
    let cancel = signal::install_handler()?;

    match command {
        Commands::Scan(args) => run_scan(&args, quiet, no_color, &cancel),
        Commands::Hash(args) => run_hash(&args, quiet, &cancel),
        Commands::Sync(args) => run_sync(&args, &cancel),
        Commands::Clean(args) => run_clean(&args, &cancel),
    }
}

fn run_scan(
    args: &ScanArgs,
    quiet: bool,
    no_color: bool,
    cancel: &CancelToken,
) -> anyhow::Result<ExitCode> {
    let finder = DupeFinder::new()
        .with_thread_limit(args.threads)
        .with_force_all(args.force_all)
        .with_sort_on_size(args.sort_on_size)
        .with_reverse_order(args.reverse)
        .with_clean_caches(args.clean)
        .with_cancel_token(cancel.clone())
        .with_progress(Arc::new(Progress::new(quiet)));

    let summary = match &args.in_folder {
        Some(folder) => finder.scan_against(&args.roots, folder)?,
        None => finder.scan(&args.roots)?,
    };

    write_report(&summary, args, no_color)?;

    // A hash-phase interruption still yields a sound partial report;
    // the exit code tells scripts the run was cut short.
    if summary.interrupted {
        return Ok(ExitCode::Interrupted);
    }
    Ok(ExitCode::Success)
}

fn write_report(summary: &ScanSummary, args: &ScanArgs, no_color: bool) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let color = !no_color && stdout.is_terminal();
    let mut out = stdout.lock();

    match args.output {
        OutputFormat::Json => JsonReport::new(summary).write_to(&mut out, args.pretty)?,
        OutputFormat::Text => TextReport::new(summary)
            .with_color(color)
            .write_to(&mut out)?,
    }
    Ok(())
}

fn run_hash(args: &HashArgs, quiet: bool, cancel: &CancelToken) -> anyhow::Result<ExitCode> {
    let finder = DupeFinder::new()
        .with_thread_limit(args.threads)
        .with_sort_on_size(args.sort_on_size)
        .with_reverse_order(args.reverse)
        .with_cancel_token(cancel.clone())
        .with_progress(Arc::new(Progress::new(quiet)));

    let summary = finder.hash_all(&args.roots)?;

    if summary.interrupted {
        return Ok(ExitCode::Interrupted);
    }
    Ok(ExitCode::Success)
}

fn run_sync(args: &SyncArgs, cancel: &CancelToken) -> anyhow::Result<ExitCode> {
    sync::sync_hashes(&args.left, &args.right, Some(cancel))?;

    if cancel.is_cancelled() {
        return Ok(ExitCode::Interrupted);
    }
    Ok(ExitCode::Success)
}

fn run_clean(args: &CleanArgs, cancel: &CancelToken) -> anyhow::Result<ExitCode> {
    for root in &args.roots {
        scanner::clean_tree(root, args.remove_empty_dirs, Some(cancel))?;
        if cancel.is_cancelled() {
            return Ok(ExitCode::Interrupted);
        }
    }
    Ok(ExitCode::Success)
}
