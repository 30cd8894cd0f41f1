//! Logging setup over the `log` facade and `env_logger`.
//!
//! The level comes from, in priority order: the `RUST_LOG` environment
//! variable, the `--quiet` flag (errors only), the `-v` count (debug,
//! then trace), and finally the info default.
//!
//! Debug builds log with timestamp, level, target and line; release
//! builds keep each line compact (level and message only).
//!
//! # Example
//!
//! ```rust,no_run
//! use finddupes::logging::init_logging;
//!
//! init_logging(0, false);
//! log::info!("scan starting");
//! ```

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Initialize logging. Call once, before the first log statement.
///
/// `verbose` is the `-v` count (0 info, 1 debug, 2 and up trace);
/// `quiet` drops everything below errors. A set `RUST_LOG` overrides
/// both flags.
///
/// # Panics
///
/// Panics when called a second time; `env_logger` installs a global
/// logger that cannot be replaced.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(level_for(verbose, quiet));
    }

    apply_format(&mut builder);
    builder.init();

    log::debug!("logging ready at {}", log::max_level());
}

fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(debug_assertions)]
fn apply_format(builder: &mut Builder) {
    builder.format(|buf, record| {
        let level_style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{} {level_style}{:<5}{level_style:#} [{}:{}] {}",
            buf.timestamp_seconds(),
            record.level(),
            record.target(),
            record.line().unwrap_or(0),
            record.args()
        )
    });
}

#[cfg(not(debug_assertions))]
fn apply_format(builder: &mut Builder) {
    builder.format(|buf, record| {
        let level_style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{level_style}{:<5}{level_style:#} {}",
            record.level(),
            record.args()
        )
    });
}
