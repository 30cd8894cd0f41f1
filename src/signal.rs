//! Signal handling for graceful cancellation.
//!
//! This module provides centralized Ctrl+C handling. It uses an
//! `AtomicBool` flag shared across threads to signal that the current
//! operation should wind down: walkers stop descending, the hash
//! scheduler stops dispatching, and in-flight file reads run to
//! completion so caches stay consistent.
//!
//! # Usage
//!
//! ```rust,no_run
//! use finddupes::signal::install_handler;
//!
//! let cancel = install_handler().expect("Failed to install signal handler");
//!
//! if cancel.is_cancelled() {
//!     println!("Interrupted, winding down...");
//!     return;
//! }
//! // Pass `cancel.clone()` to Walker, HashScheduler, etc.
//! ```
//!
//! # Exit Codes
//!
//! When a signal is received the flag is set, "Interrupted. Cleaning up..."
//! is printed to stderr, and the application exits with code 130
//! (128 + SIGINT) once the current phase has wound down.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared cancellation token observed by all long-running phases.
///
/// Cloning is cheap and every clone observes the same flag. The token is
/// `Send` and `Sync`; workers poll it between units of work.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token with the flag initially cleared.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    ///
    /// Observed by every clone of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so the token can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_TOKEN: OnceLock<CancelToken> = OnceLock::new();

/// Install a Ctrl+C handler that sets the cancellation flag on interrupt.
///
/// Call once, early in startup, before long-running operations begin.
/// If a handler is already installed (e.g. in tests), the existing token
/// is reset and returned; if the process-wide handler slot is taken by
/// someone else, an unhooked token is returned so callers can still
/// cancel manually. Tests running in parallel can therefore all call
/// [`crate::run_app`] without conflicting over the signal handler.
pub fn install_handler() -> Result<CancelToken, SignalError> {
    if let Some(token) = GLOBAL_TOKEN.get() {
        token.reset();
        return Ok(token.clone());
    }

    let token = CancelToken::new();
    let flag = Arc::clone(&token.flag);

    match ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);

        // stderr may be mid-line with progress output.
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
        let _ = std::io::stderr().flush();

        log::info!("Cancellation signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_TOKEN.set(token.clone());
            Ok(token)
        }
        Err(_) => {
            if let Some(token) = GLOBAL_TOKEN.get() {
                token.reset();
                Ok(token.clone())
            } else {
                log::debug!("Ctrl+C handler already registered, using unhooked token");
                let fallback = CancelToken::new();
                let _ = GLOBAL_TOKEN.set(fallback.clone());
                Ok(fallback)
            }
        }
    }
}
