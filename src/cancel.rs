//! Cooperative cancellation for cache operations.
//!
//! Every asynchronous cache operation accepts a [`CancelFlag`]. The flag wraps
//! an `Arc<AtomicBool>` that callers share with whoever may abort the work:
//! the host pipeline when the user closes a capture, or the Ctrl+C handler
//! installed by the maintenance CLI.
//!
//! Cancellation is observed at two points:
//!
//! - before an operation touches the store, where it turns the call into a
//!   miss or a no-op;
//! - right before a write transaction commits, where it rolls the
//!   transaction back so the store looks as if the write never happened.
//!
//! # Usage
//!
//! ```rust
//! use pcapcache::cancel::CancelFlag;
//!
//! let cancel = CancelFlag::new();
//! let for_worker = cancel.clone();
//!
//! cancel.cancel();
//! assert!(for_worker.is_cancelled());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code for SIGINT (Ctrl+C) interruption.
/// This follows Unix convention: 128 + signal number (SIGINT = 2).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared cancellation signal.
///
/// Clones share the same underlying flag, so cancelling any clone is seen
/// by all of them.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Create a flag that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing atomic flag, e.g. one owned by the host pipeline.
    #[must_use]
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the same handle can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// The raw shared flag.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_FLAG: OnceLock<CancelFlag> = OnceLock::new();

/// Install a Ctrl+C handler that cancels the returned flag.
///
/// Only one process-wide handler can exist. Repeated calls (tests running
/// `run_app` in parallel) get the already-installed flag back, reset to
/// "not cancelled". If another component registered its own handler first,
/// an unhooked flag is returned; it still works for manual cancellation.
pub fn install_handler() -> Result<CancelFlag, SignalError> {
    if let Some(flag) = GLOBAL_FLAG.get() {
        flag.reset();
        return Ok(flag.clone());
    }

    let cancel = CancelFlag::new();
    let flag = cancel.get_flag();

    match ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);

        let _ = writeln!(std::io::stderr(), "\nInterrupted. Rolling back...");
        let _ = std::io::stderr().flush();

        log::info!("Cancellation signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_FLAG.set(cancel.clone());
            Ok(cancel)
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered, using unhooked cancel flag");
            let fallback = GLOBAL_FLAG.get_or_init(CancelFlag::new);
            fallback.reset();
            Ok(fallback.clone())
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}
