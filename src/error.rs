//! Exit codes and structured error output for the `pcapcache` binary.

use serde::Serialize;

/// Exit codes for the maintenance CLI.
///
/// - 0: Success
/// - 1: General error (unexpected failure, unreadable capture)
/// - 2: Not cached (`status` found no entries for the file)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotCached = 2,
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "PC000",
            Self::GeneralError => "PC001",
            Self::NotCached => "PC002",
            Self::Interrupted => "PC130",
        }
    }
}

/// Error returned by `run_app` when Ctrl+C interrupted a command.
#[derive(Debug, thiserror::Error)]
#[error("operation interrupted")]
pub struct Interrupted;

/// Structured error information for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "PC001")
    pub code: String,
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// Pick the exit code for an error returned by `run_app`.
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if err.downcast_ref::<Interrupted>().is_some() {
        ExitCode::Interrupted
    } else {
        ExitCode::GeneralError
    }
}
