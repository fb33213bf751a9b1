use std::io;
use std::path::PathBuf;

use nix::sys::signal::Signal;
use thiserror::Error;

use crate::config::PathError;
use crate::pidfile::guard::GuardState;

/// Failures from acquiring or releasing a PID file. Every variant that touches
/// the file carries its resolved path and the PID of the calling process.
#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("Failed to resolve PID file path: {0}")]
    PathResolution(#[from] PathError),

    #[error("Unwilling to overwrite existing pidfile {path} (recorded PID: {existing}, my PID: {pid})")]
    AlreadyLocked {
        path: PathBuf,
        pid: u32,
        existing: String,
    },

    #[error("Permission denied: cannot {operation} pidfile {path} (my PID: {pid})")]
    PermissionDenied {
        path: PathBuf,
        pid: u32,
        operation: &'static str,
    },

    #[error("Can't unlink non-existent pidfile {path} (my PID: {pid})")]
    NotFound { path: PathBuf, pid: u32 },

    #[error("Unwilling to unlink pidfile {path} containing a different process ID (recorded PID: {recorded}, my PID: {pid})")]
    OwnershipMismatch {
        path: PathBuf,
        pid: u32,
        recorded: String,
    },

    #[error("Cannot {operation} pidfile {path} while guard is {state:?}")]
    InvalidState {
        path: PathBuf,
        state: GuardState,
        operation: &'static str,
    },

    #[error("Another guard already owns the process-wide hooks (active pidfile: {active})")]
    HooksInUse { path: PathBuf, active: PathBuf },

    #[error("Failed to register handler for {signal}: {source}")]
    SignalSetup { signal: Signal, source: io::Error },

    #[error("Failed to parse PID from {path}: {content:?}")]
    Parse { path: PathBuf, content: String },

    #[error("I/O error on pidfile {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl PidFileError {
    pub fn error_label(&self) -> &'static str {
        match self {
            PidFileError::PathResolution(_) => "path_resolution",
            PidFileError::AlreadyLocked { .. } => "already_locked",
            PidFileError::PermissionDenied { .. } => "permission_denied",
            PidFileError::NotFound { .. } => "not_found",
            PidFileError::OwnershipMismatch { .. } => "ownership_mismatch",
            PidFileError::InvalidState { .. } => "invalid_state",
            PidFileError::HooksInUse { .. } => "hooks_in_use",
            PidFileError::SignalSetup { .. } => "signal_setup",
            PidFileError::Parse { .. } => "parse",
            PidFileError::Io { .. } => "io",
        }
    }
}
