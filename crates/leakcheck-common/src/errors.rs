//! Error types for launching and controlling the subject process.
//!
//! Launch failures are kept apart from control failures: a launch error means
//! there is no process to clean up, so the harness aborts the run right away.
//! Every other error happens while a subject is alive and is converted into
//! a cleanup-then-report path by the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for launching a subject.
pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

/// Failure to bring a subject process into existence.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Subject executable does not exist: {}", path.display())]
    ExecutableMissing { path: PathBuf },

    #[error("Subject executable is not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("Working directory does not exist: {}", path.display())]
    WorkingDirectoryMissing { path: PathBuf },

    #[error("Failed to spawn {}: {source}", path.display())]
    SpawnFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A subject is already running (PID: {pid})")]
    AlreadyRunning { pid: u32 },
}

impl LaunchError {
    pub fn executable_missing(path: impl Into<PathBuf>) -> Self {
        Self::ExecutableMissing { path: path.into() }
    }

    pub fn not_a_file(path: impl Into<PathBuf>) -> Self {
        Self::NotAFile { path: path.into() }
    }

    pub fn working_directory_missing(path: impl Into<PathBuf>) -> Self {
        Self::WorkingDirectoryMissing { path: path.into() }
    }

    pub fn spawn_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while a subject is (or was) running.
#[derive(Error, Debug, Clone)]
pub enum ProcessError {
    #[error("No subject process is running")]
    NotRunning,

    #[error("Failed to kill subject (PID: {pid}): {reason}")]
    KillFailed { pid: u32, reason: String },

    #[error("Failed to collect exit status of subject (PID: {pid}): {reason}")]
    WaitFailed { pid: u32, reason: String },

    #[error("Failed to signal subject (PID: {pid}): {reason}")]
    SignalFailed { pid: u32, reason: String },

    #[error("Operation not supported on this platform: {operation}")]
    Unsupported { operation: String },
}

impl ProcessError {
    pub fn kill_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::KillFailed {
            pid,
            reason: reason.into(),
        }
    }

    pub fn wait_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::WaitFailed {
            pid,
            reason: reason.into(),
        }
    }

    pub fn signal_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            pid,
            reason: reason.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}

/// Result type for process control operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;
