use crate::verdict::ExpectedExitCodes;
use leakcheck_common::{Endpoint, ExitCode, LaunchError, ProcessError};
use leakcheck_run_state::InvalidTransition;
use std::time::Duration;
use thiserror::Error;

/// Failures of a harness run.
///
/// Only [`HarnessError::Launch`] aborts a run; the others are collected in
/// the run report while shutdown and cleanup proceed.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("Subject at {endpoint} not ready within {timeout:?}")]
    StartupTimeout { endpoint: Endpoint, timeout: Duration },

    #[error("Functional probe failed: {reason}")]
    ProbeFailure { reason: String },

    #[error("Subject did not shut down within {timeout:?} and was force killed")]
    ShutdownTimeout { timeout: Duration },

    #[error("Subject exited with {exit_code}, expected one of {expected}")]
    UnexpectedExitCode {
        exit_code: ExitCode,
        expected: ExpectedExitCodes,
    },

    #[error("Subject crashed: {exit_code}")]
    Crashed { exit_code: ExitCode },

    #[error("Process control failed: {0}")]
    Process(#[from] ProcessError),

    #[error(transparent)]
    State(#[from] InvalidTransition),
}

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
