//! # leakcheck common
//!
//! Types shared by every leakcheck crate: the error taxonomy for launching
//! and controlling a subject process, and the small domain values that flow
//! between the supervisor, the monitors and the verdict classifier.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{LaunchError, LaunchResult, ProcessError, ProcessResult};
pub use types::{
    Endpoint, ExitCode, ExitOutcome, TerminationCause, CLEAN_EXIT_CODE, LEAK_SENTINEL_EXIT_CODE,
};
