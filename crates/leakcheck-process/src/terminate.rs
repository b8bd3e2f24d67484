//! Cooperative termination by PID.
//!
//! Forced kills go through the supervisor, which owns the child handle.
//! This module only covers the polite request used as a graceful stop
//! channel for subjects that have no control endpoint of their own.

use leakcheck_common::ProcessResult;

/// Ask the process to terminate (SIGTERM on Unix).
///
/// On Windows there is no equivalent that works without a shared console, so
/// the request is reported as unsupported and the caller escalates.
pub fn request_termination(pid: u32) -> ProcessResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let nix_pid = Pid::from_raw(pid as i32);
        kill(nix_pid, Signal::SIGTERM)
            .map_err(|e| leakcheck_common::ProcessError::signal_failed(pid, e.to_string()))
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        Err(leakcheck_common::ProcessError::unsupported(
            "graceful termination by signal",
        ))
    }
}
