//! Domain values exchanged between the supervisor, monitors and classifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit code of a subject that shut down cleanly.
pub const CLEAN_EXIT_CODE: i32 = 0;

/// Reserved exit code: the subject's intentional-leak path ran and its leak
/// tracker fired. No other tool in the pipeline uses this value.
pub const LEAK_SENTINEL_EXIT_CODE: i32 = 123;

/// Network endpoint the subject listens on.
///
/// # Example
/// ```
/// use leakcheck_common::Endpoint;
///
/// let endpoint = Endpoint::new("127.0.0.1", 8002);
/// assert_eq!(endpoint.to_string(), "127.0.0.1:8002");
/// assert_eq!(endpoint.url("/"), "http://127.0.0.1:8002/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Builds an `http://` URL for `path` on this endpoint.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("http://{}{}", self, path)
        } else {
            format!("http://{}/{}", self, path)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // IPv6 literals need brackets in front of the port
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// How the subject's exit was reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitCode {
    /// The process returned an explicit exit code.
    Code(i32),
    /// The process was terminated without an exit code (Unix signal).
    Killed { signal: Option<i32> },
}

impl ExitCode {
    /// Returns the explicit exit code, if the OS reported one.
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitCode::Code(code) => Some(*code),
            ExitCode::Killed { .. } => None,
        }
    }

    pub fn is_killed(&self) -> bool {
        matches!(self, ExitCode::Killed { .. })
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Code(code) => write!(f, "{}", code),
            ExitCode::Killed { signal: Some(sig) } => write!(f, "killed (signal {})", sig),
            ExitCode::Killed { signal: None } => write!(f, "killed"),
        }
    }
}

/// Why the subject stopped running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationCause {
    /// The subject exited on its own (possibly after a graceful stop request).
    Natural,
    /// The harness sent a forced kill while the subject was alive.
    Forced,
    /// A forced kill was requested but the subject had already exited.
    AlreadyDead,
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationCause::Natural => write!(f, "natural"),
            TerminationCause::Forced => write!(f, "forced"),
            TerminationCause::AlreadyDead => write!(f, "already_dead"),
        }
    }
}

/// Terminal state of a subject process. Produced once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOutcome {
    pub exit_code: ExitCode,
    pub cause: TerminationCause,
}

impl ExitOutcome {
    pub fn new(exit_code: ExitCode, cause: TerminationCause) -> Self {
        Self { exit_code, cause }
    }

    /// True when the harness had to kill a live subject.
    pub fn was_forced(&self) -> bool {
        self.cause == TerminationCause::Forced
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit code {} ({})", self.exit_code, self.cause)
    }
}
