//! Mapping from a run's exit outcome to a verdict.

use leakcheck_common::{ExitCode, ExitOutcome, LEAK_SENTINEL_EXIT_CODE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Final judgement of one harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    /// Exited with the leak sentinel, and the scenario expected it
    LeakDetected,
    /// Died from a signal the harness did not send
    Crashed,
    UnexpectedExitCode,
    StartupTimeout,
    ShutdownTimeout,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass | Verdict::LeakDetected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::LeakDetected => "leak_detected",
            Verdict::Crashed => "crashed",
            Verdict::UnexpectedExitCode => "unexpected_exit_code",
            Verdict::StartupTimeout => "startup_timeout",
            Verdict::ShutdownTimeout => "shutdown_timeout",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exit codes a scenario accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedExitCodes(BTreeSet<i32>);

impl ExpectedExitCodes {
    pub fn from_codes<I: IntoIterator<Item = i32>>(codes: I) -> Self {
        Self(codes.into_iter().collect())
    }

    pub fn contains(&self, code: i32) -> bool {
        self.0.contains(&code)
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for ExpectedExitCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<String> = self.0.iter().map(i32::to_string).collect();
        write!(f, "{{{}}}", codes.join(", "))
    }
}

/// What happened during the run, apart from the exit outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFacts {
    pub readiness_observed: bool,
    /// The harness killed the subject after a stop request went unanswered
    pub shutdown_escalated: bool,
}

/// Deterministic verdict mapping for one scenario.
#[derive(Debug, Clone)]
pub struct VerdictClassifier {
    expected: ExpectedExitCodes,
}

impl VerdictClassifier {
    pub fn new(expected: ExpectedExitCodes) -> Self {
        Self { expected }
    }

    pub fn expected(&self) -> &ExpectedExitCodes {
        &self.expected
    }

    pub fn classify(&self, outcome: &ExitOutcome, facts: &RunFacts) -> Verdict {
        if !facts.readiness_observed {
            return Verdict::StartupTimeout;
        }

        match outcome.exit_code {
            ExitCode::Code(code) if self.expected.contains(code) => {
                if code == LEAK_SENTINEL_EXIT_CODE {
                    Verdict::LeakDetected
                } else {
                    Verdict::Pass
                }
            }
            ExitCode::Code(_) => Verdict::UnexpectedExitCode,
            ExitCode::Killed { .. } if outcome.was_forced() && facts.shutdown_escalated => {
                Verdict::ShutdownTimeout
            }
            ExitCode::Killed { .. } => Verdict::Crashed,
        }
    }
}
