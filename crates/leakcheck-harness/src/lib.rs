//! # leakcheck harness
//!
//! Drives one leak-check run against a long-lived subject process:
//! - YAML configuration and validation
//! - Run orchestration (launch, readiness, probe, graceful stop, escalation)
//! - Verdict classification against the scenario's expected exit codes
//! - Working directory cleanup

pub mod cleanup;
pub mod config;
pub mod errors;
pub mod run;
pub mod verdict;

// Re-export main types
pub use cleanup::WorkspaceCleanup;
pub use config::{
    CleanupConfig, EndpointConfig, HarnessConfig, ProbeConfig, ReadinessConfig, ScenarioConfig,
    ScenarioPreset, ShutdownConfig, StopChannel, SubjectConfig,
};
pub use errors::{HarnessError, HarnessResult};
pub use run::{HarnessRun, RunReport};
pub use verdict::{ExpectedExitCodes, RunFacts, Verdict, VerdictClassifier};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
