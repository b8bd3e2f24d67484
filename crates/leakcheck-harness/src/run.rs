//! One end-to-end harness run.
//!
//! Phases are awaited strictly in order: launch, readiness, probe, graceful
//! stop, escalation, exit collection, classification, cleanup. Every phase
//! after a successful launch runs regardless of how earlier phases went; only
//! a launch failure returns `Err`.

use crate::cleanup::WorkspaceCleanup;
use crate::config::{HarnessConfig, StopChannel};
use crate::errors::{HarnessError, HarnessResult};
use crate::verdict::{RunFacts, Verdict, VerdictClassifier};
use chrono::Utc;
use leakcheck_common::{Endpoint, ExitOutcome, ProcessError, ProcessResult, TerminationCause};
use leakcheck_monitoring::{
    FunctionalProbe, HttpStopRequester, ProbeResult, ReadinessProber, ShutdownCoordinator,
    SignalStopRequester, StopRequester,
};
use leakcheck_process::{
    base_environment, compose_environment, Environment, LaunchSpec, LeakCheckFlags, Platform,
    ProcessSupervisor,
};
use leakcheck_run_state::{InvalidTransition, RunStateMachine, StateTransition};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Everything observed during a run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub verdict: Verdict,
    pub exit_outcome: Option<ExitOutcome>,
    /// Present only if the probe was sent
    pub probe: Option<ProbeResult>,
    pub readiness_observed: bool,
    /// The subject stopped and exited in response to the stop request
    pub graceful_stop: bool,
    pub history: Vec<StateTransition>,
    pub cleanup_ran: bool,
    /// In the order they occurred
    pub failures: Vec<HarnessError>,
    pub duration: Duration,
}

impl RunReport {
    /// True when the verdict passes and no phase recorded a failure.
    pub fn passed(&self) -> bool {
        self.verdict.is_pass() && self.failures.is_empty()
    }

    /// `Ok(self)` for a passing run, otherwise the first recorded failure.
    pub fn into_result(mut self) -> HarnessResult<RunReport> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(self.failures.remove(0))
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Run {}: {}", self.run_id, self.verdict)?;
        if let Some(ref outcome) = self.exit_outcome {
            write!(f, ", {}", outcome)?;
        }
        if let Some(ref probe) = self.probe {
            match probe.status {
                Some(status) => write!(f, ", probe status {}", status)?,
                None => write!(f, ", probe failed")?,
            }
        }
        write!(f, ", {}ms", self.duration.as_millis())
    }
}

/// Launches one subject and drives it through the whole run.
pub struct HarnessRun {
    run_id: String,
    config: HarnessConfig,
    base_env: Environment,
    platform: Platform,
}

impl HarnessRun {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            run_id: format!("leakcheck-{}", Utc::now().format("%Y%m%d-%H%M%S%.3f")),
            config,
            base_env: base_environment(),
            platform: Platform::current(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Replace the snapshot of the harness environment the subject's
    /// environment is derived from.
    pub fn with_base_environment(mut self, base_env: Environment) -> Self {
        self.base_env = base_env;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The environment the subject will be launched with.
    pub fn subject_environment(&self) -> Environment {
        compose_environment(&self.base_env, self.platform, &self.leak_check_flags())
    }

    fn leak_check_flags(&self) -> LeakCheckFlags {
        let sanitizer_library = match self.config.subject.sanitizer_path() {
            Some(path) if path.is_file() => Some(path),
            Some(path) => {
                debug!(
                    "Sanitizer library {} not found, running without preload",
                    path.display()
                );
                None
            }
            None => None,
        };

        LeakCheckFlags {
            memory_tracking: self.config.scenario.memory_tracking,
            intentional_leak: self.config.scenario.intentional_leak(),
            sanitizer_library,
            extra: self.config.subject.env.clone(),
        }
    }

    fn stop_requester(&self, pid: u32) -> Box<dyn StopRequester> {
        match self.config.shutdown.channel {
            StopChannel::Http { ref path, ref body } => {
                Box::new(HttpStopRequester::new(path.clone(), body.clone()))
            }
            StopChannel::Signal => Box::new(SignalStopRequester::new(pid)),
        }
    }

    /// Run the subject through all phases and report what happened.
    ///
    /// Returns `Err` only if the subject could not be launched.
    pub async fn execute(self) -> HarnessResult<RunReport> {
        let started = Instant::now();
        let config = &self.config;
        let endpoint = config.endpoint.to_endpoint();
        let working_dir = config.subject.working_dir();
        let launch = LaunchSpec::new(config.subject.executable_path(self.platform))
            .with_args(config.subject.args.iter().cloned());
        let env = self.subject_environment();
        let classifier = VerdictClassifier::new(config.scenario.expected_exit_codes());

        // Declared before the supervisor so it drops after the subject is killed
        let mut cleanup =
            WorkspaceCleanup::new(&working_dir, config.cleanup.remove_working_directory);
        let mut supervisor = ProcessSupervisor::new(&self.run_id);
        let mut state = RunStateMachine::new(&self.run_id);
        let mut failures: Vec<HarnessError> = Vec::new();

        info!(
            "Starting run {} against {} (expected exit codes {})",
            self.run_id,
            endpoint,
            classifier.expected()
        );

        let pid = supervisor.start(&launch, &working_dir, &env)?.pid();
        cleanup.arm();
        record_transition(state.transition_to_starting(), &mut failures);

        // Readiness
        let prober = ReadinessProber::new(config.readiness.check.clone())
            .with_poll_interval(config.readiness.poll_interval)
            .with_attempt_timeout(config.readiness.attempt_timeout);
        let ready = prober.wait_ready(&endpoint, config.readiness.timeout).await;

        let mut probe = None;
        let mut exit_outcome = None;
        let mut shutdown_escalated = false;
        let mut kill_reason: Option<&str> = None;

        if ready {
            record_transition(state.transition_to_running(), &mut failures);

            if config.probe.enabled {
                probe = Some(self.run_probe(&endpoint, &mut failures).await);
            }

            // Graceful stop
            record_transition(state.transition_to_stop_requested(), &mut failures);
            let coordinator = ShutdownCoordinator::new(self.stop_requester(pid))
                .with_poll_interval(config.shutdown.poll_interval)
                .with_send_timeout(config.shutdown.send_timeout);

            if coordinator
                .request_stop(&endpoint, config.shutdown.timeout)
                .await
            {
                record_transition(
                    state.transition_to_stopped("Port closed after stop request"),
                    &mut failures,
                );
                let waited = supervisor
                    .wait_exit_timeout(config.shutdown.exit_timeout)
                    .await;
                match settle_after_stop(waited, config.shutdown.exit_timeout, &mut failures) {
                    Ok(outcome) => exit_outcome = Some(outcome),
                    Err(reason) => {
                        shutdown_escalated = true;
                        kill_reason = Some(reason);
                    }
                }
            } else {
                failures.push(HarnessError::ShutdownTimeout {
                    timeout: config.shutdown.timeout,
                });
                shutdown_escalated = true;
                kill_reason = Some("Graceful stop timed out");
            }
        } else {
            failures.push(HarnessError::StartupTimeout {
                endpoint: endpoint.clone(),
                timeout: config.readiness.timeout,
            });
            if supervisor.is_running() {
                kill_reason = Some("Readiness timed out");
            } else {
                warn!("Subject exited before becoming ready");
                record_transition(
                    state.transition_to_stopped("Subject exited during startup"),
                    &mut failures,
                );
            }
        }

        // Escalation
        if let Some(reason) = kill_reason {
            if let Err(e) = supervisor.terminate() {
                error!("Failed to kill subject: {}", e);
                failures.push(e.into());
            }
            record_transition(state.transition_to_force_killed(reason), &mut failures);
        }

        if exit_outcome.is_none() && supervisor.current().is_some() {
            exit_outcome = self.collect_exit(&mut supervisor, pid, &mut failures).await;
        }

        // Classification
        let facts = RunFacts {
            readiness_observed: ready,
            shutdown_escalated,
        };
        let verdict = match exit_outcome {
            Some(ref outcome) => classifier.classify(outcome, &facts),
            None if !ready => Verdict::StartupTimeout,
            None => Verdict::Crashed,
        };

        if let Some(ref outcome) = exit_outcome {
            match verdict {
                Verdict::UnexpectedExitCode => failures.push(HarnessError::UnexpectedExitCode {
                    exit_code: outcome.exit_code,
                    expected: classifier.expected().clone(),
                }),
                Verdict::Crashed => failures.push(HarnessError::Crashed {
                    exit_code: outcome.exit_code,
                }),
                _ => {}
            }
        }

        record_transition(state.transition_to_classified(verdict.as_str()), &mut failures);

        // Cleanup
        cleanup.run();

        let graceful_stop = ready
            && !shutdown_escalated
            && exit_outcome
                .as_ref()
                .map_or(false, |o| o.cause == TerminationCause::Natural);

        let report = RunReport {
            run_id: self.run_id.clone(),
            verdict,
            exit_outcome,
            probe,
            readiness_observed: ready,
            graceful_stop,
            history: state.history().to_vec(),
            cleanup_ran: cleanup.ran(),
            failures,
            duration: started.elapsed(),
        };

        if report.passed() {
            info!("{}", report);
        } else {
            warn!("{}", report);
            for failure in &report.failures {
                warn!("  {}", failure);
            }
        }

        Ok(report)
    }

    async fn run_probe(
        &self,
        endpoint: &Endpoint,
        failures: &mut Vec<HarnessError>,
    ) -> ProbeResult {
        let result = FunctionalProbe::new(endpoint.clone())
            .check(&self.config.probe.to_request())
            .await;

        if !result.success {
            failures.push(HarnessError::ProbeFailure {
                reason: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "no response".to_string()),
            });
        }
        result
    }

    async fn collect_exit(
        &self,
        supervisor: &mut ProcessSupervisor,
        pid: u32,
        failures: &mut Vec<HarnessError>,
    ) -> Option<ExitOutcome> {
        let limit = self.config.shutdown.exit_timeout;
        match supervisor.wait_exit_timeout(limit).await {
            Ok(Some(outcome)) => Some(outcome),
            Ok(None) => {
                error!("Subject (PID: {}) still running {:?} after kill", pid, limit);
                failures.push(
                    ProcessError::wait_failed(pid, format!("still running after {:?}", limit))
                        .into(),
                );
                None
            }
            Err(e) => {
                error!("Failed to collect exit status: {}", e);
                failures.push(e.into());
                None
            }
        }
    }
}

/// Log a rejected state transition and keep the run going.
fn record_transition(
    result: Result<(), InvalidTransition>,
    failures: &mut Vec<HarnessError>,
) {
    if let Err(e) = result {
        error!("{}", e);
        failures.push(e.into());
    }
}

/// Outcome of the bounded exit wait after the subject closed its port.
///
/// `Err` carries the reason to kill the subject: it has not exited within
/// `exit_timeout`, or its status could not be collected.
fn settle_after_stop(
    waited: ProcessResult<Option<ExitOutcome>>,
    exit_timeout: Duration,
    failures: &mut Vec<HarnessError>,
) -> Result<ExitOutcome, &'static str> {
    match waited {
        Ok(Some(outcome)) => Ok(outcome),
        Ok(None) => {
            warn!(
                "Subject closed its port but did not exit within {:?}",
                exit_timeout
            );
            failures.push(HarnessError::ShutdownTimeout {
                timeout: exit_timeout,
            });
            Err("Subject did not exit after closing its port")
        }
        Err(e) => {
            error!("Failed to collect exit status: {}", e);
            failures.push(e.into());
            Err("Exit status could not be collected")
        }
    }
}
