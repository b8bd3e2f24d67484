//! Subject process supervision.
//!
//! The supervisor owns at most one live [`ServiceProcess`]. It can launch the
//! subject, force-kill it, and collect its exit outcome. Children are spawned
//! with kill-on-drop, so dropping the supervisor never leaves a subject alive.

use crate::environment::Environment;
use crate::validation::{validate_executable, validate_working_directory};
use chrono::{DateTime, Utc};
use leakcheck_common::{
    ExitCode, ExitOutcome, LaunchError, LaunchResult, ProcessError, ProcessResult,
    TerminationCause,
};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Executable and arguments of the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// A launched subject.
#[derive(Debug)]
pub struct ServiceProcess {
    pid: u32,
    working_dir: PathBuf,
    environment: Environment,
    started_at: DateTime<Utc>,
    child: Child,
    /// Status observed by `try_wait` before exit collection
    exit_status: Option<ExitStatus>,
    kill_sent: bool,
    exited_before_kill: bool,
}

impl ServiceProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Environment the subject was launched with.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn poll_exit(&mut self) -> ProcessResult<Option<ExitStatus>> {
        if self.exit_status.is_some() {
            return Ok(self.exit_status);
        }
        let status = self
            .child
            .try_wait()
            .map_err(|e| ProcessError::wait_failed(self.pid, e.to_string()))?;
        self.exit_status = status;
        Ok(status)
    }

    fn cause(&self) -> TerminationCause {
        if self.exited_before_kill {
            TerminationCause::AlreadyDead
        } else if self.kill_sent {
            TerminationCause::Forced
        } else {
            TerminationCause::Natural
        }
    }
}

/// Launches and controls a single subject process.
#[derive(Debug)]
pub struct ProcessSupervisor {
    id: String,
    current: Option<ServiceProcess>,
}

impl ProcessSupervisor {
    /// Create a supervisor; `id` only labels log lines.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            current: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The subject currently owned, if any.
    pub fn current(&self) -> Option<&ServiceProcess> {
        self.current.as_ref()
    }

    pub fn pid(&self) -> Option<u32> {
        self.current.as_ref().map(|p| p.pid)
    }

    /// Whether the owned subject is still alive.
    pub fn is_running(&mut self) -> bool {
        match self.current.as_mut() {
            Some(process) => matches!(process.poll_exit(), Ok(None)),
            None => false,
        }
    }

    /// Spawn the subject.
    ///
    /// The environment is applied verbatim (the harness environment is not
    /// inherited), stdin is closed, and stdout/stderr are inherited so the
    /// subject's logs show up in the test output.
    pub fn start(
        &mut self,
        command: &LaunchSpec,
        working_dir: &Path,
        env: &Environment,
    ) -> LaunchResult<&ServiceProcess> {
        if let Some(mut existing) = self.current.take() {
            if matches!(existing.poll_exit(), Ok(None)) {
                let pid = existing.pid;
                self.current = Some(existing);
                return Err(LaunchError::AlreadyRunning { pid });
            }
            warn!(
                "Discarding exited subject {} (PID: {}) whose exit status was never collected",
                self.id, existing.pid
            );
        }

        validate_executable(&command.program)?;
        validate_working_directory(working_dir)?;

        info!(
            "Launching subject {}: {} {:?} (cwd: {})",
            self.id,
            command.program.display(),
            command.args,
            working_dir.display()
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(working_dir)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        // Keep console control events of the test runner away from the subject
        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LaunchError::executable_missing(&command.program)
            } else {
                LaunchError::spawn_failed(&command.program, e)
            }
        })?;

        let pid = child.id().unwrap_or(0);
        info!("Subject spawned successfully: {} (PID: {})", self.id, pid);

        Ok(&*self.current.insert(ServiceProcess {
            pid,
            working_dir: working_dir.to_path_buf(),
            environment: env.clone(),
            started_at: Utc::now(),
            child,
            exit_status: None,
            kill_sent: false,
            exited_before_kill: false,
        }))
    }

    /// Force-kill the subject.
    ///
    /// Idempotent: calling it with no subject, after a previous kill, or after
    /// the subject already exited is not an error.
    pub fn terminate(&mut self) -> ProcessResult<()> {
        let id = &self.id;
        let process = match self.current.as_mut() {
            Some(process) => process,
            None => {
                debug!("No subject to terminate for {}", id);
                return Ok(());
            }
        };

        if process.kill_sent || process.exited_before_kill {
            return Ok(());
        }

        if let Some(status) = process.poll_exit()? {
            info!(
                "Subject {} (PID: {}) had already exited ({}), nothing to kill",
                id, process.pid, status
            );
            process.exited_before_kill = true;
            return Ok(());
        }

        warn!("Force killing subject {} (PID: {})", id, process.pid);
        match process.child.start_kill() {
            Ok(()) => {
                process.kill_sent = true;
                Ok(())
            }
            // Raced with a natural exit
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
                process.exited_before_kill = true;
                Ok(())
            }
            Err(e) => Err(ProcessError::kill_failed(process.pid, e.to_string())),
        }
    }

    /// Block until the subject has terminated and return its outcome.
    ///
    /// Releases the process handle. This does not bound the wait itself;
    /// callers that need a bound request termination first or use
    /// [`wait_exit_timeout`](Self::wait_exit_timeout).
    pub async fn wait_exit(&mut self) -> ProcessResult<ExitOutcome> {
        let mut process = self.current.take().ok_or(ProcessError::NotRunning)?;

        let status = match process.exit_status {
            Some(status) => status,
            None => process
                .child
                .wait()
                .await
                .map_err(|e| ProcessError::wait_failed(process.pid, e.to_string()))?,
        };

        Ok(self.finish(process, status))
    }

    /// Wait at most `timeout` for the subject to exit.
    ///
    /// Returns `Ok(None)` if it is still running; the subject stays owned by
    /// the supervisor in that case.
    pub async fn wait_exit_timeout(&mut self, timeout: Duration) -> ProcessResult<Option<ExitOutcome>> {
        let process = self.current.as_mut().ok_or(ProcessError::NotRunning)?;

        let status = match process.exit_status {
            Some(status) => status,
            None => match tokio::time::timeout(timeout, process.child.wait()).await {
                Ok(result) => {
                    result.map_err(|e| ProcessError::wait_failed(process.pid, e.to_string()))?
                }
                Err(_) => {
                    debug!(
                        "Subject {} (PID: {}) still running after {:?}",
                        self.id, process.pid, timeout
                    );
                    return Ok(None);
                }
            },
        };

        match self.current.take() {
            Some(process) => Ok(Some(self.finish(process, status))),
            None => Err(ProcessError::NotRunning),
        }
    }

    fn finish(&self, process: ServiceProcess, status: ExitStatus) -> ExitOutcome {
        let outcome = ExitOutcome::new(exit_code_from_status(status), process.cause());
        let runtime = Utc::now() - process.started_at;
        info!(
            "Subject {} (PID: {}) terminated: {} after {}ms",
            self.id,
            process.pid,
            outcome,
            runtime.num_milliseconds()
        );
        outcome
    }
}

/// Map an OS exit status to an [`ExitCode`].
pub fn exit_code_from_status(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => ExitCode::Code(code),
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                ExitCode::Killed {
                    signal: status.signal(),
                }
            }
            #[cfg(not(unix))]
            {
                ExitCode::Killed { signal: None }
            }
        }
    }
}
