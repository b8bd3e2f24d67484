//! # leakcheck run state
//!
//! Explicit state machine for one harness run. The two-tier shutdown
//! (cooperative stop request, then forced kill) is expressed as states rather
//! than as error-handling order:
//!
//! ```text
//! Created -> Starting -> Running -> StopRequested -> Stopped ----> Classified
//!               |           |             |            |              ^
//!               |           |             +--------> ForceKilled -----+
//!               +-----------+-------------------------^
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Phase of a harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing launched yet
    Created,
    /// Subject launched, waiting for readiness
    Starting,
    /// Readiness observed
    Running,
    /// Graceful stop requested through the control channel
    StopRequested,
    /// Subject stopped on its own
    Stopped,
    /// Subject killed by the harness
    ForceKilled,
    /// Exit outcome collected and verdict assigned
    Classified,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Created => write!(f, "created"),
            RunState::Starting => write!(f, "starting"),
            RunState::Running => write!(f, "running"),
            RunState::StopRequested => write!(f, "stop_requested"),
            RunState::Stopped => write!(f, "stopped"),
            RunState::ForceKilled => write!(f, "force_killed"),
            RunState::Classified => write!(f, "classified"),
        }
    }
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Classified)
    }

    /// Whether a subject may still be alive in this state.
    pub fn subject_may_be_alive(&self) -> bool {
        matches!(
            self,
            RunState::Starting | RunState::Running | RunState::StopRequested
        )
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid run state transition for {run_id}: {from} -> {to}")]
pub struct InvalidTransition {
    pub run_id: String,
    pub from: RunState,
    pub to: RunState,
}

/// A state transition with timestamp and optional reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: RunState,
    pub to_state: RunState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// State machine tracking one harness run.
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    run_id: String,
    current_state: RunState,
    created_at: DateTime<Utc>,
    last_transition_time: DateTime<Utc>,
    history: Vec<StateTransition>,
}

impl RunStateMachine {
    pub fn new(run_id: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.to_string(),
            current_state: RunState::Created,
            created_at: now,
            last_transition_time: now,
            history: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn current_state(&self) -> RunState {
        self.current_state
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Check if `target` is reachable from the current state.
    pub fn is_valid_transition(&self, target: RunState) -> bool {
        use RunState::*;

        matches!(
            (self.current_state, target),
            (Created, Starting)
                | (Starting, Running)
                // Readiness timed out
                | (Starting, ForceKilled)
                // Subject died during startup
                | (Starting, Stopped)
                | (Running, StopRequested)
                | (Running, ForceKilled)
                | (StopRequested, Stopped)
                | (StopRequested, ForceKilled)
                // Port closed but the process never exited
                | (Stopped, ForceKilled)
                | (Stopped, Classified)
                | (ForceKilled, Classified)
        )
    }

    /// Transition to `target`, recording `reason` in the history.
    pub fn transition_to(
        &mut self,
        target: RunState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        if !self.is_valid_transition(target) {
            return Err(InvalidTransition {
                run_id: self.run_id.clone(),
                from: self.current_state,
                to: target,
            });
        }

        let now = Utc::now();
        self.history.push(StateTransition {
            from_state: self.current_state,
            to_state: target,
            timestamp: now,
            reason,
        });

        tracing::debug!(
            "Run {} transitioned from {} to {}",
            self.run_id,
            self.current_state,
            target
        );

        self.current_state = target;
        self.last_transition_time = now;
        Ok(())
    }

    pub fn transition_to_starting(&mut self) -> Result<(), InvalidTransition> {
        self.transition_to(RunState::Starting, Some("Subject launched".to_string()))
    }

    pub fn transition_to_running(&mut self) -> Result<(), InvalidTransition> {
        self.transition_to(RunState::Running, Some("Readiness observed".to_string()))
    }

    pub fn transition_to_stop_requested(&mut self) -> Result<(), InvalidTransition> {
        self.transition_to(
            RunState::StopRequested,
            Some("Graceful stop requested".to_string()),
        )
    }

    pub fn transition_to_stopped(&mut self, reason: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition_to(RunState::Stopped, Some(reason.into()))
    }

    pub fn transition_to_force_killed(&mut self, reason: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition_to(RunState::ForceKilled, Some(reason.into()))
    }

    pub fn transition_to_classified(&mut self, verdict: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition_to(RunState::Classified, Some(verdict.into()))
    }

    /// True once the subject was observed ready.
    pub fn readiness_observed(&self) -> bool {
        self.history.iter().any(|t| t.to_state == RunState::Running)
    }

    /// True if the subject stopped in response to the graceful stop request.
    pub fn graceful_stop_succeeded(&self) -> bool {
        self.history
            .iter()
            .any(|t| t.from_state == RunState::StopRequested && t.to_state == RunState::Stopped)
    }

    /// True if the harness had to kill the subject.
    pub fn was_force_killed(&self) -> bool {
        self.history.iter().any(|t| t.to_state == RunState::ForceKilled)
    }

    /// Time spent so far in `state`, summed over all visits.
    pub fn time_in(&self, state: RunState) -> chrono::Duration {
        let mut total = chrono::Duration::zero();
        let mut entered = if state == RunState::Created {
            Some(self.created_at)
        } else {
            None
        };

        for transition in &self.history {
            if let Some(since) = entered.take() {
                if transition.from_state == state {
                    total = total + (transition.timestamp - since);
                }
            }
            if transition.to_state == state {
                entered = Some(transition.timestamp);
            }
        }

        if let Some(since) = entered {
            if self.current_state == state {
                total = total + (Utc::now() - since);
            }
        }

        total
    }

    /// Time spent in the current state.
    pub fn time_in_current_state(&self) -> chrono::Duration {
        Utc::now() - self.last_transition_time
    }

    /// Total time since the run was created.
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}
