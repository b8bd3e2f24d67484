//! Custom assertions for E2E tests

use leakcheck_common::{ExitCode, TerminationCause};
use leakcheck_harness::{HarnessError, RunReport, Verdict};
use leakcheck_run_state::RunState;

/// Assert the run ended with `expected`
pub fn assert_verdict(report: &RunReport, expected: Verdict) -> Result<(), String> {
    if report.verdict == expected {
        Ok(())
    } else {
        Err(format!(
            "Expected verdict {}, got {}. Failures: {:?}",
            expected, report.verdict, report.failures
        ))
    }
}

/// Assert the run passed as a whole
pub fn assert_passed(report: &RunReport) -> Result<(), String> {
    if report.passed() {
        Ok(())
    } else {
        Err(format!(
            "Run did not pass: {}. Failures: {:?}",
            report, report.failures
        ))
    }
}

/// Assert the run failed and its first failure matches `predicate`
pub fn assert_first_failure<F>(report: &RunReport, description: &str, predicate: F) -> Result<(), String>
where
    F: Fn(&HarnessError) -> bool,
{
    match report.failures.first() {
        Some(failure) if predicate(failure) => Ok(()),
        Some(failure) => Err(format!(
            "Expected first failure to be {}, got: {}",
            description, failure
        )),
        None => Err(format!("Expected a {} failure, run had none", description)),
    }
}

/// Assert the subject exited with `code` on its own
pub fn assert_natural_exit(report: &RunReport, code: i32) -> Result<(), String> {
    match report.exit_outcome {
        Some(outcome)
            if outcome.exit_code == ExitCode::Code(code)
                && outcome.cause == TerminationCause::Natural =>
        {
            Ok(())
        }
        other => Err(format!(
            "Expected natural exit with code {}, got {:?}",
            code, other
        )),
    }
}

/// Assert the subject stopped through the graceful stop request
pub fn assert_stopped_gracefully(report: &RunReport) -> Result<(), String> {
    if !report.graceful_stop {
        return Err(format!(
            "Subject did not stop gracefully. History: {:?}",
            report.history
        ));
    }
    if reached(report, RunState::ForceKilled) {
        return Err("Subject stopped gracefully but was also force killed".to_string());
    }
    Ok(())
}

/// Assert the harness had to kill the subject
pub fn assert_force_killed(report: &RunReport) -> Result<(), String> {
    if !reached(report, RunState::ForceKilled) {
        return Err(format!(
            "Subject was not force killed. History: {:?}",
            report.history
        ));
    }
    match report.exit_outcome {
        Some(outcome) if outcome.cause == TerminationCause::Forced => Ok(()),
        other => Err(format!("Expected a forced exit outcome, got {:?}", other)),
    }
}

/// Assert the subject received exactly `expected` functional requests
pub fn assert_request_count(requests: &[String], expected: usize) -> Result<(), String> {
    if requests.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "Expected {} functional request(s), subject recorded {}: {:#?}",
            expected,
            requests.len(),
            requests
        ))
    }
}

fn reached(report: &RunReport, state: RunState) -> bool {
    report.history.iter().any(|t| t.to_state == state)
}
