//! Test Scenario 1.3: Forced Stop
//!
//! A subject that ignores the stop request is killed after the shutdown
//! deadline. A subject that closes its port but keeps running is killed
//! after the exit deadline.

use e2e_tests::assertions::{assert_first_failure, assert_force_killed, assert_verdict};
use e2e_tests::TestExecutor;
use leakcheck_harness::{HarnessError, Verdict};
use std::time::Duration;

#[test]
fn test_ignored_stop_request() {
    println!("\n========================================");
    println!("TEST: Ignored Stop Request");
    println!("========================================\n");

    let executor = TestExecutor::new("ignored-stop");
    let mut options = executor.options(&["--ignore-stop"]);
    options.shutdown_timeout_ms = 1000;

    let result = executor.run_test(options, |report, _| {
        println!("Step 1: Checking the stop escalated...");
        assert_force_killed(report)?;
        if report.graceful_stop {
            return Err("Stop reported as graceful".to_string());
        }
        println!("✓ Subject was force killed\n");

        println!("Step 2: Checking the failure...");
        assert_first_failure(report, "shutdown timeout", |f| {
            matches!(f, HarnessError::ShutdownTimeout { timeout } if *timeout == Duration::from_millis(1000))
        })?;
        if cfg!(unix) {
            assert_verdict(report, Verdict::ShutdownTimeout)?;
        }
        println!("✓ Shutdown timeout recorded\n");

        Ok(())
    });

    match result {
        Ok(()) => {
            println!("\n========================================");
            println!("✓ TEST PASSED: Ignored Stop Request");
            println!("========================================\n");
        }
        Err(e) => {
            println!("\n========================================");
            println!("✗ TEST FAILED: Ignored Stop Request");
            println!("Error: {}", e);
            println!("========================================\n");
            panic!("Test failed: {}", e);
        }
    }
}

#[test]
fn test_exit_timeout_after_port_closed() {
    println!("\n========================================");
    println!("TEST: Exit Timeout After Port Closed");
    println!("========================================\n");

    let executor = TestExecutor::new("exit-timeout");
    let mut options = executor.options(&["--linger-ms", "30000"]);
    options.exit_timeout_ms = 1000;

    let result = executor.run_test(options, |report, _| {
        assert_force_killed(report)?;
        assert_first_failure(report, "exit timeout", |f| {
            matches!(f, HarnessError::ShutdownTimeout { timeout } if *timeout == Duration::from_millis(1000))
        })?;
        if report.duration > Duration::from_secs(20) {
            return Err(format!("Harness waited out the linger: {:?}", report.duration));
        }
        Ok(())
    });

    match result {
        Ok(()) => {
            println!("\n========================================");
            println!("✓ TEST PASSED: Exit Timeout After Port Closed");
            println!("========================================\n");
        }
        Err(e) => {
            println!("\n========================================");
            println!("✗ TEST FAILED: Exit Timeout After Port Closed");
            println!("Error: {}", e);
            println!("========================================\n");
            panic!("Test failed: {}", e);
        }
    }
}
