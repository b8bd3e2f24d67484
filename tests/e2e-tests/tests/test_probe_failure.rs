//! Test Scenario 2.1: Probe Failure
//!
//! A subject answering the functional request with 500 fails the run, but
//! the harness still stops it gracefully and cleans up.

use e2e_tests::assertions::{
    assert_first_failure, assert_natural_exit, assert_request_count, assert_stopped_gracefully,
};
use e2e_tests::TestExecutor;
use leakcheck_harness::HarnessError;

#[test]
fn test_probe_failure() {
    println!("\n========================================");
    println!("TEST: Probe Failure");
    println!("========================================\n");

    let executor = TestExecutor::new("probe-failure");
    let mut options = executor.options(&["--probe-status", "500"]);
    options.remove_working_directory = true;

    let result = executor.run_test(options, |report, executor| {
        println!("Step 1: Checking the probe failed...");
        let probe = report.probe.as_ref().ok_or("Probe was not sent")?;
        if probe.success || probe.status != Some(500) {
            return Err(format!("Expected a failed probe with status 500, got {:?}", probe));
        }
        assert_first_failure(report, "probe failure", |f| {
            matches!(f, HarnessError::ProbeFailure { .. })
        })?;
        if report.passed() {
            return Err("Run passed despite the failed probe".to_string());
        }
        assert_request_count(&executor.recorded_requests(), 1)?;
        println!("✓ Probe failure recorded\n");

        println!("Step 2: Checking shutdown still ran...");
        assert_stopped_gracefully(report)?;
        assert_natural_exit(report, 0)?;
        println!("✓ Subject stopped gracefully\n");

        println!("Step 3: Checking cleanup...");
        if !report.cleanup_ran || executor.app_dir.exists() {
            return Err(format!(
                "Working directory {} was not removed",
                executor.app_dir.display()
            ));
        }
        println!("✓ Working directory removed\n");

        Ok(())
    });

    match result {
        Ok(()) => {
            println!("\n========================================");
            println!("✓ TEST PASSED: Probe Failure");
            println!("========================================\n");
        }
        Err(e) => {
            println!("\n========================================");
            println!("✗ TEST FAILED: Probe Failure");
            println!("Error: {}", e);
            println!("========================================\n");
            panic!("Test failed: {}", e);
        }
    }
}

#[test]
fn test_not_found_is_not_a_probe_failure() {
    println!("\n========================================");
    println!("TEST: Probe 404 Accepted");
    println!("========================================\n");

    let executor = TestExecutor::new("probe-404");
    let options = executor.options(&["--probe-status", "404"]);

    let result = executor.run_test(options, |report, _| {
        let probe = report.probe.as_ref().ok_or("Probe was not sent")?;
        if !probe.success {
            return Err(format!("404 should not fail the probe: {:?}", probe));
        }
        if !report.passed() {
            return Err(format!("Run failed: {:?}", report.failures));
        }
        Ok(())
    });

    if let Err(e) = result {
        println!("✗ TEST FAILED: Probe 404 Accepted");
        panic!("Test failed: {}", e);
    }
    println!("✓ TEST PASSED: Probe 404 Accepted");
}
