use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &HarnessConfig) -> Result<()> {
    validate_subject(&config.subject)?;
    validate_endpoint(&config.endpoint)?;
    validate_readiness(&config.readiness)?;
    validate_probe(&config.probe)?;
    validate_shutdown(&config.shutdown)?;
    validate_scenario(&config.scenario)?;
    validate_log_level(&config.log_level)
}

fn validate_subject(subject: &SubjectConfig) -> Result<()> {
    if subject.executable.as_os_str().is_empty() {
        return Err(anyhow!("subject.executable cannot be empty"));
    }

    for key in subject.env.keys() {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(anyhow!("Invalid environment variable name: {:?}", key));
        }
    }

    Ok(())
}

fn validate_endpoint(endpoint: &EndpointConfig) -> Result<()> {
    if endpoint.host.is_empty() {
        return Err(anyhow!("endpoint.host cannot be empty"));
    }

    if endpoint.port == 0 {
        return Err(anyhow!(
            "Port must be between 1 and 65535, got: {}",
            endpoint.port
        ));
    }

    Ok(())
}

fn validate_readiness(readiness: &ReadinessConfig) -> Result<()> {
    require_timeout("readiness.timeout", readiness.timeout)?;
    require_timeout("readiness.poll_interval", readiness.poll_interval)?;
    require_timeout("readiness.attempt_timeout", readiness.attempt_timeout)?;

    if let ReadinessCheck::Http { ref path } = readiness.check {
        validate_path("readiness.check.path", path)?;
    }

    Ok(())
}

fn validate_probe(probe: &ProbeConfig) -> Result<()> {
    if !probe.enabled {
        return Ok(());
    }

    require_timeout("probe.timeout", probe.timeout)?;
    validate_path("probe.path", &probe.request.path)
}

fn validate_shutdown(shutdown: &ShutdownConfig) -> Result<()> {
    require_timeout("shutdown.timeout", shutdown.timeout)?;
    require_timeout("shutdown.poll_interval", shutdown.poll_interval)?;
    require_timeout("shutdown.send_timeout", shutdown.send_timeout)?;
    require_timeout("shutdown.exit_timeout", shutdown.exit_timeout)?;

    if let StopChannel::Http { ref path, .. } = shutdown.channel {
        validate_path("shutdown.channel.path", path)?;
    }

    Ok(())
}

fn validate_scenario(scenario: &ScenarioConfig) -> Result<()> {
    if let Some(ref codes) = scenario.expected_exit_codes {
        if codes.is_empty() {
            return Err(anyhow!(
                "scenario.expected_exit_codes must list at least one exit code"
            ));
        }
    }

    Ok(())
}

fn validate_log_level(log_level: &str) -> Result<()> {
    match log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            log_level
        )),
    }
}

/// Longest accepted value for any timeout or interval.
const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

fn require_timeout(field: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(anyhow!("{} must be greater than 0", field));
    }
    if value > MAX_TIMEOUT {
        return Err(anyhow!(
            "{} must be at most {:?}, got: {:?}",
            field,
            MAX_TIMEOUT,
            value
        ));
    }
    Ok(())
}

fn validate_path(field: &str, path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(anyhow!("{} must start with '/', got: {}", field, path));
    }
    Ok(())
}
