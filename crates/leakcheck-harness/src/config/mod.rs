use crate::verdict::ExpectedExitCodes;
use anyhow::{Context, Result};
use leakcheck_common::{Endpoint, CLEAN_EXIT_CODE, LEAK_SENTINEL_EXIT_CODE};
use leakcheck_monitoring::{close_app_body, ProbeRequest, ReadinessCheck};
use leakcheck_process::{resolve_binary_path, Platform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub subject: SubjectConfig,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// The process under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    /// Application root. Relative paths in this section resolve against it,
    /// and a relative root resolves against the config file's directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Executable, without the platform suffix
    pub executable: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    /// Defaults to `root`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Extra environment variables for this scenario
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Sanitizer runtime to preload, injected only if the file exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitizer_library: Option<PathBuf>,
}

impl SubjectConfig {
    pub fn executable_path(&self, platform: Platform) -> PathBuf {
        resolve_binary_path(&self.root, &self.executable, platform)
    }

    pub fn working_dir(&self) -> PathBuf {
        match self.working_directory {
            Some(ref dir) => self.root.join(dir),
            None => self.root.clone(),
        }
    }

    pub fn sanitizer_path(&self) -> Option<PathBuf> {
        self.sanitizer_library
            .as_ref()
            .map(|library| self.root.join(library))
    }
}

/// Where the subject listens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl EndpointConfig {
    pub fn to_endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

/// Readiness polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default)]
    pub check: ReadinessCheck,
    #[serde(default = "default_readiness_timeout", with = "duration_serde")]
    pub timeout: Duration,
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_attempt_timeout", with = "duration_serde")]
    pub attempt_timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            check: ReadinessCheck::default(),
            timeout: default_readiness_timeout(),
            poll_interval: default_poll_interval(),
            attempt_timeout: default_attempt_timeout(),
        }
    }
}

/// The functional probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub request: ProbeRequest,
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request: ProbeRequest::default(),
            timeout: default_probe_timeout(),
        }
    }
}

impl ProbeConfig {
    pub fn to_request(&self) -> ProbeRequest {
        self.request.clone().with_timeout(self.timeout)
    }
}

/// How the subject is asked to stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopChannel {
    Http {
        #[serde(default = "default_path")]
        path: String,
        #[serde(default = "close_app_body")]
        body: serde_json::Value,
    },
    Signal,
}

impl Default for StopChannel {
    fn default() -> Self {
        StopChannel::Http {
            path: default_path(),
            body: close_app_body(),
        }
    }
}

/// Graceful stop and exit collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default)]
    pub channel: StopChannel,
    /// Bound on waiting for the port to close after the stop request
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub timeout: Duration,
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_send_timeout", with = "duration_serde")]
    pub send_timeout: Duration,
    /// Bound on collecting the exit status, before and after a forced kill
    #[serde(default = "default_exit_timeout", with = "duration_serde")]
    pub exit_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            channel: StopChannel::default(),
            timeout: default_shutdown_timeout(),
            poll_interval: default_poll_interval(),
            send_timeout: default_send_timeout(),
            exit_timeout: default_exit_timeout(),
        }
    }
}

/// Named scenario presets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPreset {
    /// Intentional leak enabled, the subject must exit with the leak sentinel
    #[default]
    LeakCheck,
    /// No intentional leak, the subject must exit cleanly
    Generic,
}

impl ScenarioPreset {
    pub fn expected_exit_codes(&self) -> ExpectedExitCodes {
        match self {
            ScenarioPreset::LeakCheck => ExpectedExitCodes::from_codes([LEAK_SENTINEL_EXIT_CODE]),
            ScenarioPreset::Generic => ExpectedExitCodes::from_codes([CLEAN_EXIT_CODE]),
        }
    }

    pub fn intentional_leak(&self) -> bool {
        matches!(self, ScenarioPreset::LeakCheck)
    }
}

/// Scenario selection and its overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub preset: ScenarioPreset,
    /// Replaces the preset's expected exit codes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_exit_codes: Option<Vec<i32>>,
    #[serde(default = "default_true")]
    pub memory_tracking: bool,
    /// Replaces the preset's intentional-leak flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intentional_leak: Option<bool>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            preset: ScenarioPreset::default(),
            expected_exit_codes: None,
            memory_tracking: true,
            intentional_leak: None,
        }
    }
}

impl ScenarioConfig {
    pub fn expected_exit_codes(&self) -> ExpectedExitCodes {
        match self.expected_exit_codes {
            Some(ref codes) => ExpectedExitCodes::from_codes(codes.iter().copied()),
            None => self.preset.expected_exit_codes(),
        }
    }

    pub fn intentional_leak(&self) -> bool {
        self.intentional_leak
            .unwrap_or_else(|| self.preset.intentional_leak())
    }
}

/// Post-run cleanup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default)]
    pub remove_working_directory: bool,
}

impl HarnessConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&content)?;
        if config.subject.root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.subject.root = base.join(&config.subject.root);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8002
}

fn default_path() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_readiness_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_exit_timeout() -> Duration {
    Duration::from_secs(10)
}

// Custom serialization for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let invalid = || format!("Invalid duration: {}", s);

        // Check for "ms" BEFORE "s" since "ms" ends with 's'
        if let Some(num) = s.strip_suffix("ms") {
            num.trim().parse().map(Duration::from_millis).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('s') {
            num.trim().parse().map(Duration::from_secs).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('m') {
            let mins: u64 = num.trim().parse().map_err(|_| invalid())?;
            let secs = mins.checked_mul(60).ok_or_else(invalid)?;
            Ok(Duration::from_secs(secs))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}
