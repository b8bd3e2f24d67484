//! # leakcheck monitoring
//!
//! Network-side observation of the subject:
//! - readiness polling (TCP connect or HTTP response)
//! - the single functional probe request
//! - graceful shutdown through the subject's control channel

pub mod http;
pub mod probe;
pub mod readiness;
pub mod shutdown;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use thiserror::Error;

/// Stand-in expiry for deadlines too large to represent as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `start + deadline`, saturating to a far-future instant on overflow.
pub(crate) fn expiry(start: Instant, deadline: Duration) -> Instant {
    start
        .checked_add(deadline)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

/// Probe error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Probe timeout: {target} after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("Probe connection failed: {target} - {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Probe invalid request: {target} - {reason}")]
    InvalidRequest { target: String, reason: String },

    #[error("Stop request failed: {reason}")]
    StopFailed { reason: String },
}

impl ProbeError {
    pub fn timeout(target: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            target: target.into(),
            timeout,
        }
    }

    pub fn connection_failed(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_request(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for probe operations.
pub type MonitorResult<T> = Result<T, ProbeError>;

/// Outcome of one readiness, functional or stop poll attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub elapsed: Duration,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn succeeded(status: Option<u16>, elapsed: Duration) -> Self {
        Self {
            success: true,
            status,
            error: None,
            elapsed,
            checked_at: Utc::now(),
        }
    }

    pub fn failed(status: Option<u16>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            status,
            error: Some(error.into()),
            elapsed,
            checked_at: Utc::now(),
        }
    }
}

pub use http::{send_request, HttpMethod, HttpRequest};
pub use probe::{FunctionalProbe, ProbeRequest, FAILING_STATUS};
pub use readiness::{check_reachable, ReadinessCheck, ReadinessProber};
pub use shutdown::{
    close_app_body, HttpStopRequester, ShutdownCoordinator, SignalStopRequester, StopRequester,
};
