//! Readiness polling.
//!
//! A failed attempt only means "not ready yet"; the prober never returns an
//! error, just whether readiness was observed before the deadline.

use crate::http::{send_request, HttpMethod, HttpRequest};
use crate::ProbeResult;
use leakcheck_common::Endpoint;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// What counts as "ready".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadinessCheck {
    /// A TCP connect to the endpoint succeeds
    #[default]
    Tcp,
    /// Any HTTP response to `GET path`, whatever its status
    Http { path: String },
}

/// Attempt one TCP connect to `endpoint`, bounded by `limit`.
pub async fn check_reachable(endpoint: &Endpoint, limit: Duration) -> ProbeResult {
    let start = Instant::now();
    let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));

    match timeout(limit, connect).await {
        Ok(Ok(_stream)) => ProbeResult::succeeded(None, start.elapsed()),
        Ok(Err(e)) => ProbeResult::failed(None, e.to_string(), start.elapsed()),
        Err(_) => ProbeResult::failed(None, "Connect timed out", start.elapsed()),
    }
}

/// Polls an endpoint until it answers or a deadline passes.
#[derive(Debug, Clone)]
pub struct ReadinessProber {
    check: ReadinessCheck,
    poll_interval: Duration,
    attempt_timeout: Duration,
}

impl Default for ReadinessProber {
    fn default() -> Self {
        Self {
            check: ReadinessCheck::Tcp,
            poll_interval: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(1),
        }
    }
}

impl ReadinessProber {
    pub fn new(check: ReadinessCheck) -> Self {
        Self {
            check,
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run a single readiness attempt bounded by `limit`.
    pub async fn check_once(&self, endpoint: &Endpoint, limit: Duration) -> ProbeResult {
        match self.check {
            ReadinessCheck::Tcp => check_reachable(endpoint, limit).await,
            ReadinessCheck::Http { ref path } => {
                let start = Instant::now();
                let request = HttpRequest::new(endpoint.url(path))
                    .with_method(HttpMethod::Get)
                    .with_timeout(limit);
                match send_request(&request).await {
                    Ok(status) => ProbeResult::succeeded(Some(status), start.elapsed()),
                    Err(e) => ProbeResult::failed(None, e.to_string(), start.elapsed()),
                }
            }
        }
    }

    /// Poll `endpoint` until an attempt succeeds or `deadline` elapses.
    ///
    /// Every attempt and every pause is clipped to the time left, so the call
    /// returns within `deadline` plus scheduling slack.
    pub async fn wait_ready(&self, endpoint: &Endpoint, deadline: Duration) -> bool {
        let started = Instant::now();
        let expires_at = crate::expiry(started, deadline);
        let mut attempts: u32 = 0;

        debug!(
            "Waiting up to {:?} for {} to become ready ({:?})",
            deadline, endpoint, self.check
        );

        loop {
            let now = Instant::now();
            if now >= expires_at {
                break;
            }

            let limit = (expires_at - now).min(self.attempt_timeout);
            let result = self.check_once(endpoint, limit).await;
            attempts += 1;

            if result.success {
                info!(
                    "Subject ready at {} after {:?} ({} attempts)",
                    endpoint,
                    started.elapsed(),
                    attempts
                );
                return true;
            }

            debug!(
                "Readiness attempt {} on {} failed: {}",
                attempts,
                endpoint,
                result.error.as_deref().unwrap_or("unknown")
            );

            let now = Instant::now();
            if now >= expires_at {
                break;
            }
            sleep((expires_at - now).min(self.poll_interval)).await;
        }

        warn!(
            "Subject at {} not ready after {:?} ({} attempts)",
            endpoint, deadline, attempts
        );
        false
    }
}
