//! Graceful shutdown coordination.
//!
//! A stop request goes out through a [`StopRequester`], then the coordinator
//! watches the subject's port until it refuses connections. Escalating to a
//! forced kill is left to the caller, which owns the process handle.

use crate::http::{send_request, HttpMethod, HttpRequest};
use crate::{MonitorResult, ProbeError};
use async_trait::async_trait;
use leakcheck_common::Endpoint;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Body of the subject's `close_app` control message.
pub fn close_app_body() -> serde_json::Value {
    serde_json::json!({
        "ten": {
            "type": "close_app",
            "dest": [{ "app": "localhost" }]
        }
    })
}

/// True when a connect attempt is actively refused. A connect that neither
/// succeeds nor fails within `limit` counts as still open.
async fn refuses_connections(endpoint: &Endpoint, limit: Duration) -> bool {
    let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
    matches!(timeout(limit, connect).await, Ok(Err(_)))
}

/// A control channel that asks the subject to stop.
#[async_trait]
pub trait StopRequester: Send + Sync {
    /// Channel name used in logs.
    fn name(&self) -> &'static str;

    /// Send the stop request. `limit` bounds the send itself.
    async fn send_stop(&self, endpoint: &Endpoint, limit: Duration) -> MonitorResult<()>;
}

/// Stop request delivered as an HTTP message to the subject.
#[derive(Debug, Clone)]
pub struct HttpStopRequester {
    path: String,
    body: serde_json::Value,
}

impl Default for HttpStopRequester {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            body: close_app_body(),
        }
    }
}

impl HttpStopRequester {
    pub fn new(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            body,
        }
    }
}

#[async_trait]
impl StopRequester for HttpStopRequester {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send_stop(&self, endpoint: &Endpoint, limit: Duration) -> MonitorResult<()> {
        let request = HttpRequest::new(endpoint.url(&self.path))
            .with_method(HttpMethod::Post)
            .with_json_body(self.body.clone())
            .with_timeout(limit);

        let status = send_request(&request).await?;
        debug!("Stop request to {} answered with {}", endpoint, status);
        Ok(())
    }
}

/// Stop request delivered as SIGTERM to the subject's pid.
#[derive(Debug, Clone, Copy)]
pub struct SignalStopRequester {
    pid: u32,
}

impl SignalStopRequester {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }
}

#[async_trait]
impl StopRequester for SignalStopRequester {
    fn name(&self) -> &'static str {
        "signal"
    }

    async fn send_stop(&self, _endpoint: &Endpoint, _limit: Duration) -> MonitorResult<()> {
        leakcheck_process::request_termination(self.pid).map_err(|e| ProbeError::StopFailed {
            reason: e.to_string(),
        })
    }
}

/// Requests a graceful stop and waits for the port to close.
pub struct ShutdownCoordinator {
    requester: Box<dyn StopRequester>,
    poll_interval: Duration,
    send_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(requester: Box<dyn StopRequester>) -> Self {
        Self {
            requester,
            poll_interval: Duration::from_secs(1),
            send_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Send the stop request, then poll until `endpoint` refuses connections.
    ///
    /// Returns `true` once the port is closed, `false` if it is still open
    /// after `deadline`. Errors while sending are logged and ignored: a
    /// subject that is already shutting down may drop the connection.
    pub async fn request_stop(&self, endpoint: &Endpoint, deadline: Duration) -> bool {
        let started = Instant::now();
        let expires_at = crate::expiry(started, deadline);

        info!(
            "Requesting graceful stop of {} via {}",
            endpoint,
            self.requester.name()
        );

        let limit = deadline.min(self.send_timeout);
        if let Err(e) = self.requester.send_stop(endpoint, limit).await {
            warn!(
                "Stop request via {} to {} failed: {}",
                self.requester.name(),
                endpoint,
                e
            );
        }

        loop {
            let now = Instant::now();
            let remaining = expires_at.saturating_duration_since(now);
            if refuses_connections(endpoint, remaining.min(self.poll_interval)).await {
                info!(
                    "Subject at {} stopped accepting connections after {:?}",
                    endpoint,
                    started.elapsed()
                );
                return true;
            }

            let now = Instant::now();
            if now >= expires_at {
                break;
            }
            sleep((expires_at - now).min(self.poll_interval)).await;
        }

        warn!(
            "Subject at {} still reachable {:?} after the stop request",
            endpoint, deadline
        );
        false
    }
}
