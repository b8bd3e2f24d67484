//! The functional probe: one meaningful request against a ready subject.

use crate::http::{send_request, HttpMethod, HttpRequest};
use crate::{MonitorResult, ProbeResult};
use leakcheck_common::Endpoint;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Status that marks the probe as failed. Any other status is accepted.
pub const FAILING_STATUS: u16 = 500;

fn default_path() -> String {
    "/".to_string()
}

fn default_body() -> Option<serde_json::Value> {
    Some(serde_json::json!({ "ten": { "name": "test" } }))
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Request issued by the functional probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRequest {
    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_body")]
    pub body: Option<serde_json::Value>,

    #[serde(skip, default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for ProbeRequest {
    fn default() -> Self {
        Self {
            method: HttpMethod::Post,
            path: default_path(),
            body: default_body(),
            timeout: default_timeout(),
        }
    }
}

impl ProbeRequest {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Issues the functional request. Never retries.
#[derive(Debug, Clone)]
pub struct FunctionalProbe {
    endpoint: Endpoint,
}

impl FunctionalProbe {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Send exactly one request and return the status.
    pub async fn call(&self, request: &ProbeRequest) -> MonitorResult<u16> {
        let mut http = HttpRequest::new(self.endpoint.url(&request.path))
            .with_method(request.method)
            .with_timeout(request.timeout);
        if let Some(ref body) = request.body {
            http = http.with_json_body(body.clone());
        }

        send_request(&http).await
    }

    /// Send the request and judge it: status 500 or a transport error fails.
    pub async fn check(&self, request: &ProbeRequest) -> ProbeResult {
        let start = Instant::now();

        match self.call(request).await {
            Ok(status) if status == FAILING_STATUS => {
                warn!("Functional probe on {} returned {}", self.endpoint, status);
                ProbeResult::failed(
                    Some(status),
                    format!("Subject answered with status {}", status),
                    start.elapsed(),
                )
            }
            Ok(status) => {
                info!("Functional probe on {} returned {}", self.endpoint, status);
                ProbeResult::succeeded(Some(status), start.elapsed())
            }
            Err(e) => {
                warn!("Functional probe on {} failed: {}", self.endpoint, e);
                ProbeResult::failed(None, e.to_string(), start.elapsed())
            }
        }
    }
}
