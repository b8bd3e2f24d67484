// HTTP request plumbing shared by the readiness prober, the functional probe
// and the stop requester.

use crate::{MonitorResult, ProbeError};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONNECTION, CONTENT_TYPE, USER_AGENT};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

const USER_AGENT_VALUE: &str = concat!("leakcheck/", env!("CARGO_PKG_VERSION"));

/// HTTP methods supported for probe and stop requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Head,
}

impl HttpMethod {
    fn as_method(&self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Head => Method::HEAD,
        }
    }
}

/// A single HTTP exchange with an optional JSON body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Send `request` and return the response status.
///
/// The whole exchange, including reading the response body, is bounded by
/// `request.timeout`. Connections are not reused.
pub async fn send_request(request: &HttpRequest) -> MonitorResult<u16> {
    let uri: Uri = request
        .url
        .parse()
        .map_err(|e| ProbeError::invalid_request(&request.url, format!("Invalid URI: {}", e)))?;

    let client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();

    let mut builder = Request::builder()
        .method(request.method.as_method())
        .uri(uri)
        .header(USER_AGENT, USER_AGENT_VALUE)
        .header(CONNECTION, "close");

    let body = match request.body {
        Some(ref value) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            let encoded = serde_json::to_vec(value).map_err(|e| {
                ProbeError::invalid_request(&request.url, format!("Failed to encode body: {}", e))
            })?;
            Bytes::from(encoded)
        }
        None => Bytes::new(),
    };

    let http_request = builder.body(Full::new(body)).map_err(|e| {
        ProbeError::invalid_request(&request.url, format!("Failed to build request: {}", e))
    })?;

    let exchange = async {
        let response = client
            .request(http_request)
            .await
            .map_err(|e| ProbeError::connection_failed(&request.url, error_chain(&e)))?;

        let status = response.status().as_u16();

        // The subject may close the connection right after answering a stop
        // request, so a truncated body does not invalidate the status.
        match response.into_body().collect().await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                debug!(
                    "HTTP {} {} -> {} ({} bytes): {}",
                    request.method.as_method(),
                    request.url,
                    status,
                    bytes.len(),
                    String::from_utf8_lossy(&bytes[..bytes.len().min(200)])
                );
            }
            Err(e) => {
                debug!(
                    "HTTP {} {} -> {}, body unreadable: {}",
                    request.method.as_method(),
                    request.url,
                    status,
                    e
                );
            }
        }

        Ok::<u16, ProbeError>(status)
    };

    timeout(request.timeout, exchange)
        .await
        .map_err(|_| ProbeError::timeout(&request.url, request.timeout))?
}

/// Render an error with its source chain, since the client's top-level
/// messages omit the underlying cause.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
