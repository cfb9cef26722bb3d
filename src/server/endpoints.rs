//! Response values for the built-in endpoints.
//!
//! Handlers return an `EndpointResponse` instead of writing to the session,
//! which keeps them testable without a socket. The server writes it out.

use std::time::Instant;

use bytes::Bytes;

use crate::error::AppError;
use crate::metrics::Metrics;

/// Response produced by a handler
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value
    pub content_type: String,
    /// Headers besides Content-Type and Content-Length
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl EndpointResponse {
    /// Create a JSON response with the given status and body.
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json; charset=utf-8".to_string(),
            headers: Vec::new(),
            body: Bytes::from(body),
        }
    }

    /// Create a plain text response (for Prometheus metrics).
    pub fn prometheus(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; version=0.0.4".to_string(),
            headers: Vec::new(),
            body: Bytes::from(body),
        }
    }

    /// Binary success response
    pub fn binary(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// `{"error": "..."}` with the error's status
    pub fn error(err: &AppError) -> Self {
        let mut response = Self::json(err.to_http_status(), err.to_json());
        if matches!(err, AppError::MethodNotAllowed) {
            response.headers.push(("Allow", "POST".to_string()));
        }
        response
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Value of an extra header, if set
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parsed `error` field of a JSON error body
    pub fn error_message(&self) -> Option<String> {
        serde_json::from_slice::<serde_json::Value>(&self.body)
            .ok()?
            .get("error")?
            .as_str()
            .map(str::to_string)
    }
}

/// Generate response for /health endpoint.
///
/// Returns health status with uptime and version information.
pub fn handle_health(start_time: Instant) -> EndpointResponse {
    let uptime_seconds = start_time.elapsed().as_secs();
    let version = env!("CARGO_PKG_VERSION");

    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": uptime_seconds,
        "version": version
    })
    .to_string();

    EndpointResponse::json(200, body)
}

/// Generate response for /metrics endpoint.
pub fn handle_metrics(metrics: &Metrics) -> EndpointResponse {
    EndpointResponse::prometheus(metrics.export_prometheus())
}
