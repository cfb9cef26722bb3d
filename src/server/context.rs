// Per-request context carried through the Pingora hooks

use std::time::{Duration, Instant};
use uuid::Uuid;

/// Request context that holds everything the logging hook needs once the
/// response has been written
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    started: Instant,
    bytes_received: u64,
    bytes_sent: u64,
}

impl RequestContext {
    /// Create a new RequestContext
    /// Automatically generates a unique request ID (UUID v4) and captures the start time
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path,
            started: Instant::now(),
            bytes_received: 0,
            bytes_sent: 0,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fill in method and path once the request header is available
    pub fn set_request(&mut self, method: &str, path: &str) {
        self.method = method.to_string();
        self.path = path.to_string();
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn add_bytes_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn set_bytes_sent(&mut self, bytes: usize) {
        self.bytes_sent = bytes as u64;
    }
}
