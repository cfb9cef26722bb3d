// Metrics module - Prometheus-compatible metrics tracking
// Provides counters and latency percentiles for the conversion server

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Latency samples kept per series; older samples are dropped first
const MAX_SAMPLES: usize = 10_000;

/// Histogram represents percentile statistics for latency measurements
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Histogram {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Metrics struct tracks counters and histograms for Prometheus export
/// Thread-safe via atomic operations and mutexes
pub struct Metrics {
    // Request counters
    request_count: AtomicU64,

    // Status code counters (e.g., 200, 400, 500)
    status_counts: Mutex<BTreeMap<u16, u64>>,

    // HTTP method counters (GET, HEAD, POST, etc.)
    method_counts: Mutex<BTreeMap<String, u64>>,

    // Successful conversions by target format
    conversions: Mutex<BTreeMap<String, u64>>,

    // Failed conversions by target format
    conversion_failures: Mutex<BTreeMap<String, u64>>,

    // Rejected uploads by reason (missing_file, file_too_large, ...)
    upload_rejections: Mutex<BTreeMap<String, u64>>,

    // Request and conversion durations (stored in microseconds)
    durations: Mutex<VecDeque<u64>>,
    conversion_durations: Mutex<VecDeque<u64>>,

    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Metrics {
            request_count: AtomicU64::new(0),
            status_counts: Mutex::new(BTreeMap::new()),
            method_counts: Mutex::new(BTreeMap::new()),
            conversions: Mutex::new(BTreeMap::new()),
            conversion_failures: Mutex::new(BTreeMap::new()),
            upload_rejections: Mutex::new(BTreeMap::new()),
            durations: Mutex::new(VecDeque::new()),
            conversion_durations: Mutex::new(VecDeque::new()),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }

    /// Increment the total request count
    pub fn increment_request_count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_status_count(&self, status_code: u16) {
        if let Ok(mut counts) = self.status_counts.lock() {
            *counts.entry(status_code).or_insert(0) += 1;
        }
    }

    /// Count a request by method; unknown methods share the `OTHER` label
    pub fn increment_method_count(&self, method: &str) {
        bump(&self.method_counts, method_label(method));
    }

    pub fn increment_conversion(&self, format: &str) {
        bump(&self.conversions, format);
    }

    pub fn increment_conversion_failure(&self, format: &str) {
        bump(&self.conversion_failures, format);
    }

    pub fn increment_upload_rejection(&self, reason: &str) {
        bump(&self.upload_rejections, reason);
    }

    /// Record a request duration in milliseconds
    pub fn record_duration(&self, duration_ms: f64) {
        push_sample(&self.durations, duration_ms);
    }

    /// Record the codec time of one conversion in milliseconds
    pub fn record_conversion_duration(&self, duration_ms: f64) {
        push_sample(&self.conversion_durations, duration_ms);
    }

    pub fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn get_status_count(&self, status_code: u16) -> u64 {
        self.status_counts
            .lock()
            .ok()
            .and_then(|counts| counts.get(&status_code).copied())
            .unwrap_or(0)
    }

    pub fn get_method_count(&self, method: &str) -> u64 {
        lookup(&self.method_counts, method_label(method))
    }

    pub fn get_conversion_count(&self, format: &str) -> u64 {
        lookup(&self.conversions, format)
    }

    pub fn get_conversion_failure_count(&self, format: &str) -> u64 {
        lookup(&self.conversion_failures, format)
    }

    pub fn get_upload_rejection_count(&self, reason: &str) -> u64 {
        lookup(&self.upload_rejections, reason)
    }

    pub fn get_bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn get_bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Calculate histogram from request duration samples
    pub fn get_duration_histogram(&self) -> Histogram {
        self.durations
            .lock()
            .map(|samples| calculate_histogram(samples.iter().copied()))
            .unwrap_or_default()
    }

    /// Calculate histogram from conversion duration samples
    pub fn get_conversion_histogram(&self) -> Histogram {
        self.conversion_durations
            .lock()
            .map(|samples| calculate_histogram(samples.iter().copied()))
            .unwrap_or_default()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP http_requests_total Total number of HTTP requests received\n");
        output.push_str("# TYPE http_requests_total counter\n");
        output.push_str(&format!("http_requests_total {}\n", self.get_request_count()));

        output.push_str("\n# HELP http_requests_by_status_total HTTP requests by status code\n");
        output.push_str("# TYPE http_requests_by_status_total counter\n");
        if let Ok(counts) = self.status_counts.lock() {
            for (status, count) in counts.iter() {
                output.push_str(&format!(
                    "http_requests_by_status_total{{status=\"{}\"}} {}\n",
                    status, count
                ));
            }
        }

        push_labelled(
            &mut output,
            "http_requests_by_method_total",
            "HTTP requests by method",
            "method",
            &self.method_counts,
        );
        push_labelled(
            &mut output,
            "image_conversions_total",
            "Successful conversions by target format",
            "format",
            &self.conversions,
        );
        push_labelled(
            &mut output,
            "image_conversion_failures_total",
            "Failed conversions by target format",
            "format",
            &self.conversion_failures,
        );
        push_labelled(
            &mut output,
            "upload_rejections_total",
            "Rejected uploads by reason",
            "reason",
            &self.upload_rejections,
        );

        output.push_str("\n# HELP http_request_bytes_received_total Request body bytes received\n");
        output.push_str("# TYPE http_request_bytes_received_total counter\n");
        output.push_str(&format!(
            "http_request_bytes_received_total {}\n",
            self.get_bytes_received()
        ));

        output.push_str("\n# HELP http_response_bytes_sent_total Response body bytes sent\n");
        output.push_str("# TYPE http_response_bytes_sent_total counter\n");
        output.push_str(&format!(
            "http_response_bytes_sent_total {}\n",
            self.get_bytes_sent()
        ));

        push_summary(
            &mut output,
            "http_request_duration_ms",
            "HTTP request duration in milliseconds",
            self.get_duration_histogram(),
        );
        push_summary(
            &mut output,
            "image_conversion_duration_ms",
            "Codec time per conversion in milliseconds",
            self.get_conversion_histogram(),
        );

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        "OPTIONS" => "OPTIONS",
        _ => "OTHER",
    }
}

fn bump(map: &Mutex<BTreeMap<String, u64>>, key: &str) {
    if let Ok(mut counts) = map.lock() {
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
}

fn lookup(map: &Mutex<BTreeMap<String, u64>>, key: &str) -> u64 {
    map.lock()
        .ok()
        .and_then(|counts| counts.get(key).copied())
        .unwrap_or(0)
}

fn push_sample(samples: &Mutex<VecDeque<u64>>, duration_ms: f64) {
    let duration_us = (duration_ms * 1000.0) as u64;
    if let Ok(mut samples) = samples.lock() {
        if samples.len() == MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(duration_us);
    }
}

fn push_labelled(
    output: &mut String,
    name: &str,
    help: &str,
    label: &str,
    map: &Mutex<BTreeMap<String, u64>>,
) {
    output.push_str(&format!("\n# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} counter\n", name));
    if let Ok(counts) = map.lock() {
        for (value, count) in counts.iter() {
            output.push_str(&format!("{}{{{}=\"{}\"}} {}\n", name, label, value, count));
        }
    }
}

fn push_summary(output: &mut String, name: &str, help: &str, histogram: Histogram) {
    output.push_str(&format!("\n# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} summary\n", name));
    for (quantile, value) in [
        ("0.5", histogram.p50),
        ("0.9", histogram.p90),
        ("0.95", histogram.p95),
        ("0.99", histogram.p99),
    ] {
        output.push_str(&format!(
            "{}{{quantile=\"{}\"}} {:.3}\n",
            name, quantile, value
        ));
    }
}

fn calculate_histogram(samples: impl Iterator<Item = u64>) -> Histogram {
    let mut sorted: Vec<u64> = samples.collect();
    if sorted.is_empty() {
        return Histogram::default();
    }
    sorted.sort_unstable();

    let percentile = |p: f64| {
        let idx = (sorted.len() as f64 * p) as usize;
        // Convert from microseconds to milliseconds
        sorted.get(idx.saturating_sub(1)).copied().unwrap_or(0) as f64 / 1000.0
    };

    Histogram {
        p50: percentile(0.50),
        p90: percentile(0.90),
        p95: percentile(0.95),
        p99: percentile(0.99),
    }
}
