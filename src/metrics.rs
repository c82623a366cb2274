//! Metrics instrumentation for disco-dns.
//!
//! All metrics are prefixed with `disco_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Query outcome for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Query returned records.
    Success,
    /// Name or type did not resolve (NXDOMAIN).
    NxDomain,
    /// Query failed with a server-side error.
    Error,
}

/// Record a DNS query, regardless of outcome.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Success => "success",
        QueryResult::NxDomain => "nxdomain",
        QueryResult::Error => "error",
    };

    counter!("disco_dns.query.count", "record" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("disco_dns.query.duration.seconds", "record" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Record a query that yielded NXDOMAIN or a failure.
pub fn record_query_failed(record_type: &str) {
    counter!("disco_dns.query.failed", "record" => record_type.to_string()).increment(1);
}

/// Track the discovered-container gauge for an endpoint.
pub fn record_container_added(endpoint: &str) {
    gauge!("disco_dns.containers", "endpoint" => endpoint.to_string()).increment(1.0);
}

/// See [`record_container_added`].
pub fn record_container_removed(endpoint: &str) {
    gauge!("disco_dns.containers", "endpoint" => endpoint.to_string()).decrement(1.0);
}

/// Record a docker event-stream reconnect.
pub fn record_client_reconnect(endpoint: &str) {
    counter!("disco_dns.client.reconnect.count", "endpoint" => endpoint.to_string()).increment(1);
}

/// Record registry state counts (emitted periodically).
pub fn record_state_counts(addresses: usize, idents: usize) {
    gauge!("disco_dns.state.addresses.count").set(addresses as f64);
    gauge!("disco_dns.state.idents.count").set(idents as f64);
}

/// Record the current zone serial.
pub fn record_serial(serial: u32) {
    gauge!("disco_dns.state.serial").set(serial as f64);
}

/// Record a completed web request.
pub fn record_request(method: &str, path: &str, status: u16, duration: std::time::Duration) {
    counter!(
        "disco_dns.web.requests.count",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "code" => status.to_string()
    )
    .increment(1);
    histogram!(
        "disco_dns.web.request.duration.seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
