//! Metrics collection and export for Chatter.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const SESSIONS_TOTAL: &str = "chatter_sessions_total";
    pub const SESSIONS_ACTIVE: &str = "chatter_sessions_active";
    pub const MESSAGES_PUBLISHED: &str = "chatter_messages_published_total";
    pub const DELIVERIES_SKIPPED: &str = "chatter_deliveries_skipped_total";
    pub const PUBLISH_LATENCY_SECONDS: &str = "chatter_publish_latency_seconds";
    pub const ERRORS_TOTAL: &str = "chatter_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::SESSIONS_TOTAL,
        "Total number of event stream sessions since server start"
    );
    metrics::describe_gauge!(
        names::SESSIONS_ACTIVE,
        "Current number of open event stream sessions"
    );
    metrics::describe_counter!(
        names::MESSAGES_PUBLISHED,
        "Total number of chat messages published"
    );
    metrics::describe_counter!(
        names::DELIVERIES_SKIPPED,
        "Deliveries dropped because a listener's mailbox was full"
    );
    metrics::describe_histogram!(
        names::PUBLISH_LATENCY_SECONDS,
        "Time spent fanning a message out, in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a published message.
pub fn record_publish(room: &str, skipped: usize, seconds: f64) {
    counter!(names::MESSAGES_PUBLISHED, "room" => room.to_string()).increment(1);
    if skipped > 0 {
        counter!(names::DELIVERIES_SKIPPED, "room" => room.to_string()).increment(skipped as u64);
    }
    histogram!(names::PUBLISH_LATENCY_SECONDS).record(seconds);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

/// Metrics guard that records the end of a session on drop.
pub struct SessionMetricsGuard;

impl SessionMetricsGuard {
    /// Create a new metrics guard, recording a session start.
    #[must_use]
    pub fn new() -> Self {
        counter!(names::SESSIONS_TOTAL).increment(1);
        gauge!(names::SESSIONS_ACTIVE).increment(1.0);
        Self
    }
}

impl Default for SessionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::SESSIONS_ACTIVE).decrement(1.0);
    }
}
