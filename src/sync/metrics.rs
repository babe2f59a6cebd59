//! Prometheus metrics for the queue
//!
//! Poll loop health, store failures and ticket throughput.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec,
    register_histogram, Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, TextEncoder,
};

lazy_static! {
    /// Histogram: poll tick duration (seconds)
    pub static ref TICK_DURATION: Histogram = register_histogram!(
        "queuedesk_tick_duration_seconds",
        "Duration of queue poll ticks",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    )
    .expect("Failed to create tick_duration metric");

    /// Counter: poll ticks by status
    pub static ref TICKS: CounterVec = register_counter_vec!(
        "queuedesk_ticks_total",
        "Total poll ticks by status",
        &["status"]
    )
    .expect("Failed to create ticks metric");

    /// Counter: shared store failures by operation
    pub static ref STORE_ERRORS: CounterVec = register_counter_vec!(
        "queuedesk_store_errors_total",
        "Shared store failures by operation",
        &["operation"]
    )
    .expect("Failed to create store_errors metric");

    /// Counter: call notifications fired, by signal
    pub static ref NOTIFICATIONS: CounterVec = register_counter_vec!(
        "queuedesk_notifications_total",
        "Call notifications fired",
        &["signal"]
    )
    .expect("Failed to create notifications metric");

    /// Counter: tickets issued
    pub static ref TICKETS_ISSUED: Counter = register_counter!(
        "queuedesk_tickets_issued_total",
        "Tickets issued"
    )
    .expect("Failed to create tickets_issued metric");

    /// Counter: tickets called (re-calls included)
    pub static ref TICKETS_CALLED: Counter = register_counter!(
        "queuedesk_tickets_called_total",
        "Ticket calls"
    )
    .expect("Failed to create tickets_called metric");

    /// Gauge: retained tickets by status
    pub static ref QUEUE_DEPTH: GaugeVec = register_gauge_vec!(
        "queuedesk_queue_depth",
        "Retained tickets by status",
        &["status"]
    )
    .expect("Failed to create queue_depth metric");

    /// Gauge: poll loop health (1 = running, 0 = stopped)
    pub static ref HEALTH_STATUS: Gauge = register_gauge!(
        "queuedesk_health_status",
        "Poll loop health status (1 = running, 0 = stopped)"
    )
    .expect("Failed to create health_status metric");
}

/// Record a completed tick duration
pub fn record_tick_duration(duration_secs: f64) {
    TICK_DURATION.observe(duration_secs);
}

/// Record a tick outcome ("success" or "error")
pub fn record_tick(status: &str) {
    TICKS.with_label_values(&[status]).inc();
}

/// Record a failed store operation
pub fn record_store_error(operation: &str) {
    STORE_ERRORS.with_label_values(&[operation]).inc();
}

pub fn record_notification(signal: &str) {
    NOTIFICATIONS.with_label_values(&[signal]).inc();
}

pub fn record_ticket_issued() {
    TICKETS_ISSUED.inc();
}

pub fn record_ticket_called() {
    TICKETS_CALLED.inc();
}

/// Set retained waiting/called counts
pub fn set_queue_depth(waiting: usize, called: usize) {
    QUEUE_DEPTH
        .with_label_values(&["waiting"])
        .set(waiting as f64);
    QUEUE_DEPTH.with_label_values(&["called"]).set(called as f64);
}

/// Set health status
pub fn set_health_status(healthy: bool) {
    HEALTH_STATUS.set(if healthy { 1.0 } else { 0.0 });
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
