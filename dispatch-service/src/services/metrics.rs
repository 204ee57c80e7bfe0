//! Prometheus metrics for dispatch-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for dispatch requests by mode (webhook/crm) and status.
pub static DISPATCHES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dispatch_requests_total",
        "Total number of dispatch requests",
        &["mode", "status"]
    )
    .expect("Failed to register DISPATCHES")
});

/// Counter for individual delivery attempts by channel and outcome.
pub static DELIVERY_ATTEMPTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dispatch_delivery_attempts_total",
        "Total number of delivery attempts",
        &["channel", "outcome"]
    )
    .expect("Failed to register DELIVERY_ATTEMPTS")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "dispatch_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DISPATCHES);
    Lazy::force(&DELIVERY_ATTEMPTS);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Record a dispatch request.
pub fn record_dispatch(mode: &str, status: &str) {
    DISPATCHES.with_label_values(&[mode, status]).inc();
}

/// Record a delivery attempt.
pub fn record_delivery_attempt(channel: &str, outcome: &str) {
    DELIVERY_ATTEMPTS.with_label_values(&[channel, outcome]).inc();
}
