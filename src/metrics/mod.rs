//! Metrics module
//!
//! Prometheus metrics for relayed uploads.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec,
};

lazy_static! {
    // Relay metrics
    pub static ref RELAYS_TOTAL: CounterVec = register_counter_vec!(
        "tg_uploadr_relays_total",
        "Total number of relay attempts to Telegram",
        &["destination_kind", "status"]  // status: "success", "failure" or "error"
    ).unwrap();

    pub static ref RELAY_BYTES_TOTAL: Counter = register_counter!(
        "tg_uploadr_relay_bytes_total",
        "Total bytes delivered to Telegram"
    ).unwrap();

    pub static ref RELAY_DURATION: HistogramVec = register_histogram_vec!(
        "tg_uploadr_relay_duration_seconds",
        "Telegram sendDocument duration in seconds",
        &["status"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // Rejected uploads
    pub static ref REJECTED_UPLOADS: CounterVec = register_counter_vec!(
        "tg_uploadr_rejected_uploads_total",
        "Uploads rejected before reaching Telegram",
        &["reason"]
    ).unwrap();
}

/// Record a delivered document
pub fn record_relay_success(destination_kind: &str, bytes: u64) {
    RELAYS_TOTAL
        .with_label_values(&[destination_kind, "success"])
        .inc();
    RELAY_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a structured relay failure
pub fn record_relay_failure(destination_kind: &str) {
    RELAYS_TOTAL
        .with_label_values(&[destination_kind, "failure"])
        .inc();
}

/// Record a relay that ended in a transport error
pub fn record_relay_error(destination_kind: &str) {
    RELAYS_TOTAL
        .with_label_values(&[destination_kind, "error"])
        .inc();
}

/// Record relay duration
pub fn record_relay_duration(status: &str, duration_secs: f64) {
    RELAY_DURATION
        .with_label_values(&[status])
        .observe(duration_secs);
}

/// Record an upload rejected by validation
pub fn record_rejected_upload(reason: &str) {
    REJECTED_UPLOADS.with_label_values(&[reason]).inc();
}
