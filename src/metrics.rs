use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Instant;

use crate::{DashQueryError, Result};

lazy_static! {
    // Planner metrics
    pub static ref QUERIES_TOTAL: IntCounter = register_int_counter!(
        "dashquery_queries_total",
        "Total number of panel queries planned"
    ).unwrap();

    pub static ref QUERY_DURATION: Histogram = register_histogram!(
        "dashquery_query_duration_seconds",
        "Panel query duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]
    ).unwrap();

    pub static ref SERIES_RETURNED: IntCounter = register_int_counter!(
        "dashquery_series_returned_total",
        "Total number of series handed back to callers"
    ).unwrap();

    // Transport metrics
    pub static ref BATCH_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "dashquery_batch_requests_total",
        "Total number of batched fetch calls issued",
        &["kind"]
    ).unwrap();

    pub static ref TRANSPORT_FAILURES: IntCounter = register_int_counter!(
        "dashquery_transport_failures_total",
        "Total number of failed batched fetch calls"
    ).unwrap();
}

pub fn init_metrics() {
    lazy_static::initialize(&QUERIES_TOTAL);
    lazy_static::initialize(&QUERY_DURATION);
    lazy_static::initialize(&SERIES_RETURNED);
    lazy_static::initialize(&BATCH_REQUESTS);
    lazy_static::initialize(&TRANSPORT_FAILURES);
}

pub struct QueryTimer {
    start: Instant,
}

impl QueryTimer {
    pub fn new() -> Self {
        QUERIES_TOTAL.inc();
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for QueryTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for QueryTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        QUERY_DURATION.observe(duration);
    }
}

pub fn record_batch_request(kind: &str) {
    BATCH_REQUESTS.with_label_values(&[kind]).inc();
}

pub fn record_transport_failure() {
    TRANSPORT_FAILURES.inc();
}

pub fn record_series(count: usize) {
    SERIES_RETURNED.inc_by(count as u64);
}

/// Renders every registered collector in the Prometheus text format.
pub fn gather_text() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| DashQueryError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| DashQueryError::Internal(format!("Metrics are not UTF-8: {}", e)))
}
