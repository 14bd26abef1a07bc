//! Prometheus metrics about the exporter itself
//!
//! Allocation gauges live in their own registry (see [`crate::gauges`]); the
//! statics below are registered in the default registry and appended to the
//! scrape output by [`encode_metrics`].

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, Registry, TextEncoder,
};

// ── Fetch metrics ────────────────────────────────────────────────────────────

pub static FETCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "kubecost_exporter_fetch_total",
        "Allocation API requests by outcome",
        &["status"]
    )
    .unwrap()
});

pub static FETCH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "kubecost_exporter_fetch_duration_seconds",
        "Allocation API request latency",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap()
});

pub static ALLOCATIONS_FETCHED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "kubecost_exporter_allocations",
        "Allocation records returned by the last successful fetch"
    )
    .unwrap()
});

// ── Update metrics ───────────────────────────────────────────────────────────

pub static LABEL_MISMATCH_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "kubecost_exporter_label_mismatch_total",
        "Gauge updates skipped because the label set did not match the metric"
    )
    .unwrap()
});

pub static LAST_SUCCESS_TIMESTAMP: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "kubecost_exporter_last_success_timestamp_seconds",
        "Unix time of the last poll that updated metrics"
    )
    .unwrap()
});

/// Render the allocation registry followed by the exporter's own metrics
/// in Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut families = registry.gather();
    families.extend(prometheus::gather());

    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
