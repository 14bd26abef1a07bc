//! Operational events.
//!
//! Events are emitted via `tracing` with a dedicated target so they can be
//! filtered and formatted (e.g. JSON) separately from diagnostic logs.

use tracing::info;

const AUDIT_TARGET: &str = "kubecost_exporter::audit";

/// Log the configuration the exporter started with.
pub fn config_loaded(location: &str, metrics: usize, labels: usize) {
    info!(
        target: AUDIT_TARGET,
        event = "config_loaded",
        location = %location,
        metrics = metrics,
        labels = labels,
    );
}

/// Log one completed poll cycle.
pub fn poll_completed(records: usize, updated: usize, skipped: usize) {
    info!(
        target: AUDIT_TARGET,
        event = "poll_completed",
        records = records,
        updated = updated,
        skipped = skipped,
    );
}

/// Log a request to the scrape server.
pub fn http_request(path: &str, status: u16) {
    info!(
        target: AUDIT_TARGET,
        event = "http_request",
        path = %path,
        status = %status,
    );
}
