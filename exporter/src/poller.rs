//! Background polling loop
//!
//! Each tick builds the query URL for the current instant, fetches
//! allocations and updates the gauges before waiting for the next tick, so
//! at most one fetch is in flight. Fetch failures are logged and the loop
//! carries on with the next tick.

use crate::audit;
use crate::client::{build_url, AllocationApi, FetchError};
use crate::config::{ApiConfig, ExporterConfig};
use crate::gauges::{AllocationGauges, UpdateSummary};
use crate::metrics;
use chrono::{DateTime, Utc};
use kubecost_shared::utils::time::{duration_or_default, DEFAULT_DURATION};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Polls the Allocation API and feeds the gauges
pub struct Poller<A> {
    api: A,
    api_config: ApiConfig,
    gauges: Arc<AllocationGauges>,
    interval: Duration,
    ready: Arc<AtomicBool>,
}

impl<A: AllocationApi + 'static> Poller<A> {
    /// A zero interval is replaced by the 1m default.
    pub fn new(
        api: A,
        api_config: ApiConfig,
        gauges: Arc<AllocationGauges>,
        interval: Duration,
    ) -> Self {
        let interval = if interval.is_zero() {
            warn!("Update interval must be greater than 0. Defaulting to 1m");
            DEFAULT_DURATION
        } else {
            interval
        };

        Self {
            api,
            api_config,
            gauges,
            interval,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Poller for `config.api`, ticking every `server.update_interval`
    pub fn from_config(api: A, config: &ExporterConfig, gauges: Arc<AllocationGauges>) -> Self {
        let interval = duration_or_default(&config.server.update_interval, "update_interval");
        Self::new(api, config.api.clone(), gauges, interval)
    }

    /// Share a flag that is set once a poll has updated the gauges
    pub fn with_ready_flag(mut self, ready: Arc<AtomicBool>) -> Self {
        self.ready = ready;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fetch allocations for a query made at `now` and update the gauges.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Result<UpdateSummary, FetchError> {
        let url = build_url(&self.api_config, now)?;
        debug!(url = %url, "Fetching allocations");

        let start = Instant::now();
        let result = self.api.get_allocation(&url).await;
        metrics::FETCH_DURATION.observe(start.elapsed().as_secs_f64());

        let records = match result {
            Ok(records) => {
                metrics::FETCH_TOTAL.with_label_values(&["ok"]).inc();
                records
            }
            Err(e) => {
                metrics::FETCH_TOTAL.with_label_values(&["error"]).inc();
                return Err(e);
            }
        };
        metrics::ALLOCATIONS_FETCHED.set(records.len() as f64);

        let summary = self.gauges.update(&records);
        metrics::LAST_SUCCESS_TIMESTAMP.set(Utc::now().timestamp() as f64);
        self.ready.store(true, Ordering::Release);
        audit::poll_completed(summary.records, summary.updated, summary.skipped);
        Ok(summary)
    }

    /// Poll immediately, then once per interval, until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.poll_once(Utc::now()) => {
                    if let Err(e) = result {
                        warn!("{}", e);
                    }
                }
            }
        }
        debug!("Poller stopped");
    }

    /// Run the loop on a background task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
