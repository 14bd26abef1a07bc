//! Kubecost exporter
//!
//! Polls the Kubecost Allocation API on a fixed interval and exposes the
//! configured allocation fields as Prometheus gauges.

use anyhow::{Context, Result};
use clap::Parser;
use kubecost_exporter::{
    audit,
    client::AllocationApiClient,
    config::{ConfigSource, ExporterConfig, DEFAULT_CONFIG_PATH},
    gauges::AllocationGauges,
    poller::Poller,
    schema::MetricSchema,
    server::http::{self, ServerState},
};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "kubecost-exporter")]
#[command(about = "Prometheus exporter for Kubecost cost allocation data", long_about = None)]
#[command(version)]
struct Args {
    /// Directory containing default.yaml
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config_path: String,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let location = ConfigSource::default_in(&args.config_path).location();
    let (config, warning) = ExporterConfig::load_from_dir(&args.config_path)
        .with_context(|| format!("Failed to load {}", location))?;
    if let Some(e) = warning {
        warn!("Error during configuration: {}", e);
    }
    audit::config_loaded(
        &location,
        config.metrics.names.len(),
        config.metrics.labels.len(),
    );

    // Allocation gauges only; operational metrics stay in the default registry.
    let schema = MetricSchema::from_config(&config.metrics).context("Invalid metric schema")?;
    let gauges = Arc::new(AllocationGauges::new(schema).context("Invalid metric schema")?);
    let registry = Registry::new();
    gauges
        .register(&registry)
        .context("Failed to register metrics")?;

    let cancel = CancellationToken::new();
    let ready = Arc::new(AtomicBool::new(false));

    let poller = Poller::from_config(AllocationApiClient::new(), &config, gauges)
        .with_ready_flag(ready.clone());
    info!(
        "Polling {}:{}{} every {:?}",
        config.api.host,
        config.api.port,
        config.api.path,
        poller.interval()
    );
    let poll_handle = poller.spawn(cancel.clone());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, stopping...");
        }
        shutdown.cancel();
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let state = Arc::new(ServerState::new(registry, config.server.path.clone(), ready));
    http::serve(addr, state, cancel.clone())
        .await
        .context("Metrics server error")?;

    cancel.cancel();
    poll_handle.await.context("Poller task failed")?;
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
