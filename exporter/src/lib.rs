//! Kubecost allocation exporter library
//!
//! Polls the Kubecost Allocation API, maps allocation fields onto gauges
//! described by configuration and serves them for Prometheus to scrape.

pub mod audit;
pub mod client;
pub mod config;
pub mod gauges;
pub mod metrics;
pub mod poller;
pub mod schema;
pub mod server;
