//! End to end: configuration -> poll -> gauges -> scrape output.

use chrono::{DateTime, Utc};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use kubecost_exporter::client::AllocationApiClient;
use kubecost_exporter::config::ExporterConfig;
use kubecost_exporter::gauges::{AllocationGauges, UpdateSummary};
use kubecost_exporter::metrics::encode_metrics;
use kubecost_exporter::poller::Poller;
use kubecost_exporter::schema::MetricSchema;
use prometheus::Registry;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

const RESPONSE: &str = r#"{
    "code": 200,
    "status": "success",
    "data": [
        {
            "cluster-one/kube-system": {
                "name": "cluster-one/kube-system",
                "properties": {
                    "cluster": "cluster-one",
                    "namespace": "kube-system",
                    "services": ["kube-dns", "coredns"],
                    "labels": {"team": "platform", "app": "dns"}
                },
                "window": {"start": "1970-01-01T01:32:00Z", "end": "1970-01-01T01:33:00Z"},
                "start": "1970-01-01T01:32:00Z",
                "end": "1970-01-01T01:33:00Z",
                "cpuCost": 0.75,
                "totalCost": 1.5
            },
            "cluster-one/default": {
                "name": "cluster-one/default",
                "properties": {"cluster": "cluster-one", "namespace": "default"},
                "cpuCost": 0.25,
                "totalCost": 0.5
            }
        }
    ]
}"#;

fn config(port: u16) -> ExporterConfig {
    ExporterConfig::from_yaml(&format!(
        r#"
api:
  host: 127.0.0.1
  port: {port}
  path: /allocation/compute
  parameters:
    window: 30m
    aggregate: cluster,namespace
server:
  port: 9090
  path: /metrics
  update_interval: 1m
metrics:
  namespace: pipeline
  subsystem: allocation
  names:
    - name: total_cost
      field: TotalCost
    - name: cpu_cost
      field: CPUCost
  labels:
    - name: cluster
      key: cluster
    - name: namespace
      key: namespace
    - name: services
      key: services
    - name: app
      key: labels.app
"#
    ))
    .unwrap()
}

/// Serve RESPONSE and remember the last request URI.
fn spawn_upstream(seen: Arc<Mutex<Option<String>>>) -> SocketAddr {
    let make_svc = make_service_fn(move |_| {
        let seen = seen.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let seen = seen.clone();
                async move {
                    *seen.lock().unwrap() = Some(req.uri().to_string());
                    Ok::<_, Infallible>(Response::new(Body::from(RESPONSE)))
                }
            }))
        }
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let addr = server.local_addr();
    tokio::spawn(server);
    addr
}

#[tokio::test]
async fn test_poll_update_and_scrape() {
    let seen = Arc::new(Mutex::new(None));
    let addr = spawn_upstream(seen.clone());
    let config = config(addr.port());

    let schema = MetricSchema::from_config(&config.metrics).unwrap();
    let gauges = Arc::new(AllocationGauges::new(schema).unwrap());
    let registry = Registry::new();
    gauges.register(&registry).unwrap();

    let poller = Poller::from_config(AllocationApiClient::new(), &config, gauges);
    let now: DateTime<Utc> = DateTime::parse_from_rfc3339("1970-01-01T01:33:07Z")
        .unwrap()
        .with_timezone(&Utc);
    let summary = poller.poll_once(now).await.unwrap();
    assert_eq!(
        summary,
        UpdateSummary { records: 2, updated: 4, skipped: 0 }
    );

    let uri = seen.lock().unwrap().clone().unwrap();
    assert_eq!(
        uri,
        "/allocation/compute?aggregate=cluster%2Cnamespace&window=1970-01-01T01%3A03%3A00Z%2C1970-01-01T01%3A33%3A00Z"
    );

    let text = encode_metrics(&registry).unwrap();
    assert!(text.contains(
        r#"pipeline_allocation_total_cost{app="dns",cluster="cluster-one",namespace="kube-system",services="coredns,kube-dns"} 1.5"#
    ));
    assert!(text.contains(
        r#"pipeline_allocation_cpu_cost{app="",cluster="cluster-one",namespace="default",services=""} 0.25"#
    ));
}
