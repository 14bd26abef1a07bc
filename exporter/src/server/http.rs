//! Scrape HTTP server serving metrics and health checks

use crate::audit;
use crate::metrics;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// State shared by all requests
pub struct ServerState {
    /// Registry holding the allocation gauges
    pub registry: Registry,

    /// Path serving the metrics, e.g. `/metrics`
    pub metrics_path: String,

    /// Set by the poller after the first successful update
    pub ready: Arc<AtomicBool>,
}

impl ServerState {
    pub fn new(registry: Registry, metrics_path: impl Into<String>, ready: Arc<AtomicBool>) -> Self {
        Self {
            registry,
            metrics_path: metrics_path.into(),
            ready,
        }
    }
}

/// Serve the metrics path, /healthz and /readyz until `cancel` fires.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<ServerState>,
    cancel: CancellationToken,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req: Request<Body>| {
                let state = state.clone();
                async move { handle(req, &state) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    tracing::info!("Metrics server listening on {}", server.local_addr());
    server
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

fn text(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

pub(crate) fn handle(
    req: Request<Body>,
    state: &ServerState,
) -> Result<Response<Body>, hyper::Error> {
    let path = req.uri().path();

    let response = if path == state.metrics_path {
        match metrics::encode_metrics(&state.registry) {
            Ok(body) => {
                let mut response = text(StatusCode::OK, body);
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_FORMAT));
                response
            }
            Err(e) => {
                tracing::error!("Failed to encode metrics: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n")
            }
        }
    } else {
        match path {
            "/healthz" => text(StatusCode::OK, "ok\n"),
            "/readyz" if state.ready.load(Ordering::Acquire) => text(StatusCode::OK, "ready\n"),
            "/readyz" => text(StatusCode::SERVICE_UNAVAILABLE, "not ready\n"),
            _ => text(StatusCode::NOT_FOUND, "not found\n"),
        }
    };

    if path == state.metrics_path || path == "/readyz" || path == "/healthz" {
        audit::http_request(path, response.status().as_u16());
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Gauge, Opts};

    fn state(ready: bool) -> ServerState {
        let registry = Registry::new();
        let gauge = Gauge::with_opts(Opts::new("http_test_gauge", "test gauge")).unwrap();
        gauge.set(3.0);
        registry.register(Box::new(gauge)).unwrap();
        ServerState::new(registry, "/metrics", Arc::new(AtomicBool::new(ready)))
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_path() {
        let response = handle(get("/metrics"), &state(true)).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_FORMAT);
        assert!(body_string(response).await.contains("http_test_gauge 3"));
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let mut s = state(true);
        s.metrics_path = "/costs".into();
        assert_eq!(handle(get("/costs"), &s).unwrap().status(), StatusCode::OK);
        assert_eq!(handle(get("/metrics"), &s).unwrap().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_and_readiness() {
        assert_eq!(handle(get("/healthz"), &state(false)).unwrap().status(), StatusCode::OK);
        assert_eq!(
            handle(get("/readyz"), &state(false)).unwrap().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(handle(get("/readyz"), &state(true)).unwrap().status(), StatusCode::OK);
        assert_eq!(
            handle(get("/nope"), &state(true)).unwrap().status(),
            StatusCode::NOT_FOUND
        );
    }
}
