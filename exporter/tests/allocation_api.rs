//! AllocationApiClient against a local HTTP server.

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use kubecost_exporter::client::{AllocationApi, AllocationApiClient, FetchError};
use std::convert::Infallible;
use std::net::SocketAddr;

/// Serve `body` with `status` for every request; returns the bound address.
fn spawn_upstream(status: StatusCode, body: &'static str) -> SocketAddr {
    let make_svc = make_service_fn(move |_| async move {
        Ok::<_, Infallible>(service_fn(move |_req: Request<Body>| async move {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            Ok::<_, Infallible>(response)
        }))
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let addr = server.local_addr();
    tokio::spawn(server);
    addr
}

fn url(addr: SocketAddr) -> String {
    format!("http://{}/allocation/compute?window=1m", addr)
}

#[tokio::test]
async fn test_get_allocation_flattens_buckets() {
    let addr = spawn_upstream(
        StatusCode::OK,
        r#"{
            "code": 200,
            "status": "success",
            "data": [
                {"kube-system": {"name": "kube-system", "properties": {"namespace": "kube-system"}, "totalCost": 1.25}},
                {"default": {"name": "default", "properties": {"namespace": "default"}, "totalCost": 0.5},
                 "monitoring": {"name": "monitoring", "totalCost": 2.0}}
            ]
        }"#,
    );

    let records = AllocationApiClient::new()
        .get_allocation(&url(addr))
        .await
        .unwrap();

    let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["kube-system", "default", "monitoring"]);
    assert_eq!(records[0].total_cost, 1.25);
}

#[tokio::test]
async fn test_get_allocation_empty_data() {
    let addr = spawn_upstream(StatusCode::OK, r#"{"code": 200, "status": "success", "data": []}"#);

    let records = AllocationApiClient::new()
        .get_allocation(&url(addr))
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_get_allocation_bad_status() {
    let addr = spawn_upstream(StatusCode::INTERNAL_SERVER_ERROR, "boom");

    let err = AllocationApiClient::new()
        .get_allocation(&url(addr))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::UnexpectedStatus(500)));
    assert_eq!(
        err.to_string(),
        "Failed to retrieve cost allocation data from Allocation API: unexpected status code: 500"
    );
}

#[tokio::test]
async fn test_get_allocation_bad_json() {
    let addr = spawn_upstream(StatusCode::OK, r#"{"code": 200, "data": "#);

    let err = AllocationApiClient::new()
        .get_allocation(&url(addr))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn test_get_allocation_connection_refused() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = AllocationApiClient::new()
        .get_allocation(&url(addr))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test]
async fn test_get_allocation_invalid_url() {
    let err = AllocationApiClient::new()
        .get_allocation("not a url")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl(_)));
}
