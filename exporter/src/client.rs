//! HTTP client for the Kubecost Allocation API
//!
//! See <https://docs.kubecost.com/apis/apis/allocation> for the API itself.

use crate::config::ApiConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hyper::client::HttpConnector;
use hyper::{Client, StatusCode, Uri};
use kubecost_shared::types::allocation::{AllocationRecord, AllocationResponse};
use kubecost_shared::utils::window_param;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Query parameter replaced by the computed time window
pub const WINDOW_PARAM: &str = "window";

/// Raised when an error or bad response is returned from the Allocation API.
///
/// Every variant's message starts with the same prefix so log searches for
/// failed fetches match all causes.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to retrieve cost allocation data from Allocation API: invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to retrieve cost allocation data from Allocation API: {0}")]
    Transport(#[source] hyper::Error),

    #[error("Failed to retrieve cost allocation data from Allocation API: unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("Failed to retrieve cost allocation data from Allocation API: unable to read response body: {0}")]
    Body(#[source] hyper::Error),

    #[error("Failed to retrieve cost allocation data from Allocation API: unable to unmarshal response JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Build the Allocation API URL for a query made at `now`.
///
/// All configured parameters are added in key order. The `window` parameter
/// holds a relative duration (30m, 12h, 7d) and is replaced by an explicit
/// `start,end` pair ending at the last whole minute; given a current time of
/// 15:04:05, windows of 1m, 30m and 1h become 15:03-15:04, 14:34-15:04 and
/// 14:04-15:04. Left relative, the API would end the window at the request
/// time and each poll would cover a slightly different span.
pub fn build_url(api: &ApiConfig, now: DateTime<Utc>) -> Result<String, FetchError> {
    let mut url = Url::parse(&format!("http://{}:{}", api.host, api.port))
        .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    url.set_path(&api.path);

    let mut params = api.parameters.clone();
    let window = params
        .get(WINDOW_PARAM)
        .map(String::as_str)
        .unwrap_or_default();
    let window = window_param(window, now);
    params.insert(WINDOW_PARAM.to_string(), window);

    url.query_pairs_mut().extend_pairs(params.iter());
    Ok(url.into())
}

/// Decode an Allocation API response body into a flat list of records.
///
/// Aggregation keys are dropped; records keep their order in the document.
pub fn decode_allocations(body: &[u8]) -> Result<Vec<AllocationRecord>, FetchError> {
    let response: AllocationResponse = serde_json::from_slice(body).map_err(FetchError::Decode)?;

    if let Some(warning) = response.warning.as_deref().filter(|w| !w.is_empty()) {
        warn!(code = response.code, "Allocation API warning: {}", warning);
    }
    if let Some(message) = response.message.as_deref().filter(|m| !m.is_empty()) {
        debug!(code = response.code, "Allocation API message: {}", message);
    }

    Ok(response.into_records())
}

/// Source of allocation records. Implemented over HTTP by
/// [`AllocationApiClient`]; tests substitute their own.
#[async_trait]
pub trait AllocationApi: Send + Sync {
    async fn get_allocation(&self, url: &str) -> Result<Vec<AllocationRecord>, FetchError>;
}

/// Allocation API client over plain HTTP
#[derive(Debug, Clone)]
pub struct AllocationApiClient {
    client: Client<HttpConnector>,
}

impl AllocationApiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for AllocationApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AllocationApi for AllocationApiClient {
    async fn get_allocation(&self, url: &str) -> Result<Vec<AllocationRecord>, FetchError> {
        let uri: Uri = url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| FetchError::InvalidUrl(e.to_string()))?;

        let response = self.client.get(uri).await.map_err(FetchError::Transport)?;
        if response.status() != StatusCode::OK {
            return Err(FetchError::UnexpectedStatus(response.status().as_u16()));
        }

        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(FetchError::Body)?;
        decode_allocations(&body)
    }
}
