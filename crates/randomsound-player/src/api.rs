//! Client side of the metadata API: endpoint URLs, response parsing and the
//! fetcher the controller dispatches random-track requests through.

use std::time::Duration;

use randomsound_proto::config::ApiConfig;
use randomsound_proto::filter::Selection;
use randomsound_proto::protocol::{RandomResponse, TrackMetadata};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::ControllerEvent;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("server answered HTTP {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if let Some(status) = e.status() {
            ApiError::Status(status.as_u16())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// URLs relative to the API base.  The base always ends in `/`.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    base: String,
}

impl ApiEndpoints {
    pub fn new(base_url: &str) -> Self {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self { base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn random_url(&self, selection: Selection) -> String {
        format!("{}{}", self.base, selection.endpoint())
    }

    pub fn stream_url(&self, path: &str) -> String {
        format!("{}stream/{}", self.base, path.trim_start_matches('/'))
    }
}

/// Parse a `random` response body into the first track it names.
pub fn parse_random_response(body: &str) -> Result<TrackMetadata, ApiError> {
    let response: RandomResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Malformed(e.to_string()))?;
    let record = response
        .data
        .and_then(|mut data| (!data.is_empty()).then(|| data.swap_remove(0)))
        .ok_or_else(|| ApiError::Malformed("no data".to_string()))?;
    TrackMetadata::from_record(record).ok_or_else(|| ApiError::Malformed("empty path".to_string()))
}

pub async fn fetch_random(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<TrackMetadata, ApiError> {
    let response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status(status.as_u16()));
    }
    let body = response.text().await?;
    parse_random_response(&body)
}

/// One attempt of a fetch chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub generation: u64,
    pub attempt: u32,
    pub selection: Selection,
}

/// Starts fetches without waiting for them.  The outcome comes back to the
/// controller as a `ControllerEvent::FetchCompleted`.
pub trait TrackFetcher: Send {
    fn dispatch(&self, request: FetchRequest);
}

pub struct HttpFetcher {
    client: reqwest::Client,
    endpoints: ApiEndpoints,
    timeout: Duration,
    events: mpsc::Sender<ControllerEvent>,
}

impl HttpFetcher {
    pub fn new(config: &ApiConfig, events: mpsc::Sender<ControllerEvent>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("randomsound/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoints: ApiEndpoints::new(&config.base_url),
            timeout: Duration::from_millis(config.request_timeout_ms),
            events,
        })
    }
}

impl TrackFetcher for HttpFetcher {
    fn dispatch(&self, request: FetchRequest) {
        let client = self.client.clone();
        let url = self.endpoints.random_url(request.selection);
        let timeout = self.timeout;
        let events = self.events.clone();
        tokio::spawn(async move {
            debug!(
                "fetch gen={} attempt={} {}",
                request.generation, request.attempt, url
            );
            let outcome = fetch_random(&client, &url, timeout).await;
            if let Err(e) = &outcome {
                warn!("fetch gen={} attempt={} failed: {}", request.generation, request.attempt, e);
            }
            let _ = events
                .send(ControllerEvent::FetchCompleted {
                    generation: request.generation,
                    outcome,
                })
                .await;
        });
    }
}
