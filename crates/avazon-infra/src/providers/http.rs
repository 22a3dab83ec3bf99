//! HTTP plumbing shared by the generation providers: status checks, JSON
//! decoding, artifact downloads, and bounded status polling.

use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use tracing::debug;

use avazon_core::generation::GeneratedMedia;
use avazon_types::error::ProviderError;
use avazon_types::storage::{MAX_BLOB_SIZE_BYTES, mime_for_name};

const USER_AGENT: &str = concat!("avazon/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client for a provider.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Send a request and fail on any non-2xx status.
pub(crate) async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Request(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Send a request and decode its JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, ProviderError> {
    let response = send(request).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::Request(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Download a finished artifact. The MIME type comes from the
/// `Content-Type` header, falling back to the URL's extension.
pub(crate) async fn fetch_media(client: &reqwest::Client, url: &str) -> Result<GeneratedMedia, ProviderError> {
    let response = send(client.get(url)).await?;
    let header_mime = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::Request(e.to_string()))?;
    if bytes.len() > MAX_BLOB_SIZE_BYTES {
        return Err(ProviderError::Generation(format!(
            "artifact is {} bytes, limit is {MAX_BLOB_SIZE_BYTES}",
            bytes.len()
        )));
    }

    let mime = header_mime
        .filter(|m| !m.is_empty() && m != "application/octet-stream")
        .unwrap_or_else(|| mime_for_name(url).to_string());
    Ok(GeneratedMedia::new(bytes.to_vec(), mime))
}

/// Outcome of a single status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollStatus<T> {
    Pending,
    Ready(T),
}

/// Repeats a status check at a fixed interval until it is ready, fails,
/// or `max_polls` checks have been made.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Poller {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Poller {
    pub(crate) fn new(interval: Duration, max_polls: u32) -> Self {
        Self { interval, max_polls }
    }

    pub(crate) async fn run<T, F, Fut>(&self, mut check: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollStatus<T>, ProviderError>>,
    {
        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.interval).await;
            match check().await? {
                PollStatus::Ready(value) => return Ok(value),
                PollStatus::Pending => debug!(attempt, "job still pending"),
            }
        }
        Err(ProviderError::Timeout(self.max_polls))
    }
}
