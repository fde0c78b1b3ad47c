//! HTTP client utilities.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use super::retry::{source_retry_config, with_retry, RetryConfig};
use crate::sources::SourceError;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP client with timeouts, status classification and retries
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    retry: RetryConfig,
}

impl HttpClient {
    /// Create a client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            retry: source_retry_config(),
        })
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Send a request, retrying transient failures.
    ///
    /// `build` is called once per attempt. Non-success statuses are mapped to
    /// [`SourceError`]: 404 is `NotFound`, 429 is `RateLimit`, 5xx is
    /// `Server`, anything else is `Api`.
    pub async fn send<F>(&self, build: F) -> Result<Response, SourceError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        with_retry(self.retry, || {
            let request = build(self.client.as_ref());
            async move {
                let response = request.send().await?;
                check_status(response)
            }
        })
        .await
    }
}

fn retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Map an HTTP status to the source error taxonomy
pub fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    tracing::debug!("HTTP {} for {}", status, url);

    match status {
        StatusCode::NOT_FOUND => Err(SourceError::NotFound(url)),
        StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimit(retry_after(&response))),
        s if s.is_server_error() => Err(SourceError::Server(format!("HTTP {} for {}", s, url))),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::Api(format!(
            "HTTP {} for {} (check the API key)",
            status, url
        ))),
        s => Err(SourceError::Api(format!("HTTP {} for {}", s, url))),
    }
}
