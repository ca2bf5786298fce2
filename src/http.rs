// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tracing::{debug, warn};

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// HTTP response with status, content length, and body stream
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

/// HTTP client abstraction for testability
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a HEAD request and return the status code
    async fn head(&self, url: &str) -> Result<u16, reqwest::Error>;

    /// Fetch the entire response body as bytes, failing on non-success status
    async fn get_bytes(&self, url: &str) -> Result<Bytes, reqwest::Error>;

    /// Get a streaming response for large downloads
    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error>;
}

/// Connection-level retry applied to every request, independent of any
/// retry loop the caller runs on top
#[derive(Debug, Clone)]
pub struct ConnectionRetry {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for every further retry
    pub base_delay: Duration,
    /// Status codes that trigger a retry
    pub retry_statuses: Vec<u16>,
}

impl Default for ConnectionRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            retry_statuses: vec![500, 502, 503, 504, 520, 521, 522, 524],
        }
    }
}

impl ConnectionRetry {
    /// Delay after the given (1-based) failed attempt
    fn delay_after(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(multiplier)
    }

    fn retries_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

const HEAD_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    retry: ConnectionRetry,
}

impl ReqwestClient {
    /// Create a new ReqwestClient with default settings
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self::with_client(client)
    }

    /// Create a new ReqwestClient with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            retry: ConnectionRetry::default(),
        }
    }

    /// Replace the connection-level retry policy
    pub fn with_retry(mut self, retry: ConnectionRetry) -> Self {
        self.retry = retry;
        self
    }

    async fn send<F>(&self, build: F) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let last_attempt = attempt >= self.retry.max_attempts;

            match build().send().await {
                Ok(response)
                    if !last_attempt && self.retry.retries_status(response.status().as_u16()) =>
                {
                    debug!(
                        url = %response.url(),
                        status = response.status().as_u16(),
                        attempt,
                        "Retrying request after gateway status"
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if !last_attempt && is_transient(&e) => {
                    warn!(attempt, error = %e, "Retrying request after connection error");
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(self.retry.delay_after(attempt)).await;
        }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn head(&self, url: &str) -> Result<u16, reqwest::Error> {
        let response = self
            .send(|| self.client.head(url).timeout(HEAD_TIMEOUT))
            .await?;
        Ok(response.status().as_u16())
    }

    async fn get_bytes(&self, url: &str) -> Result<Bytes, reqwest::Error> {
        self.send(|| self.client.get(url))
            .await?
            .error_for_status()?
            .bytes()
            .await
    }

    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let response = self.send(|| self.client.get(url)).await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body: ByteStream = Box::pin(response.bytes_stream());

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}
