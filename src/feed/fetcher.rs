use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use super::charset;
use super::parser::parse_rss;
use super::source::{RawItem, Source};

/// Feeds larger than this are refused rather than buffered.
const MAX_FEED_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Why one feed could not be turned into raw items.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The server answered with a non-2xx status.
    #[error("Feed server returned status {0}")]
    HttpStatus(u16),
    #[error("Feed request timed out")]
    Timeout,
    #[error("Feed body exceeds {} bytes", MAX_FEED_BYTES)]
    ResponseTooLarge,
    /// The connection closed before `Content-Length` bytes arrived.
    #[error("Feed body truncated: got {received} of {expected} bytes")]
    IncompleteResponse { expected: u64, received: usize },
    /// The body is not a readable RSS document.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// True for failures of the document itself rather than its transport.
    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Decode(_))
    }
}

/// The capability the aggregator uses to obtain a feed's entries.
///
/// Implementations own their timeout and transport policy; the caller
/// imposes none.
pub trait FetchSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        source: &'a Source,
    ) -> impl Future<Output = Result<Vec<RawItem>, FetchError>> + Send + 'a;
}

/// Fetches RSS documents over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_TIMEOUT)
    }
}

impl HttpFetcher {
    /// Request, status check and body read, without a deadline.
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_body(response, MAX_FEED_BYTES).await
    }
}

impl FetchSource for HttpFetcher {
    async fn fetch<'a>(&'a self, source: &'a Source) -> Result<Vec<RawItem>, FetchError> {
        tracing::debug!(feed = %source.url, name = %source.name, "Fetching feed");

        // One deadline for the whole exchange, headers and body together.
        let bytes = tokio::time::timeout(self.timeout, self.download(&source.url))
            .await
            .map_err(|_| FetchError::Timeout)??;

        let text = charset::decode(&bytes, source.decoding)?;
        let items = parse_rss(&text)?;

        tracing::debug!(feed = %source.url, items = items.len(), "Fetched feed");
        Ok(items)
    }
}

/// Buffers the response body, giving up as soon as it passes `limit`.
async fn read_body(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    let declared = response.content_length();
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(FetchError::ResponseTooLarge);
    }

    let mut body = Vec::with_capacity(declared.map_or(0, |len| len as usize));
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    match declared {
        Some(expected) if (body.len() as u64) < expected => Err(FetchError::IncompleteResponse {
            expected,
            received: body.len(),
        }),
        _ => Ok(body),
    }
}
