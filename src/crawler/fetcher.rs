//! HTTP transport for listing pages
//!
//! This module provides the transport used by the driver with features including:
//! - Bounded retries with an optional fixed delay
//! - A politeness throttle spacing consecutive sends (governor)
//! - Bounded concurrency for window fetches
//! - Charset-aware body decoding
//!
//! Batch fetches never fail as a whole: a request whose attempts all fail is
//! logged and left out of the result.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use futures::future;
use futures::stream::{self, StreamExt};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{Client, Response};

use crate::config::Config;
use crate::crawler::request::ListingRequest;
use crate::error::ErrorExt;
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Body of one successfully fetched listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub page: u32,
    pub body: String,
}

/// Sends listing requests
///
/// Implementations only need `fetch`; `fetch_all` fans a window out over
/// `max_concurrency` in-flight requests and keeps request order.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch one request, retrying per the transport's policy
    async fn fetch(&self, request: &ListingRequest) -> Result<String, FetchError>;

    /// Upper bound on in-flight requests during `fetch_all`
    fn max_concurrency(&self) -> usize {
        1
    }

    /// Fetch a batch; failed requests are logged and omitted
    async fn fetch_all(&self, requests: &[ListingRequest]) -> Vec<FetchedPage> {
        let concurrency = self.max_concurrency().max(1);
        let pending: Vec<_> = requests
            .iter()
            .map(|request| fetch_page(self, request))
            .collect();

        stream::iter(pending)
            .buffered(concurrency)
            .filter_map(future::ready)
            .collect()
            .await
    }
}

/// Fetch one page through `transport`, logging and dropping a failure
async fn fetch_page<T>(transport: &T, request: &ListingRequest) -> Option<FetchedPage>
where
    T: Transport + ?Sized,
{
    match transport.fetch(request).await {
        Ok(body) => Some(FetchedPage {
            page: request.page,
            body,
        }),
        Err(e) => {
            tracing::warn!(
                category_code = request.category_code,
                page = request.page,
                error = %e,
                error.category = %e.category(),
                "Send request failed, page omitted"
            );
            None
        }
    }
}

/// reqwest-backed transport
pub struct HttpTransport {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Spaces consecutive sends; `None` when the throttle is disabled
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,

    /// Attempts per request
    retry: RetryConfig,

    /// In-flight bound for window fetches
    max_concurrency: usize,
}

impl HttpTransport {
    /// Create a transport from crawler configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::with_settings(
            config.request_timeout(),
            RetryConfig::with_delay(config.crawler.max_attempts, config.retry_delay()),
            config.throttle(),
            config.crawler.max_concurrent_requests,
        )
    }

    /// Create a transport with explicit settings
    ///
    /// # Arguments
    ///
    /// * `timeout` - Hard per-request timeout
    /// * `retry` - Attempts per request and delay between them
    /// * `throttle` - Minimum spacing between sends (zero disables it)
    /// * `max_concurrency` - In-flight bound for window fetches
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_settings(
        timeout: Duration,
        retry: RetryConfig,
        throttle: Duration,
        max_concurrency: usize,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .pool_max_idle_per_host(max_concurrency.max(1))
            .build()?;

        let rate_limiter = Quota::with_period(throttle)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));

        Ok(Self {
            client,
            rate_limiter,
            retry,
            max_concurrency: max_concurrency.max(1),
        })
    }

    /// Send a request once, without retry
    async fn send_once(&self, request: &ListingRequest) -> Result<String, FetchError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let url = request.url()?;
        let headers = request.header_map()?;

        tracing::debug!(url = %url, "Sending listing request");

        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(headers)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        self.decode_response(response).await
    }

    fn classify(e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(e)
        }
    }

    /// Decode response body using the charset announced in `Content-Type`
    async fn decode_response(&self, response: Response) -> Result<String, FetchError> {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let bytes = response.bytes().await.map_err(Self::classify)?;

        decode_bytes(&bytes, &content_type)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &ListingRequest) -> Result<String, FetchError> {
        let result = with_retry_if(
            &self.retry,
            || self.send_once(request),
            FetchError::is_transient,
        )
        .await;

        match result {
            Ok(body) => {
                tracing::debug!(
                    category_code = request.category_code,
                    page = request.page,
                    bytes = body.len(),
                    "Send completed"
                );
                Ok(body)
            }
            Err(exhausted) if exhausted.last_error.is_transient() => {
                Err(FetchError::RetriesExhausted {
                    url: request
                        .url()
                        .map(|u| u.to_string())
                        .unwrap_or_else(|_| request.endpoint.clone()),
                    attempts: exhausted.attempts,
                })
            }
            Err(exhausted) => Err(exhausted.last_error),
        }
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

/// Decode bytes to a UTF-8 string
///
/// Uses the `charset` parameter of `content_type` when it names a known
/// encoding, UTF-8 otherwise.
///
/// # Errors
///
/// Returns `FetchError::Decode` if the bytes are invalid in that encoding
pub fn decode_bytes(bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
    let encoding = charset_of(content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let (cow, _encoding, had_errors) = encoding.decode(bytes);

    if had_errors {
        return Err(FetchError::Decode(format!(
            "{} decoding errors",
            encoding.name()
        )));
    }

    Ok(cow.into_owned())
}

fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}
