//! Listing request construction
//!
//! Builds the POST the listing endpoint expects for one category and page.
//! Construction is pure: the same inputs always give an equal request.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

use crate::config::CrawlerConfig;
use crate::utils::error::FetchError;
use crate::utils::extract_domain;

/// Host the listing endpoint insists on seeing in the `Host` header
const NAVER_NEWS_HOST: &str = "news.naver.com";

/// A ready-to-send listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub category_code: u32,
    pub page: u32,
    pub method: Method,
    pub endpoint: String,
    /// Header name/value pairs in insertion order
    pub headers: Vec<(&'static str, String)>,
    /// Query parameters in insertion order
    pub query: Vec<(&'static str, String)>,
}

impl ListingRequest {
    /// Full URL including the encoded query string
    pub fn url(&self) -> Result<Url, FetchError> {
        Url::parse_with_params(&self.endpoint, &self.query)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", self.endpoint)))
    }

    /// Headers as a reqwest `HeaderMap`
    pub fn header_map(&self) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidUrl(format!("header {name}: {e}")))?;
            headers.insert(HeaderName::from_static(name), value);
        }
        Ok(headers)
    }
}

/// Builds listing requests for a fixed endpoint and user agent
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint: String,
    user_agent: String,
    send_host: bool,
}

impl RequestBuilder {
    /// Create a builder for the given endpoint
    ///
    /// The `Host` header is only pinned when the endpoint really is the
    /// Naver News host, so local mock servers keep working.
    pub fn new(endpoint: &str, user_agent: &str) -> Self {
        let send_host = extract_domain(endpoint)
            .map(|host| host == NAVER_NEWS_HOST)
            .unwrap_or(false);

        Self {
            endpoint: endpoint.to_string(),
            user_agent: user_agent.to_string(),
            send_host,
        }
    }

    /// Create a builder from crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(&config.endpoint, &config.user_agent)
    }

    /// Build the request for one category page
    ///
    /// # Examples
    ///
    /// ```
    /// use sinmun::crawler::request::RequestBuilder;
    ///
    /// let builder = RequestBuilder::new("https://news.naver.com/main/mainNews.naver", "curl/7.64.1");
    /// let request = builder.build(101, 3);
    /// let url = request.url().unwrap();
    /// assert_eq!(url.as_str(), "https://news.naver.com/main/mainNews.naver?sid1=101&page=3");
    /// ```
    #[must_use]
    pub fn build(&self, category_code: u32, page: u32) -> ListingRequest {
        let mut headers = Vec::with_capacity(3);
        if self.send_host {
            headers.push(("host", NAVER_NEWS_HOST.to_string()));
        }
        headers.push(("user-agent", self.user_agent.clone()));
        headers.push(("accept", String::from("*/*")));

        ListingRequest {
            category_code,
            page,
            method: Method::POST,
            endpoint: self.endpoint.clone(),
            headers,
            query: vec![
                ("sid1", category_code.to_string()),
                ("page", page.to_string()),
            ],
        }
    }

    /// Build requests for a contiguous page range
    pub fn build_range(
        &self,
        category_code: u32,
        pages: impl IntoIterator<Item = u32>,
    ) -> Vec<ListingRequest> {
        pages
            .into_iter()
            .map(|page| self.build(category_code, page))
            .collect()
    }
}
