//! Listing crawl pipeline
//!
//! This module builds listing requests, fetches them with rate limiting and
//! retries, and drives the windowed pagination loop that feeds the sink.
//!
//! - [`request`] - Pure request construction
//! - [`fetcher`] - HTTP transport with throttling and retries
//! - [`driver`] - Window iteration, deduplication and exhaustion detection

pub mod driver;
pub mod fetcher;
pub mod request;

pub use driver::{
    merge_pages, Driver, DriverSettings, ExhaustionReason, ExhaustionReport, PageWindow,
    SeenIdSet, WindowBatch, WindowOutcome,
};
pub use fetcher::{FetchedPage, HttpTransport, Transport};
pub use request::{ListingRequest, RequestBuilder};
