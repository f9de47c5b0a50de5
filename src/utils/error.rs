//! Error types for the sinmun crawler
//!
//! This module defines the domain error types used throughout the application.
//! None of these abort a category crawl on their own; the driver logs them
//! and keeps going.

use thiserror::Error;

/// Errors that can occur while fetching a listing page
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error (connection refused, reset, TLS, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx status code
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Every attempt for a request failed
    #[error("{url} exceeded max retry ({attempts} attempts)")]
    RetriesExhausted { url: String, attempts: u32 },

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether another attempt of the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status(_) | Self::Timeout)
    }
}

/// Errors that can occur while parsing a listing payload
///
/// Any of these rejects the whole page.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Outer document is not JSON
    #[error("Invalid listing document: {0}")]
    InvalidDocument(#[source] serde_json::Error),

    /// Outer document lacks the nested result field
    #[error("Missing field `{0}` in listing document")]
    MissingField(&'static str),

    /// Nested document is not JSON
    #[error("Invalid nested document: {0}")]
    InvalidNestedDocument(#[source] serde_json::Error),

    /// Nested document has a `result` of the wrong shape
    #[error("Nested document has no result object")]
    MissingResult,

    /// No entries keyed by the category code
    #[error("No entries for category code {0}")]
    MissingCategory(u32),

    /// Entries keyed by the category code are not a list
    #[error("Entries for category code {0} are not a list")]
    NotAList(u32),

    /// One entry could not be extracted
    #[error("Can't parse entry #{index}: {reason}")]
    InvalidEntry { index: usize, reason: String },
}

/// Errors that can occur while persisting a batch
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Table name is not a plain SQL identifier
    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    /// Connection lock was poisoned by a panicking writer
    #[error("Connection lock poisoned")]
    LockPoisoned,

    /// I/O error while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
