//! Unified error handling for the sinmun crate
//!
//! This module provides a unified error type that consolidates the
//! domain-specific errors into a single `Error` enum, while keeping the
//! domain errors available where a caller wants to match on them.
//!
//! # Architecture
//!
//! - [`ErrorExt`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust
//! use sinmun::error::{Error, ErrorCategory, ErrorExt};
//! use sinmun::utils::error::FetchError;
//!
//! let err = Error::from(FetchError::Timeout);
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), ErrorCategory::Network);
//! ```

use std::io;
use thiserror::Error;

pub use crate::utils::error::{FetchError, ParseError, StoreError};

/// Common trait for all sinmun error types
pub trait ErrorExt: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, status)
    Network,
    /// Payload parsing errors
    Parsing,
    /// Storage and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short label used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }

    /// Korean description for user-facing messages
    pub fn korean_desc(&self) -> &'static str {
        match self {
            Self::Network => "네트워크 오류",
            Self::Parsing => "파싱 오류",
            Self::Storage => "저장소 오류",
            Self::Config => "설정 오류",
            Self::Other => "기타 오류",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorExt for FetchError {
    fn is_recoverable(&self) -> bool {
        self.is_transient()
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrl(_) => ErrorCategory::Config,
            Self::Decode(_) => ErrorCategory::Parsing,
            _ => ErrorCategory::Network,
        }
    }
}

impl ErrorExt for ParseError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl ErrorExt for StoreError {
    fn is_recoverable(&self) -> bool {
        // A busy or locked database may succeed on the next batch
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Self::Io(_) => true,
            _ => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTable(_) => ErrorCategory::Config,
            _ => ErrorCategory::Storage,
        }
    }
}

/// Unified error type for the sinmun crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Sink errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ErrorExt for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Io(_) => true, // I/O errors are often transient
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Parse(e) => e.category(),
            Self::Store(e) => e.category(),
            Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let fetch_err = Error::Fetch(FetchError::Timeout);
        assert_eq!(fetch_err.category(), ErrorCategory::Network);

        let parse_err = Error::Parse(ParseError::MissingResult);
        assert_eq!(parse_err.category(), ErrorCategory::Parsing);

        let store_err = Error::Store(StoreError::InvalidTable("x y".into()));
        assert_eq!(store_err.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::Fetch(FetchError::Timeout).is_recoverable());
        assert!(Error::Fetch(FetchError::Status(503)).is_recoverable());
        assert!(!Error::Parse(ParseError::MissingResult).is_recoverable());
        assert!(!Error::Fetch(FetchError::RetriesExhausted {
            url: "http://x".into(),
            attempts: 3
        })
        .is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let unified: Error = ParseError::MissingCategory(101).into();
        assert!(matches!(unified, Error::Parse(_)));
        assert_eq!(
            unified.to_string(),
            "Parse error: No entries for category code 101"
        );
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("window_size must be positive");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_other_error() {
        let err: Error = anyhow::anyhow!("missing field").context("reading config.toml").into();
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(err.to_string(), "reading config.toml: missing field");

        let err = Error::with_source("opening db", io::Error::other("denied"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_category_korean() {
        assert_eq!(ErrorCategory::Network.korean_desc(), "네트워크 오류");
        assert_eq!(ErrorCategory::Storage.to_string(), "storage");
    }
}
