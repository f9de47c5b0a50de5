//! sinmun - Naver News category listing crawler
//!
//! Walks the paginated listing of each news category, extracts normalized
//! article records, drops duplicates and stops once a category runs out of
//! new articles.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Request building, HTTP transport and the pagination driver
//! - [`parser`] - Listing payload parsing
//! - [`models`] - Core data structures and types
//! - [`storage`] - Article sinks (SQLite, in-memory)
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sinmun::config::Config;
//! use sinmun::crawler::{Driver, HttpTransport};
//! use sinmun::storage::create_sqlite_sink;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let transport = Arc::new(HttpTransport::from_config(&config)?);
//!     let sink = create_sqlite_sink(&config.database)?;
//!
//!     let driver = Driver::new(&config, transport, sink);
//!     let reports = driver.run(&config.crawler.categories).await;
//!     println!("{} categories crawled", reports.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, DedupScope};
    pub use crate::crawler::{Driver, HttpTransport, RequestBuilder, Transport, WindowOutcome};
    pub use crate::error::{Error, ErrorCategory, ErrorExt, Result};
    pub use crate::models::{ArticleRecord, CategoryReport, NewsCategory};
    pub use crate::parser::ListingParser;
    pub use crate::storage::{ArticleSink, MemorySink, SqliteArticleSink};
}

// Direct re-exports for convenience
pub use models::{ArticleRecord, CategoryReport, NewsCategory};
