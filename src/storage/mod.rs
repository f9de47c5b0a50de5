//! Database operations for crawled articles
//!
//! This module handles persisting finalized article batches into SQLite.

pub mod sink;

pub use sink::{
    create_sqlite_sink, ArticleSink, MemorySink, SharedArticleSink, SqliteArticleSink,
    StoreReport,
};
