//! Listing payload parsing
//!
//! This module turns raw listing responses into normalized `ArticleRecord`s.

pub mod listing;

pub use listing::ListingParser;
