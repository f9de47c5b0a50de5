//! Configuration management for sinmun crawler
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files. The resulting `Config` is immutable and handed to the transport,
//! driver and sink constructors.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::NewsCategory;

/// Default listing endpoint
pub const DEFAULT_ENDPOINT: &str = "https://news.naver.com/main/mainNews.naver";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Crawler configuration
    pub crawler: CrawlerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Scope of the identity set used to drop duplicate articles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupScope {
    /// Reset at every window
    Window,
    /// Kept for the whole crawl invocation of a category
    Session,
}

/// Crawler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Listing endpoint URL
    pub endpoint: String,

    /// User agent string
    pub user_agent: String,

    /// Categories crawled when none are given on the command line
    pub categories: Vec<NewsCategory>,

    /// Pages fetched together per window
    pub window_size: u32,

    /// Stop after this many pages per category (0 = unlimited)
    pub max_pages: u32,

    /// Total attempts per request
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    pub retry_delay_ms: u64,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Minimum spacing between sends in milliseconds (0 = no throttle)
    pub throttle_ms: u64,

    /// Maximum number of in-flight requests within a window
    pub max_concurrent_requests: usize,

    /// Consecutive pages without new articles that end a category
    pub exhaustion_threshold: u32,

    /// Identity set scope for duplicate suppression
    pub dedup_scope: DedupScope,

    /// Crawl categories concurrently instead of one after another
    pub parallel_categories: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,

    /// Table receiving article rows
    pub table: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from(DEFAULT_ENDPOINT),
            user_agent: String::from("curl/7.64.1"),
            categories: NewsCategory::all(),
            window_size: 10,
            max_pages: 0,
            max_attempts: 3,
            retry_delay_ms: 0,
            request_timeout_secs: 30,
            throttle_ms: 100,
            max_concurrent_requests: 4,
            exhaustion_threshold: 1,
            dedup_scope: DedupScope::Window,
            parallel_categories: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/news.db"),
            table: String::from("newses"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{key}={v}: {e}")),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults; set but unparsable variables are an error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        let crawler = &mut config.crawler;

        if let Ok(endpoint) = std::env::var("SINMUN_ENDPOINT") {
            crawler.endpoint = endpoint;
        }
        if let Ok(user_agent) = std::env::var("SINMUN_USER_AGENT") {
            crawler.user_agent = user_agent;
        }
        if let Ok(categories) = std::env::var("SINMUN_CATEGORIES") {
            crawler.categories = categories
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<NewsCategory>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()
                .context("SINMUN_CATEGORIES")?;
        }
        if let Some(v) = env_parse("SINMUN_WINDOW_SIZE")? {
            crawler.window_size = v;
        }
        if let Some(v) = env_parse("SINMUN_MAX_PAGES")? {
            crawler.max_pages = v;
        }
        if let Some(v) = env_parse("SINMUN_MAX_ATTEMPTS")? {
            crawler.max_attempts = v;
        }
        if let Some(v) = env_parse("SINMUN_RETRY_DELAY_MS")? {
            crawler.retry_delay_ms = v;
        }
        if let Some(v) = env_parse("SINMUN_REQUEST_TIMEOUT")? {
            crawler.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("SINMUN_THROTTLE_MS")? {
            crawler.throttle_ms = v;
        }
        if let Some(v) = env_parse("SINMUN_MAX_CONCURRENT_REQUESTS")? {
            crawler.max_concurrent_requests = v;
        }
        if let Some(v) = env_parse("SINMUN_EXHAUSTION_THRESHOLD")? {
            crawler.exhaustion_threshold = v;
        }
        if let Ok(scope) = std::env::var("SINMUN_DEDUP_SCOPE") {
            crawler.dedup_scope = match scope.trim().to_lowercase().as_str() {
                "window" => DedupScope::Window,
                "session" => DedupScope::Session,
                other => anyhow::bail!("SINMUN_DEDUP_SCOPE: unknown scope {other}"),
            };
        }
        if let Some(v) = env_parse("SINMUN_PARALLEL_CATEGORIES")? {
            crawler.parallel_categories = v;
        }

        if let Ok(path) = std::env::var("SINMUN_SQLITE_PATH") {
            config.database.sqlite_path = path.into();
        }
        if let Ok(table) = std::env::var("SINMUN_TABLE") {
            config.database.table = table;
        }

        if let Ok(level) = std::env::var("SINMUN_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("SINMUN_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let crawler = &self.crawler;

        if crawler.window_size == 0 {
            anyhow::bail!("window_size must be greater than 0");
        }

        if crawler.max_attempts == 0 {
            anyhow::bail!("max_attempts must be greater than 0");
        }

        if crawler.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if crawler.max_concurrent_requests == 0 {
            anyhow::bail!("max_concurrent_requests must be greater than 0");
        }

        if crawler.exhaustion_threshold == 0 {
            anyhow::bail!("exhaustion_threshold must be greater than 0");
        }

        if crawler.categories.is_empty() {
            anyhow::bail!("at least one category must be configured");
        }

        url::Url::parse(&crawler.endpoint)
            .with_context(|| format!("endpoint is not a valid URL: {}", crawler.endpoint))?;

        if !is_valid_table_name(&self.database.table) {
            anyhow::bail!("table is not a valid identifier: {}", self.database.table);
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.request_timeout_secs)
    }

    /// Get politeness throttle as Duration
    #[must_use]
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.crawler.throttle_ms)
    }

    /// Get delay between attempts as Duration
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.crawler.retry_delay_ms)
    }
}

/// Whether `name` can be spliced into SQL as a bare identifier
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.crawler.window_size, 10);
        assert_eq!(config.crawler.max_attempts, 3);
        assert_eq!(config.crawler.exhaustion_threshold, 1);
        assert_eq!(config.crawler.dedup_scope, DedupScope::Window);
        assert_eq!(config.crawler.categories.len(), 5);
        assert_eq!(config.database.table, "newses");
    }

    #[test]
    fn test_invalid_window_size() {
        let mut config = Config::default();
        config.crawler.window_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_concurrent_requests() {
        let mut config = Config::default();
        config.crawler.max_concurrent_requests = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_endpoint() {
        let mut config = Config::default();
        config.crawler.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("newses"));
        assert!(is_valid_table_name("_news_2024"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("1news"));
        assert!(!is_valid_table_name("news; DROP TABLE x"));
    }

    #[test]
    fn test_duration_conversion() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.throttle(), Duration::from_millis(100));
        assert_eq!(config.retry_delay(), Duration::ZERO);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            window_size = 5
            categories = ["politics", "economy"]
            dedup_scope = "session"
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.window_size, 5);
        assert_eq!(
            config.crawler.categories,
            vec![NewsCategory::Politics, NewsCategory::Economy]
        );
        assert_eq!(config.crawler.dedup_scope, DedupScope::Session);
        assert_eq!(config.crawler.max_attempts, 3);
        assert_eq!(config.database.table, "newses");
    }
}
