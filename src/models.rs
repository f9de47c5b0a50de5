// Core data structures for sinmun crawler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Detail page address template: `{DETAIL_URL_BASE}/{office_id}/{article_id}`
pub const DETAIL_URL_BASE: &str = "https://n.news.naver.com/article";

/// Build the article detail URL from publisher id and article id
pub fn detail_url(office_id: &str, article_id: &str) -> String {
    format!("{DETAIL_URL_BASE}/{office_id}/{article_id}")
}

/// Normalized listing entry
///
/// `id` is only unique inside one category, so any identity check must be
/// paired with `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String, // Article ID (e.g., "0014123456")
    pub category: NewsCategory,
    pub title: String,
    pub summary: String,
    pub publisher_name: String,
    pub published_at: i64, // Epoch seconds
    pub detail_url: String,
}

impl ArticleRecord {
    /// Publication time as a UTC timestamp, if representable
    pub fn published_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.published_at, 0)
    }
}

/// News category enumeration
///
/// Discriminants are the `sid1` codes the listing API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
    Politics = 100,
    Economy = 101,
    Society = 102,
    Science = 103,
    World = 104,
}

impl NewsCategory {
    /// Create from section code
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            100 => Some(Self::Politics),
            101 => Some(Self::Economy),
            102 => Some(Self::Society),
            103 => Some(Self::Science),
            104 => Some(Self::World),
            _ => None,
        }
    }

    /// Section code used in listing requests
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Politics => "politics",
            Self::Economy => "economy",
            Self::Society => "society",
            Self::Science => "science",
            Self::World => "world",
        }
    }

    /// Get Korean name
    pub fn korean_name(&self) -> &'static str {
        match self {
            Self::Politics => "정치",
            Self::Economy => "경제",
            Self::Society => "사회",
            Self::Science => "과학",
            Self::World => "세계",
        }
    }

    /// Create from string (English name, Korean name or numeric code)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u32>() {
            return Self::from_code(code);
        }

        match s.to_lowercase().as_str() {
            "politics" | "정치" => Some(Self::Politics),
            "economy" | "경제" => Some(Self::Economy),
            "society" | "사회" => Some(Self::Society),
            "science" | "과학" => Some(Self::Science),
            "world" | "세계" => Some(Self::World),
            _ => None,
        }
    }

    /// Get all categories
    pub fn all() -> Vec<Self> {
        vec![
            Self::Politics,
            Self::Economy,
            Self::Society,
            Self::Science,
            Self::World,
        ]
    }
}

impl std::fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NewsCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Per-category crawl summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub category: NewsCategory,
    pub windows: u32,
    pub pages_requested: u32,
    pub records_emitted: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub store_failures: u32,
    pub exhausted: bool,
}

impl CategoryReport {
    /// Create an empty report for a category
    pub fn new(category: NewsCategory) -> Self {
        Self {
            category,
            windows: 0,
            pages_requested: 0,
            records_emitted: 0,
            inserted: 0,
            duplicates: 0,
            store_failures: 0,
            exhausted: false,
        }
    }

    /// Share of emitted records that turned out to be new rows (0.0 - 1.0)
    pub fn insert_rate(&self) -> f64 {
        if self.records_emitted == 0 {
            return 0.0;
        }
        self.inserted as f64 / self.records_emitted as f64
    }
}
