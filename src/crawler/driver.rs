//! Windowed pagination and deduplication driver
//!
//! For each category the driver walks the listing in fixed-width page
//! windows:
//!
//! ```text
//!   ┌──────────┐    ┌──────────┐    ┌──────────┐
//!   │ FETCHING │───▶│ MERGING  │───▶│  batch   │──▶ sink, next window
//!   └──────────┘    └──────────┘    └──────────┘
//!                        │
//!                        └──▶ EXHAUSTED (stream ends)
//! ```
//!
//! Pages are merged in page order. The first occurrence of an article id
//! wins; later copies are dropped. A page that parsed but added nothing new
//! is taken as the end of the category, because the listing keeps serving
//! already-seen articles once it runs past its last real page. Pages that
//! failed to arrive or to parse never count toward that, but a window where
//! no page produced a record ends the category too.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};

use crate::config::{Config, CrawlerConfig, DedupScope};
use crate::crawler::fetcher::Transport;
use crate::crawler::request::RequestBuilder;
use crate::error::ErrorExt;
use crate::models::{ArticleRecord, CategoryReport, NewsCategory};
use crate::parser::ListingParser;
use crate::storage::SharedArticleSink;
use crate::utils::error::ParseError;
use crate::utils::truncate_text;

// ============================================================================
// Windows and identity sets
// ============================================================================

/// Contiguous range of page numbers fetched as one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: u32,
    pub width: u32,
}

impl PageWindow {
    /// First window of a crawl
    pub fn first(width: u32) -> Self {
        Self { start: 1, width }
    }

    /// Page numbers covered by this window
    pub fn pages(&self) -> Range<u32> {
        self.start..self.start + self.width
    }

    /// Last page number in this window
    pub fn end(&self) -> u32 {
        self.start + self.width.saturating_sub(1)
    }

    /// Window immediately after this one
    #[must_use]
    pub fn next(&self) -> Self {
        Self {
            start: self.start + self.width,
            width: self.width,
        }
    }

    /// Clip the window so it does not go past `max_pages` (0 = unlimited)
    ///
    /// Returns `None` when the window starts past the limit.
    pub fn clipped(&self, max_pages: u32) -> Option<Self> {
        if max_pages == 0 {
            return Some(*self);
        }
        if self.start > max_pages {
            return None;
        }
        Some(Self {
            start: self.start,
            width: self.width.min(max_pages - self.start + 1),
        })
    }
}

/// Article ids already emitted
#[derive(Debug, Clone, Default)]
pub struct SeenIdSet {
    ids: HashSet<String>,
}

impl SeenIdSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id; returns `true` if it was not seen before
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_string())
    }

    /// Number of ids seen
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forget every id
    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

// ============================================================================
// Window outcomes
// ============================================================================

/// Merged, duplicate-free records of one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBatch {
    pub category: NewsCategory,
    pub window: PageWindow,
    pub records: Vec<ArticleRecord>,
    /// Pages whose response arrived
    pub pages_fetched: usize,
    /// Pages whose response arrived but could not be parsed
    pub pages_failed_parse: usize,
    /// Records dropped because their id was already seen
    pub duplicates_dropped: usize,
}

/// Why a category ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionReason {
    /// A run of parsed pages added no new articles; `page` closed the run
    NoNewArticles { page: u32 },
    /// No page of the window produced a record
    EmptyWindow {
        pages_fetched: usize,
        pages_failed_parse: usize,
    },
}

/// End-of-stream signal for a category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExhaustionReport {
    pub category: NewsCategory,
    pub window: PageWindow,
    pub reason: ExhaustionReason,
    /// New records merged in this window before exhaustion, not emitted
    pub discarded_records: usize,
}

/// What one driver iteration produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    Batch(WindowBatch),
    Exhausted(ExhaustionReport),
}

impl WindowOutcome {
    /// Window this outcome belongs to
    pub fn window(&self) -> PageWindow {
        match self {
            Self::Batch(batch) => batch.window,
            Self::Exhausted(report) => report.window,
        }
    }
}

/// Merge parsed pages of one window
///
/// `pages` must be in page order. Records whose id is already in `seen` are
/// dropped; the rest are added to `seen` and kept in order. After
/// `exhaustion_threshold` consecutive parsed pages contribute nothing new,
/// merging stops and the window is reported as exhausted. Failed pages
/// contribute nothing and neither extend nor break such a run, but a window
/// in which no page produced a record also ends the category.
pub fn merge_pages<I>(
    category: NewsCategory,
    window: PageWindow,
    pages: I,
    seen: &mut SeenIdSet,
    exhaustion_threshold: u32,
) -> WindowOutcome
where
    I: IntoIterator<Item = (u32, Result<Vec<ArticleRecord>, ParseError>)>,
{
    let threshold = exhaustion_threshold.max(1);
    let mut records = Vec::new();
    let mut pages_fetched = 0;
    let mut pages_failed_parse = 0;
    let mut duplicates_dropped = 0;
    let mut empty_run = 0;

    for (page, parsed) in pages {
        pages_fetched += 1;

        let page_records = match parsed {
            Ok(page_records) => page_records,
            Err(e) => {
                tracing::warn!(
                    category = %category,
                    page,
                    error = %e,
                    error.category = %e.category(),
                    "Can't parse page, treating as empty"
                );
                pages_failed_parse += 1;
                continue;
            }
        };

        let before = records.len();
        for record in page_records {
            if seen.insert(&record.id) {
                records.push(record);
            } else {
                duplicates_dropped += 1;
            }
        }

        if records.len() > before {
            empty_run = 0;
            continue;
        }

        empty_run += 1;
        if empty_run >= threshold {
            tracing::info!(
                category = %category,
                page,
                start = window.start,
                end = window.end(),
                "Category ended: page yielded no new articles"
            );
            return WindowOutcome::Exhausted(ExhaustionReport {
                category,
                window,
                reason: ExhaustionReason::NoNewArticles { page },
                discarded_records: records.len(),
            });
        }
    }

    if records.is_empty() {
        tracing::warn!(
            category = %category,
            start = window.start,
            end = window.end(),
            pages_fetched,
            pages_failed_parse,
            "Category ended: window produced no records"
        );
        return WindowOutcome::Exhausted(ExhaustionReport {
            category,
            window,
            reason: ExhaustionReason::EmptyWindow {
                pages_fetched,
                pages_failed_parse,
            },
            discarded_records: 0,
        });
    }

    WindowOutcome::Batch(WindowBatch {
        category,
        window,
        records,
        pages_fetched,
        pages_failed_parse,
        duplicates_dropped,
    })
}

// ============================================================================
// Driver
// ============================================================================

/// Loop parameters of the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    pub window_size: u32,
    pub max_pages: u32,
    pub exhaustion_threshold: u32,
    pub dedup_scope: DedupScope,
    pub parallel_categories: bool,
}

impl DriverSettings {
    /// Extract driver settings from crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            window_size: config.window_size,
            max_pages: config.max_pages,
            exhaustion_threshold: config.exhaustion_threshold,
            dedup_scope: config.dedup_scope,
            parallel_categories: config.parallel_categories,
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Per-stream cursor
struct CrawlCursor {
    window: Option<PageWindow>,
    seen: SeenIdSet,
}

/// Crawls categories window by window and hands batches to the sink
pub struct Driver {
    transport: Arc<dyn Transport>,
    sink: SharedArticleSink,
    builder: RequestBuilder,
    parser: ListingParser,
    settings: DriverSettings,
}

impl Driver {
    /// Create a driver from configuration
    pub fn new(config: &Config, transport: Arc<dyn Transport>, sink: SharedArticleSink) -> Self {
        Self::with_settings(
            RequestBuilder::from_config(&config.crawler),
            DriverSettings::from_config(&config.crawler),
            transport,
            sink,
        )
    }

    /// Create a driver with explicit collaborators
    pub fn with_settings(
        builder: RequestBuilder,
        settings: DriverSettings,
        transport: Arc<dyn Transport>,
        sink: SharedArticleSink,
    ) -> Self {
        Self {
            transport,
            sink,
            builder,
            parser: ListingParser::new(),
            settings,
        }
    }

    /// Driver settings
    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Lazily crawl one category
    ///
    /// Each item is one window. The stream is finite and cannot be
    /// restarted: it ends after an `Exhausted` item or once `max_pages`
    /// pages have been requested. Nothing is stored; see `run_category`.
    pub fn windows(&self, category: NewsCategory) -> impl Stream<Item = WindowOutcome> + '_ {
        let cursor = CrawlCursor {
            window: PageWindow::first(self.settings.window_size.max(1))
                .clipped(self.settings.max_pages),
            seen: SeenIdSet::new(),
        };

        stream::unfold(cursor, move |mut cursor| async move {
            let window = cursor.window?;

            if self.settings.dedup_scope == DedupScope::Window {
                cursor.seen.clear();
            }

            let pages = self.fetch_window(category, window).await;
            let outcome = merge_pages(
                category,
                window,
                pages,
                &mut cursor.seen,
                self.settings.exhaustion_threshold,
            );

            cursor.window = match outcome {
                WindowOutcome::Batch(_) => window.next().clipped(self.settings.max_pages),
                WindowOutcome::Exhausted(_) => None,
            };

            Some((outcome, cursor))
        })
    }

    /// Fetch and parse every page of a window, in page order
    async fn fetch_window(
        &self,
        category: NewsCategory,
        window: PageWindow,
    ) -> Vec<(u32, Result<Vec<ArticleRecord>, ParseError>)> {
        tracing::debug!(
            category = %category,
            start = window.start,
            end = window.end(),
            "Fetching window"
        );

        let requests = self.builder.build_range(category.code(), window.pages());
        let fetched = self.transport.fetch_all(&requests).await;

        if fetched.len() < requests.len() {
            tracing::warn!(
                category = %category,
                start = window.start,
                requested = requests.len(),
                received = fetched.len(),
                "Some pages were not received"
            );
        }

        fetched
            .into_iter()
            .map(|page| (page.page, self.parser.parse(&page.body, category)))
            .collect()
    }

    /// Crawl one category to the end and store every batch
    ///
    /// Never fails: store errors are logged and counted in the report.
    pub async fn run_category(&self, category: NewsCategory) -> CategoryReport {
        tracing::info!(
            category = %category,
            code = category.code(),
            korean_name = category.korean_name(),
            "Category crawl started"
        );

        let mut report = CategoryReport::new(category);
        let mut windows = Box::pin(self.windows(category));

        while let Some(outcome) = windows.next().await {
            report.windows += 1;
            report.pages_requested += outcome.window().width;

            let batch = match outcome {
                WindowOutcome::Batch(batch) => batch,
                WindowOutcome::Exhausted(exhausted) => {
                    report.exhausted = true;
                    tracing::debug!(
                        category = %category,
                        reason = ?exhausted.reason,
                        discarded = exhausted.discarded_records,
                        "Exhausted window not stored"
                    );
                    continue;
                }
            };

            report.records_emitted += batch.records.len();
            self.store_batch(&batch, &mut report);
        }

        tracing::info!(
            category = %category,
            windows = report.windows,
            pages = report.pages_requested,
            emitted = report.records_emitted,
            inserted = report.inserted,
            duplicates = report.duplicates,
            store_failures = report.store_failures,
            exhausted = report.exhausted,
            "Category crawl finished"
        );

        report
    }

    fn store_batch(&self, batch: &WindowBatch, report: &mut CategoryReport) {
        let Some(first) = batch.records.first() else {
            return;
        };

        match self.sink.store(&batch.records) {
            Ok(stored) => {
                report.inserted += stored.inserted;
                report.duplicates += stored.duplicates;
                tracing::info!(
                    category = %batch.category,
                    start = batch.window.start,
                    end = batch.window.end(),
                    records = batch.records.len(),
                    inserted = stored.inserted,
                    duplicates = stored.duplicates,
                    sample = %truncate_text(&first.title, 40),
                    sample_published = ?first.published_at_utc(),
                    "Window stored"
                );
            }
            Err(e) => {
                report.store_failures += 1;
                tracing::error!(
                    category = %batch.category,
                    start = batch.window.start,
                    end = batch.window.end(),
                    records = batch.records.len(),
                    error = %e,
                    error.category = %e.category(),
                    recoverable = e.is_recoverable(),
                    "Failed to store window, continuing"
                );
            }
        }
    }

    /// Crawl several categories
    ///
    /// Categories share nothing but the transport and sink, so they run
    /// concurrently when `parallel_categories` is set.
    pub async fn run(&self, categories: &[NewsCategory]) -> Vec<CategoryReport> {
        if self.settings.parallel_categories {
            futures::future::join_all(categories.iter().map(|&c| self.run_category(c))).await
        } else {
            let mut reports = Vec::with_capacity(categories.len());
            for &category in categories {
                reports.push(self.run_category(category).await);
            }
            reports
        }
    }
}
