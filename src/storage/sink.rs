//! Article sinks
//!
//! A sink receives one window's merged batch at a time. Storage is
//! at-least-once: rows already present from an earlier run are rejected by
//! the primary key, counted as duplicates, and the rest of the batch still
//! lands.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sinmun::storage::{ArticleSink, SqliteArticleSink};
//!
//! let sink = SqliteArticleSink::new("data/news.db", "newses")?;
//! let report = sink.store(&records)?;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rusqlite::{params, Connection};

use crate::config::{is_valid_table_name, DatabaseConfig};
use crate::models::{ArticleRecord, NewsCategory};
use crate::utils::error::StoreError;

// ============================================================================
// Core Types
// ============================================================================

/// Outcome of storing one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreReport {
    /// Rows written
    pub inserted: usize,

    /// Rows rejected because the key already existed
    pub duplicates: usize,
}

/// Destination for finalized article batches
pub trait ArticleSink: Send + Sync {
    /// Persist a batch, skipping records whose key already exists
    fn store(&self, records: &[ArticleRecord]) -> Result<StoreReport, StoreError>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of `ArticleSink`
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection; concurrent
/// category crawls serialize their batches here.
pub struct SqliteArticleSink {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteArticleSink {
    /// Open (or create) a database file and ensure the table exists
    pub fn new(path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let sink = Self::with_connection(conn, table)?;

        tracing::info!(path = %path.display(), table, "SQLite sink initialized");
        Ok(sink)
    }

    /// Create from database configuration
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, StoreError> {
        Self::new(&config.sqlite_path, &config.table)
    }

    /// Create in-memory sink (for testing and dry runs)
    pub fn in_memory(table: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self, StoreError> {
        if !is_valid_table_name(table) {
            return Err(StoreError::InvalidTable(table.to_string()));
        }

        let sink = Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        };
        sink.create_schema()?;
        Ok(sink)
    }

    /// Table receiving rows
    pub fn table(&self) -> &str {
        &self.table
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Create database schema
    fn create_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(
            r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT NOT NULL,
                    category TEXT NOT NULL,
                    title TEXT NOT NULL,
                    summary TEXT NOT NULL,
                    office_name TEXT NOT NULL,
                    service_time INTEGER NOT NULL,
                    url TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    PRIMARY KEY (category, id)
                );

                CREATE INDEX IF NOT EXISTS idx_{table}_service_time
                    ON {table}(service_time);
                "#,
            table = self.table
        ))?;

        Ok(())
    }

    /// Total number of stored rows
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(total as usize)
    }

    /// Row counts per category name, ordered by name
    pub fn count_by_category(&self) -> Result<Vec<(String, usize)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT category, COUNT(*) FROM {} GROUP BY category ORDER BY category",
            self.table
        ))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

fn is_primary_key_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

impl ArticleSink for SqliteArticleSink {
    fn store(&self, records: &[ArticleRecord]) -> Result<StoreReport, StoreError> {
        let mut report = StoreReport::default();
        if records.is_empty() {
            return Ok(report);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                r#"
                    INSERT INTO {} (id, category, title, summary, office_name, service_time, url)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                self.table
            ))?;

            for record in records {
                let result = stmt.execute(params![
                    record.id,
                    record.category.as_str(),
                    record.title,
                    record.summary,
                    record.publisher_name,
                    record.published_at,
                    record.detail_url,
                ]);

                match result {
                    Ok(_) => report.inserted += 1,
                    Err(e) if is_primary_key_conflict(&e) => {
                        tracing::debug!(
                            category = %record.category,
                            id = %record.id,
                            "Row already stored, skipping"
                        );
                        report.duplicates += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        tx.commit()?;

        Ok(report)
    }
}

// ============================================================================
// In-memory Implementation
// ============================================================================

/// In-memory implementation of `ArticleSink`
///
/// Same duplicate semantics as the SQLite sink. Useful for tests and dry runs.
pub struct MemorySink {
    records: RwLock<HashMap<(NewsCategory, String), ArticleRecord>>,
    order: RwLock<Vec<(NewsCategory, String)>>,
}

impl MemorySink {
    /// Create a new empty sink
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Get the number of stored records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored records in insertion order
    pub fn records(&self) -> Vec<ArticleRecord> {
        let (Ok(records), Ok(order)) = (self.records.read(), self.order.read()) else {
            return Vec::new();
        };
        order
            .iter()
            .filter_map(|key| records.get(key).cloned())
            .collect()
    }

    /// Clear all records
    pub fn clear(&self) {
        if let (Ok(mut records), Ok(mut order)) = (self.records.write(), self.order.write()) {
            records.clear();
            order.clear();
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl ArticleSink for MemorySink {
    fn store(&self, batch: &[ArticleRecord]) -> Result<StoreReport, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut order = self.order.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut report = StoreReport::default();

        for record in batch {
            let key = (record.category, record.id.clone());
            if records.contains_key(&key) {
                report.duplicates += 1;
                continue;
            }
            records.insert(key.clone(), record.clone());
            order.push(key);
            report.inserted += 1;
        }

        Ok(report)
    }
}

// ============================================================================
// Shared Sink Types
// ============================================================================

/// Thread-safe shared sink
pub type SharedArticleSink = Arc<dyn ArticleSink>;

/// Create a shared SQLite sink
pub fn create_sqlite_sink(config: &DatabaseConfig) -> Result<SharedArticleSink, StoreError> {
    Ok(Arc::new(SqliteArticleSink::from_config(config)?))
}

// ============================================================================
// Tests
// ============================================================================
