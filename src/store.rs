//! Bounded history store for qplay
//!
//! This module provides SQLite-backed storage for applied queries and
//! templates with support for:
//! - Capacity limits with oldest-first eviction
//! - Suppression of consecutive duplicates
//! - Cursor-based, search-filtered pagination
//!
//! Each [`HistoryKind`] lives in its own table. Insertion runs inside a single
//! immediate transaction so the dedup and eviction reads are never interleaved
//! with another writer.

use crate::error::{Error, Result};
use crate::types::{EntryId, HistoryKind};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// How long a writer waits for another connection's transaction
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default page size used by [`PageRequest::new`]
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// A stored history record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: EntryId,
    /// Milliseconds since the Unix epoch at insertion
    pub timestamp: i64,
    pub content: String,
}

/// Result of a successful insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub inserted: HistoryEntry,
    /// Entry removed to make room, if the store was full
    pub evicted: Option<HistoryEntry>,
}

/// Capacity limits enforced by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_entries: usize,
    pub max_entry_size: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_entries: crate::config::DEFAULT_MAX_ENTRIES,
            max_entry_size: crate::config::DEFAULT_MAX_ENTRY_SIZE,
        }
    }
}

impl From<&crate::config::StoreConfig> for StoreLimits {
    fn from(config: &crate::config::StoreConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            max_entry_size: config.max_entry_size,
        }
    }
}

/// Timestamp ordering for iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most recent first
    #[default]
    Descending,
    /// Oldest first
    Ascending,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::Descending => "DESC",
            SortOrder::Ascending => "ASC",
        }
    }
}

/// A page request with optional search filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page number
    pub page: usize,
    /// Maximum number of items in the page
    pub limit: usize,
    /// Case-insensitive substring filter
    pub search: Option<String>,
    pub order: SortOrder,
}

impl PageRequest {
    pub fn new() -> Self {
        Self {
            page: 0,
            limit: DEFAULT_PAGE_LIMIT,
            search: None,
            order: SortOrder::Descending,
        }
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Filter by substring; an empty needle matches everything
    pub fn search<S: Into<String>>(mut self, needle: S) -> Self {
        let needle = needle.into();
        self.search = (!needle.is_empty()).then_some(needle);
        self
    }

    pub fn ascending(mut self) -> Self {
        self.order = SortOrder::Ascending;
        self
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Page {
    pub items: Vec<HistoryEntry>,
    /// Whether at least one more matching entry follows this page
    pub has_more: bool,
}

/// Statistics about one history category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub kind: Option<HistoryKind>,
    pub total_entries: usize,
    pub oldest_timestamp: Option<i64>,
    pub newest_timestamp: Option<i64>,
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        content: row.get(2)?,
    })
}

/// SQLite-backed bounded history store
pub struct HistoryStore {
    conn: Connection,
    limits: StoreLimits,
}

impl HistoryStore {
    /// Open (or create) a store at the given path and initialize the schema
    #[must_use = "History store must be used"]
    pub fn open(db_path: &Path, limits: StoreLimits) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self { conn, limits };
        store.initialize_schema()?;

        info!(path = %db_path.display(), "opened history store");
        Ok(store)
    }

    /// Open a store that lives only in memory
    pub fn open_in_memory(limits: StoreLimits) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn, limits };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    fn initialize_schema(&self) -> Result<()> {
        for kind in HistoryKind::ALL {
            let table = kind.table();
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp INTEGER NOT NULL,
                    content TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_timestamp ON {table}(timestamp);
                CREATE INDEX IF NOT EXISTS idx_{table}_content ON {table}(content);"
            ))?;
        }
        Ok(())
    }

    /// Record `content` as the newest entry of `kind`.
    ///
    /// Returns `Ok(None)` without touching the store when the content is
    /// empty, longer than the configured maximum, or identical to the most
    /// recent entry. When the store is full the single oldest entry is
    /// evicted and returned alongside the new one.
    pub fn insert(&mut self, kind: HistoryKind, content: &str) -> Result<Option<Insertion>> {
        if let Err(reason) = self.check_content(content) {
            debug!(%kind, %reason, "history entry rejected");
            return Ok(None);
        }

        let table = kind.table();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let most_recent: Option<HistoryEntry> = tx
            .query_row(
                &format!(
                    "SELECT id, timestamp, content FROM {table}
                     ORDER BY timestamp DESC, id DESC LIMIT 1"
                ),
                [],
                entry_from_row,
            )
            .optional()?;

        if most_recent.as_ref().is_some_and(|e| e.content == content) {
            debug!(%kind, "history entry matches most recent, skipping");
            return Ok(None);
        }

        let count: usize = tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;

        let evicted = if count >= self.limits.max_entries {
            let oldest: Option<HistoryEntry> = tx
                .query_row(
                    &format!(
                        "SELECT id, timestamp, content FROM {table}
                         ORDER BY timestamp ASC, id ASC LIMIT 1"
                    ),
                    [],
                    entry_from_row,
                )
                .optional()?;
            // More than one row goes when the limit was lowered since the last insert.
            let excess = count + 1 - self.limits.max_entries;
            tx.execute(
                &format!(
                    "DELETE FROM {table} WHERE id IN (
                        SELECT id FROM {table} ORDER BY timestamp ASC, id ASC LIMIT ?1
                    )"
                ),
                [excess as i64],
            )?;
            oldest
        } else {
            None
        };

        // Never step backwards, even if the wall clock does.
        let now = Utc::now().timestamp_millis();
        let timestamp = most_recent.map_or(now, |e| now.max(e.timestamp));

        tx.execute(
            &format!("INSERT INTO {table} (timestamp, content) VALUES (?1, ?2)"),
            params![timestamp, content],
        )?;
        let id = EntryId::new(tx.last_insert_rowid());
        tx.commit()?;

        debug!(%kind, %id, evicted = evicted.is_some(), "history entry recorded");

        Ok(Some(Insertion {
            inserted: HistoryEntry {
                id,
                timestamp,
                content: content.to_string(),
            },
            evicted,
        }))
    }

    fn check_content(&self, content: &str) -> Result<()> {
        if content.is_empty() {
            return Err(Error::custom("empty content"));
        }
        let size = content.chars().count();
        if size > self.limits.max_entry_size {
            return Err(Error::EntryTooLarge {
                size,
                max: self.limits.max_entry_size,
            });
        }
        Ok(())
    }

    /// Fetch one page of entries of `kind`.
    ///
    /// Rows are streamed from a cursor in timestamp order; non-matching rows
    /// are skipped without consuming a page slot. Iteration stops as soon as
    /// the page is full and one more match has been seen.
    pub fn query(&self, kind: HistoryKind, request: &PageRequest) -> Result<Page> {
        let table = kind.table();
        let dir = request.order.sql();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, timestamp, content FROM {table} ORDER BY timestamp {dir}, id {dir}"
        ))?;
        let rows = stmt.query_map([], entry_from_row)?;

        let needle = request.search.as_deref().map(str::to_lowercase);
        let offset = request.page.saturating_mul(request.limit);

        let mut skipped = 0usize;
        let mut items = Vec::new();
        let mut has_more = false;

        for row in rows {
            let entry = row?;
            if let Some(needle) = &needle {
                if !entry.content.to_lowercase().contains(needle.as_str()) {
                    continue;
                }
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            if items.len() == request.limit {
                has_more = true;
                break;
            }
            items.push(entry);
        }

        Ok(Page { items, has_more })
    }

    /// Remove an entry; missing ids are ignored
    pub fn delete(&self, kind: HistoryKind, id: EntryId) -> Result<()> {
        let removed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            [id],
        )?;
        debug!(%kind, %id, removed, "history delete");
        Ok(())
    }

    /// Number of stored entries of `kind`
    pub fn count(&self, kind: HistoryKind) -> Result<usize> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Statistics for one category
    pub fn stats(&self, kind: HistoryKind) -> Result<StoreStats> {
        let (total_entries, oldest_timestamp, newest_timestamp) = self.conn.query_row(
            &format!(
                "SELECT COUNT(*), MIN(timestamp), MAX(timestamp) FROM {}",
                kind.table()
            ),
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(StoreStats {
            kind: Some(kind),
            total_entries,
            oldest_timestamp,
            newest_timestamp,
        })
    }

    /// Erase every category. Ids handed out before the reset are never reused.
    pub fn reset(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for kind in HistoryKind::ALL {
            // DELETE keeps the AUTOINCREMENT counter in sqlite_sequence.
            tx.execute(&format!("DELETE FROM {}", kind.table()), [])?;
        }
        tx.commit()?;
        info!("history store reset");
        Ok(())
    }

    /// Close the underlying connection
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Storage(e))
    }
}

enum StoreState {
    Unopened,
    Open(HistoryStore),
    Failed(String),
    Closed,
}

/// Shared, lazily opened handle to a [`HistoryStore`].
///
/// The connection is opened on first use. If opening fails, every later call
/// fails with [`Error::StoreUnavailable`] until [`StoreHandle::reconnect`]
/// succeeds.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<StoreHandleInner>,
}

struct StoreHandleInner {
    path: Option<PathBuf>,
    limits: StoreLimits,
    state: Mutex<StoreState>,
}

impl StoreHandle {
    /// Handle that opens `path` on first use
    pub fn new(path: impl Into<PathBuf>, limits: StoreLimits) -> Self {
        Self {
            inner: Arc::new(StoreHandleInner {
                path: Some(path.into()),
                limits,
                state: Mutex::new(StoreState::Unopened),
            }),
        }
    }

    /// Handle around an already opened store
    pub fn from_store(store: HistoryStore) -> Self {
        Self {
            inner: Arc::new(StoreHandleInner {
                path: None,
                limits: store.limits(),
                state: Mutex::new(StoreState::Open(store)),
            }),
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.inner.limits
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn open_into(&self, state: &mut StoreState) -> Result<()> {
        let Some(path) = &self.inner.path else {
            *state = StoreState::Failed("in-memory store cannot be reopened".to_string());
            return Err(Error::store_unavailable("in-memory store cannot be reopened"));
        };
        match HistoryStore::open(path, self.inner.limits) {
            Ok(store) => {
                *state = StoreState::Open(store);
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                *state = StoreState::Failed(reason.clone());
                Err(Error::store_unavailable(reason))
            }
        }
    }

    /// Run `f` against the open store, opening it first if needed
    pub fn with_store<T>(&self, f: impl FnOnce(&mut HistoryStore) -> Result<T>) -> Result<T> {
        let mut state = self.lock_state();
        if matches!(*state, StoreState::Unopened) {
            self.open_into(&mut state)?;
        }
        match &mut *state {
            StoreState::Open(store) => f(store),
            StoreState::Failed(reason) => Err(Error::store_unavailable(reason.clone())),
            StoreState::Closed => Err(Error::store_unavailable("store closed")),
            StoreState::Unopened => Err(Error::store_unavailable("store not opened")),
        }
    }

    /// Drop any existing connection and try to open a fresh one
    pub fn reconnect(&self) -> Result<()> {
        let mut state = self.lock_state();
        if let StoreState::Open(store) = std::mem::replace(&mut *state, StoreState::Unopened) {
            store.close()?;
        }
        self.open_into(&mut state)
    }

    /// Close the connection; later calls fail until [`StoreHandle::reconnect`]
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, StoreState::Closed) {
            StoreState::Open(store) => store.close(),
            _ => Ok(()),
        }
    }

    pub fn insert(&self, kind: HistoryKind, content: &str) -> Result<Option<Insertion>> {
        self.with_store(|store| store.insert(kind, content))
    }

    pub fn query(&self, kind: HistoryKind, request: &PageRequest) -> Result<Page> {
        self.with_store(|store| store.query(kind, request))
    }

    pub fn delete(&self, kind: HistoryKind, id: EntryId) -> Result<()> {
        self.with_store(|store| store.delete(kind, id))
    }

    pub fn count(&self, kind: HistoryKind) -> Result<usize> {
        self.with_store(|store| store.count(kind))
    }

    pub fn stats(&self, kind: HistoryKind) -> Result<StoreStats> {
        self.with_store(|store| store.stats(kind))
    }

    pub fn reset(&self) -> Result<()> {
        self.with_store(|store| store.reset())
    }
}
