// ABOUTME: Persistence layer for intray: the flat-file store, the SQLite store, and the migration between them.
// ABOUTME: Exposes one narrow capability trait per responsibility: Store for records, Migrator for the one-way move.

pub mod error;
pub mod lock;
pub mod migration;
pub mod sqlite;
pub mod tsv;

use std::thread;

use chrono::{DateTime, Utc};
use intray_core::model::{days_before, now_utc};
use intray_core::record::MAX_ID;
use intray_core::{Filter, NewNotification, Notification};
use serde::Serialize;

pub use error::{MigrationError, StoreError};
pub use lock::{LockFile, LockGuard};
pub use migration::{
    MigrationOptions, MigrationReport, MigrationStats, Migrator, RowIssue, TsvToSqlite,
};
pub use sqlite::SqliteStore;
pub use tsv::{StoreOptions, TsvStore};

/// Record persistence. Every method takes `&self`; a handle is cheap to
/// share and any locking happens inside the call.
pub trait Store {
    /// Validate and append a new Active record, returning its id.
    fn add(&self, input: NewNotification) -> Result<u64, StoreError>;

    /// Records matching `filter`, unread before read.
    fn list(&self, filter: &Filter) -> Result<Vec<Notification>, StoreError>;

    fn get(&self, id: u64) -> Result<Notification, StoreError>;

    /// Active -> Dismissed. Dismissing twice is not an error.
    fn dismiss(&self, id: u64) -> Result<(), StoreError>;

    /// Dismiss every Active record, returning how many changed.
    fn dismiss_all(&self) -> Result<usize, StoreError>;

    fn mark_read(&self, id: u64) -> Result<(), StoreError>;

    fn mark_unread(&self, id: u64) -> Result<(), StoreError>;

    /// Remove Dismissed records older than `days`. With `dry_run` nothing
    /// is written and the report lists what would go.
    fn cleanup(&self, days: u32, dry_run: bool) -> Result<CleanupReport, StoreError>;

    fn active_count(&self) -> Result<usize, StoreError>;
}

/// Outcome of a cleanup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub cutoff: DateTime<Utc>,
    /// Removed ids, or the ids that would be removed on a dry run.
    pub ids: Vec<u64>,
    pub dry_run: bool,
}

impl CleanupReport {
    pub fn removed(&self) -> usize {
        self.ids.len()
    }
}

/// The id after `highest`, or `IdSpaceExhausted` once ids run out.
pub(crate) fn next_id(highest: u64) -> Result<u64, StoreError> {
    highest
        .checked_add(1)
        .filter(|id| *id <= MAX_ID)
        .ok_or(StoreError::IdSpaceExhausted(highest))
}

/// Run `f`, retrying retryable failures up to `opts.retries` extra times.
pub(crate) fn with_retry<T>(
    op: &'static str,
    opts: &StoreOptions,
    mut f: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut attempt = 0;
    loop {
        match f() {
            Err(e) if e.is_retryable() && attempt < opts.retries => {
                attempt += 1;
                tracing::warn!(op, attempt, error = %e, "retrying store write");
                thread::sleep(opts.retry_backoff);
            }
            other => return other,
        }
    }
}

/// Which dismissed records a cleanup run expires. Zero days expires all of
/// them, including records stamped within the current second.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Retention {
    pub cutoff: DateTime<Utc>,
    all: bool,
}

impl Retention {
    pub fn days(days: u32) -> Self {
        Self {
            cutoff: days_before(now_utc(), days),
            all: days == 0,
        }
    }

    pub fn expires(&self, timestamp: DateTime<Utc>) -> bool {
        self.all || timestamp < self.cutoff
    }
}
