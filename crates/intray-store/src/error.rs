// ABOUTME: Error types for store operations and for the TSV to SQLite migration.
// ABOUTME: Store errors separate caller mistakes (NotFound, InvalidArgument) from transient failures.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use intray_core::{RecordError, ValidationError};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("notification not found: {0}")]
    NotFound(u64),

    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),

    #[error("timed out after {}ms waiting for exclusive access to {}", .waited.as_millis(), .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("notification {id} is stored in a malformed record: {source}")]
    CorruptRecord {
        id: u64,
        #[source]
        source: RecordError,
    },

    #[error("no notification ids left after {0}")]
    IdSpaceExhausted(u64),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Lock contention and interrupted I/O are worth another attempt;
    /// everything else surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::LockTimeout { .. } => true,
            StoreError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Fatal errors that stop a migration or rollback. Row-level problems are
/// not errors; they are collected in `MigrationStats::warnings`.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration: {0} path cannot be empty")]
    EmptyPath(&'static str),

    #[error("migration: dry-run cannot be combined with rollback")]
    DryRunWithRollback,

    #[error("migration: source file {} does not exist", .0.display())]
    SourceMissing(PathBuf),

    #[error("migration: backup already exists at {}", .0.display())]
    BackupExists(PathBuf),

    #[error("rollback: backup not found at {}", .0.display())]
    BackupMissing(PathBuf),

    #[error(
        "migration: transaction rolled back, {failed} rows not imported (source and backup at {} untouched): {source}",
        .backup_path.display()
    )]
    Transaction {
        failed: usize,
        backup_path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("migration: {0}")]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
