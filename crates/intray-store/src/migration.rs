// ABOUTME: One-way migration of the flat-file store into SQLite, with a byte-exact backup and rollback.
// ABOUTME: Row problems are collected as warnings; only setup and transaction failures abort the run.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use intray_core::Notification;
use intray_core::record::decode_line;
use serde::Serialize;

use crate::error::MigrationError;
use crate::lock::{LockFile, LockGuard};
use crate::sqlite::SqliteStore;
use crate::tsv::{StoreOptions, sidecar, write_atomic};

/// Parameters for a migration or a rollback.
#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    pub tsv_path: PathBuf,
    pub sqlite_path: PathBuf,
    /// Defaults to `<tsv>.sqlite-migration.bak`.
    pub backup_path: Option<PathBuf>,
    pub dry_run: bool,
    pub rollback: bool,
}

impl MigrationOptions {
    pub fn new(tsv_path: impl Into<PathBuf>, sqlite_path: impl Into<PathBuf>) -> Self {
        Self {
            tsv_path: tsv_path.into(),
            sqlite_path: sqlite_path.into(),
            ..Self::default()
        }
    }

    pub fn with_backup_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_path = Some(path.into());
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn rollback(mut self) -> Self {
        self.rollback = true;
        self
    }

    /// Checked before any I/O.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.dry_run && self.rollback {
            return Err(MigrationError::DryRunWithRollback);
        }
        if self.tsv_path.as_os_str().is_empty() {
            return Err(MigrationError::EmptyPath("tsv"));
        }
        if self.sqlite_path.as_os_str().is_empty() {
            return Err(MigrationError::EmptyPath("sqlite"));
        }
        Ok(())
    }

    pub fn resolved_backup_path(&self) -> PathBuf {
        match &self.backup_path {
            Some(p) if !p.as_os_str().is_empty() => p.clone(),
            _ => default_backup_path(&self.tsv_path),
        }
    }
}

pub fn default_backup_path(tsv_path: &Path) -> PathBuf {
    sidecar(tsv_path, "sqlite-migration.bak")
}

/// A source line that was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    /// 1-based line number in the source file.
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    /// Non-blank source lines.
    pub total: usize,
    /// Rows imported, or that would be imported on a dry run.
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Earlier copies of an id superseded by a later line.
    pub duplicates: usize,
    pub backup_path: Option<PathBuf>,
    pub warnings: Vec<RowIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum MigrationReport {
    Migrated(MigrationStats),
    RolledBack {
        tsv_path: PathBuf,
        sqlite_path: PathBuf,
        backup_path: PathBuf,
    },
}

/// The one-way storage migration capability.
pub trait Migrator {
    fn migrate(&self, opts: &MigrationOptions) -> Result<MigrationStats, MigrationError>;

    /// Restore the source from its backup and delete the destination.
    fn rollback(&self, opts: &MigrationOptions) -> Result<(), MigrationError>;

    /// Validate `opts`, then migrate or roll back as it asks.
    fn run(&self, opts: &MigrationOptions) -> Result<MigrationReport, MigrationError> {
        opts.validate()?;
        if opts.rollback {
            self.rollback(opts)?;
            return Ok(MigrationReport::RolledBack {
                tsv_path: opts.tsv_path.clone(),
                sqlite_path: opts.sqlite_path.clone(),
                backup_path: opts.resolved_backup_path(),
            });
        }
        Ok(MigrationReport::Migrated(self.migrate(opts)?))
    }
}

/// Moves a flat-file store into SQLite.
///
/// Among valid rows sharing an id, the last one in the file is imported
/// and each earlier copy counts once in `duplicates`.
#[derive(Debug, Clone, Default)]
pub struct TsvToSqlite {
    store_opts: StoreOptions,
}

impl TsvToSqlite {
    pub fn new(store_opts: StoreOptions) -> Self {
        Self { store_opts }
    }

    fn lock_source(&self, tsv_path: &Path) -> Result<LockGuard, MigrationError> {
        let lock = LockFile::new(sidecar(tsv_path, "lock"));
        Ok(lock.exclusive(self.store_opts.lock_timeout)?)
    }
}

impl Migrator for TsvToSqlite {
    fn migrate(&self, opts: &MigrationOptions) -> Result<MigrationStats, MigrationError> {
        opts.validate()?;
        if !opts.tsv_path.is_file() {
            return Err(MigrationError::SourceMissing(opts.tsv_path.clone()));
        }

        // Held until the import commits so no writer changes the source
        // between the backup and the import.
        let _guard = if opts.dry_run {
            None
        } else {
            Some(self.lock_source(&opts.tsv_path)?)
        };

        let source = match fs::read(&opts.tsv_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(MigrationError::SourceMissing(opts.tsv_path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let (rows, mut stats) = parse_rows(&source);
        for issue in &stats.warnings {
            tracing::warn!(path = %opts.tsv_path.display(), line = issue.line, reason = %issue.reason, "skipping row");
        }

        if opts.dry_run {
            stats.migrated = rows.len();
            tracing::info!(
                total = stats.total,
                migrated = stats.migrated,
                skipped = stats.skipped,
                duplicates = stats.duplicates,
                "migration dry run"
            );
            return Ok(stats);
        }

        let backup_path = opts.resolved_backup_path();
        write_backup(&backup_path, &source)?;
        stats.backup_path = Some(backup_path.clone());
        tracing::info!(backup = %backup_path.display(), "source backed up");

        let dest_existed = opts.sqlite_path.exists();
        let records: Vec<Notification> = rows.into_values().collect();

        let mut store = match SqliteStore::open(&opts.sqlite_path, self.store_opts.clone()) {
            Ok(store) => store,
            Err(e) => {
                if !dest_existed {
                    remove_database(&opts.sqlite_path)?;
                }
                return Err(e.into());
            }
        };

        if let Err(source) = store.import(&records) {
            drop(store);
            stats.failed = records.len();
            if !dest_existed {
                remove_database(&opts.sqlite_path)?;
            }
            tracing::warn!(failed = stats.failed, error = %source, "migration transaction rolled back");
            return Err(MigrationError::Transaction {
                failed: stats.failed,
                backup_path,
                source,
            });
        }

        stats.migrated = records.len();
        tracing::info!(
            total = stats.total,
            migrated = stats.migrated,
            skipped = stats.skipped,
            duplicates = stats.duplicates,
            dest = %opts.sqlite_path.display(),
            "migration completed"
        );
        Ok(stats)
    }

    fn rollback(&self, opts: &MigrationOptions) -> Result<(), MigrationError> {
        opts.validate()?;
        let backup_path = opts.resolved_backup_path();
        let backup = match fs::read(&backup_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(MigrationError::BackupMissing(backup_path));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = opts.tsv_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let _guard = self.lock_source(&opts.tsv_path)?;
        write_atomic(&opts.tsv_path, &backup)?;
        remove_database(&opts.sqlite_path)?;

        tracing::info!(
            tsv = %opts.tsv_path.display(),
            backup = %backup_path.display(),
            "migration rolled back"
        );
        Ok(())
    }
}

/// Decode every non-blank line, keeping the last valid row per id.
fn parse_rows(source: &[u8]) -> (BTreeMap<u64, Notification>, MigrationStats) {
    let mut stats = MigrationStats::default();
    let mut rows = BTreeMap::new();
    let text = String::from_utf8_lossy(source);

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        stats.total += 1;
        match decode_line(line) {
            Ok(n) => {
                if rows.insert(n.id, n).is_some() {
                    stats.duplicates += 1;
                }
            }
            Err(e) => {
                stats.skipped += 1;
                stats.warnings.push(RowIssue {
                    line: idx + 1,
                    reason: e.to_string(),
                });
            }
        }
    }
    (rows, stats)
}

/// Write the backup without ever replacing an existing file.
fn write_backup(path: &Path, bytes: &[u8]) -> Result<(), MigrationError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(MigrationError::BackupExists(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Remove a database file along with its WAL and shared-memory files.
fn remove_database(path: &Path) -> io::Result<()> {
    for p in [path.to_path_buf(), sidecar_dash(path, "wal"), sidecar_dash(path, "shm")] {
        match fs::remove_file(&p) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn sidecar_dash(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push("-");
    name.push(suffix);
    path.with_file_name(name)
}
