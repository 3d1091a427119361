// ABOUTME: SQLite-backed notification store, the destination of the one-way TSV migration.
// ABOUTME: Mirrors the line fields in a notifications table and tracks the id high-water mark in meta.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use intray_core::model::{format_timestamp, now_utc, parse_timestamp};
use intray_core::{
    Filter, Level, NewNotification, Notification, NotificationState, PaneAddress, Querier,
    Query, QueryEngine, RecordError,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::StoreError;
use crate::tsv::StoreOptions;
use crate::{CleanupReport, Retention, Store, next_id, with_retry};

const COLUMNS: &str =
    "id, timestamp, state, session, window, pane, message, pane_created, level, read_timestamp";

/// A notification store in a single SQLite database file. Opened in WAL
/// mode so readers do not block the writer.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
    opts: StoreOptions,
}

impl SqliteStore {
    /// Open or create the database at `path` and ensure the schema exists.
    /// `opts.lock_timeout` becomes SQLite's busy timeout.
    pub fn open(path: &Path, opts: StoreOptions) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(opts.lock_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY,
                timestamp TEXT NOT NULL,
                state TEXT NOT NULL CHECK (state IN ('active', 'dismissed')),
                session TEXT NOT NULL DEFAULT '',
                window TEXT NOT NULL DEFAULT '',
                pane TEXT NOT NULL DEFAULT '',
                message TEXT NOT NULL,
                pane_created TEXT NOT NULL DEFAULT '',
                level TEXT NOT NULL CHECK (level IN ('info', 'warning', 'error', 'critical')),
                read_timestamp TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_state ON notifications(state);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            opts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The last id ever allocated, from the meta table.
    pub fn get_last_id(&self) -> Result<Option<u64>, rusqlite::Error> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'last_id'", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value.and_then(|v| v.parse::<u64>().ok()))
    }

    pub fn set_last_id(&self, id: u64) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES ('last_id', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![id.to_string()],
        )?;
        Ok(())
    }

    /// Insert or replace a record by id.
    pub fn upsert(&self, n: &Notification) -> Result<(), rusqlite::Error> {
        upsert_on(&self.conn, n)
    }

    /// Upsert every record in one transaction and raise the high-water
    /// mark to cover them. Nothing is kept if any row fails.
    pub fn import(&mut self, records: &[Notification]) -> Result<usize, rusqlite::Error> {
        let tx = self.conn.transaction()?;
        for n in records {
            upsert_on(&tx, n)?;
        }
        let max = records.iter().map(|n| n.id).max().unwrap_or(0);
        let last = last_id_on(&tx)?.unwrap_or(0);
        if max > last {
            set_last_id_on(&tx, max)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Every record in id order.
    pub fn list_all(&self) -> Result<Vec<Notification>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM notifications ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_notification)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn add_with_timestamp(
        &self,
        input: NewNotification,
        timestamp: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        input.validate()?;
        let id = with_retry("add", &self.opts, || {
            let tx = self.conn.unchecked_transaction()?;
            let max: Option<u64> =
                tx.query_row("SELECT MAX(id) FROM notifications", [], |row| row.get(0))?;
            let id = next_id(max.unwrap_or(0).max(last_id_on(&tx)?.unwrap_or(0)))?;
            upsert_on(&tx, &input.clone().into_notification(id, timestamp))?;
            set_last_id_on(&tx, id)?;
            tx.commit()?;
            Ok(id)
        })?;
        tracing::debug!(id, path = %self.path.display(), "notification added");
        Ok(id)
    }

    pub fn mark_read_at(&self, id: u64, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.update_one("mark_read", id, "read_timestamp = ?3", &format_timestamp(&at))?;
        tracing::debug!(id, "notification marked read");
        Ok(())
    }

    /// Run `UPDATE ... SET {set}` for one id, failing with NotFound when no
    /// row has that id. `?1` is the id, `?2` the update time, `?3` `value`.
    fn update_one(
        &self,
        op: &'static str,
        id: u64,
        set: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let sql = format!("UPDATE notifications SET {set}, updated_at = ?2 WHERE id = ?1");
        let changed = with_retry(op, &self.opts, || {
            Ok(self
                .conn
                .execute(&sql, params![id, format_timestamp(&now_utc()), value])?)
        })?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn exists(&self, id: u64) -> Result<bool, StoreError> {
        let found: Option<u64> = self
            .conn
            .query_row("SELECT id FROM notifications WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn expired_ids(&self, retention: &Retention) -> Result<Vec<u64>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp FROM notifications WHERE state = 'dismissed' ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, u64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut ids = Vec::new();
        for row in rows {
            let (id, raw) = row?;
            match parse_timestamp(&raw) {
                Some(ts) if retention.expires(ts) => ids.push(id),
                Some(_) => {}
                None => tracing::warn!(id, timestamp = %raw, "skipping record with unreadable timestamp"),
            }
        }
        Ok(ids)
    }
}

impl Store for SqliteStore {
    fn add(&self, input: NewNotification) -> Result<u64, StoreError> {
        self.add_with_timestamp(input, now_utc())
    }

    fn list(&self, filter: &Filter) -> Result<Vec<Notification>, StoreError> {
        let records = self.list_all()?;
        Ok(QueryEngine.select(records, &Query::new(filter.clone())))
    }

    fn get(&self, id: u64) -> Result<Notification, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM notifications WHERE id = ?1"),
                params![id],
                row_to_notification,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }

    fn dismiss(&self, id: u64) -> Result<(), StoreError> {
        let changed = with_retry("dismiss", &self.opts, || {
            Ok(self.conn.execute(
                "UPDATE notifications SET state = 'dismissed', updated_at = ?2
                 WHERE id = ?1 AND state = 'active'",
                params![id, format_timestamp(&now_utc())],
            )?)
        })?;
        if changed == 0 && !self.exists(id)? {
            return Err(StoreError::NotFound(id));
        }
        tracing::debug!(id, "notification dismissed");
        Ok(())
    }

    fn dismiss_all(&self) -> Result<usize, StoreError> {
        let count = with_retry("dismiss_all", &self.opts, || {
            Ok(self.conn.execute(
                "UPDATE notifications SET state = 'dismissed', updated_at = ?1
                 WHERE state = 'active'",
                params![format_timestamp(&now_utc())],
            )?)
        })?;
        tracing::debug!(count, "all active notifications dismissed");
        Ok(count)
    }

    fn mark_read(&self, id: u64) -> Result<(), StoreError> {
        self.mark_read_at(id, now_utc())
    }

    fn mark_unread(&self, id: u64) -> Result<(), StoreError> {
        self.update_one("mark_unread", id, "read_timestamp = ?3", "")?;
        tracing::debug!(id, "notification marked unread");
        Ok(())
    }

    fn cleanup(&self, days: u32, dry_run: bool) -> Result<CleanupReport, StoreError> {
        let retention = Retention::days(days);
        let cutoff = retention.cutoff;

        if dry_run {
            let ids = self.expired_ids(&retention)?;
            tracing::info!(would_remove = ids.len(), %cutoff, "cleanup dry run");
            return Ok(CleanupReport {
                cutoff,
                ids,
                dry_run: true,
            });
        }

        let ids = with_retry("cleanup", &self.opts, || {
            let tx = self.conn.unchecked_transaction()?;
            let ids = self.expired_ids(&retention)?;
            if let Some(&max) = ids.iter().max()
                && max > last_id_on(&tx)?.unwrap_or(0)
            {
                set_last_id_on(&tx, max)?;
            }
            for id in &ids {
                tx.execute("DELETE FROM notifications WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
            Ok(ids)
        })?;
        tracing::info!(removed = ids.len(), %cutoff, "cleanup completed");
        Ok(CleanupReport {
            cutoff,
            ids,
            dry_run: false,
        })
    }

    fn active_count(&self) -> Result<usize, StoreError> {
        let count: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE state = 'active'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn upsert_on(conn: &Connection, n: &Notification) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO notifications
            (id, timestamp, state, session, window, pane, message, pane_created, level, read_timestamp, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
            timestamp = excluded.timestamp,
            state = excluded.state,
            session = excluded.session,
            window = excluded.window,
            pane = excluded.pane,
            message = excluded.message,
            pane_created = excluded.pane_created,
            level = excluded.level,
            read_timestamp = excluded.read_timestamp,
            updated_at = excluded.updated_at",
        params![
            n.id,
            format_timestamp(&n.timestamp),
            n.state.as_str(),
            n.session().unwrap_or(""),
            n.window().unwrap_or(""),
            n.pane().unwrap_or(""),
            n.message,
            n.pane_created.as_deref().unwrap_or(""),
            n.level.as_str(),
            n.read_timestamp.as_ref().map(format_timestamp).unwrap_or_default(),
            format_timestamp(&now_utc()),
        ],
    )?;
    Ok(())
}

fn last_id_on(conn: &Connection) -> Result<Option<u64>, rusqlite::Error> {
    let value: Option<String> = conn
        .query_row("SELECT value FROM meta WHERE key = 'last_id'", [], |row| row.get(0))
        .optional()?;
    Ok(value.and_then(|v| v.parse::<u64>().ok()))
}

fn set_last_id_on(conn: &Connection, id: u64) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('last_id', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![id.to_string()],
    )?;
    Ok(())
}

fn row_to_notification(row: &Row<'_>) -> Result<Notification, rusqlite::Error> {
    let raw_ts: String = row.get(1)?;
    let timestamp = parse_timestamp(&raw_ts)
        .ok_or_else(|| bad_column(1, RecordError::InvalidTimestamp(raw_ts.clone())))?;

    let raw_state: String = row.get(2)?;
    let state: NotificationState = raw_state
        .parse()
        .map_err(|_| bad_column(2, RecordError::InvalidState(raw_state.clone())))?;

    let session: String = row.get(3)?;
    let window: String = row.get(4)?;
    let pane: String = row.get(5)?;
    let address = PaneAddress::from_parts(Some(session.as_str()), Some(window.as_str()), Some(pane.as_str()))
        .map_err(|_| bad_column(3, RecordError::PartialAddress))?;

    let raw_level: String = row.get(8)?;
    let level: Level = raw_level
        .parse()
        .map_err(|_| bad_column(8, RecordError::InvalidLevel(raw_level.clone())))?;

    let raw_read: String = row.get(9)?;
    let read_timestamp = if raw_read.is_empty() {
        None
    } else {
        Some(
            parse_timestamp(&raw_read)
                .ok_or_else(|| bad_column(9, RecordError::InvalidReadTimestamp(raw_read.clone())))?,
        )
    };

    let pane_created: String = row.get(7)?;
    Ok(Notification {
        id: row.get(0)?,
        timestamp,
        state,
        address,
        message: row.get(6)?,
        pane_created: Some(pane_created).filter(|p| !p.is_empty()),
        level,
        read_timestamp,
    })
}

fn bad_column(idx: usize, err: RecordError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}
