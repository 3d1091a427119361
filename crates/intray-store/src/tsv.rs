// ABOUTME: File-backed notification store: one tab-separated record per line, shared by many processes.
// ABOUTME: Writers hold an exclusive lock for a full read-modify-write and replace the file atomically.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use intray_core::model::now_utc;
use intray_core::record::{decode_line, encode_line, peek_id, peek_state};
use intray_core::{
    Filter, NewNotification, Notification, NotificationState, Querier, Query, QueryEngine,
};

use crate::error::StoreError;
use crate::lock::{LockFile, LockGuard};
use crate::{CleanupReport, Retention, Store, next_id, with_retry};

/// Tunables for a store handle. Supplied by the caller; the store loads
/// no configuration of its own.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Bounded wait for exclusive access before a write gives up.
    pub lock_timeout: Duration,
    /// Bounded wait for shared access before a read falls back to the
    /// current file without the lock.
    pub read_lock_timeout: Duration,
    /// Extra attempts for a write that failed with a retryable error.
    pub retries: u32,
    pub retry_backoff: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(10),
            read_lock_timeout: Duration::from_secs(1),
            retries: 2,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

/// One line of the data file. A line that is not valid UTF-8 is read
/// through a lossy view and keeps its original bytes for rewrites.
struct Line {
    text: String,
    raw: Option<Vec<u8>>,
}

impl Line {
    fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self {
                text: text.to_string(),
                raw: None,
            },
            Err(_) => Self {
                text: String::from_utf8_lossy(bytes).into_owned(),
                raw: Some(bytes.to_vec()),
            },
        }
    }

    fn encoded(n: &Notification) -> Self {
        Self {
            text: encode_line(n),
            raw: None,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        self.raw.as_deref().unwrap_or(self.text.as_bytes())
    }
}

/// The lines of the data file plus the id high-water mark, loaded under
/// the exclusive lock. Lines that are not touched by a mutation are
/// written back byte-for-byte, malformed ones included.
struct Document {
    lines: Vec<Line>,
    last_id: u64,
    lines_dirty: bool,
    seq_dirty: bool,
}

impl Document {
    fn max_id(&self) -> u64 {
        self.lines
            .iter()
            .filter_map(|l| peek_id(&l.text))
            .max()
            .unwrap_or(0)
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        next_id(self.max_id().max(self.last_id))
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.lines.iter().position(|l| peek_id(&l.text) == Some(id))
    }

    fn decode_at(&self, idx: usize, id: u64) -> Result<Notification, StoreError> {
        decode_line(&self.lines[idx].text).map_err(|source| StoreError::CorruptRecord { id, source })
    }

    fn replace(&mut self, idx: usize, n: &Notification) {
        self.lines[idx] = Line::encoded(n);
        self.lines_dirty = true;
    }

    /// Apply `f` to the record with `id`, writing it back only if `f`
    /// reports a change.
    fn update(
        &mut self,
        id: u64,
        f: impl FnOnce(&mut Notification) -> bool,
    ) -> Result<bool, StoreError> {
        let idx = self.position(id).ok_or(StoreError::NotFound(id))?;
        let mut n = self.decode_at(idx, id)?;
        let changed = f(&mut n);
        if changed {
            self.replace(idx, &n);
        }
        Ok(changed)
    }
}

/// Handle on a flat-file store. Construct one per process and pass it to
/// whatever needs it; any number of handles may point at the same file.
#[derive(Debug, Clone)]
pub struct TsvStore {
    path: PathBuf,
    seq_path: PathBuf,
    lock: LockFile,
    opts: StoreOptions,
}

impl TsvStore {
    /// Open a store at `path`, creating the parent directory if needed.
    /// The data file itself is created by the first write.
    pub fn open(path: &Path, opts: StoreOptions) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            seq_path: sidecar(path, "seq"),
            lock: LockFile::new(sidecar(path, "lock")),
            opts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_file(&self) -> &LockFile {
        &self.lock
    }

    /// Add with an explicit creation time. Callers importing history or
    /// replaying hooks use this; `add` stamps the current time.
    pub fn add_with_timestamp(
        &self,
        input: NewNotification,
        timestamp: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        input.validate()?;
        self.mutate("add", |doc| {
            let id = doc.next_id()?;
            let n = input.clone().into_notification(id, timestamp);
            doc.lines.push(Line::encoded(&n));
            doc.last_id = id;
            doc.lines_dirty = true;
            doc.seq_dirty = true;
            Ok(id)
        })
        .inspect(|id| tracing::debug!(id, path = %self.path.display(), "notification added"))
    }

    /// Every well-formed record in file order.
    pub fn list_all(&self) -> Result<Vec<Notification>, StoreError> {
        self.snapshot(|lines| decode_all(&self.path, lines))
    }

    /// Mark read with a caller-supplied timestamp.
    pub fn mark_read_at(&self, id: u64, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.mutate("mark_read", |doc| {
            doc.update(id, |n| {
                if n.read_timestamp == Some(at) {
                    return false;
                }
                n.mark_read(at);
                true
            })
        })?;
        tracing::debug!(id, "notification marked read");
        Ok(())
    }

    /// The id high-water mark recorded on disk.
    pub fn last_allocated_id(&self) -> Result<u64, StoreError> {
        Ok(read_seq(&self.seq_path)?)
    }

    /// Run a read against the current file. Takes a shared lock when it
    /// can get one in time; otherwise reads anyway, which is safe because
    /// writers only ever replace the file whole.
    fn snapshot<T>(&self, f: impl FnOnce(&[Line]) -> T) -> Result<T, StoreError> {
        let _guard: Option<LockGuard> = match self.lock.shared(self.opts.read_lock_timeout) {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "reading without shared lock; result may be one write behind"
                );
                None
            }
        };
        let lines = read_lines(&self.path)?;
        Ok(f(&lines))
    }

    /// Exclusive read-modify-write, retried on lock timeouts and transient
    /// I/O errors. The lock is released when the guard drops, on success
    /// and on every error path.
    fn mutate<T>(
        &self,
        op: &'static str,
        mut f: impl FnMut(&mut Document) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        with_retry(op, &self.opts, || self.mutate_once(&mut f))
    }

    fn mutate_once<T>(
        &self,
        f: &mut impl FnMut(&mut Document) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.exclusive(self.opts.lock_timeout)?;

        let mut doc = Document {
            lines: read_lines(&self.path)?,
            last_id: read_seq(&self.seq_path)?,
            lines_dirty: false,
            seq_dirty: false,
        };
        let out = f(&mut doc)?;

        // The high-water mark goes first so a crash between the two writes
        // can only skip an id, never reuse one.
        if doc.seq_dirty {
            write_atomic(&self.seq_path, format!("{}\n", doc.last_id).as_bytes())?;
        }
        if doc.lines_dirty {
            write_atomic(&self.path, &render(&doc.lines))?;
        }
        Ok(out)
    }
}

impl Store for TsvStore {
    fn add(&self, input: NewNotification) -> Result<u64, StoreError> {
        self.add_with_timestamp(input, now_utc())
    }

    fn list(&self, filter: &Filter) -> Result<Vec<Notification>, StoreError> {
        let records = self.list_all()?;
        Ok(QueryEngine.select(records, &Query::new(filter.clone())))
    }

    fn get(&self, id: u64) -> Result<Notification, StoreError> {
        self.snapshot(|lines| {
            let line = lines
                .iter()
                .find(|l| peek_id(&l.text) == Some(id))
                .ok_or(StoreError::NotFound(id))?;
            decode_line(&line.text).map_err(|source| StoreError::CorruptRecord { id, source })
        })?
    }

    fn dismiss(&self, id: u64) -> Result<(), StoreError> {
        let changed = self.mutate("dismiss", |doc| doc.update(id, |n| n.dismiss()))?;
        if changed {
            tracing::debug!(id, "notification dismissed");
        } else {
            tracing::debug!(id, "notification already dismissed");
        }
        Ok(())
    }

    fn dismiss_all(&self) -> Result<usize, StoreError> {
        let path = self.path.clone();
        let count = self.mutate("dismiss_all", |doc| {
            let mut count = 0;
            for idx in 0..doc.lines.len() {
                if peek_state(&doc.lines[idx].text) != Some(NotificationState::Active) {
                    continue;
                }
                match decode_line(&doc.lines[idx].text) {
                    Ok(mut n) => {
                        n.dismiss();
                        doc.replace(idx, &n);
                        count += 1;
                    }
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        line = idx + 1,
                        error = %e,
                        "skipping malformed record during dismiss-all"
                    ),
                }
            }
            Ok(count)
        })?;
        tracing::debug!(count, "all active notifications dismissed");
        Ok(count)
    }

    fn mark_read(&self, id: u64) -> Result<(), StoreError> {
        self.mark_read_at(id, now_utc())
    }

    fn mark_unread(&self, id: u64) -> Result<(), StoreError> {
        self.mutate("mark_unread", |doc| {
            doc.update(id, |n| {
                let was_read = n.is_read();
                n.mark_unread();
                was_read
            })
        })?;
        tracing::debug!(id, "notification marked unread");
        Ok(())
    }

    fn cleanup(&self, days: u32, dry_run: bool) -> Result<CleanupReport, StoreError> {
        let retention = Retention::days(days);
        let cutoff = retention.cutoff;

        if dry_run {
            let ids = self.snapshot(|lines| cleanup_candidates(lines, &retention))?;
            tracing::info!(would_remove = ids.len(), %cutoff, "cleanup dry run");
            return Ok(CleanupReport {
                cutoff,
                ids,
                dry_run: true,
            });
        }

        let ids = self.mutate("cleanup", |doc| {
            let ids = cleanup_candidates(&doc.lines, &retention);
            if ids.is_empty() {
                return Ok(ids);
            }
            let max = doc.max_id();
            if max > doc.last_id {
                doc.last_id = max;
                doc.seq_dirty = true;
            }
            doc.lines.retain(|l| !is_expired(&l.text, &retention));
            doc.lines_dirty = true;
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
        self.snapshot(|lines| {
            lines
                .iter()
                .filter(|l| peek_state(&l.text) == Some(NotificationState::Active))
                .count()
        })
    }
}

/// Dismissed records past retention. Active records never qualify.
fn cleanup_candidates(lines: &[Line], retention: &Retention) -> Vec<u64> {
    lines
        .iter()
        .filter(|l| is_expired(&l.text, retention))
        .filter_map(|l| peek_id(&l.text))
        .collect()
}

fn is_expired(line: &str, retention: &Retention) -> bool {
    if peek_state(line) != Some(NotificationState::Dismissed) {
        return false;
    }
    match decode_line(line) {
        Ok(n) => retention.expires(n.timestamp),
        Err(_) => false,
    }
}

fn decode_all(path: &Path, lines: &[Line]) -> Vec<Notification> {
    let mut out = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        match decode_line(&line.text) {
            Ok(n) => out.push(n),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = idx + 1,
                error = %e,
                "skipping malformed record"
            ),
        }
    }
    out
}

/// `<file>.<suffix>` next to the data file.
pub(crate) fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn read_lines(path: &Path) -> Result<Vec<Line>, StoreError> {
    let content = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(content
        .split(|b| *b == b'\n')
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
        .filter(|l| !l.trim_ascii().is_empty())
        .map(Line::from_bytes)
        .collect())
}

fn read_seq(path: &Path) -> io::Result<u64> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(s.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(path = %path.display(), "ignoring unreadable id high-water mark");
            0
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

fn render(lines: &[Line]) -> Vec<u8> {
    let mut out = Vec::new();
    for line in lines {
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    out
}

/// Write to a temp file, fsync, rename over `path`, then fsync the
/// directory so the rename itself is durable.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = sidecar(path, "tmp");
    let mut tmp = File::create(&tmp_path)?;
    tmp.write_all(bytes)?;
    tmp.sync_all()?;
    drop(tmp);

    fs::rename(&tmp_path, path)?;

    // Best-effort: the rename already succeeded.
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use intray_core::record::MAX_ID;
    use intray_core::{Level, PaneAddress, ReadFilter, StateFilter};
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> TsvStore {
        TsvStore::open(&dir.path().join("notifications.tsv"), StoreOptions::default()).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now_utc() - ChronoDuration::days(days)
    }

    #[test]
    fn add_and_list_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let inputs = vec![
            NewNotification::new("build done"),
            NewNotification::new("tabs\tand\nnewlines \\ kept")
                .with_level(Level::Error)
                .with_address(PaneAddress::new("$1", "@2", "%3"))
                .with_pane_created("1700000000"),
            NewNotification::new("third").with_level(Level::Critical),
        ];
        for input in &inputs {
            store.add(input.clone()).unwrap();
        }

        let listed = store.list(&Filter::new()).unwrap();
        assert_eq!(listed.len(), 3);
        for (n, input) in listed.iter().zip(&inputs) {
            assert_eq!(n.message, input.message);
            assert_eq!(n.address, input.address);
            assert_eq!(n.pane_created, input.pane_created);
            assert_eq!(n.level, input.level);
            assert_eq!(n.state, NotificationState::Active);
            assert!(n.read_timestamp.is_none());
        }
        assert_eq!(listed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn add_rejects_invalid_input_without_touching_disk() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let err = store.add(NewNotification::new("  \n ")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(!store.path().exists());
    }

    #[test]
    fn get_by_id_and_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.add(NewNotification::new("one")).unwrap();
        let id = store.add(NewNotification::new("two")).unwrap();

        assert_eq!(store.get(id).unwrap().message, "two");
        assert!(matches!(store.get(99), Err(StoreError::NotFound(99))));
    }

    #[test]
    fn dismiss_is_idempotent_and_keeps_read_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = store.add(NewNotification::new("ping")).unwrap();
        let read_at = days_ago(1);
        store.mark_read_at(id, read_at).unwrap();

        store.dismiss(id).unwrap();
        store.dismiss(id).unwrap();

        let n = store.get(id).unwrap();
        assert_eq!(n.state, NotificationState::Dismissed);
        assert_eq!(n.read_timestamp, Some(read_at));
        assert!(matches!(store.dismiss(42), Err(StoreError::NotFound(42))));
    }

    #[test]
    fn dismiss_all_only_touches_active() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let a = store.add(NewNotification::new("a")).unwrap();
        store.add(NewNotification::new("b")).unwrap();
        store.add(NewNotification::new("c")).unwrap();
        store.dismiss(a).unwrap();

        assert_eq!(store.dismiss_all().unwrap(), 2);
        assert_eq!(store.active_count().unwrap(), 0);
        assert_eq!(store.dismiss_all().unwrap(), 0);
    }

    #[test]
    fn read_state_is_orthogonal_to_dismissal() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = store.add(NewNotification::new("x")).unwrap();

        store.dismiss(id).unwrap();
        store.mark_read(id).unwrap();
        assert!(store.get(id).unwrap().is_read());

        store.mark_unread(id).unwrap();
        let n = store.get(id).unwrap();
        assert!(!n.is_read());
        assert_eq!(n.state, NotificationState::Dismissed);

        assert!(matches!(store.mark_read(7), Err(StoreError::NotFound(7))));
        assert!(matches!(store.mark_unread(7), Err(StoreError::NotFound(7))));
    }

    #[test]
    fn list_orders_unread_first_and_filters() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        for i in 1..=4 {
            store.add(NewNotification::new(format!("n{i}"))).unwrap();
        }
        store.mark_read(1).unwrap();
        store.mark_read(3).unwrap();

        let ids: Vec<u64> = store
            .list(&Filter::new())
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);

        let unread = store.list(&Filter::new().with_read(ReadFilter::Unread)).unwrap();
        assert_eq!(unread.len(), 2);
    }

    #[test]
    fn cleanup_removes_old_dismissed_only() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let old_dismissed = store
            .add_with_timestamp(NewNotification::new("old"), days_ago(40))
            .unwrap();
        let old_active = store
            .add_with_timestamp(NewNotification::new("old but active"), days_ago(40))
            .unwrap();
        let recent_dismissed = store
            .add_with_timestamp(NewNotification::new("recent"), days_ago(2))
            .unwrap();
        store.dismiss(old_dismissed).unwrap();
        store.dismiss(recent_dismissed).unwrap();

        let preview = store.cleanup(30, true).unwrap();
        assert_eq!(preview.ids, vec![old_dismissed]);
        assert_eq!(store.list_all().unwrap().len(), 3);

        let report = store.cleanup(30, false).unwrap();
        assert_eq!(report.removed(), 1);
        assert!(!report.dry_run);

        let left: Vec<u64> = store.list_all().unwrap().iter().map(|n| n.id).collect();
        assert_eq!(left, vec![old_active, recent_dismissed]);
    }

    #[test]
    fn cleanup_with_zero_days_removes_every_dismissed_record() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let a = store.add(NewNotification::new("just now")).unwrap();
        let b = store.add(NewNotification::new("still active")).unwrap();
        store.dismiss(a).unwrap();

        let report = store.cleanup(0, false).unwrap();
        assert_eq!(report.ids, vec![a]);
        let left: Vec<u64> = store.list_all().unwrap().iter().map(|n| n.id).collect();
        assert_eq!(left, vec![b]);
    }

    #[test]
    fn ids_are_never_reused_after_cleanup() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.add(NewNotification::new("keep")).unwrap();
        let last = store
            .add_with_timestamp(NewNotification::new("expire"), days_ago(10))
            .unwrap();
        store.dismiss(last).unwrap();
        store.cleanup(1, false).unwrap();

        let next = store.add(NewNotification::new("after cleanup")).unwrap();
        assert_eq!(next, last + 1);
    }

    #[test]
    fn seq_file_lost_falls_back_to_max_id_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.add(NewNotification::new("a")).unwrap();
        store.add(NewNotification::new("b")).unwrap();
        fs::remove_file(sidecar(store.path(), "seq")).unwrap();

        assert_eq!(store.add(NewNotification::new("c")).unwrap(), 3);
        assert_eq!(store.last_allocated_id().unwrap(), 3);
    }

    #[test]
    fn malformed_lines_are_skipped_on_read_and_preserved_on_write() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = store.add(NewNotification::new("good")).unwrap();

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        writeln!(file, "this is not a record").unwrap();
        drop(file);

        let listed = store.list(&Filter::new().with_state(StateFilter::Active)).unwrap();
        assert_eq!(listed.len(), 1);

        store.dismiss(id).unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("this is not a record\n"));
        assert_eq!(store.add(NewNotification::new("next")).unwrap(), id + 1);
    }

    #[test]
    fn active_count_reads_state_field_only() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert_eq!(store.active_count().unwrap(), 0);

        store.add(NewNotification::new("a")).unwrap();
        let b = store.add(NewNotification::new("b")).unwrap();
        store.dismiss(b).unwrap();
        assert_eq!(store.active_count().unwrap(), 1);
    }

    #[test]
    fn reads_fall_back_when_writer_holds_lock() {
        let dir = TempDir::new().unwrap();
        let opts = StoreOptions {
            read_lock_timeout: Duration::from_millis(30),
            ..StoreOptions::default()
        };
        let store = TsvStore::open(&dir.path().join("notifications.tsv"), opts).unwrap();
        store.add(NewNotification::new("visible")).unwrap();

        let _writer = store.lock_file().exclusive(Duration::from_millis(50)).unwrap();
        let listed = store.list(&Filter::new()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(store.active_count().unwrap(), 1);
    }

    #[test]
    fn writes_time_out_under_a_held_lock() {
        let dir = TempDir::new().unwrap();
        let opts = StoreOptions {
            lock_timeout: Duration::from_millis(30),
            retries: 1,
            retry_backoff: Duration::from_millis(1),
            ..StoreOptions::default()
        };
        let store = TsvStore::open(&dir.path().join("notifications.tsv"), opts).unwrap();

        let _writer = store.lock_file().exclusive(Duration::from_millis(50)).unwrap();
        let err = store.add(NewNotification::new("blocked")).unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));
    }

    #[test]
    fn invalid_utf8_lines_survive_unrelated_writes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.add(NewNotification::new("first")).unwrap();
        let second = store.add(NewNotification::new("second")).unwrap();

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        file.write_all(b"\xff\xfe\n").unwrap();
        drop(file);

        store.dismiss(second).unwrap();
        store.add(NewNotification::new("third")).unwrap();

        let raw = fs::read(store.path()).unwrap();
        assert!(raw.windows(3).any(|w| w == b"\xff\xfe\n"));
        assert_eq!(store.list(&Filter::new()).unwrap().len(), 3);
    }

    #[test]
    fn add_fails_cleanly_when_ids_run_out() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let edge = NewNotification::new("edge").into_notification(MAX_ID, now_utc());
        fs::write(store.path(), format!("{}\n", encode_line(&edge))).unwrap();
        let before = fs::read(store.path()).unwrap();

        assert_eq!(store.list(&Filter::new()).unwrap().len(), 1);
        assert!(matches!(
            store.add(NewNotification::new("one too many")),
            Err(StoreError::IdSpaceExhausted(id)) if id == MAX_ID
        ));
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn ids_beyond_the_signed_range_are_malformed() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let line = format!("{}\t2025-01-02T03:04:05Z\tactive\t\t\t\tm\t\tinfo\t\n", u64::MAX);
        fs::write(store.path(), &line).unwrap();

        assert!(store.list(&Filter::new()).unwrap().is_empty());
        assert_eq!(store.add(NewNotification::new("next")).unwrap(), 1);
        assert!(fs::read_to_string(store.path()).unwrap().starts_with(&line));
    }

    #[test]
    fn cleanup_accepts_any_day_count() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = store.add(NewNotification::new("old")).unwrap();
        store.dismiss(id).unwrap();

        let report = store.cleanup(u32::MAX, true).unwrap();
        assert!(report.ids.is_empty());
        assert_eq!(store.cleanup(u32::MAX, false).unwrap().removed(), 0);
    }
}
