//! 3-tier structured logger (spec §4.3): `system`, `business-operations`,
//! `business-monitoring`, per-instance `operations`/`monitoring` streams, and
//! an aggregated `errors` mirror. Writes are queued to a background flusher
//! task so a caller's `log`/`echo` call never blocks on file I/O — matching
//! spec §5's "Logger file handles: one writer per stream; a serialized queue
//! drains to disk".

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::category::LogCategory;
use crate::entry::LogEntry;
use crate::level::LogLevel;
use crate::stream::LogStream;

const DEFAULT_RING_CAP: usize = 2000;
const DEFAULT_HIGH_WATER_MARK: usize = 5000;

struct FlushJob {
    relative_path: String,
    label: String,
    line: String,
}

struct Inner {
    root: PathBuf,
    streams: Mutex<HashMap<String, LogStream>>,
    global_level: LogLevel,
    category_levels: Mutex<HashMap<String, LogLevel>>,
    ring: Mutex<VecDeque<LogEntry>>,
    error_ring: Mutex<VecDeque<LogEntry>>,
    category_rings: Mutex<HashMap<String, VecDeque<LogEntry>>>,
    ring_cap: usize,
    pending: AtomicUsize,
    dropped: AtomicU64,
    high_water_mark: usize,
    last_drop_marker: Mutex<Option<DateTime<Utc>>>,
    tx: mpsc::UnboundedSender<FlushJob>,
}

#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Logger {
    /// Build a logger rooted at `root` and spawn its flusher task. Callers
    /// should keep the returned `JoinHandle` to await on shutdown.
    pub fn new(root: impl Into<PathBuf>, global_level: LogLevel) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<FlushJob>();
        let root = root.into();

        let inner = Arc::new(Inner {
            root: root.clone(),
            streams: Mutex::new(HashMap::new()),
            global_level,
            category_levels: Mutex::new(HashMap::new()),
            ring: Mutex::new(VecDeque::with_capacity(DEFAULT_RING_CAP)),
            error_ring: Mutex::new(VecDeque::with_capacity(DEFAULT_RING_CAP)),
            category_rings: Mutex::new(HashMap::new()),
            ring_cap: DEFAULT_RING_CAP,
            pending: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            last_drop_marker: Mutex::new(None),
            tx,
        });

        let flusher_inner = inner.clone();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let inner = flusher_inner.clone();
                let result = tokio::task::spawn_blocking(move || {
                    let mut streams = inner.streams.lock();
                    let stream = streams
                        .entry(job.label.clone())
                        .or_insert_with(|| LogStream::new(&inner.root, &job.relative_path, job.label.clone()));
                    stream.write_line(&job.line)
                })
                .await;
                if let Ok(Err(err)) = result {
                    warn!(error = %err, "log flush failed");
                }
                flusher_inner.pending.fetch_sub(1, Ordering::Relaxed);
            }
        });

        (Self { inner }, handle)
    }

    pub fn set_category_level(&self, category: impl Into<String>, level: LogLevel) {
        self.inner.category_levels.lock().insert(category.into(), level);
    }

    fn effective_level(&self, category: &LogCategory) -> LogLevel {
        self.inner
            .category_levels
            .lock()
            .get(&category.label())
            .copied()
            .unwrap_or(self.inner.global_level)
    }

    /// Write one entry to `category`'s stream (and, if `level` is `Error`,
    /// additionally mirror it into the aggregated errors stream).
    pub fn log(
        &self,
        category: LogCategory,
        level: LogLevel,
        message: impl Into<String>,
        instance_id: Option<String>,
        data: Option<serde_json::Value>,
    ) {
        if !level.passes(self.effective_level(&category)) {
            return;
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            category: category.label(),
            message: message.into(),
            instance_id,
            data,
        };

        self.push_ring(&entry);

        if level != LogLevel::Error && self.inner.pending.load(Ordering::Relaxed) > self.inner.high_water_mark {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            self.maybe_emit_drop_marker();
            return;
        }

        self.enqueue(category.relative_path(), category.label(), &entry);

        if level == LogLevel::Error {
            self.inner.error_ring.lock().push_back(entry.clone());
            trim(&mut self.inner.error_ring.lock(), self.inner.ring_cap);
            self.enqueue("errors/errors.log".to_string(), "errors".to_string(), &entry);
        }
    }

    /// Publish one event simultaneously to business-operations, an optional
    /// per-instance stream, and a short system-stream summary (spec §4.3
    /// "echo helpers").
    pub fn echo(&self, message: impl Into<String>, instance_id: Option<String>, data: Option<serde_json::Value>) {
        let message = message.into();
        self.log(
            LogCategory::BusinessOperations,
            LogLevel::Info,
            message.clone(),
            instance_id.clone(),
            data.clone(),
        );
        if let Some(id) = instance_id.clone() {
            self.log(LogCategory::InstanceOperations(id.clone()), LogLevel::Info, message.clone(), Some(id), data);
        }
        let summary: String = message.chars().take(80).collect();
        self.log(LogCategory::System, LogLevel::Info, summary, instance_id, None);
    }

    fn enqueue(&self, relative_path: String, label: String, entry: &LogEntry) {
        let line = serde_json::to_string(entry).unwrap_or_else(|_| entry.message.clone());
        self.inner.pending.fetch_add(1, Ordering::Relaxed);
        let _ = self.inner.tx.send(FlushJob { relative_path, label, line });
    }

    fn push_ring(&self, entry: &LogEntry) {
        {
            let mut ring = self.inner.ring.lock();
            ring.push_back(entry.clone());
            trim(&mut ring, self.inner.ring_cap);
        }
        let mut category_rings = self.inner.category_rings.lock();
        let ring = category_rings.entry(entry.category.clone()).or_default();
        ring.push_back(entry.clone());
        trim(ring, self.inner.ring_cap);
    }

    fn maybe_emit_drop_marker(&self) {
        let now = Utc::now();
        let mut last = self.inner.last_drop_marker.lock();
        let should_emit = last.map(|at| (now - at).num_seconds() >= 1).unwrap_or(true);
        if !should_emit {
            return;
        }
        *last = Some(now);
        let dropped = self.inner.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            drop(last);
            self.log(
                LogCategory::System,
                LogLevel::Warn,
                format!("{dropped} lines dropped (log queue over high-water mark)"),
                None,
                None,
            );
        }
    }

    /// Most recent `limit` entries across every stream, in reverse
    /// chronological order.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        tail(&self.inner.ring.lock(), limit)
    }

    /// Most recent `limit` error-level entries.
    pub fn errors(&self, limit: usize) -> Vec<LogEntry> {
        tail(&self.inner.error_ring.lock(), limit)
    }

    /// Most recent `limit` entries for one category label (see
    /// [`LogCategory::label`]).
    pub fn by_category(&self, category_label: &str, limit: usize) -> Vec<LogEntry> {
        self.inner
            .category_rings
            .lock()
            .get(category_label)
            .map(|ring| tail(ring, limit))
            .unwrap_or_default()
    }

    /// Entries merged across every stream, sorted by timestamp descending.
    /// Equivalent to [`Self::recent`] because the shared ring is already
    /// maintained in chronological insertion order across all categories;
    /// kept as a distinct method for API parity with the four read
    /// operations spec §4.3 names.
    pub fn mixed(&self, limit: usize) -> Vec<LogEntry> {
        self.recent(limit)
    }

    /// Delete every file under the logger's root except those named in
    /// `allow_list` (spec §4.3 "must preserve a configured allow-list of
    /// files (server stdout logs)").
    pub fn purge_on_startup(&self, allow_list: &[String]) -> std::io::Result<()> {
        purge_dir(&self.inner.root, allow_list)
    }
}

fn purge_dir(dir: &Path, allow_list: &[String]) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if allow_list.iter().any(|allowed| allowed == &name) {
            continue;
        }
        if path.is_dir() {
            purge_dir(&path, allow_list)?;
            let _ = std::fs::remove_dir(&path);
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn trim(ring: &mut VecDeque<LogEntry>, cap: usize) {
    while ring.len() > cap {
        ring.pop_front();
    }
}

fn tail(ring: &VecDeque<LogEntry>, limit: usize) -> Vec<LogEntry> {
    ring.iter().rev().take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("dlmm-logger-test-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn log_respects_category_level_override() {
        let root = temp_root();
        let (logger, _handle) = Logger::new(&root, LogLevel::Info);
        logger.set_category_level(LogCategory::System.label(), LogLevel::Error);

        logger.log(LogCategory::System, LogLevel::Info, "suppressed", None, None);
        assert!(logger.recent(10).is_empty());

        logger.log(LogCategory::System, LogLevel::Error, "kept", None, None);
        assert_eq!(logger.recent(10).len(), 1);

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn error_entries_mirror_into_errors_ring() {
        let root = temp_root();
        let (logger, _handle) = Logger::new(&root, LogLevel::Info);

        logger.log(LogCategory::BusinessOperations, LogLevel::Error, "swap failed", None, None);
        assert_eq!(logger.errors(10).len(), 1);
        assert_eq!(logger.errors(10)[0].message, "swap failed");

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn echo_writes_operations_instance_and_system_streams() {
        let root = temp_root();
        let (logger, _handle) = Logger::new(&root, LogLevel::Info);

        logger.echo("position created", Some("simple_y_abc".to_string()), None);

        assert_eq!(logger.by_category("business-operations", 10).len(), 1);
        assert_eq!(logger.by_category("instance-operations:simple_y_abc", 10).len(), 1);
        assert_eq!(logger.by_category("system", 10).len(), 1);

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn by_category_isolates_streams() {
        let root = temp_root();
        let (logger, _handle) = Logger::new(&root, LogLevel::Info);

        logger.log(LogCategory::System, LogLevel::Info, "system line", None, None);
        logger.log(LogCategory::BusinessOperations, LogLevel::Info, "biz line", None, None);

        assert_eq!(logger.by_category("system", 10).len(), 1);
        assert_eq!(logger.by_category("business-operations", 10).len(), 1);

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn purge_on_startup_preserves_allow_listed_file() {
        let root = temp_root();
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("keep.log"), b"keep me").unwrap();
        std::fs::write(root.join("scratch.log"), b"discard me").unwrap();

        let (logger, _handle) = Logger::new(&root, LogLevel::Info);
        logger.purge_on_startup(&["keep.log".to_string()]).unwrap();

        assert!(root.join("keep.log").exists());
        assert!(!root.join("scratch.log").exists());

        std::fs::remove_dir_all(&root).ok();
    }
}
