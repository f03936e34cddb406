//! Durable audit trail and undo/redo stack.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/.gitcherry/
//!     logs/<YYYYMMDDTHHMMSSZ>[-N].json   one OperationRecord per applied operation
//!     undo.json                          {"history": [UndoEntry...], "position": n}
//!     store.lock                         advisory lock for read-modify-write cycles
//!     .gitignore                         "*", keeps the tree clean for the next preflight
//! ```
//!
//! Nothing is cached between calls: every undo/redo/push reloads `undo.json`
//! under the lock, mutates it, and writes it back before releasing.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::{with_store_lock, DEFAULT_LOCK_TIMEOUT};
use crate::plan::OperationPlan;
use crate::types::OperationKind;

/// Directory created under the storage root.
pub const STORE_DIR: &str = ".gitcherry";

const LOGS_DIR: &str = "logs";
const UNDO_FILE: &str = "undo.json";
const IGNORE_FILE: &str = ".gitignore";

// ---------------------------------------------------------------------------
// OperationRecord
// ---------------------------------------------------------------------------

/// Persisted form of a successfully executed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub source: String,
    pub target: String,
    pub start: String,
    pub end: String,
    pub message: String,
    pub commands: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl OperationRecord {
    pub fn from_plan(plan: &OperationPlan, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: plan.kind,
            source: plan.source.clone(),
            target: plan.target.clone(),
            start: plan.start.clone(),
            end: plan.end.clone(),
            message: plan.message.clone(),
            commands: plan.commands(),
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// UndoEntry / UndoStack
// ---------------------------------------------------------------------------

/// Branch heads on either side of one applied operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoEntry {
    pub source: String,
    pub target: String,
    /// `None` when the operation created the branch.
    #[serde(default)]
    pub before_head: Option<String>,
    pub after_head: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered history plus a position separating applied entries from undone
/// ones. `0 <= position <= history.len()` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoStack {
    history: Vec<UndoEntry>,
    position: usize,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh action, discarding any undone entries past `position`.
    pub fn push(&mut self, entry: UndoEntry) {
        self.history.truncate(self.position);
        self.history.push(entry);
        self.position = self.history.len();
    }

    /// Step back one entry. `None` when nothing is left to undo.
    pub fn undo(&mut self) -> Option<UndoEntry> {
        if self.position == 0 {
            return None;
        }
        self.position -= 1;
        Some(self.history[self.position].clone())
    }

    /// Step forward one entry. `None` when nothing has been undone.
    pub fn redo(&mut self) -> Option<UndoEntry> {
        let entry = self.history.get(self.position)?.clone();
        self.position += 1;
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.history.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn entries(&self) -> &[UndoEntry] {
        &self.history
    }

    fn validate(&self) -> Result<()> {
        if self.position > self.history.len() {
            return Err(Error::storage_corrupt(format!(
                "undo position {} exceeds history length {}",
                self.position,
                self.history.len()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AuditStore
// ---------------------------------------------------------------------------

/// File-backed audit log and undo stack rooted at a directory.
///
/// Cheap to construct; holds no state beyond its paths.
#[derive(Debug, Clone)]
pub struct AuditStore {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl AuditStore {
    /// Use `<root>/.gitcherry` as the storage directory. Nothing is created
    /// until the first write.
    pub fn open(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join(STORE_DIR),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override how long to wait for the storage lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir.join(LOGS_DIR)
    }

    pub fn undo_path(&self) -> PathBuf {
        self.dir.join(UNDO_FILE)
    }

    /// Write `record` to its own file under `logs/`, named by its timestamp.
    ///
    /// A `-1`, `-2`, … suffix is added when another record already claimed
    /// the same second. Returns the path written.
    ///
    /// # Errors
    /// Any failure to serialize, create, or write the file is
    /// [`Error::Fatal`]: the git side already changed, so an unlogged
    /// operation is reported loudly. A lock timeout stays
    /// [`Error::StorageLocked`].
    pub fn record_operation(&self, record: &OperationRecord) -> Result<PathBuf> {
        let data = serde_json::to_vec_pretty(record)
            .map_err(|e| Error::fatal("serialize operation record", e.to_string()))?;
        let logs = self.logs_dir();
        let stem = record.timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        let written = self.locked(|| {
            std::fs::create_dir_all(&logs)
                .map_err(|e| Error::fatal(format!("create {}", logs.display()), e.to_string()))?;

            let mut suffix = 0u32;
            loop {
                let name = if suffix == 0 {
                    format!("{}.json", stem)
                } else {
                    format!("{}-{}.json", stem, suffix)
                };
                let path = logs.join(name);
                match OpenOptions::new().write(true).create_new(true).open(&path) {
                    Ok(mut file) => {
                        file.write_all(&data)
                            .and_then(|_| file.sync_all())
                            .map_err(|e| {
                                Error::fatal(format!("write {}", path.display()), e.to_string())
                            })?;
                        log::info!("recorded {} operation in {}", record.kind, path.display());
                        return Ok(path);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
                    Err(e) => {
                        return Err(Error::fatal(
                            format!("write {}", path.display()),
                            e.to_string(),
                        ));
                    }
                }
            }
        });
        written.map_err(|e| match e {
            Error::Io(_) | Error::Json(_) => {
                Error::fatal(format!("write {}", logs.display()), e.to_string())
            }
            other => other,
        })
    }

    /// All recorded operations, oldest first.
    pub fn operations(&self) -> Result<Vec<OperationRecord>> {
        let logs = self.logs_dir();
        let entries = match std::fs::read_dir(&logs) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&logs, e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(&logs, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;
            let record: OperationRecord = serde_json::from_slice(&data)
                .map_err(|e| Error::storage_corrupt(format!("{}: {}", path.display(), e)))?;
            records.push((record, collision_suffix(&path)));
        }
        records.sort_by(|(a, sa), (b, sb)| a.timestamp.cmp(&b.timestamp).then(sa.cmp(sb)));
        Ok(records.into_iter().map(|(r, _)| r).collect())
    }

    /// Push a new undo entry, discarding any redo history.
    pub fn push_undo(&self, entry: UndoEntry) -> Result<()> {
        self.update(|stack| stack.push(entry))
    }

    /// Step the undo position back. `Ok(None)` when there is nothing to undo.
    pub fn pop_undo(&self) -> Result<Option<UndoEntry>> {
        self.update(UndoStack::undo)
    }

    /// Step the undo position forward. `Ok(None)` when there is nothing to redo.
    pub fn pop_redo(&self) -> Result<Option<UndoEntry>> {
        self.update(UndoStack::redo)
    }

    /// Current persisted stack, read under the lock.
    pub fn undo_stack(&self) -> Result<UndoStack> {
        self.locked(|| self.load_stack())
    }

    /// Run `f` under the storage lock, creating the directory on first use.
    fn locked<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let ignore = self.dir.join(IGNORE_FILE);
        if !ignore.exists() {
            std::fs::write(&ignore, "*\n").map_err(|e| Error::io(&ignore, e))?;
        }
        with_store_lock(&self.dir, self.lock_timeout, f)
    }

    fn update<T>(&self, f: impl FnOnce(&mut UndoStack) -> T) -> Result<T> {
        self.locked(|| {
            let mut stack = self.load_stack()?;
            let out = f(&mut stack);
            self.save_stack(&stack)?;
            Ok(out)
        })
    }

    fn load_stack(&self) -> Result<UndoStack> {
        let path = self.undo_path();
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UndoStack::new()),
            Err(e) => {
                return Err(Error::storage_corrupt(format!("{}: {}", path.display(), e)));
            }
        };
        let stack: UndoStack = serde_json::from_slice(&data)
            .map_err(|e| Error::storage_corrupt(format!("{}: {}", path.display(), e)))?;
        stack.validate()?;
        Ok(stack)
    }

    fn save_stack(&self, stack: &UndoStack) -> Result<()> {
        let path = self.undo_path();
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(stack)?;
        std::fs::write(&tmp, data).map_err(|e| Error::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Error::io(&path, e))?;
        log::debug!(
            "undo stack saved: position {} of {}",
            stack.position(),
            stack.len()
        );
        Ok(())
    }
}

/// Numeric collision suffix of a log file name (`0` when absent).
fn collision_suffix(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split_once('-'))
        .and_then(|(_, n)| n.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn entry(n: usize) -> UndoEntry {
        UndoEntry {
            source: "main".into(),
            target: "feature".into(),
            before_head: Some(format!("before{}", n)),
            after_head: format!("after{}", n),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, n as u32).unwrap(),
        }
    }

    fn record(ts: DateTime<Utc>) -> OperationRecord {
        OperationRecord {
            kind: OperationKind::Transfer,
            source: "main".into(),
            target: "feature".into(),
            start: "abc".into(),
            end: "def".into(),
            message: "Merge commits".into(),
            commands: vec!["git checkout feature".into()],
            timestamp: ts,
        }
    }

    #[test]
    fn empty_stack_has_nothing_to_undo_or_redo() {
        let mut stack = UndoStack::new();
        assert!(stack.undo().is_none());
        assert!(stack.redo().is_none());
        assert_eq!(stack.position(), 0);
    }

    #[test]
    fn undo_then_redo_walks_back_and_forth() {
        let mut stack = UndoStack::new();
        let n = 4;
        for i in 0..n {
            stack.push(entry(i));
        }
        assert_eq!(stack.position(), n);

        let undone: Vec<_> = (0..n).map(|_| stack.undo().unwrap()).collect();
        assert_eq!(stack.position(), 0);
        assert!(stack.undo().is_none());

        let redone: Vec<_> = (0..n).map(|_| stack.redo().unwrap()).collect();
        assert_eq!(stack.position(), n);
        assert!(stack.redo().is_none());

        let expected: Vec<_> = (0..n).map(entry).collect();
        let mut reversed = expected.clone();
        reversed.reverse();
        assert_eq!(undone, reversed);
        assert_eq!(redone, expected);
    }

    #[test]
    fn push_after_undo_truncates_redo() {
        let mut stack = UndoStack::new();
        stack.push(entry(0));
        stack.push(entry(1));
        stack.push(entry(2));
        assert_eq!(stack.undo(), Some(entry(2)));
        assert!(stack.can_redo());

        stack.push(entry(9));
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.position(), 3);
        assert!(!stack.can_redo());
        assert_eq!(stack.entries()[2], entry(9));
        assert!(stack.redo().is_none());
    }

    #[test]
    fn record_collisions_get_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::open(dir.path());
        let ts = Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap();

        let first = store.record_operation(&record(ts)).unwrap();
        let second = store.record_operation(&record(ts)).unwrap();
        let third = store.record_operation(&record(ts)).unwrap();

        assert_eq!(first.file_name().unwrap(), "20261017T093000Z.json");
        assert_eq!(second.file_name().unwrap(), "20261017T093000Z-1.json");
        assert_eq!(third.file_name().unwrap(), "20261017T093000Z-2.json");
        assert_eq!(store.operations().unwrap().len(), 3);
    }

    #[test]
    fn operations_sorted_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::open(dir.path());
        let late = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let mut second = record(late);
        second.message = "second".into();
        store.record_operation(&second).unwrap();
        store.record_operation(&record(early)).unwrap();

        let ops = store.operations().unwrap();
        assert_eq!(ops[0].timestamp, early);
        assert_eq!(ops[1].message, "second");
    }

    #[test]
    fn operations_empty_when_nothing_logged() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AuditStore::open(dir.path()).operations().unwrap().is_empty());
    }

    #[test]
    fn out_of_range_position_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::open(dir.path());
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.undo_path(), r#"{"history": [], "position": 3}"#).unwrap();
        assert!(matches!(store.pop_undo(), Err(Error::StorageCorrupt(_))));
    }

    #[test]
    fn unwritable_store_dir_fails_record_as_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::open(dir.path());
        std::fs::write(store.dir(), "not a directory").unwrap();

        let ts = Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap();
        let err = store.record_operation(&record(ts)).unwrap_err();
        assert!(matches!(err, Error::Fatal { .. }), "got {:?}", err);
    }

    #[test]
    fn collision_suffix_parsing() {
        assert_eq!(collision_suffix(Path::new("logs/20261017T093000Z.json")), 0);
        assert_eq!(collision_suffix(Path::new("logs/20261017T093000Z-12.json")), 12);
    }
}
