//! Progress / crash-recovery store.
//!
//! One canonical progress file per installation, always written atomically
//! (temp + rename) and wrapped in an integrity envelope keyed by a
//! per-installation secret. Processed filenames are appended to the
//! in-memory record synchronously and cheaply; durable flushes run on a
//! fixed interval and concurrent flush requests are coalesced.

pub mod integrity;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::executor::ExecMode;
use crate::fs_ops::atomic_write;
use crate::naming::{BatchSummary, Operation};
use crate::planner::SortOrder;
use crate::platform;

pub const PROGRESS_FILE: &str = "progress.json";
const SECRET_FILE: &str = "secret.key";

/// Durable flush cadence during execution.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Everything needed to detect and resume an interrupted run.
/// Created at execution start, updated throughout, deleted on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub operation_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mode: ExecMode,
    pub cap: usize,
    pub prefix: Option<String>,
    pub sort_order: SortOrder,
    pub total_files: usize,
    /// Append-only set of completed filenames.
    pub processed_files: Vec<String>,
    pub operations: Vec<Operation>,
    pub batches: Vec<BatchSummary>,
}

impl ProgressRecord {
    pub fn processed_set(&self) -> HashSet<&str> {
        self.processed_files.iter().map(String::as_str).collect()
    }

    /// Operations not yet completed, in original order. This is the work
    /// list a resumed run executes.
    pub fn remaining_operations(&self) -> Vec<Operation> {
        let done = self.processed_set();
        self.operations
            .iter()
            .filter(|op| !done.contains(op.file_name.as_str()))
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct Inner {
    record: Option<ProgressRecord>,
    flushing: bool,
    pending: bool,
    last_flush: Option<Instant>,
}

/// Handle to the on-disk progress state. Owned by the engine and shared by
/// handle with the executor's flush hook; no ambient module-level state.
pub struct ProgressStore {
    data_dir: PathBuf,
    secret: OnceLock<[u8; 32]>,
    inner: Mutex<Inner>,
}

impl ProgressStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            secret: OnceLock::new(),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn progress_path(&self) -> PathBuf {
        self.data_dir.join(PROGRESS_FILE)
    }

    /// Install `record` as the live run state and persist it immediately, so
    /// a crash right after the first file is already resumable.
    pub fn begin(&self, record: ProgressRecord) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.record = Some(record);
        }
        self.flush()
    }

    /// Cheap synchronous append; durability comes from the next flush tick.
    pub fn mark_processed(&self, file_name: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(rec) = inner.record.as_mut() {
            rec.processed_files.push(file_name.to_string());
            rec.last_updated = Utc::now();
        }
    }

    /// Interval-gated flush for the executor's periodic tick. Serializing
    /// and sealing the full record is not cheap at scale, so ticks inside
    /// the flush window are no-ops.
    pub fn flush_if_due(&self) -> Result<()> {
        {
            let inner = self.inner.lock().unwrap();
            if inner
                .last_flush
                .is_some_and(|t| t.elapsed() < FLUSH_INTERVAL)
            {
                return Ok(());
            }
        }
        self.flush()
    }

    /// Durable write of the current record. Coalesced: if a flush is already
    /// running, exactly one follow-up flush is queued rather than stacking
    /// multiple writers.
    pub fn flush(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.flushing {
                inner.pending = true;
                return Ok(());
            }
            inner.flushing = true;
        }

        loop {
            let snapshot = self.inner.lock().unwrap().record.clone();
            let result = match snapshot {
                Some(rec) => self.write_record(&rec),
                None => Ok(()),
            };

            let mut inner = self.inner.lock().unwrap();
            if result.is_ok() {
                inner.last_flush = Some(Instant::now());
                if inner.pending {
                    inner.pending = false;
                    continue;
                }
            }
            inner.flushing = false;
            inner.pending = false;
            return result;
        }
    }

    /// Load the persisted record, validating its integrity envelope. Any
    /// mismatch means the file is treated as absent: it is deleted and no
    /// resume is offered.
    pub fn load(&self) -> Option<ProgressRecord> {
        let path = self.progress_path();
        let bytes = fs::read(&path).ok()?;
        let key = match self.secret() {
            Ok(k) => k,
            Err(e) => {
                warn!(error = %e, "cannot obtain integrity secret, discarding progress record");
                let _ = fs::remove_file(&path);
                return None;
            }
        };
        match integrity::open::<ProgressRecord>(&bytes, &key) {
            Ok(rec) => {
                debug!(
                    operation_id = %rec.operation_id,
                    processed = rec.processed_files.len(),
                    total = rec.total_files,
                    "loaded interrupted progress record"
                );
                Some(rec)
            }
            Err(e) => {
                warn!(error = %e, "progress record failed validation, discarding");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Successful completion: drop the live record and delete the file.
    pub fn complete(&self) -> Result<()> {
        self.inner.lock().unwrap().record = None;
        self.remove_file()
    }

    /// Explicit user dismissal of an interrupted run.
    pub fn discard(&self) -> Result<()> {
        self.inner.lock().unwrap().record = None;
        self.remove_file()
    }

    fn remove_file(&self) -> Result<()> {
        match fs::remove_file(self.progress_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("remove progress file {}", self.progress_path().display())
            }),
        }
    }

    fn write_record(&self, record: &ProgressRecord) -> Result<()> {
        let key = self.secret()?;
        let bytes = integrity::seal(record, &key)?;
        let path = self.progress_path();
        atomic_write(&path, &bytes)?;
        let _ = platform::set_file_mode_0600(&path);
        Ok(())
    }

    /// Per-installation secret, generated on first use, stored 0600 and
    /// cached in memory afterwards.
    fn secret(&self) -> Result<[u8; 32]> {
        if let Some(k) = self.secret.get() {
            return Ok(*k);
        }
        let path = self.data_dir.join(SECRET_FILE);
        let key = match fs::read(&path) {
            Ok(bytes) => match <[u8; 32]>::try_from(bytes.as_slice()) {
                Ok(k) => k,
                Err(_) => {
                    warn!(path = %path.display(), "secret has wrong length, regenerating");
                    self.generate_secret(&path)?
                }
            },
            Err(_) => self.generate_secret(&path)?,
        };
        Ok(*self.secret.get_or_init(|| key))
    }

    fn generate_secret(&self, path: &Path) -> Result<[u8; 32]> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("create data directory {}", self.data_dir.display()))?;
        let _ = platform::set_dir_mode_0700(&self.data_dir);

        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        platform::write_file_secure_new_0600(path, &key)?;
        info!(path = %path.display(), "generated new integrity secret");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record() -> ProgressRecord {
        let ops = vec![
            Operation {
                file_name: "a.jpg".into(),
                source_path: "/in/a.jpg".into(),
                destination_path: "/out/Batch_001/a.jpg".into(),
                batch_index: 1,
            },
            Operation {
                file_name: "b.jpg".into(),
                source_path: "/in/b.jpg".into(),
                destination_path: "/out/Batch_001/b.jpg".into(),
                batch_index: 1,
            },
        ];
        ProgressRecord {
            operation_id: Uuid::new_v4(),
            started_at: Utc::now(),
            last_updated: Utc::now(),
            source_dir: "/in".into(),
            output_dir: "/out".into(),
            mode: ExecMode::Move,
            cap: 100,
            prefix: None,
            sort_order: SortOrder::SizeDesc,
            total_files: 2,
            processed_files: Vec::new(),
            operations: ops,
            batches: vec![BatchSummary {
                folder: "Batch_001".into(),
                file_count: 2,
            }],
        }
    }

    #[test]
    fn begin_flush_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ProgressStore::new(dir.path());
        let rec = sample_record();
        let id = rec.operation_id;

        store.begin(rec).unwrap();
        store.mark_processed("a.jpg");
        store.flush().unwrap();

        let loaded = store.load().expect("record should load");
        assert_eq!(loaded.operation_id, id);
        assert_eq!(loaded.processed_files, vec!["a.jpg".to_string()]);
        let remaining = loaded.remaining_operations();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].file_name, "b.jpg");
    }

    #[test]
    fn periodic_flush_skips_inside_the_flush_window() {
        let dir = tempdir().unwrap();
        let store = ProgressStore::new(dir.path());
        store.begin(sample_record()).unwrap();

        // begin() just wrote durably; a tick arriving right away must not
        // rewrite the file.
        store.mark_processed("a.jpg");
        store.flush_if_due().unwrap();
        assert!(store.load().unwrap().processed_files.is_empty());

        // An unconditional flush still writes through.
        store.flush().unwrap();
        assert_eq!(
            store.load().unwrap().processed_files,
            vec!["a.jpg".to_string()]
        );
    }

    #[test]
    fn tampered_record_is_deleted_and_treated_as_absent() {
        let dir = tempdir().unwrap();
        let store = ProgressStore::new(dir.path());
        store.begin(sample_record()).unwrap();

        let path = store.progress_path();
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("a.jpg", "z.jpg")).unwrap();

        assert!(store.load().is_none());
        assert!(!path.exists(), "invalid record must be deleted");
    }

    #[test]
    fn complete_removes_the_file() {
        let dir = tempdir().unwrap();
        let store = ProgressStore::new(dir.path());
        store.begin(sample_record()).unwrap();
        assert!(store.progress_path().exists());

        store.complete().unwrap();
        assert!(!store.progress_path().exists());
        assert!(store.load().is_none());
        // Idempotent.
        store.complete().unwrap();
    }

    #[test]
    fn secret_survives_across_store_instances() {
        let dir = tempdir().unwrap();
        let rec = sample_record();
        let id = rec.operation_id;
        ProgressStore::new(dir.path()).begin(rec).unwrap();

        // Fresh instance must read the same secret and accept the record.
        let again = ProgressStore::new(dir.path());
        assert_eq!(again.load().unwrap().operation_id, id);
    }

    #[test]
    fn load_without_file_is_none() {
        let dir = tempdir().unwrap();
        let store = ProgressStore::new(dir.path());
        assert!(store.load().is_none());
    }
}
