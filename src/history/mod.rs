//! Rollback manifests and bounded persistent history.
//!
//! Manifests are recorded only for move-mode runs (copy mode needs no
//! reversal). The session manifest is the most recent move run and lives in
//! memory inside the engine; the persistent history is a bounded,
//! newest-first index plus one on-disk manifest per retained entry, keyed by
//! operation id. Exceeding the cap evicts the oldest entry.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{sanitize_io, EngineError};
use crate::executor::FileError;
use crate::fs_ops::{atomic_write, move_cross_volume, rename_durable, same_volume};
use crate::naming::BatchSummary;
use crate::planner::SortOrder;
use crate::platform;

/// Maximum retained history entries.
pub const HISTORY_CAP: usize = 10;

/// Upper bound on the number of current-paths sampled by the staleness
/// check, keeping validation cost sublinear for very large operations.
pub const STALENESS_SAMPLE: usize = 32;

const HISTORY_DIR: &str = "history";
const INDEX_FILE: &str = "index.json";

/// One file as recorded at the end of a move run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub file_name: String,
    pub original_path: PathBuf,
    pub current_path: PathBuf,
}

/// Everything needed to reverse one move run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackManifest {
    pub operation_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub prefix: Option<String>,
    pub cap: usize,
    pub sort_order: SortOrder,
    pub files: Vec<ManifestFile>,
    pub batch_folders: Vec<PathBuf>,
    pub batches: Vec<BatchSummary>,
}

/// Index row; the full manifest lives in its own file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub operation_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub file_count: usize,
    pub batch_count: usize,
}

impl HistoryEntry {
    fn from_manifest(m: &RollbackManifest) -> Self {
        Self {
            operation_id: m.operation_id,
            recorded_at: m.recorded_at,
            source_dir: m.source_dir.clone(),
            output_dir: m.output_dir.clone(),
            file_count: m.files.len(),
            batch_count: m.batch_folders.len(),
        }
    }
}

/// Outcome of one rollback run. Per-file failures never halt the remaining
/// files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResult {
    pub restored: usize,
    pub failed: Vec<FileError>,
    pub removed_folders: usize,
}

impl RollbackResult {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct HistoryManager {
    data_dir: PathBuf,
    cap: usize,
}

impl HistoryManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cap: HISTORY_CAP,
        }
    }

    #[cfg(test)]
    pub fn with_cap(data_dir: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            cap,
        }
    }

    fn history_dir(&self) -> PathBuf {
        self.data_dir.join(HISTORY_DIR)
    }

    fn index_path(&self) -> PathBuf {
        self.history_dir().join(INDEX_FILE)
    }

    fn manifest_path(&self, id: Uuid) -> PathBuf {
        self.history_dir().join(format!("{id}.json"))
    }

    /// Persist a manifest and prepend it to the index, evicting the oldest
    /// entries beyond the cap.
    pub fn record(&self, manifest: &RollbackManifest) -> Result<()> {
        fs::create_dir_all(self.history_dir())
            .with_context(|| format!("create history directory {}", self.history_dir().display()))?;
        let _ = platform::set_dir_mode_0700(&self.history_dir());

        let path = self.manifest_path(manifest.operation_id);
        let bytes = serde_json::to_vec_pretty(manifest).context("serialize manifest")?;
        atomic_write(&path, &bytes)?;
        let _ = platform::set_file_mode_0600(&path);

        let mut entries = self.history()?;
        entries.retain(|e| e.operation_id != manifest.operation_id);
        entries.insert(0, HistoryEntry::from_manifest(manifest));
        while entries.len() > self.cap {
            if let Some(evicted) = entries.pop() {
                debug!(operation_id = %evicted.operation_id, "evicting oldest history entry");
                let _ = fs::remove_file(self.manifest_path(evicted.operation_id));
            }
        }
        self.write_index(&entries)?;

        info!(
            operation_id = %manifest.operation_id,
            files = manifest.files.len(),
            "recorded rollback manifest"
        );
        Ok(())
    }

    /// Newest-first list of retained entries. A missing or unreadable index
    /// is an empty history, not an error.
    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        let bytes = match fs::read(self.index_path()) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read history index {}", self.index_path().display()))
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(error = %e, "history index is unreadable, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    pub fn load_manifest(&self, id: Uuid) -> Result<RollbackManifest> {
        let path = self.manifest_path(id);
        let bytes =
            fs::read(&path).map_err(|_| EngineError::HistoryEntryMissing(id.to_string()))?;
        let manifest = serde_json::from_slice(&bytes)
            .map_err(|_| EngineError::HistoryEntryMissing(id.to_string()))?;
        Ok(manifest)
    }

    /// Remove one entry and its manifest file.
    pub fn delete_entry(&self, id: Uuid) -> Result<()> {
        let mut entries = self.history()?;
        entries.retain(|e| e.operation_id != id);
        self.write_index(&entries)?;
        match fs::remove_file(self.manifest_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("remove manifest file"),
        }
    }

    /// Drop all history, index and manifests alike.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(self.history_dir()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("clear history {}", self.history_dir().display())),
        }
    }

    fn write_index(&self, entries: &[HistoryEntry]) -> Result<()> {
        fs::create_dir_all(self.history_dir())
            .with_context(|| format!("create history directory {}", self.history_dir().display()))?;
        let bytes = serde_json::to_vec_pretty(entries).context("serialize history index")?;
        atomic_write(&self.index_path(), &bytes)?;
        let _ = platform::set_file_mode_0600(&self.index_path());
        Ok(())
    }
}

/// Staleness check: a bounded, evenly spaced sample of the manifest's
/// current-paths must all still exist before an older entry is trusted.
pub fn is_stale(manifest: &RollbackManifest) -> bool {
    if manifest.files.is_empty() {
        return false;
    }
    let step = (manifest.files.len() / STALENESS_SAMPLE).max(1);
    manifest
        .files
        .iter()
        .step_by(step)
        .take(STALENESS_SAMPLE)
        .any(|f| !f.current_path.exists())
}

/// Reverse one move run.
///
/// Per file, same-volume vs. cross-volume is re-derived between current and
/// original path and the inverse of the forward strategy applied: rename
/// back on the same volume, copy-back + size-verify + delete-from-current
/// across volumes. A verification failure never deletes the current copy.
/// Batch folders are removed afterwards if and only if they are empty.
pub fn execute_rollback(manifest: &RollbackManifest) -> RollbackResult {
    let mut restored = 0usize;
    let mut failed: Vec<FileError> = Vec::new();

    for file in &manifest.files {
        match restore_one(file) {
            Ok(()) => restored += 1,
            Err(e) => {
                warn!(file = %file.file_name, error = %e, "rollback failed for file");
                let sanitized = match e.root_cause().downcast_ref::<std::io::Error>() {
                    Some(ioe) => sanitize_io(ioe).to_string(),
                    None => e.root_cause().to_string(),
                };
                failed.push(FileError {
                    file: file.file_name.clone(),
                    error: sanitized,
                });
            }
        }
    }

    let mut removed_folders = 0usize;
    for folder in &manifest.batch_folders {
        // remove_dir refuses non-empty directories, which is exactly the
        // wanted "only if empty" behavior.
        match fs::remove_dir(folder) {
            Ok(()) => removed_folders += 1,
            Err(e) => debug!(folder = %folder.display(), error = %e, "batch folder kept"),
        }
    }

    info!(restored, failures = failed.len(), removed_folders, "rollback settled");
    RollbackResult {
        restored,
        failed,
        removed_folders,
    }
}

fn restore_one(file: &ManifestFile) -> Result<()> {
    if let Some(parent) = file.original_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    if same_volume(&file.current_path, &file.original_path) {
        rename_durable(&file.current_path, &file.original_path)
    } else {
        move_cross_volume(&file.current_path, &file.original_path).map(|_| ())
    }
}
