//! Engine facade.
//!
//! One `Organizer` owns the progress store, the history manager, the session
//! rollback manifest and the cancel token, and exposes the full operation
//! surface: plan, execute, resume, discard, rollback and history management.
//! Collaborator policies (path approval, file-type filter, capture dates) are
//! pluggable seams with sensible defaults.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::errors::{EngineError, MAX_BATCH_CAP};
use crate::executor::{
    self, CancelToken, ExecHooks, ExecMode, ExecOptions, ExecutionResult, ProgressUpdate, Strategy,
};
use crate::fs_ops::{preflight_space, same_volume};
use crate::history::{
    self, HistoryEntry, HistoryManager, ManifestFile, RollbackManifest, RollbackResult,
};
use crate::naming::{self, BatchSummary, Operation};
use crate::planner::{self, BatchPlan, SortOrder, SourceFile};
use crate::policy::{
    CaptureDateProvider, DefaultPathPolicy, FileTypePolicy, FsDateProvider, MediaTypePolicy,
    PathPolicy,
};
use crate::store::{ProgressRecord, ProgressStore};

/// What the caller wants done.
#[derive(Debug, Clone)]
pub struct OrganizeRequest {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mode: ExecMode,
    pub cap: usize,
    pub prefix: Option<String>,
    pub sort_order: SortOrder,
}

/// A validated plan plus its concrete operations, ready to execute.
#[derive(Debug, Clone)]
pub struct PlannedRun {
    pub request: OrganizeRequest,
    pub plan: BatchPlan,
    pub operations: Vec<Operation>,
    pub batches: Vec<BatchSummary>,
    pub total_bytes: u64,
}

/// Summary of an interrupted run found on disk.
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    pub operation_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mode: ExecMode,
    pub processed: usize,
    pub total: usize,
}

/// Summary of the most recent reversible run.
#[derive(Debug, Clone)]
pub struct RollbackSummary {
    pub operation_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub file_count: usize,
    pub batch_count: usize,
}

pub struct Organizer {
    store: ProgressStore,
    history: HistoryManager,
    session: Mutex<Option<RollbackManifest>>,
    cancel: CancelToken,
    exec_opts: ExecOptions,
    path_policy: Box<dyn PathPolicy>,
    file_policy: Box<dyn FileTypePolicy>,
    date_provider: Box<dyn CaptureDateProvider>,
}

impl Organizer {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            store: ProgressStore::new(&data_dir),
            history: HistoryManager::new(&data_dir),
            session: Mutex::new(None),
            cancel: CancelToken::new(),
            exec_opts: ExecOptions::default(),
            path_policy: Box::new(DefaultPathPolicy),
            file_policy: Box::new(MediaTypePolicy),
            date_provider: Box::new(FsDateProvider),
        }
    }

    pub fn with_exec_options(mut self, opts: ExecOptions) -> Self {
        self.exec_opts = opts;
        self
    }

    pub fn with_path_policy(mut self, policy: Box<dyn PathPolicy>) -> Self {
        self.path_policy = policy;
        self
    }

    pub fn with_file_policy(mut self, policy: Box<dyn FileTypePolicy>) -> Self {
        self.file_policy = policy;
        self
    }

    pub fn with_date_provider(mut self, provider: Box<dyn CaptureDateProvider>) -> Self {
        self.date_provider = provider;
        self
    }

    /// Token shared with signal handlers; cancelling it stops the current run
    /// cooperatively.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    /// Validate the request, scan the source folder and produce the batch
    /// plan with its concrete operations. No filesystem mutation happens here.
    pub fn plan(&self, request: &OrganizeRequest) -> Result<PlannedRun> {
        if request.cap == 0 || request.cap > MAX_BATCH_CAP {
            return Err(EngineError::InvalidCap(request.cap).into());
        }
        if let Some(prefix) = request.prefix.as_deref() {
            naming::validate_pattern(prefix)?;
        }
        self.path_policy
            .approve(&request.source_dir, &request.output_dir)?;

        let (files, total_bytes) = self.scan_source(request)?;
        let plan = planner::plan(&files, request.cap, request.sort_order);
        let (operations, batches) = naming::build_operations(
            &plan,
            &request.source_dir,
            &request.output_dir,
            request.prefix.as_deref(),
            Local::now().date_naive(),
        )?;

        info!(
            files = plan.total_files,
            batches = plan.batches.len(),
            oversized = plan.oversized.len(),
            sort = %request.sort_order,
            "plan ready"
        );
        Ok(PlannedRun {
            request: request.clone(),
            plan,
            operations,
            batches,
            total_bytes,
        })
    }

    /// Execute a planned run: space pre-flight, progress record, worker run,
    /// then manifest recording for move mode. Cancellation is a valid
    /// terminal state; the progress record is kept for a later resume.
    pub fn execute(
        &self,
        planned: &PlannedRun,
        on_progress: Option<&(dyn Fn(ProgressUpdate) + Sync)>,
    ) -> Result<ExecutionResult> {
        let req = &planned.request;
        let strategy = Strategy::select(
            req.mode,
            same_volume(&req.source_dir, &req.output_dir),
        );
        if strategy.needs_space_preflight() {
            preflight_space(&req.output_dir, planned.total_bytes)?;
        }

        let record = ProgressRecord {
            operation_id: Uuid::new_v4(),
            started_at: Utc::now(),
            last_updated: Utc::now(),
            source_dir: req.source_dir.clone(),
            output_dir: req.output_dir.clone(),
            mode: req.mode,
            cap: req.cap,
            prefix: req.prefix.clone(),
            sort_order: req.sort_order,
            total_files: planned.operations.len(),
            processed_files: Vec::new(),
            operations: planned.operations.clone(),
            batches: planned.batches.clone(),
        };
        let operation_id = record.operation_id;
        self.store.begin(record)?;

        let result = self.run(
            &planned.operations,
            strategy,
            &planned.batches,
            0,
            planned.operations.len(),
            on_progress,
        );

        self.finalize(operation_id, req.mode, &planned.operations, req, &result)?;
        Ok(result)
    }

    /// Interrupted-run detection; validation failures are treated as "no
    /// record" by the store.
    pub fn check_interrupted(&self) -> Option<ProgressSummary> {
        let rec = self.store.load()?;
        Some(ProgressSummary {
            operation_id: rec.operation_id,
            started_at: rec.started_at,
            last_updated: rec.last_updated,
            source_dir: rec.source_dir.clone(),
            output_dir: rec.output_dir.clone(),
            mode: rec.mode,
            processed: rec.processed_files.len(),
            total: rec.total_files,
        })
    }

    /// Continue an interrupted run from its recorded offset, never
    /// reprocessing already completed files.
    pub fn resume(
        &self,
        on_progress: Option<&(dyn Fn(ProgressUpdate) + Sync)>,
    ) -> Result<ExecutionResult> {
        let rec = self.store.load().ok_or(EngineError::NothingToResume)?;
        let remaining = rec.remaining_operations();
        let initial = rec.total_files - remaining.len();
        let strategy = Strategy::select(rec.mode, same_volume(&rec.source_dir, &rec.output_dir));

        info!(
            operation_id = %rec.operation_id,
            remaining = remaining.len(),
            initial,
            "resuming interrupted run"
        );

        let request = OrganizeRequest {
            source_dir: rec.source_dir.clone(),
            output_dir: rec.output_dir.clone(),
            mode: rec.mode,
            cap: rec.cap,
            prefix: rec.prefix.clone(),
            sort_order: rec.sort_order,
        };
        let operation_id = rec.operation_id;
        let mode = rec.mode;
        let all_operations = rec.operations.clone();
        let batches = rec.batches.clone();
        let total = rec.total_files;

        // Reinstall as the live record so flush ticks keep extending it.
        self.store.begin(rec)?;

        let result = self.run(&remaining, strategy, &batches, initial, total, on_progress);
        self.finalize(operation_id, mode, &all_operations, &request, &result)?;
        Ok(result)
    }

    /// Explicitly drop an interrupted run's record.
    pub fn discard_interrupted(&self) -> Result<()> {
        if !self.store.progress_path().exists() {
            return Err(EngineError::NothingToResume.into());
        }
        self.store.discard()
    }

    /// Most recent reversible run: the session manifest if one exists, else
    /// the newest history entry.
    pub fn check_rollback_available(&self) -> Option<RollbackSummary> {
        if let Some(m) = self.session.lock().unwrap().as_ref() {
            return Some(RollbackSummary {
                operation_id: m.operation_id,
                recorded_at: m.recorded_at,
                output_dir: m.output_dir.clone(),
                file_count: m.files.len(),
                batch_count: m.batch_folders.len(),
            });
        }
        let entries = self.history.history().ok()?;
        let newest = entries.first()?;
        Some(RollbackSummary {
            operation_id: newest.operation_id,
            recorded_at: newest.recorded_at,
            output_dir: newest.output_dir.clone(),
            file_count: newest.file_count,
            batch_count: newest.batch_count,
        })
    }

    /// Reverse the most recent move run.
    pub fn rollback(&self) -> Result<RollbackResult> {
        let session = self.session.lock().unwrap().clone();
        let (manifest, from_history) = match session {
            Some(m) => (m, false),
            None => {
                let entries = self.history.history()?;
                let newest = entries.first().ok_or(EngineError::NothingToRollBack)?;
                (self.history.load_manifest(newest.operation_id)?, true)
            }
        };
        if from_history && history::is_stale(&manifest) {
            return Err(
                EngineError::StaleHistoryEntry(manifest.operation_id.to_string()).into(),
            );
        }
        self.run_rollback(manifest)
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.history.history()
    }

    /// Reverse one specific past run by id, after the staleness gate.
    pub fn rollback_history_entry(&self, id: Uuid) -> Result<RollbackResult> {
        let manifest = self.history.load_manifest(id)?;
        if history::is_stale(&manifest) {
            return Err(EngineError::StaleHistoryEntry(id.to_string()).into());
        }
        self.run_rollback(manifest)
    }

    pub fn delete_history_entry(&self, id: Uuid) -> Result<()> {
        let mut session = self.session.lock().unwrap();
        if session.as_ref().is_some_and(|m| m.operation_id == id) {
            *session = None;
        }
        drop(session);
        self.history.delete_entry(id)
    }

    pub fn clear_history(&self) -> Result<()> {
        *self.session.lock().unwrap() = None;
        self.history.clear()
    }

    fn run(
        &self,
        ops: &[Operation],
        strategy: Strategy,
        batches: &[BatchSummary],
        initial: usize,
        total: usize,
        on_progress: Option<&(dyn Fn(ProgressUpdate) + Sync)>,
    ) -> ExecutionResult {
        let mark = |op: &Operation| self.store.mark_processed(&op.file_name);
        let flush = || {
            if let Err(e) = self.store.flush_if_due() {
                warn!(error = %e, "progress flush failed");
            }
        };
        let hooks = ExecHooks {
            on_progress,
            on_file_done: Some(&mark),
            on_flush: Some(&flush),
        };
        executor::execute(
            ops,
            strategy,
            batches,
            &self.exec_opts,
            &self.cancel,
            &hooks,
            initial,
            total,
        )
    }

    /// Post-run bookkeeping. A cancelled run keeps its progress record for a
    /// later resume; a settled run deletes it and, for move mode, records the
    /// rollback manifest covering every file that actually moved.
    fn finalize(
        &self,
        operation_id: Uuid,
        mode: ExecMode,
        all_operations: &[Operation],
        request: &OrganizeRequest,
        result: &ExecutionResult,
    ) -> Result<()> {
        if result.cancelled {
            self.store.flush()?;
            debug!(operation_id = %operation_id, "run cancelled, progress record kept");
            return Ok(());
        }

        self.store.complete()?;

        if mode == ExecMode::Move {
            let failed: HashSet<&str> = result.errors.iter().map(|e| e.file.as_str()).collect();
            let files: Vec<ManifestFile> = all_operations
                .iter()
                .filter(|op| !failed.contains(op.file_name.as_str()))
                .map(|op| ManifestFile {
                    file_name: op.file_name.clone(),
                    original_path: op.source_path.clone(),
                    current_path: op.destination_path.clone(),
                })
                .collect();
            if files.is_empty() {
                return Ok(());
            }
            let manifest = RollbackManifest {
                operation_id,
                recorded_at: Utc::now(),
                source_dir: request.source_dir.clone(),
                output_dir: request.output_dir.clone(),
                prefix: request.prefix.clone(),
                cap: request.cap,
                sort_order: request.sort_order,
                files,
                batch_folders: result
                    .batches
                    .iter()
                    .map(|b| request.output_dir.join(&b.folder))
                    .collect(),
                batches: result.batches.clone(),
            };
            self.history.record(&manifest)?;
            *self.session.lock().unwrap() = Some(manifest);
        }
        Ok(())
    }

    fn run_rollback(&self, manifest: RollbackManifest) -> Result<RollbackResult> {
        let result = history::execute_rollback(&manifest);
        if result.is_complete() {
            self.history.delete_entry(manifest.operation_id)?;
            let mut session = self.session.lock().unwrap();
            if session
                .as_ref()
                .is_some_and(|m| m.operation_id == manifest.operation_id)
            {
                *session = None;
            }
        }
        Ok(result)
    }

    /// Shallow scan of the source folder through the file-type policy.
    /// Subfolders are not descended into; a folder of folders is a different
    /// organizing job.
    fn scan_source(&self, request: &OrganizeRequest) -> Result<(Vec<SourceFile>, u64)> {
        let mut files = Vec::new();
        let mut total_bytes = 0u64;
        let wants_dates = matches!(request.sort_order, SortOrder::DateAsc | SortOrder::DateDesc);

        for entry in WalkDir::new(&request.source_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
        {
            let entry = entry.with_context(|| {
                format!("scan source folder {}", request.source_dir.display())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                debug!(path = %entry.path().display(), "skipping non-UTF-8 file name");
                continue;
            };
            if !self.file_policy.eligible(name) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            total_bytes = total_bytes.saturating_add(size);
            let timestamp = if wants_dates {
                self.date_provider.capture_date(entry.path())
            } else {
                None
            };
            files.push(SourceFile {
                name: name.to_string(),
                size,
                timestamp,
            });
        }
        debug!(eligible = files.len(), total_bytes, "source scan complete");
        Ok((files, total_bytes))
    }
}
