//! Operation execution: strategy selection, bounded worker pool with an
//! atomic work-claiming cursor, chunked synchronous renames, throttled
//! progress ticks and cooperative cancellation.

mod cancel;

pub use cancel::CancelToken;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::sanitize_io;
use crate::fs_ops;
use crate::naming::{BatchSummary, Operation};

/// How the run treats the originals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    Copy,
    Move,
}

impl std::fmt::Display for ExecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExecMode::Copy => "copy",
            ExecMode::Move => "move",
        })
    }
}

/// Per-run execution strategy, decided exactly once from the mode and
/// whether source and destination share a storage volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Bounded-concurrency parallel copy; originals untouched.
    ParallelCopy,
    /// Synchronous renames in fixed-size chunks with yields between chunks.
    SameVolumeRename,
    /// Parallel copy + byte-size verification + source deletion.
    CrossVolumeMove,
}

impl Strategy {
    pub fn select(mode: ExecMode, same_volume: bool) -> Self {
        match (mode, same_volume) {
            (ExecMode::Copy, _) => Strategy::ParallelCopy,
            (ExecMode::Move, true) => Strategy::SameVolumeRename,
            (ExecMode::Move, false) => Strategy::CrossVolumeMove,
        }
    }

    /// Whether the run consumes destination space it did not occupy before.
    pub fn needs_space_preflight(&self) -> bool {
        !matches!(self, Strategy::SameVolumeRename)
    }
}

/// Tunables for one run. File-transfer and directory-creation concurrency
/// are independent ceilings; the latter stays low to bound simultaneously
/// open descriptors while pre-creating output folders.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub file_concurrency: usize,
    pub dir_concurrency: usize,
    pub rename_chunk: usize,
    pub progress_interval: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            file_concurrency: 8,
            dir_concurrency: 2,
            rename_chunk: 500,
            progress_interval: Duration::from_millis(300),
        }
    }
}

/// Throttled progress report. `complete` is true exactly once, after the
/// run (or its cancellation) settles.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub processed: usize,
    pub total: usize,
    pub complete: bool,
}

impl ProgressUpdate {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            100
        } else {
            ((self.processed * 100) / self.total).min(100) as u8
        }
    }
}

/// A single file's failure, with sanitized message. Never aborts the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub file: String,
    pub error: String,
}

/// Outcome of one Execute/Resume call. `success` means the run settled
/// without cancellation; per-file failures are reported via `errors` and
/// partial completion is a first-class, resumable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub cancelled: bool,
    pub batches_created: usize,
    pub batches: Vec<BatchSummary>,
    pub errors: Vec<FileError>,
    pub processed_files: usize,
}

impl ExecutionResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Callbacks wired in by the coordinator. `on_file_done` feeds the progress
/// store (and manifest accounting); `on_flush` is the durable checkpoint
/// tick; `on_progress` crosses to the interface layer at a throttled cadence.
#[derive(Default)]
pub struct ExecHooks<'a> {
    pub on_progress: Option<&'a (dyn Fn(ProgressUpdate) + Sync)>,
    pub on_file_done: Option<&'a (dyn Fn(&Operation) + Sync)>,
    pub on_flush: Option<&'a (dyn Fn() + Sync)>,
}

/// Run `ops` under the chosen strategy.
///
/// `initial_processed` offsets all progress accounting for resumed runs;
/// `total` is the full operation count of the original run (equal to
/// `initial_processed + ops.len()`).
#[allow(clippy::too_many_arguments)]
pub fn execute(
    ops: &[Operation],
    strategy: Strategy,
    batches: &[BatchSummary],
    opts: &ExecOptions,
    cancel: &CancelToken,
    hooks: &ExecHooks<'_>,
    initial_processed: usize,
    total: usize,
) -> ExecutionResult {
    let processed = AtomicUsize::new(0);
    let errors: Mutex<Vec<FileError>> = Mutex::new(Vec::new());

    info!(
        operations = ops.len(),
        ?strategy,
        initial_processed,
        "starting execution"
    );

    if !cancel.is_cancelled() {
        precreate_directories(ops, opts.dir_concurrency, &errors);
    }

    // Progress ticker, owned by this run and torn down before returning.
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let interval = opts.progress_interval;

    std::thread::scope(|scope| {
        let ticker_handle = (hooks.on_progress.is_some() || hooks.on_flush.is_some()).then(|| {
            let processed = &processed;
            scope.spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            if let Some(cb) = hooks.on_progress {
                                cb(ProgressUpdate {
                                    processed: initial_processed
                                        + processed.load(Ordering::Relaxed),
                                    total,
                                    complete: false,
                                });
                            }
                            if let Some(flush) = hooks.on_flush {
                                flush();
                            }
                        }
                    }
                }
            })
        });

        match strategy {
            Strategy::SameVolumeRename => {
                run_chunked_renames(ops, opts.rename_chunk, cancel, hooks, &processed, &errors)
            }
            Strategy::ParallelCopy | Strategy::CrossVolumeMove => run_worker_pool(
                ops,
                strategy,
                opts.file_concurrency,
                cancel,
                hooks,
                &processed,
                &errors,
            ),
        }

        let _ = stop_tx.send(());
        if let Some(h) = ticker_handle {
            let _ = h.join();
        }
    });

    let done = initial_processed + processed.load(Ordering::Relaxed);
    let cancelled = cancel.is_cancelled();

    // The final 100%-complete report is sent exactly once after the run (or
    // cancellation) settles.
    if let Some(cb) = hooks.on_progress {
        cb(ProgressUpdate {
            processed: done,
            total,
            complete: true,
        });
    }

    let errors = errors.into_inner().unwrap_or_default();
    info!(
        processed = done,
        errors = errors.len(),
        cancelled,
        "execution settled"
    );

    ExecutionResult {
        success: !cancelled,
        cancelled,
        batches_created: batches.len(),
        batches: batches.to_vec(),
        errors,
        processed_files: done,
    }
}

/// Pre-create the distinct destination folders under the directory-creation
/// ceiling. A failure here is recorded once per folder; the files aimed at
/// it will fail (and be recorded) individually, the run continues.
fn precreate_directories(ops: &[Operation], dir_concurrency: usize, errors: &Mutex<Vec<FileError>>) {
    let mut unique: Vec<PathBuf> = ops
        .iter()
        .filter_map(|o| o.destination_path.parent().map(|p| p.to_path_buf()))
        .collect();
    unique.sort();
    unique.dedup();

    let create = |dir: &PathBuf| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(error = %e, dir = %dir.display(), "failed to create batch folder");
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            errors.lock().unwrap().push(FileError {
                file: name,
                error: sanitize_io(&e).to_string(),
            });
        }
    };

    match rayon::ThreadPoolBuilder::new()
        .num_threads(dir_concurrency.max(1))
        .build()
    {
        Ok(pool) => pool.scope(|s| {
            for dir in &unique {
                s.spawn(move |_| create(dir));
            }
        }),
        Err(_) => unique.iter().for_each(create),
    }
    debug!(folders = unique.len(), "destination folders pre-created");
}

/// Same-volume move path: renames are near-instant per file, but tens of
/// thousands of uninterrupted synchronous calls would starve the ticker and
/// cancellation checks, so the list is processed in fixed-size chunks with
/// an explicit yield in between.
fn run_chunked_renames(
    ops: &[Operation],
    chunk_size: usize,
    cancel: &CancelToken,
    hooks: &ExecHooks<'_>,
    processed: &AtomicUsize,
    errors: &Mutex<Vec<FileError>>,
) {
    for chunk in ops.chunks(chunk_size.max(1)) {
        for op in chunk {
            // Checked before every rename; the load is negligible next to
            // the syscall and bounds post-cancel work to the file in flight.
            if cancel.is_cancelled() {
                debug!("cancellation observed during rename chunk");
                return;
            }
            match fs_ops::rename_durable(&op.source_path, &op.destination_path) {
                Ok(()) => complete_one(op, hooks, processed),
                Err(e) => record_error(op, &e, errors),
            }
        }
        std::thread::yield_now();
    }
}

/// Copy-based paths: a bounded pool of workers claims indices from a shared
/// monotonic cursor. Completion order is unordered across workers; the
/// processed count is monotonically non-decreasing regardless.
fn run_worker_pool(
    ops: &[Operation],
    strategy: Strategy,
    file_concurrency: usize,
    cancel: &CancelToken,
    hooks: &ExecHooks<'_>,
    processed: &AtomicUsize,
    errors: &Mutex<Vec<FileError>>,
) {
    let workers = file_concurrency.max(1).min(ops.len().max(1));
    let cursor = AtomicUsize::new(0);

    let work = |_scope: &rayon::Scope<'_>| {
        loop {
            // Cooperative cancellation: checked before each unit of work; an
            // already claimed operation runs to completion.
            if cancel.is_cancelled() {
                return;
            }
            let idx = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(op) = ops.get(idx) else { return };

            let outcome = match strategy {
                Strategy::CrossVolumeMove => {
                    fs_ops::move_cross_volume(&op.source_path, &op.destination_path).map(|_| ())
                }
                _ => fs_ops::copy_to_temp_then_rename(&op.source_path, &op.destination_path)
                    .map(|_| ()),
            };
            match outcome {
                Ok(()) => complete_one(op, hooks, processed),
                Err(e) => record_error(op, &e, errors),
            }
        }
    };

    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.scope(|s| {
            for _ in 0..workers {
                s.spawn(work);
            }
        }),
        Err(e) => {
            // Thread pool creation only fails under resource exhaustion;
            // degrade to a single in-place worker rather than giving up.
            warn!(error = %e, "falling back to single-threaded execution");
            rayon::scope(|s| work(s));
        }
    }
}

fn complete_one(op: &Operation, hooks: &ExecHooks<'_>, processed: &AtomicUsize) {
    processed.fetch_add(1, Ordering::Relaxed);
    if let Some(cb) = hooks.on_file_done {
        cb(op);
    }
}

fn record_error(op: &Operation, e: &anyhow::Error, errors: &Mutex<Vec<FileError>>) {
    warn!(file = %op.file_name, error = %e, "operation failed");
    let sanitized = match e.root_cause().downcast_ref::<std::io::Error>() {
        Some(ioe) => sanitize_io(ioe).to_string(),
        None => e.root_cause().to_string(),
    };
    errors.lock().unwrap().push(FileError {
        file: op.file_name.clone(),
        error: sanitized,
    });
}
