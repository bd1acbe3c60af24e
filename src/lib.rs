//! shutterbatch: split oversized photo/video folders into size-capped batch
//! folders, safely and reversibly.
//!
//! The crate is organized around a small engine facade ([`Organizer`]) that
//! wires together the layers:
//! - `planner` groups sibling files (same base name, different extensions)
//!   and packs groups into capped batches without ever splitting a group.
//! - `naming` turns a plan into concrete folder names and file operations.
//! - `executor` runs the operations with a strategy picked per run (parallel
//!   copy, same-volume rename, or cross-volume copy+verify+delete), with
//!   cooperative cancellation and periodic progress flushes.
//! - `store` persists a tamper-evident progress record so an interrupted run
//!   can be resumed without reprocessing files.
//! - `history` retains rollback manifests for past move runs and can reverse
//!   them file by file.
//!
//! The binary front-end lives in `cli` and `app`; library callers can use
//! [`Organizer`] directly.

pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod fs_ops;
pub mod history;
pub mod logging;
pub mod naming;
pub mod output;
pub mod planner;
pub mod platform;
pub mod policy;
pub mod store;

pub(crate) mod utils;

pub use config::{Config, LogLevel};
pub use engine::{Organizer, OrganizeRequest, PlannedRun, ProgressSummary, RollbackSummary};
pub use errors::EngineError;
pub use executor::{ExecMode, ExecutionResult};
